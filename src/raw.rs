//! The generic, untyped parse result shared by every document format.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

const COMPONENTS_PREFIX: &str = "#/components/schemas/";
const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Stable identifier of a named schema node: the internal reference that
/// addresses it, e.g. `#/components/schemas/Pet`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SchemaId(pub String);

impl SchemaId {
    /// Declared name for schemas in a schema container, the full pointer for
    /// anything else.
    pub fn name(&self) -> &str {
        self.0
            .strip_prefix(COMPONENTS_PREFIX)
            .or_else(|| self.0.strip_prefix(DEFINITIONS_PREFIX))
            .unwrap_or(&self.0)
    }

    /// The id with a Swagger 2.0 `#/definitions/` container spelled as
    /// `#/components/schemas/`.
    pub fn canonical(&self) -> SchemaId {
        match self.0.strip_prefix(DEFINITIONS_PREFIX) {
            Some(rest) => SchemaId(format!("{COMPONENTS_PREFIX}{rest}")),
            None => self.clone(),
        }
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A JSON/YAML number with a total order so it can live in sets and sort keys.
///
/// Integers are kept exact. An integral float such as `1.0` is stored as the
/// integer `1`, so both spellings compare and serialize identically.
#[derive(Debug, Clone, Copy)]
pub struct Number(Repr);

#[derive(Debug, Clone, Copy)]
enum Repr {
    Integer(i128),
    Float(f64),
}

/// 2^63; integral floats below this magnitude are stored as integers.
const INTEGRAL_FLOAT_LIMIT: f64 = 9.223_372_036_854_775_808e18;

impl Number {
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < INTEGRAL_FLOAT_LIMIT {
            Number(Repr::Integer(value as i128))
        } else {
            Number(Repr::Float(value))
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Number(Repr::Integer(i128::from(value)))
    }

    pub fn from_u64(value: u64) -> Self {
        Number(Repr::Integer(i128::from(value)))
    }

    pub fn is_integral(self) -> bool {
        match self.0 {
            Repr::Integer(_) => true,
            Repr::Float(f) => f.is_finite() && f.fract() == 0.0,
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self.0 {
            Repr::Integer(i) => u64::try_from(i).ok(),
            Repr::Float(_) => None,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Repr::Integer(a), Repr::Integer(b)) => a.cmp(&b),
            (Repr::Float(a), Repr::Float(b)) => a.total_cmp(&b),
            // An integer never equals a float; ties after rounding put the
            // integer first.
            (Repr::Integer(a), Repr::Float(b)) => (a as f64).total_cmp(&b).then(Ordering::Less),
            (Repr::Float(a), Repr::Integer(b)) => a.total_cmp(&(b as f64)).then(Ordering::Greater),
        }
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.0 {
            Repr::Integer(i) => (0u8, i).hash(state),
            Repr::Float(f) => (1u8, f.to_bits()).hash(state),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Repr::Integer(i) => match (i64::try_from(i), u64::try_from(i)) {
                (Ok(v), _) => serializer.serialize_i64(v),
                (_, Ok(v)) => serializer.serialize_u64(v),
                _ => serializer.serialize_f64(i as f64),
            },
            Repr::Float(f) => serializer.serialize_f64(f),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Integer(i) => write!(f, "{i}"),
            Repr::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Mapping that keeps the document's key order; lookups are linear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMap(Vec<(String, RawNode)>);

impl RawMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts a key, replacing the value of an earlier duplicate in place.
    pub fn insert(&mut self, key: String, value: RawNode) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawNode> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawNode)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(RawNode::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(RawNode::as_bool)
    }

    pub fn get_map(&self, key: &str) -> Option<&RawMap> {
        self.get(key).and_then(RawNode::as_map)
    }

    pub fn get_seq(&self, key: &str) -> Option<&[RawNode]> {
        self.get(key).and_then(RawNode::as_seq)
    }
}

impl FromIterator<(String, RawNode)> for RawMap {
    fn from_iter<I: IntoIterator<Item = (String, RawNode)>>(iter: I) -> Self {
        let mut map = RawMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Parsed document node. Produced by the loaders; `Ref` only ever appears in
/// trees rewritten by the resolver, where it marks a cycle edge.
#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<RawNode>),
    Mapping(RawMap),
    Ref(SchemaId),
}

impl RawNode {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RawNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            RawNode::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&RawMap> {
        match self {
            RawNode::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[RawNode]> {
        match self {
            RawNode::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in warnings.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawNode::Null => "null",
            RawNode::Bool(_) => "boolean",
            RawNode::Number(_) => "number",
            RawNode::String(_) => "string",
            RawNode::Sequence(_) => "sequence",
            RawNode::Mapping(_) => "mapping",
            RawNode::Ref(_) => "reference",
        }
    }

    /// Follows an RFC 6901 JSON pointer (without the leading `#`).
    pub fn pointer(&self, pointer: &str) -> Option<&RawNode> {
        if pointer.is_empty() {
            return Some(self);
        }
        let rest = pointer.strip_prefix('/')?;
        let mut current = self;
        for token in rest.split('/') {
            let token = unescape_pointer_token(token);
            current = match current {
                RawNode::Mapping(map) => map.get(&token)?,
                RawNode::Sequence(items) => items.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

pub fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Converts a scalar or composite node to the equivalent JSON value.
impl From<&RawNode> for serde_json::Value {
    fn from(node: &RawNode) -> Self {
        match node {
            RawNode::Null => serde_json::Value::Null,
            RawNode::Bool(b) => serde_json::Value::Bool(*b),
            RawNode::Number(n) => serde_json::to_value(n).unwrap_or(serde_json::Value::Null),
            RawNode::String(s) => serde_json::Value::String(s.clone()),
            RawNode::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            RawNode::Mapping(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                    .collect(),
            ),
            RawNode::Ref(id) => serde_json::json!({ "$ref": id.0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawNode {
        let mut inner = RawMap::new();
        inner.insert("a/b".to_string(), RawNode::Bool(true));
        let mut root = RawMap::new();
        root.insert("paths".to_string(), RawNode::Mapping(inner));
        root.insert(
            "list".to_string(),
            RawNode::Sequence(vec![RawNode::String("x".to_string())]),
        );
        RawNode::Mapping(root)
    }

    #[test]
    fn test_pointer_unescapes_tokens() {
        let root = sample();
        assert_eq!(root.pointer("/paths/a~1b"), Some(&RawNode::Bool(true)));
        assert_eq!(
            root.pointer("/list/0"),
            Some(&RawNode::String("x".to_string()))
        );
        assert_eq!(root.pointer("/missing"), None);
        assert_eq!(root.pointer(""), Some(&root));
    }

    #[test]
    fn test_insert_replaces_duplicates_in_place() {
        let mut map = RawMap::new();
        map.insert("k".to_string(), RawNode::Null);
        map.insert("j".to_string(), RawNode::Null);
        map.insert("k".to_string(), RawNode::Bool(false));
        assert_eq!(map.len(), 2);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["k", "j"]);
        assert_eq!(map.get_bool("k"), Some(false));
    }

    #[test]
    fn test_number_equality_ignores_integral_encoding() {
        assert_eq!(Number::new(1.0), Number::new(1.0_f64));
        assert_eq!(Number::new(-0.0), Number::new(0.0));
        assert!(Number::new(2.5) > Number::new(2.0));
        assert_eq!(serde_json::to_string(&Number::new(3.0)).unwrap(), "3");
        assert_eq!(Number::new(7.0).as_u64(), Some(7));
        assert_eq!(Number::new(7.5).as_u64(), None);
    }

    #[test]
    fn test_large_integers_stay_distinct() {
        let a = Number::from_u64(9_007_199_254_740_993);
        let b = Number::from_u64(9_007_199_254_740_992);
        assert_ne!(a, b);
        assert!(a > b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "9007199254740993");
        assert_eq!(Number::from_i64(-4), Number::new(-4.0));
        assert_eq!(Number::from_u64(u64::MAX).as_u64(), Some(u64::MAX));
        assert!(Number::new(0.5) < Number::from_i64(1));
    }

    #[test]
    fn test_schema_id_name() {
        let id = SchemaId("#/components/schemas/Pet".to_string());
        assert_eq!(id.name(), "Pet");
        assert_eq!(SchemaId("#/definitions/Pet".to_string()).name(), "Pet");
        assert_eq!(
            SchemaId("#/paths/~1a/get".to_string()).name(),
            "#/paths/~1a/get"
        );
    }

    #[test]
    fn test_schema_id_canonical_container() {
        let swagger = SchemaId("#/definitions/Node".to_string());
        let openapi = SchemaId("#/components/schemas/Node".to_string());
        assert_eq!(swagger.canonical(), openapi);
        assert_eq!(openapi.canonical(), openapi);
    }
}

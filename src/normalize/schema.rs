//! Schema normalization: resolved JSON-Schema-like nodes to [`Schema`].
//!
//! Equivalent spellings converge on one form: `nullable: true` and
//! `type: [T, "null"]` both become `anyOf [T, null]`, `const` becomes a
//! one-value enum, `allOf` over objects is merged into one object, and union
//! alternatives are flattened, deduplicated and sorted.

use crate::canonical::{
    AdditionalFields, ArraySchema, Bound, Literal, ObjectSchema, PrimitiveKind, PrimitiveSchema,
    Schema, UnionKind, UnionSchema,
};
use crate::error::Warning;
use crate::raw::{Number, RawMap, RawNode, escape_pointer_token};
use std::collections::{BTreeMap, BTreeSet};

/// Constructs that have no defined normalization. Each occurrence produces a
/// warning and is otherwise ignored.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "not",
    "if",
    "then",
    "else",
    "patternProperties",
    "dependentSchemas",
    "dependentRequired",
    "dependencies",
    "prefixItems",
    "contains",
    "propertyNames",
    "unevaluatedProperties",
    "unevaluatedItems",
    "$dynamicRef",
    "$recursiveRef",
];

/// Keywords that give a schema node structure of its own, next to any
/// combinator it might carry.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "enum",
    "const",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
];

const COMBINATORS: &[(&str, UnionKind)] = &[
    ("allOf", UnionKind::AllOf),
    ("anyOf", UnionKind::AnyOf),
    ("oneOf", UnionKind::OneOf),
];

pub struct SchemaNormalizer<'w> {
    warnings: &'w mut Vec<Warning>,
}

impl<'w> SchemaNormalizer<'w> {
    pub fn new(warnings: &'w mut Vec<Warning>) -> Self {
        Self { warnings }
    }

    /// Normalizes the schema node found at `pointer`.
    pub fn normalize(&mut self, node: &RawNode, pointer: &str) -> Schema {
        match node {
            RawNode::Ref(id) => Schema::Reference { id: id.canonical() },
            RawNode::Mapping(map) => self.normalize_map(map, pointer),
            RawNode::Bool(true) => Schema::any(),
            RawNode::Bool(false) => {
                self.warnings
                    .push(Warning::unsupported_construct(pointer, "false"));
                Schema::any()
            }
            other => {
                self.warn(
                    pointer,
                    format!("expected a schema, found a {}", other.kind_name()),
                );
                Schema::any()
            }
        }
    }

    /// Normalizes a mapping that may carry schema keywords inline next to
    /// other keys, as Swagger 2.0 non-body parameters do.
    pub fn normalize_map(&mut self, map: &RawMap, pointer: &str) -> Schema {
        for keyword in UNSUPPORTED_KEYWORDS {
            if map.contains_key(keyword) {
                self.warnings.push(Warning::unsupported_construct(
                    format!("{pointer}/{}", escape_pointer_token(keyword)),
                    keyword,
                ));
            }
        }

        let mut conjuncts = Vec::new();
        let structural = STRUCTURAL_KEYWORDS.iter().any(|k| map.contains_key(k));
        if structural {
            conjuncts.push(self.normalize_typed(map, pointer));
        }
        for (keyword, kind) in COMBINATORS {
            let Some(node) = map.get(keyword) else {
                continue;
            };
            let Some(items) = node.as_seq() else {
                self.warn(
                    &format!("{pointer}/{keyword}"),
                    format!("{keyword} must be a list, found a {}", node.kind_name()),
                );
                continue;
            };
            let alternatives = items
                .iter()
                .enumerate()
                .map(|(index, item)| self.normalize(item, &format!("{pointer}/{keyword}/{index}")))
                .collect();
            conjuncts.push(make_union(*kind, alternatives));
        }

        let schema = match conjuncts.len() {
            0 => Schema::any(),
            1 => conjuncts.remove(0),
            _ => make_union(UnionKind::AllOf, conjuncts),
        };

        if is_nullable(map) {
            make_union(UnionKind::AnyOf, vec![schema, Schema::primitive(PrimitiveKind::Null)])
        } else {
            schema
        }
    }

    fn normalize_typed(&mut self, map: &RawMap, pointer: &str) -> Schema {
        let mut types: Vec<&str> = match map.get("type") {
            None => infer_type(map).into_iter().collect(),
            Some(RawNode::String(name)) => vec![name.as_str()],
            Some(RawNode::Sequence(names)) => names.iter().filter_map(RawNode::as_str).collect(),
            Some(other) => {
                self.warn(
                    &format!("{pointer}/type"),
                    format!("type must be a string or a list, found a {}", other.kind_name()),
                );
                Vec::new()
            }
        };
        types.sort_unstable();
        types.dedup();

        if types.is_empty() {
            return self.primitive(map, PrimitiveKind::Any, pointer);
        }
        let alternatives: Vec<Schema> = types
            .into_iter()
            .map(|name| self.single_type(map, name, pointer))
            .collect();
        make_union(UnionKind::AnyOf, alternatives)
    }

    fn single_type(&mut self, map: &RawMap, name: &str, pointer: &str) -> Schema {
        match name {
            "object" => self.object(map, pointer),
            "array" => self.array(map, pointer),
            "file" => {
                let mut schema = self.primitive(map, PrimitiveKind::String, pointer);
                if let Schema::Primitive(p) = &mut schema {
                    p.format = Some("binary".to_string());
                }
                schema
            }
            other => match PrimitiveKind::from_id(other) {
                Some(PrimitiveKind::Any) | None => {
                    self.warnings.push(Warning::unsupported_construct(
                        format!("{pointer}/type"),
                        &format!("type: {other}"),
                    ));
                    self.primitive(map, PrimitiveKind::Any, pointer)
                }
                Some(kind) => self.primitive(map, kind, pointer),
            },
        }
    }

    fn primitive(&mut self, map: &RawMap, kind: PrimitiveKind, pointer: &str) -> Schema {
        let mut schema = PrimitiveSchema {
            kind,
            format: map.get_str("format").map(str::to_string),
            minimum: lower_bound(map),
            maximum: upper_bound(map),
            multiple_of: map.get("multipleOf").and_then(RawNode::as_number),
            min_length: map.get("minLength").and_then(RawNode::as_number).and_then(Number::as_u64),
            max_length: map.get("maxLength").and_then(RawNode::as_number).and_then(Number::as_u64),
            pattern: map.get_str("pattern").map(str::to_string),
            enumeration: self.enumeration(map, pointer),
        };
        if kind == PrimitiveKind::Boolean
            && schema
                .enumeration
                .as_ref()
                .is_some_and(|values| values.contains(&Literal::Bool(true)) && values.contains(&Literal::Bool(false)))
        {
            schema.enumeration = None;
        }
        Schema::Primitive(schema)
    }

    fn enumeration(&mut self, map: &RawMap, pointer: &str) -> Option<BTreeSet<Literal>> {
        if let Some(value) = map.get("const") {
            return Some(BTreeSet::from([literal(value)]));
        }
        match map.get("enum")? {
            RawNode::Sequence(values) => Some(values.iter().map(literal).collect()),
            other => {
                self.warn(
                    &format!("{pointer}/enum"),
                    format!("enum must be a list, found a {}", other.kind_name()),
                );
                None
            }
        }
    }

    fn object(&mut self, map: &RawMap, pointer: &str) -> Schema {
        let mut fields = BTreeMap::new();
        if let Some(properties) = map.get_map("properties") {
            for (name, node) in properties.iter() {
                let child = format!("{pointer}/properties/{}", escape_pointer_token(name));
                fields.insert(name.to_string(), self.normalize(node, &child));
            }
        }
        let required = map
            .get_seq("required")
            .map(|names| {
                names
                    .iter()
                    .filter_map(RawNode::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let additional = match map.get("additionalProperties") {
            None | Some(RawNode::Bool(true)) => AdditionalFields::Allowed,
            Some(RawNode::Bool(false)) => AdditionalFields::Forbidden,
            Some(node) => {
                let schema = self.normalize(node, &format!("{pointer}/additionalProperties"));
                if schema.is_any() {
                    AdditionalFields::Allowed
                } else {
                    AdditionalFields::Schema(Box::new(schema))
                }
            }
        };
        Schema::Object(ObjectSchema {
            fields,
            required,
            additional,
        })
    }

    fn array(&mut self, map: &RawMap, pointer: &str) -> Schema {
        let items = match map.get("items") {
            None => Schema::any(),
            Some(RawNode::Sequence(_)) => {
                self.warnings.push(Warning::unsupported_construct(
                    format!("{pointer}/items"),
                    "items as a list",
                ));
                Schema::any()
            }
            Some(node) => self.normalize(node, &format!("{pointer}/items")),
        };
        Schema::Array(ArraySchema {
            items: Box::new(items),
            min_items: map.get("minItems").and_then(RawNode::as_number).and_then(Number::as_u64),
            max_items: map.get("maxItems").and_then(RawNode::as_number).and_then(Number::as_u64),
            unique_items: map.get_bool("uniqueItems").unwrap_or(false),
        })
    }

    fn warn(&mut self, pointer: &str, message: String) {
        self.warnings.push(Warning {
            side: None,
            pointer: pointer.to_string(),
            message,
        });
    }
}

fn is_nullable(map: &RawMap) -> bool {
    map.get_bool("nullable") == Some(true) || map.get_bool("x-nullable") == Some(true)
}

/// Type implied by the keywords present when `type` is absent.
fn infer_type(map: &RawMap) -> Option<&'static str> {
    if map.contains_key("properties")
        || map.contains_key("additionalProperties")
        || map.get_seq("required").is_some()
    {
        return Some("object");
    }
    if map.contains_key("items") {
        return Some("array");
    }
    let values: Vec<&RawNode> = match (map.get("const"), map.get_seq("enum")) {
        (Some(value), _) => vec![value],
        (None, Some(values)) => values.iter().collect(),
        (None, None) => Vec::new(),
    };
    if !values.is_empty() {
        return if values.iter().all(|v| matches!(v, RawNode::String(_))) {
            Some("string")
        } else if values
            .iter()
            .all(|v| v.as_number().is_some_and(Number::is_integral))
        {
            Some("integer")
        } else if values.iter().all(|v| v.as_number().is_some()) {
            Some("number")
        } else if values.iter().all(|v| v.as_bool().is_some()) {
            Some("boolean")
        } else {
            None
        };
    }
    if ["minLength", "maxLength", "pattern"]
        .iter()
        .any(|k| map.contains_key(k))
    {
        return Some("string");
    }
    None
}

fn lower_bound(map: &RawMap) -> Option<Bound> {
    let minimum = map.get("minimum").and_then(RawNode::as_number);
    let mut candidates = Vec::new();
    match map.get("exclusiveMinimum") {
        Some(RawNode::Bool(exclusive)) => {
            if let Some(value) = minimum {
                candidates.push(Bound {
                    value,
                    exclusive: *exclusive,
                });
            }
        }
        Some(RawNode::Number(value)) => {
            candidates.push(Bound {
                value: *value,
                exclusive: true,
            });
            if let Some(value) = minimum {
                candidates.push(Bound {
                    value,
                    exclusive: false,
                });
            }
        }
        _ => {
            if let Some(value) = minimum {
                candidates.push(Bound {
                    value,
                    exclusive: false,
                });
            }
        }
    }
    // Higher value is tighter; at equal value the exclusive bound sorts last.
    candidates.into_iter().max()
}

fn upper_bound(map: &RawMap) -> Option<Bound> {
    let maximum = map.get("maximum").and_then(RawNode::as_number);
    let mut candidates = Vec::new();
    match map.get("exclusiveMaximum") {
        Some(RawNode::Bool(exclusive)) => {
            if let Some(value) = maximum {
                candidates.push(Bound {
                    value,
                    exclusive: *exclusive,
                });
            }
        }
        Some(RawNode::Number(value)) => {
            candidates.push(Bound {
                value: *value,
                exclusive: true,
            });
            if let Some(value) = maximum {
                candidates.push(Bound {
                    value,
                    exclusive: false,
                });
            }
        }
        _ => {
            if let Some(value) = maximum {
                candidates.push(Bound {
                    value,
                    exclusive: false,
                });
            }
        }
    }
    candidates
        .into_iter()
        .min_by(|a, b| a.value.cmp(&b.value).then(b.exclusive.cmp(&a.exclusive)))
}

/// Canonical literal for an enumerated value.
pub fn literal(node: &RawNode) -> Literal {
    match node {
        RawNode::Null => Literal::Null,
        RawNode::Bool(b) => Literal::Bool(*b),
        RawNode::Number(n) => Literal::Number(*n),
        RawNode::String(s) => Literal::String(s.clone()),
        composite => Literal::Composite(
            serde_json::to_string(&serde_json::Value::from(composite)).unwrap_or_default(),
        ),
    }
}

/// Builds a union in canonical form.
///
/// Nested unions of the same combinator are flattened (`oneOf` is kept nested,
/// since flattening changes its exactly-one meaning), alternatives are sorted by
/// signature and deduplicated, and a single remaining alternative stands for
/// itself. `allOf` drops unconstrained members and merges all-object members
/// into one object.
pub fn make_union(kind: UnionKind, alternatives: Vec<Schema>) -> Schema {
    let mut flat = Vec::with_capacity(alternatives.len());
    for alternative in alternatives {
        match alternative {
            Schema::Union(union) if union.combinator == kind && kind != UnionKind::OneOf => {
                flat.extend(union.alternatives)
            }
            other => flat.push(other),
        }
    }

    match kind {
        UnionKind::AllOf => {
            flat.retain(|schema| !schema.is_any());
            if flat.len() > 1 && flat.iter().all(|s| matches!(s, Schema::Object(_))) {
                return merge_objects(flat);
            }
        }
        UnionKind::AnyOf => {
            if flat.iter().any(Schema::is_any) {
                return Schema::any();
            }
        }
        UnionKind::OneOf => {}
    }

    flat.sort_by_cached_key(Schema::signature);
    flat.dedup();
    match flat.len() {
        0 => Schema::any(),
        1 => flat.remove(0),
        _ => Schema::Union(UnionSchema {
            combinator: kind,
            alternatives: flat,
        }),
    }
}

fn merge_objects(objects: Vec<Schema>) -> Schema {
    let mut fields: BTreeMap<String, Schema> = BTreeMap::new();
    let mut required = BTreeSet::new();
    let mut additional: Vec<AdditionalFields> = Vec::new();
    for object in objects {
        let Schema::Object(object) = object else {
            continue;
        };
        for (name, schema) in object.fields {
            let merged = match fields.remove(&name) {
                Some(existing) if existing != schema => {
                    make_union(UnionKind::AllOf, vec![existing, schema])
                }
                _ => schema,
            };
            fields.insert(name, merged);
        }
        required.extend(object.required);
        additional.push(object.additional);
    }

    // The most restrictive policy wins.
    let additional = if additional.contains(&AdditionalFields::Forbidden) {
        AdditionalFields::Forbidden
    } else {
        additional
            .into_iter()
            .filter(|a| matches!(a, AdditionalFields::Schema(_)))
            .min()
            .unwrap_or(AdditionalFields::Allowed)
    };
    Schema::Object(ObjectSchema {
        fields,
        required,
        additional,
    })
}

/// Infers a schema from an example payload. Object fields are marked
/// required when `fields_required` is set.
pub fn infer_from_example(value: &serde_json::Value, fields_required: bool) -> Schema {
    match value {
        serde_json::Value::Null => Schema::primitive(PrimitiveKind::Null),
        serde_json::Value::Bool(_) => Schema::primitive(PrimitiveKind::Boolean),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
            Schema::primitive(PrimitiveKind::Integer)
        }
        serde_json::Value::Number(_) => Schema::primitive(PrimitiveKind::Number),
        serde_json::Value::String(_) => Schema::primitive(PrimitiveKind::String),
        serde_json::Value::Array(items) => {
            let alternatives = items
                .iter()
                .map(|item| infer_from_example(item, fields_required))
                .collect();
            Schema::Array(ArraySchema {
                items: Box::new(make_union(UnionKind::AnyOf, alternatives)),
                min_items: None,
                max_items: None,
                unique_items: false,
            })
        }
        serde_json::Value::Object(map) => {
            let fields: BTreeMap<String, Schema> = map
                .iter()
                .map(|(name, value)| (name.clone(), infer_from_example(value, fields_required)))
                .collect();
            let required = if fields_required {
                fields.keys().cloned().collect()
            } else {
                BTreeSet::new()
            };
            Schema::Object(ObjectSchema {
                fields,
                required,
                additional: AdditionalFields::Allowed,
            })
        }
    }
}

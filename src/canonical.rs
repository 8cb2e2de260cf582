use serde::{Serialize, Serializer};

// Note: BTreeMap/BTreeSet everywhere so iteration and serialization order is
// canonical. The JSON form of a model doubles as its fingerprint input.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::raw::{Number, SchemaId};

/// Security alternative recorded for an explicit "no credentials" option.
pub const ANONYMOUS: &str = "anonymous";

//==============================================================================
// Schemas
//==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// No type restriction at all.
    #[default]
    Any,
    Boolean,
    Integer,
    Null,
    Number,
    String,
}

impl PrimitiveKind {
    pub fn id(&self) -> &'static str {
        match self {
            PrimitiveKind::Any => "any",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Null => "null",
            PrimitiveKind::Number => "number",
            PrimitiveKind::String => "string",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "any" => Some(PrimitiveKind::Any),
            "boolean" => Some(PrimitiveKind::Boolean),
            "integer" => Some(PrimitiveKind::Integer),
            "null" => Some(PrimitiveKind::Null),
            "number" => Some(PrimitiveKind::Number),
            "string" => Some(PrimitiveKind::String),
            _ => None,
        }
    }
}

/// A numeric bound. At the same value an exclusive bound is the tighter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Bound {
    pub value: Number,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclusive: bool,
}

/// An enumerated value in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Arrays and objects, as canonical (key-sorted) JSON text.
    Composite(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveSchema {
    #[serde(rename = "type")]
    pub kind: PrimitiveKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<BTreeSet<Literal>>,
}

/// What an object does with fields it does not declare.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdditionalFields {
    #[default]
    Allowed,
    Forbidden,
    Schema(Box<Schema>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectSchema {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Schema>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub required: BTreeSet<String>,
    #[serde(skip_serializing_if = "is_allowed")]
    pub additional: AdditionalFields,
}

fn is_allowed(additional: &AdditionalFields) -> bool {
    *additional == AdditionalFields::Allowed
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySchema {
    pub items: Box<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnionKind {
    AnyOf,
    OneOf,
    AllOf,
}

impl UnionKind {
    pub fn id(&self) -> &'static str {
        match self {
            UnionKind::AnyOf => "anyOf",
            UnionKind::OneOf => "oneOf",
            UnionKind::AllOf => "allOf",
        }
    }
}

/// Union alternatives are kept sorted by [`Schema::signature`] and free of
/// duplicates, so source order never matters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnionSchema {
    pub combinator: UnionKind,
    pub alternatives: Vec<Schema>,
}

/// Normalized schema node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Schema {
    Primitive(PrimitiveSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
    Union(UnionSchema),
    /// Reference to a recursive schema; its structure lives in
    /// [`ContractModel::schemas`].
    Reference { id: SchemaId },
}

impl Default for Schema {
    fn default() -> Self {
        Schema::any()
    }
}

impl Schema {
    /// The unconstrained schema.
    pub fn any() -> Self {
        Schema::Primitive(PrimitiveSchema::default())
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Schema::Primitive(PrimitiveSchema {
            kind,
            ..Default::default()
        })
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Schema::Primitive(p) if *p == PrimitiveSchema::default())
    }

    /// Canonical textual signature; equal signatures mean equal structure.
    pub fn signature(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether any reference inside this schema points at one of `ids`.
    pub fn references_any(&self, ids: &BTreeSet<SchemaId>) -> bool {
        match self {
            Schema::Primitive(_) => false,
            Schema::Object(object) => {
                object.fields.values().any(|field| field.references_any(ids))
                    || matches!(&object.additional, AdditionalFields::Schema(extra) if extra.references_any(ids))
            }
            Schema::Array(array) => array.items.references_any(ids),
            Schema::Union(union) => union.alternatives.iter().any(|alt| alt.references_any(ids)),
            Schema::Reference { id } => ids.contains(id),
        }
    }

    /// Coarse type name, used when two schemas of different shape are compared.
    pub fn type_label(&self) -> &'static str {
        match self {
            Schema::Primitive(p) => p.kind.id(),
            Schema::Object(_) => "object",
            Schema::Array(_) => "array",
            Schema::Union(u) => u.combinator.id(),
            Schema::Reference { .. } => "reference",
        }
    }
}

//==============================================================================
// Endpoints
//==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
    Other(String),
}

impl HttpMethod {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "PUT" => HttpMethod::Put,
            "POST" => HttpMethod::Post,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            "HEAD" => HttpMethod::Head,
            "PATCH" => HttpMethod::Patch,
            "TRACE" => HttpMethod::Trace,
            other => HttpMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Other(m) => m,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path segment. Variables carry no name: `/users/{id}` and
/// `/users/{userId}` are the same path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathPart {
    Literal(String),
    Variable,
}

/// Splits a path template into canonical parts plus the variable names in
/// order of appearance.
///
/// A segment that is exactly one `{name}` becomes [`PathPart::Variable`]; a
/// segment that mixes text and variables (`report.{ext}`) stays literal with
/// each variable written as `{}`. Empty segments and trailing slashes vanish.
pub fn parse_path_template(path: &str) -> (Vec<PathPart>, Vec<String>) {
    let mut parts = Vec::new();
    let mut names = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = whole_variable(segment) {
            names.push(name.to_string());
            parts.push(PathPart::Variable);
            continue;
        }
        let mut literal = String::new();
        let mut rest = segment;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            literal.push_str(&rest[..open]);
            literal.push_str("{}");
            names.push(rest[open + 1..open + close].to_string());
            rest = &rest[open + close + 1..];
        }
        literal.push_str(rest);
        parts.push(PathPart::Literal(literal));
    }
    (parts, names)
}

fn whole_variable(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    (!inner.is_empty() && !inner.contains(['{', '}'])).then_some(inner)
}

/// Identity of an endpoint: method plus canonical path shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    pub method: HttpMethod,
    pub path: Vec<PathPart>,
}

impl EndpointKey {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: HttpMethod::parse(method),
            path: parse_path_template(path).0,
        }
    }

    /// Canonical path with every variable written as `{}`.
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for part in &self.path {
            out.push('/');
            match part {
                PathPart::Literal(text) => out.push_str(text),
                PathPart::Variable => out.push_str("{}"),
            }
        }
        out
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_string())
    }
}

impl Serialize for EndpointKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn id(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }
}

/// Parameters are unique by location plus canonical name. Header names are
/// lowercased; path parameters are named by position (`{0}`, `{1}`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterKey {
    pub location: ParameterLocation,
    pub name: String,
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location.id(), self.name)
    }
}

impl Serialize for ParameterKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
}

impl Parameter {
    pub fn key(&self) -> ParameterKey {
        ParameterKey {
            location: self.location,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub required: bool,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub media_types: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    /// Exact code (`200`), class pattern (`2XX`) or `default`.
    pub status: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub media_types: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Whether a status key denotes a successful outcome. `default` counts, since
/// clients of an operation documented only by `default` rely on it.
pub fn is_success_status(status: &str) -> bool {
    status.starts_with('2') || status == "default"
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub key: EndpointKey,
    /// Declared path variable names, kept for display only.
    #[serde(skip)]
    pub variable_names: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<ParameterKey, Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, ResponseSpec>,
    /// Accepted credential alternatives; empty means unauthenticated.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub security: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

impl Endpoint {
    pub fn new(key: EndpointKey, variable_names: Vec<String>) -> Self {
        Self {
            key,
            variable_names,
            parameters: BTreeMap::new(),
            request_body: None,
            responses: BTreeMap::new(),
            security: BTreeSet::new(),
            deprecated: false,
        }
    }

    /// Path as declared, with the original variable names.
    pub fn template(&self) -> String {
        let mut names = self.variable_names.iter();
        let mut out = String::new();
        for part in &self.key.path {
            out.push('/');
            match part {
                PathPart::Variable => match names.next() {
                    Some(name) => out.push_str(&format!("{{{name}}}")),
                    None => out.push_str("{}"),
                },
                PathPart::Literal(text) => {
                    let mut rest = text.as_str();
                    while let Some(at) = rest.find("{}") {
                        out.push_str(&rest[..at]);
                        match names.next() {
                            Some(name) => out.push_str(&format!("{{{name}}}")),
                            None => out.push_str("{}"),
                        }
                        rest = &rest[at + 2..];
                    }
                    out.push_str(rest);
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Whether calling the endpoint needs credentials at all.
    pub fn requires_auth(&self) -> bool {
        requires_auth(&self.security)
    }
}

pub fn requires_auth(security: &BTreeSet<String>) -> bool {
    !security.is_empty() && !security.contains(ANONYMOUS)
}

//==============================================================================
// Contract model
//==============================================================================

/// Normalized, immutable view of one contract document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractModel {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<EndpointKey, Endpoint>,
    /// Reusable named schemas.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<SchemaId, Schema>,
}

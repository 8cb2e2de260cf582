//! Core types for change detection and classification

use crate::canonical::{EndpointKey, ParameterKey, UnionKind};
use serde::Serialize;
use std::fmt;

/// What happened at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn id(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }

    /// The kind seen when the comparison runs the other way.
    pub fn reversed(&self) -> Self {
        match self {
            ChangeKind::Added => ChangeKind::Removed,
            ChangeKind::Removed => ChangeKind::Added,
            ChangeKind::Modified => ChangeKind::Modified,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Classification outcome of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Breaking,
    NonBreaking,
    Informational,
}

impl Severity {
    pub fn id(&self) -> &'static str {
        match self {
            Severity::Breaking => "breaking",
            Severity::NonBreaking => "non-breaking",
            Severity::Informational => "informational",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "breaking" => Some(Severity::Breaking),
            "non-breaking" => Some(Severity::NonBreaking),
            "informational" => Some(Severity::Informational),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Grading of a breaking change: critical changes fail every existing caller,
/// high ones fail callers that use the affected part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    High,
}

impl Impact {
    pub fn id(&self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::High => "high",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Which side of the exchange a change affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Something the client sends.
    Request,
    /// Something the server sends back.
    Response,
    /// The operation as a whole, or a shared definition.
    Operation,
}

/// Schema constraint that a `Modified` entry is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintKind {
    Type,
    Format,
    Minimum,
    Maximum,
    MultipleOf,
    MinLength,
    MaxLength,
    Pattern,
    Enum,
    MinItems,
    MaxItems,
    UniqueItems,
    AdditionalFields,
    Combinator,
    Reference,
}

impl ConstraintKind {
    pub fn id(&self) -> &'static str {
        match self {
            ConstraintKind::Type => "type",
            ConstraintKind::Format => "format",
            ConstraintKind::Minimum => "minimum",
            ConstraintKind::Maximum => "maximum",
            ConstraintKind::MultipleOf => "multipleOf",
            ConstraintKind::MinLength => "minLength",
            ConstraintKind::MaxLength => "maxLength",
            ConstraintKind::Pattern => "pattern",
            ConstraintKind::Enum => "enum",
            ConstraintKind::MinItems => "minItems",
            ConstraintKind::MaxItems => "maxItems",
            ConstraintKind::UniqueItems => "uniqueItems",
            ConstraintKind::AdditionalFields => "additionalFields",
            ConstraintKind::Combinator => "combinator",
            ConstraintKind::Reference => "reference",
        }
    }
}

/// One addressing step of a [`LocationPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Endpoint(EndpointKey),
    /// Reusable named schema, by declared name.
    Definition(String),
    Deprecated,
    /// Security requirement alternative, by canonical signature.
    Security(String),
    Parameter(ParameterKey),
    RequestBody,
    Response(String),
    MediaType(String),
    /// Required flag of a parameter or request body.
    Required,
    Field(String),
    /// Membership of a field in an object's required set.
    RequiredField(String),
    Items,
    AdditionalFields,
    /// Union alternative, by short hash of its signature.
    Alternative(String),
    Constraint(ConstraintKind),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Endpoint(key) => write!(f, "{key}"),
            PathSegment::Definition(name) => write!(f, "definition:{name}"),
            PathSegment::Deprecated => write!(f, "deprecated"),
            PathSegment::Security(signature) => write!(f, "security:{signature}"),
            PathSegment::Parameter(key) => write!(f, "{key}"),
            PathSegment::RequestBody => write!(f, "requestBody"),
            PathSegment::Response(status) => write!(f, "response:{status}"),
            PathSegment::MediaType(media) => write!(f, "media:{media}"),
            PathSegment::Required => write!(f, "required"),
            PathSegment::Field(name) => write!(f, "field:{name}"),
            PathSegment::RequiredField(name) => write!(f, "required:{name}"),
            PathSegment::Items => write!(f, "items"),
            PathSegment::AdditionalFields => write!(f, "additionalFields"),
            PathSegment::Alternative(hash) => write!(f, "alt:{hash}"),
            PathSegment::Constraint(kind) => write!(f, "constraint:{}", kind.id()),
        }
    }
}

/// Ordered sequence of addressing steps from the model root to a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationPath(Vec<PathSegment>);

impl LocationPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// A new path one step deeper.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// The segment before the last one.
    pub fn parent(&self) -> Option<&PathSegment> {
        self.0.len().checked_sub(2).and_then(|i| self.0.get(i))
    }

    pub fn endpoint(&self) -> Option<&EndpointKey> {
        match self.0.first() {
            Some(PathSegment::Endpoint(key)) => Some(key),
            _ => None,
        }
    }

    /// Direction of the exchange this path lies in.
    pub fn direction(&self) -> Direction {
        for segment in &self.0 {
            match segment {
                PathSegment::Parameter(_) | PathSegment::RequestBody => return Direction::Request,
                PathSegment::Response(_) => return Direction::Response,
                _ => {}
            }
        }
        Direction::Operation
    }

    /// Rendered form used in reports and as the sort key.
    pub fn render(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for LocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render().join(" > "))
    }
}

/// Facts about the surroundings of a change that the classifier needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeContext {
    /// Whether the enclosing field, parameter or body was required in the old
    /// document. For security entries: whether the endpoint required
    /// credentials.
    pub required_before: Option<bool>,
    /// Same, in the new document.
    pub required_after: Option<bool>,
    /// Combinator of the union an alternative belongs to.
    pub combinator: Option<UnionKind>,
}

impl ChangeContext {
    pub fn required(before: bool, after: bool) -> Self {
        Self {
            required_before: Some(before),
            required_after: Some(after),
            combinator: None,
        }
    }

    pub fn with_combinator(mut self, combinator: UnionKind) -> Self {
        self.combinator = Some(combinator);
        self
    }
}

/// An unclassified difference produced by the diff engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChange {
    pub path: LocationPath,
    pub kind: ChangeKind,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
    pub context: ChangeContext,
}

/// A classified change as it appears in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub path: Vec<String>,
    pub kind: ChangeKind,
    pub severity: Severity,
    /// Set on breaking entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    /// Id of the rule that classified the change.
    pub rule: String,
    pub reason: String,
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

//! Location kinds that group related classification rules

use crate::compat::types::{LocationPath, PathSegment};
use serde::{Deserialize, Serialize};

/// The kind of contract element a change is addressed to. Rules are selected
/// by location kind first, so the most specific location always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    /// A whole endpoint
    Endpoint,
    /// The deprecation flag of an endpoint
    Deprecation,
    /// One accepted security requirement alternative
    Security,
    /// A request parameter
    Parameter,
    /// The request body as a whole
    RequestBody,
    /// The required flag of a parameter or request body
    RequiredFlag,
    /// A declared media type of a request body or response
    MediaType,
    /// A response status entry
    Response,
    /// An object field
    Field,
    /// Membership of a field in an object's required set
    RequiredField,
    /// A union alternative
    Alternative,
    /// A schema constraint (type, bounds, enum, ...)
    Constraint,
    /// A reusable named schema
    Definition,
    /// Anything the rule table has no location for
    Other,
}

impl LocationKind {
    pub fn id(&self) -> &'static str {
        match self {
            LocationKind::Endpoint => "ENDPOINT",
            LocationKind::Deprecation => "DEPRECATION",
            LocationKind::Security => "SECURITY",
            LocationKind::Parameter => "PARAMETER",
            LocationKind::RequestBody => "REQUEST_BODY",
            LocationKind::RequiredFlag => "REQUIRED_FLAG",
            LocationKind::MediaType => "MEDIA_TYPE",
            LocationKind::Response => "RESPONSE",
            LocationKind::Field => "FIELD",
            LocationKind::RequiredField => "REQUIRED_FIELD",
            LocationKind::Alternative => "ALTERNATIVE",
            LocationKind::Constraint => "CONSTRAINT",
            LocationKind::Definition => "DEFINITION",
            LocationKind::Other => "OTHER",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.id() == id)
    }

    pub fn all() -> Vec<Self> {
        vec![
            LocationKind::Endpoint,
            LocationKind::Deprecation,
            LocationKind::Security,
            LocationKind::Parameter,
            LocationKind::RequestBody,
            LocationKind::RequiredFlag,
            LocationKind::MediaType,
            LocationKind::Response,
            LocationKind::Field,
            LocationKind::RequiredField,
            LocationKind::Alternative,
            LocationKind::Constraint,
            LocationKind::Definition,
            LocationKind::Other,
        ]
    }

    /// Location kind of the element a path is addressed to.
    pub fn of(path: &LocationPath) -> Self {
        match path.last() {
            Some(PathSegment::Endpoint(_)) => LocationKind::Endpoint,
            Some(PathSegment::Deprecated) => LocationKind::Deprecation,
            Some(PathSegment::Security(_)) => LocationKind::Security,
            Some(PathSegment::Parameter(_)) => LocationKind::Parameter,
            Some(PathSegment::RequestBody) => LocationKind::RequestBody,
            Some(PathSegment::Required) => LocationKind::RequiredFlag,
            Some(PathSegment::MediaType(_)) => LocationKind::MediaType,
            Some(PathSegment::Response(_)) => LocationKind::Response,
            Some(PathSegment::Field(_)) => LocationKind::Field,
            Some(PathSegment::RequiredField(_)) => LocationKind::RequiredField,
            Some(PathSegment::Alternative(_)) => LocationKind::Alternative,
            Some(PathSegment::Constraint(_)) => LocationKind::Constraint,
            Some(PathSegment::Definition(_)) => LocationKind::Definition,
            Some(PathSegment::Items | PathSegment::AdditionalFields) | None => LocationKind::Other,
        }
    }
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for LocationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("Unknown location kind: {s}"))
    }
}

//! Classification rule table.
//!
//! Every [`RawChange`] is mapped to exactly one [`Rule`] by matching on its
//! location kind, then its change kind, then its context. Anything the table
//! does not cover falls through to [`Rule::UnclassifiedChange`], which is
//! breaking.

use crate::canonical::{UnionKind, is_success_status};
use crate::compat::categories::LocationKind;
use crate::compat::types::{
    ChangeKind, ConstraintKind, Direction, Impact, PathSegment, RawChange, Severity,
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rule {
    EndpointNoDelete,
    EndpointAdded,
    EndpointDeprecationChanged,
    SecurityNewlyRequired,
    SecurityAlternativeAdded,
    SecurityAlternativeRemoved,
    SecurityNoLongerRequired,
    ParameterRequiredAdded,
    ParameterOptionalAdded,
    ParameterRequiredRemoved,
    ParameterOptionalRemoved,
    ParameterBecameRequired,
    ParameterBecameOptional,
    RequestBodyRequiredAdded,
    RequestBodyOptionalAdded,
    RequestBodyRemoved,
    RequestBodyBecameRequired,
    RequestBodyBecameOptional,
    RequestMediaTypeAdded,
    RequestMediaTypeRemoved,
    ResponseMediaTypeAdded,
    ResponseMediaTypeRemoved,
    ResponseAdded,
    ResponseSuccessRemoved,
    ResponseErrorRemoved,
    RequestFieldRequiredAdded,
    RequestFieldOptionalAdded,
    RequestFieldRemoved,
    RequestFieldBecameRequired,
    RequestFieldBecameOptional,
    ResponseFieldAdded,
    ResponseRequiredFieldRemoved,
    ResponseOptionalFieldRemoved,
    ResponseFieldBecameRequired,
    ResponseFieldBecameOptional,
    RequestTypeNarrowed,
    RequestTypeWidened,
    ResponseTypeNarrowed,
    ResponseTypeNarrowedOptional,
    ResponseTypeWidened,
    TypeIncompatible,
    DefinitionChanged,
    UnclassifiedChange,
}

/// Every rule, in table order.
const ALL_RULES: &[Rule] = &[
    Rule::EndpointNoDelete,
    Rule::EndpointAdded,
    Rule::EndpointDeprecationChanged,
    Rule::SecurityNewlyRequired,
    Rule::SecurityAlternativeAdded,
    Rule::SecurityAlternativeRemoved,
    Rule::SecurityNoLongerRequired,
    Rule::ParameterRequiredAdded,
    Rule::ParameterOptionalAdded,
    Rule::ParameterRequiredRemoved,
    Rule::ParameterOptionalRemoved,
    Rule::ParameterBecameRequired,
    Rule::ParameterBecameOptional,
    Rule::RequestBodyRequiredAdded,
    Rule::RequestBodyOptionalAdded,
    Rule::RequestBodyRemoved,
    Rule::RequestBodyBecameRequired,
    Rule::RequestBodyBecameOptional,
    Rule::RequestMediaTypeAdded,
    Rule::RequestMediaTypeRemoved,
    Rule::ResponseMediaTypeAdded,
    Rule::ResponseMediaTypeRemoved,
    Rule::ResponseAdded,
    Rule::ResponseSuccessRemoved,
    Rule::ResponseErrorRemoved,
    Rule::RequestFieldRequiredAdded,
    Rule::RequestFieldOptionalAdded,
    Rule::RequestFieldRemoved,
    Rule::RequestFieldBecameRequired,
    Rule::RequestFieldBecameOptional,
    Rule::ResponseFieldAdded,
    Rule::ResponseRequiredFieldRemoved,
    Rule::ResponseOptionalFieldRemoved,
    Rule::ResponseFieldBecameRequired,
    Rule::ResponseFieldBecameOptional,
    Rule::RequestTypeNarrowed,
    Rule::RequestTypeWidened,
    Rule::ResponseTypeNarrowed,
    Rule::ResponseTypeNarrowedOptional,
    Rule::ResponseTypeWidened,
    Rule::TypeIncompatible,
    Rule::DefinitionChanged,
    Rule::UnclassifiedChange,
];

impl Rule {
    pub fn id(&self) -> &'static str {
        match self {
            Rule::EndpointNoDelete => "ENDPOINT_NO_DELETE",
            Rule::EndpointAdded => "ENDPOINT_ADDED",
            Rule::EndpointDeprecationChanged => "ENDPOINT_DEPRECATION_CHANGED",
            Rule::SecurityNewlyRequired => "SECURITY_NEWLY_REQUIRED",
            Rule::SecurityAlternativeAdded => "SECURITY_ALTERNATIVE_ADDED",
            Rule::SecurityAlternativeRemoved => "SECURITY_ALTERNATIVE_REMOVED",
            Rule::SecurityNoLongerRequired => "SECURITY_NO_LONGER_REQUIRED",
            Rule::ParameterRequiredAdded => "PARAMETER_REQUIRED_ADDED",
            Rule::ParameterOptionalAdded => "PARAMETER_OPTIONAL_ADDED",
            Rule::ParameterRequiredRemoved => "PARAMETER_REQUIRED_REMOVED",
            Rule::ParameterOptionalRemoved => "PARAMETER_OPTIONAL_REMOVED",
            Rule::ParameterBecameRequired => "PARAMETER_BECAME_REQUIRED",
            Rule::ParameterBecameOptional => "PARAMETER_BECAME_OPTIONAL",
            Rule::RequestBodyRequiredAdded => "REQUEST_BODY_REQUIRED_ADDED",
            Rule::RequestBodyOptionalAdded => "REQUEST_BODY_OPTIONAL_ADDED",
            Rule::RequestBodyRemoved => "REQUEST_BODY_REMOVED",
            Rule::RequestBodyBecameRequired => "REQUEST_BODY_BECAME_REQUIRED",
            Rule::RequestBodyBecameOptional => "REQUEST_BODY_BECAME_OPTIONAL",
            Rule::RequestMediaTypeAdded => "REQUEST_MEDIA_TYPE_ADDED",
            Rule::RequestMediaTypeRemoved => "REQUEST_MEDIA_TYPE_REMOVED",
            Rule::ResponseMediaTypeAdded => "RESPONSE_MEDIA_TYPE_ADDED",
            Rule::ResponseMediaTypeRemoved => "RESPONSE_MEDIA_TYPE_REMOVED",
            Rule::ResponseAdded => "RESPONSE_ADDED",
            Rule::ResponseSuccessRemoved => "RESPONSE_SUCCESS_REMOVED",
            Rule::ResponseErrorRemoved => "RESPONSE_ERROR_REMOVED",
            Rule::RequestFieldRequiredAdded => "REQUEST_FIELD_REQUIRED_ADDED",
            Rule::RequestFieldOptionalAdded => "REQUEST_FIELD_OPTIONAL_ADDED",
            Rule::RequestFieldRemoved => "REQUEST_FIELD_REMOVED",
            Rule::RequestFieldBecameRequired => "REQUEST_FIELD_BECAME_REQUIRED",
            Rule::RequestFieldBecameOptional => "REQUEST_FIELD_BECAME_OPTIONAL",
            Rule::ResponseFieldAdded => "RESPONSE_FIELD_ADDED",
            Rule::ResponseRequiredFieldRemoved => "RESPONSE_REQUIRED_FIELD_REMOVED",
            Rule::ResponseOptionalFieldRemoved => "RESPONSE_OPTIONAL_FIELD_REMOVED",
            Rule::ResponseFieldBecameRequired => "RESPONSE_FIELD_BECAME_REQUIRED",
            Rule::ResponseFieldBecameOptional => "RESPONSE_FIELD_BECAME_OPTIONAL",
            Rule::RequestTypeNarrowed => "REQUEST_TYPE_NARROWED",
            Rule::RequestTypeWidened => "REQUEST_TYPE_WIDENED",
            Rule::ResponseTypeNarrowed => "RESPONSE_TYPE_NARROWED",
            Rule::ResponseTypeNarrowedOptional => "RESPONSE_TYPE_NARROWED_OPTIONAL",
            Rule::ResponseTypeWidened => "RESPONSE_TYPE_WIDENED",
            Rule::TypeIncompatible => "TYPE_INCOMPATIBLE",
            Rule::DefinitionChanged => "DEFINITION_CHANGED",
            Rule::UnclassifiedChange => "UNCLASSIFIED_CHANGE",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        ALL_RULES.iter().copied().find(|rule| rule.id() == id)
    }

    pub fn all() -> &'static [Rule] {
        ALL_RULES
    }

    /// Default severity, before configuration overrides.
    pub fn severity(&self) -> Severity {
        match self {
            Rule::EndpointAdded
            | Rule::SecurityAlternativeAdded
            | Rule::SecurityNoLongerRequired
            | Rule::ParameterOptionalAdded
            | Rule::ParameterOptionalRemoved
            | Rule::ParameterBecameOptional
            | Rule::RequestBodyOptionalAdded
            | Rule::RequestBodyBecameOptional
            | Rule::RequestMediaTypeAdded
            | Rule::ResponseMediaTypeAdded
            | Rule::ResponseAdded
            | Rule::RequestFieldOptionalAdded
            | Rule::RequestFieldBecameOptional
            | Rule::ResponseFieldAdded
            | Rule::ResponseOptionalFieldRemoved
            | Rule::ResponseFieldBecameRequired
            | Rule::RequestTypeWidened
            | Rule::ResponseTypeNarrowedOptional => Severity::NonBreaking,

            Rule::EndpointDeprecationChanged
            | Rule::ResponseErrorRemoved
            | Rule::DefinitionChanged => Severity::Informational,

            Rule::EndpointNoDelete
            | Rule::SecurityNewlyRequired
            | Rule::SecurityAlternativeRemoved
            | Rule::ParameterRequiredAdded
            | Rule::ParameterRequiredRemoved
            | Rule::ParameterBecameRequired
            | Rule::RequestBodyRequiredAdded
            | Rule::RequestBodyRemoved
            | Rule::RequestBodyBecameRequired
            | Rule::RequestMediaTypeRemoved
            | Rule::ResponseMediaTypeRemoved
            | Rule::ResponseSuccessRemoved
            | Rule::RequestFieldRequiredAdded
            | Rule::RequestFieldRemoved
            | Rule::RequestFieldBecameRequired
            | Rule::ResponseRequiredFieldRemoved
            | Rule::ResponseFieldBecameOptional
            | Rule::RequestTypeNarrowed
            | Rule::ResponseTypeNarrowed
            | Rule::ResponseTypeWidened
            | Rule::TypeIncompatible
            | Rule::UnclassifiedChange => Severity::Breaking,
        }
    }

    /// How hard a breaking change hits clients. Only meaningful when the
    /// change is reported as breaking.
    pub fn impact(&self) -> Impact {
        match self {
            Rule::EndpointNoDelete | Rule::ParameterRequiredRemoved | Rule::RequestBodyRemoved => {
                Impact::Critical
            }
            _ => Impact::High,
        }
    }

    /// Human-readable consequence of a change matched by this rule.
    pub fn reason(&self) -> &'static str {
        match self {
            Rule::EndpointNoDelete => "clients calling this operation will fail",
            Rule::EndpointAdded => "new operation; existing clients are unaffected",
            Rule::EndpointDeprecationChanged => "operation deprecation status changed",
            Rule::SecurityNewlyRequired => {
                "operation now requires credentials that existing clients do not send"
            }
            Rule::SecurityAlternativeAdded => "an additional way to authenticate is accepted",
            Rule::SecurityAlternativeRemoved => {
                "clients authenticating this way will be rejected"
            }
            Rule::SecurityNoLongerRequired => "operation no longer requires credentials",
            Rule::ParameterRequiredAdded => "previously-valid requests may now be rejected",
            Rule::ParameterOptionalAdded => "new optional parameter; existing requests remain valid",
            Rule::ParameterRequiredRemoved => {
                "clients must stop sending a parameter the operation required"
            }
            Rule::ParameterOptionalRemoved => "clients ignoring the parameter already worked",
            Rule::ParameterBecameRequired => "previously-valid requests may now be rejected",
            Rule::ParameterBecameOptional => "existing requests remain valid",
            Rule::RequestBodyRequiredAdded => "requests without a body will now be rejected",
            Rule::RequestBodyOptionalAdded => "new optional request body; existing requests remain valid",
            Rule::RequestBodyRemoved => "clients sending a request body may be rejected",
            Rule::RequestBodyBecameRequired => "requests without a body will now be rejected",
            Rule::RequestBodyBecameOptional => "existing requests remain valid",
            Rule::RequestMediaTypeAdded => "an additional request media type is accepted",
            Rule::RequestMediaTypeRemoved => "requests using this media type will be rejected",
            Rule::ResponseMediaTypeAdded => "clients may receive a media type they cannot handle",
            Rule::ResponseMediaTypeRemoved => "clients expecting this media type will not receive it",
            Rule::ResponseAdded => "new response status documented",
            Rule::ResponseSuccessRemoved => "clients relying on this successful response will break",
            Rule::ResponseErrorRemoved => "error response no longer documented",
            Rule::RequestFieldRequiredAdded => {
                "previously-valid request bodies are missing a required field"
            }
            Rule::RequestFieldOptionalAdded => "new optional request field; existing requests remain valid",
            Rule::RequestFieldRemoved => "clients sending this field may be rejected",
            Rule::RequestFieldBecameRequired => {
                "previously-valid request bodies may omit a now-required field"
            }
            Rule::RequestFieldBecameOptional => "existing requests remain valid",
            Rule::ResponseFieldAdded => "clients ignore fields they do not know",
            Rule::ResponseRequiredFieldRemoved => "clients reading this field will not find it",
            Rule::ResponseOptionalFieldRemoved => "clients already handled the field being absent",
            Rule::ResponseFieldBecameRequired => "the server now always sends this field",
            Rule::ResponseFieldBecameOptional => "clients reading this field may not find it",
            Rule::RequestTypeNarrowed => "previously-valid request values may now be rejected",
            Rule::RequestTypeWidened => "more request values are accepted",
            Rule::ResponseTypeNarrowed => "server promises fewer values for a field clients rely on",
            Rule::ResponseTypeNarrowedOptional => {
                "server promises fewer values for a field that is now optional"
            }
            Rule::ResponseTypeWidened => "clients may receive values they have never seen",
            Rule::TypeIncompatible => "values valid before are not valid after",
            Rule::DefinitionChanged => "reusable schema definition changed",
            Rule::UnclassifiedChange => "change is not covered by any rule; treated as breaking",
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Rule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("Unknown rule: {s}"))
    }
}

/// How a change moves the set of values a schema position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Narrowed,
    Widened,
    Incompatible,
}

/// Selects the rule for a change. Pure: the same change always yields the same
/// rule.
pub fn classify(change: &RawChange) -> Rule {
    let direction = change.path.direction();
    let kind = change.kind;
    let context = change.context;

    match (LocationKind::of(&change.path), kind) {
        (LocationKind::Endpoint, ChangeKind::Removed) => Rule::EndpointNoDelete,
        (LocationKind::Endpoint, ChangeKind::Added) => Rule::EndpointAdded,
        (LocationKind::Deprecation, ChangeKind::Modified) => Rule::EndpointDeprecationChanged,
        (LocationKind::Definition, _) => Rule::DefinitionChanged,

        (LocationKind::Security, ChangeKind::Added) => {
            match (context.required_before, context.required_after) {
                (Some(false), Some(true)) => Rule::SecurityNewlyRequired,
                _ => Rule::SecurityAlternativeAdded,
            }
        }
        (LocationKind::Security, ChangeKind::Removed) => {
            if context.required_after == Some(true) {
                Rule::SecurityAlternativeRemoved
            } else {
                Rule::SecurityNoLongerRequired
            }
        }

        (LocationKind::Parameter, ChangeKind::Added) => match context.required_after {
            Some(true) => Rule::ParameterRequiredAdded,
            Some(false) => Rule::ParameterOptionalAdded,
            None => Rule::UnclassifiedChange,
        },
        (LocationKind::Parameter, ChangeKind::Removed) => match context.required_before {
            Some(true) => Rule::ParameterRequiredRemoved,
            Some(false) => Rule::ParameterOptionalRemoved,
            None => Rule::UnclassifiedChange,
        },

        (LocationKind::RequestBody, ChangeKind::Added) => match context.required_after {
            Some(true) => Rule::RequestBodyRequiredAdded,
            Some(false) => Rule::RequestBodyOptionalAdded,
            None => Rule::UnclassifiedChange,
        },
        (LocationKind::RequestBody, ChangeKind::Removed) => Rule::RequestBodyRemoved,

        (LocationKind::RequiredFlag, ChangeKind::Modified) => {
            let now_required = change.new.as_ref().and_then(Value::as_bool);
            match (change.path.parent(), now_required) {
                (Some(PathSegment::Parameter(_)), Some(true)) => Rule::ParameterBecameRequired,
                (Some(PathSegment::Parameter(_)), Some(false)) => Rule::ParameterBecameOptional,
                (Some(PathSegment::RequestBody), Some(true)) => Rule::RequestBodyBecameRequired,
                (Some(PathSegment::RequestBody), Some(false)) => Rule::RequestBodyBecameOptional,
                _ => Rule::UnclassifiedChange,
            }
        }

        (LocationKind::MediaType, ChangeKind::Added | ChangeKind::Removed) => {
            match (direction, kind) {
                (Direction::Request, ChangeKind::Added) => Rule::RequestMediaTypeAdded,
                (Direction::Request, _) => Rule::RequestMediaTypeRemoved,
                (Direction::Response, ChangeKind::Added) => Rule::ResponseMediaTypeAdded,
                (Direction::Response, _) => Rule::ResponseMediaTypeRemoved,
                (Direction::Operation, _) => Rule::UnclassifiedChange,
            }
        }

        (LocationKind::Response, ChangeKind::Added) => Rule::ResponseAdded,
        (LocationKind::Response, ChangeKind::Removed) => match change.path.last() {
            Some(PathSegment::Response(status)) if is_success_status(status) => {
                Rule::ResponseSuccessRemoved
            }
            _ => Rule::ResponseErrorRemoved,
        },

        (LocationKind::Field, ChangeKind::Added) => match direction {
            Direction::Request if context.required_after == Some(true) => {
                Rule::RequestFieldRequiredAdded
            }
            Direction::Request => Rule::RequestFieldOptionalAdded,
            Direction::Response => Rule::ResponseFieldAdded,
            Direction::Operation => Rule::UnclassifiedChange,
        },
        (LocationKind::Field, ChangeKind::Removed) => match direction {
            Direction::Request => Rule::RequestFieldRemoved,
            Direction::Response if context.required_before == Some(false) => {
                Rule::ResponseOptionalFieldRemoved
            }
            Direction::Response => Rule::ResponseRequiredFieldRemoved,
            Direction::Operation => Rule::UnclassifiedChange,
        },

        (LocationKind::RequiredField, ChangeKind::Added | ChangeKind::Removed) => {
            match (direction, kind) {
                (Direction::Request, ChangeKind::Added) => Rule::RequestFieldBecameRequired,
                (Direction::Request, _) => Rule::RequestFieldBecameOptional,
                (Direction::Response, ChangeKind::Added) => Rule::ResponseFieldBecameRequired,
                (Direction::Response, _) => Rule::ResponseFieldBecameOptional,
                (Direction::Operation, _) => Rule::UnclassifiedChange,
            }
        }

        (LocationKind::Alternative, ChangeKind::Added | ChangeKind::Removed) => {
            let variance = alternative_variance(kind, context.combinator);
            by_direction(direction, variance, change)
        }

        (LocationKind::Constraint, ChangeKind::Modified) => match change.path.last() {
            Some(PathSegment::Constraint(constraint)) => {
                let old = change.old.as_ref().unwrap_or(&Value::Null);
                let new = change.new.as_ref().unwrap_or(&Value::Null);
                by_direction(direction, constraint_variance(*constraint, old, new), change)
            }
            _ => Rule::UnclassifiedChange,
        },

        _ => Rule::UnclassifiedChange,
    }
}

fn by_direction(direction: Direction, variance: Variance, change: &RawChange) -> Rule {
    match (direction, variance) {
        (_, Variance::Incompatible) => Rule::TypeIncompatible,
        (Direction::Request, Variance::Narrowed) => Rule::RequestTypeNarrowed,
        (Direction::Request, Variance::Widened) => Rule::RequestTypeWidened,
        (Direction::Response, Variance::Widened) => Rule::ResponseTypeWidened,
        (Direction::Response, Variance::Narrowed) => {
            let context = change.context;
            if context.required_before == Some(true) && context.required_after == Some(false) {
                Rule::ResponseTypeNarrowedOptional
            } else {
                Rule::ResponseTypeNarrowed
            }
        }
        (Direction::Operation, _) => Rule::UnclassifiedChange,
    }
}

/// An added alternative widens `anyOf`/`oneOf` and narrows `allOf`; removal
/// does the opposite.
fn alternative_variance(kind: ChangeKind, combinator: Option<UnionKind>) -> Variance {
    let widens = match combinator {
        Some(UnionKind::AnyOf | UnionKind::OneOf) => kind == ChangeKind::Added,
        Some(UnionKind::AllOf) => kind == ChangeKind::Removed,
        None => return Variance::Incompatible,
    };
    if widens { Variance::Widened } else { Variance::Narrowed }
}

/// Variance of a single constraint change, judged from its old and new values.
pub fn constraint_variance(constraint: ConstraintKind, old: &Value, new: &Value) -> Variance {
    match constraint {
        ConstraintKind::Type => type_variance(old.as_str(), new.as_str()),
        ConstraintKind::Format | ConstraintKind::Pattern | ConstraintKind::MultipleOf => {
            match (old.is_null(), new.is_null()) {
                (true, false) => Variance::Narrowed,
                (false, true) => Variance::Widened,
                _ => Variance::Incompatible,
            }
        }
        ConstraintKind::Minimum | ConstraintKind::MinLength | ConstraintKind::MinItems => {
            bound_variance(old, new, true)
        }
        ConstraintKind::Maximum | ConstraintKind::MaxLength | ConstraintKind::MaxItems => {
            bound_variance(old, new, false)
        }
        ConstraintKind::Enum => enum_variance(old, new),
        ConstraintKind::UniqueItems => {
            if new.as_bool() == Some(true) {
                Variance::Narrowed
            } else {
                Variance::Widened
            }
        }
        ConstraintKind::AdditionalFields => {
            let rank = |value: &Value| match value.as_str() {
                Some("allowed") => 0,
                Some("forbidden") => 2,
                _ => 1,
            };
            match rank(new).cmp(&rank(old)) {
                std::cmp::Ordering::Greater => Variance::Narrowed,
                std::cmp::Ordering::Less => Variance::Widened,
                std::cmp::Ordering::Equal => Variance::Incompatible,
            }
        }
        ConstraintKind::Combinator => match (old.as_str(), new.as_str()) {
            (Some("anyOf"), Some("oneOf")) => Variance::Narrowed,
            (Some("oneOf"), Some("anyOf")) => Variance::Widened,
            _ => Variance::Incompatible,
        },
        ConstraintKind::Reference => Variance::Incompatible,
    }
}

fn type_variance(old: Option<&str>, new: Option<&str>) -> Variance {
    match (old, new) {
        (Some("any"), Some(_)) => Variance::Narrowed,
        (Some(_), Some("any")) => Variance::Widened,
        (Some("integer"), Some("number")) => Variance::Widened,
        (Some("number"), Some("integer")) => Variance::Narrowed,
        _ => Variance::Incompatible,
    }
}

/// Bound value plus exclusivity; bare numbers are inclusive bounds.
fn bound_key(value: &Value) -> Option<(f64, bool)> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| (v, false)),
        Value::Object(map) => {
            let v = map.get("value")?.as_f64()?;
            let exclusive = map.get("exclusive").and_then(Value::as_bool).unwrap_or(false);
            Some((v, exclusive))
        }
        _ => None,
    }
}

fn bound_variance(old: &Value, new: &Value, lower: bool) -> Variance {
    let (before, after) = match (bound_key(old), bound_key(new)) {
        (None, Some(_)) => return Variance::Narrowed,
        (Some(_), None) => return Variance::Widened,
        (Some(before), Some(after)) => (before, after),
        (None, None) => return Variance::Incompatible,
    };
    let tighter = if before.0 == after.0 {
        after.1 && !before.1
    } else if lower {
        after.0 > before.0
    } else {
        after.0 < before.0
    };
    if tighter { Variance::Narrowed } else { Variance::Widened }
}

fn enum_variance(old: &Value, new: &Value) -> Variance {
    match (old.as_array(), new.as_array()) {
        (None, Some(_)) => Variance::Narrowed,
        (Some(_), None) => Variance::Widened,
        (Some(before), Some(after)) => {
            let subset = after.iter().all(|v| before.contains(v));
            let superset = before.iter().all(|v| after.contains(v));
            match (subset, superset) {
                (true, false) => Variance::Narrowed,
                (false, true) => Variance::Widened,
                _ => Variance::Incompatible,
            }
        }
        (None, None) => Variance::Incompatible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{EndpointKey, ParameterKey, ParameterLocation};
    use crate::compat::types::{ChangeContext, LocationPath};
    use serde_json::json;
    use std::collections::HashSet;

    fn endpoint_path() -> LocationPath {
        LocationPath::root().child(PathSegment::Endpoint(EndpointKey::new("GET", "/users/{id}")))
    }

    fn change(path: LocationPath, kind: ChangeKind, old: Value, new: Value, context: ChangeContext) -> RawChange {
        RawChange {
            path,
            kind,
            old: (!old.is_null()).then_some(old),
            new: (!new.is_null()).then_some(new),
            context,
        }
    }

    #[test]
    fn test_rule_ids_are_unique_and_parse() {
        let mut seen = HashSet::new();
        for rule in Rule::all() {
            assert!(seen.insert(rule.id()), "duplicate id {}", rule.id());
            assert_eq!(rule.id().parse::<Rule>(), Ok(*rule));
        }
        assert!("NOT_A_RULE".parse::<Rule>().is_err());
    }

    #[test]
    fn test_endpoint_rules() {
        let removed = change(endpoint_path(), ChangeKind::Removed, json!("GET /users/{id}"), Value::Null, ChangeContext::default());
        assert_eq!(classify(&removed), Rule::EndpointNoDelete);
        assert_eq!(Rule::EndpointNoDelete.severity(), Severity::Breaking);

        let added = change(endpoint_path(), ChangeKind::Added, Value::Null, json!("GET /users/{id}"), ChangeContext::default());
        assert_eq!(classify(&added).severity(), Severity::NonBreaking);
    }

    #[test]
    fn test_parameter_rules() {
        let path = endpoint_path().child(PathSegment::Parameter(ParameterKey {
            location: ParameterLocation::Query,
            name: "verbose".to_string(),
        }));
        let optional_removed = change(
            path.clone(),
            ChangeKind::Removed,
            json!({}),
            Value::Null,
            ChangeContext { required_before: Some(false), ..Default::default() },
        );
        assert_eq!(classify(&optional_removed), Rule::ParameterOptionalRemoved);

        let required_added = change(
            path.clone(),
            ChangeKind::Added,
            Value::Null,
            json!({}),
            ChangeContext { required_after: Some(true), ..Default::default() },
        );
        assert_eq!(classify(&required_added), Rule::ParameterRequiredAdded);

        let became_required = change(
            path.child(PathSegment::Required),
            ChangeKind::Modified,
            json!(false),
            json!(true),
            ChangeContext::required(false, true),
        );
        assert_eq!(classify(&became_required), Rule::ParameterBecameRequired);
    }

    #[test]
    fn test_response_enum_narrowing() {
        let path = endpoint_path()
            .child(PathSegment::Response("200".to_string()))
            .child(PathSegment::Field("status".to_string()))
            .child(PathSegment::Constraint(ConstraintKind::Enum));
        let narrowed = change(
            path.clone(),
            ChangeKind::Modified,
            json!(["error", "ok"]),
            json!(["ok"]),
            ChangeContext::required(false, false),
        );
        assert_eq!(classify(&narrowed), Rule::ResponseTypeNarrowed);

        let now_optional = change(
            path,
            ChangeKind::Modified,
            json!(["error", "ok"]),
            json!(["ok"]),
            ChangeContext::required(true, false),
        );
        assert_eq!(classify(&now_optional), Rule::ResponseTypeNarrowedOptional);
        assert_eq!(Rule::ResponseTypeNarrowedOptional.severity(), Severity::NonBreaking);
    }

    #[test]
    fn test_request_variance() {
        let path = endpoint_path()
            .child(PathSegment::RequestBody)
            .child(PathSegment::Field("age".to_string()));
        let cases = [
            (ConstraintKind::Minimum, json!(0), json!(18), Rule::RequestTypeNarrowed),
            (ConstraintKind::Maximum, json!({"value": 10}), json!({"value": 10, "exclusive": true}), Rule::RequestTypeNarrowed),
            (ConstraintKind::MaxLength, json!(5), json!(50), Rule::RequestTypeWidened),
            (ConstraintKind::Type, json!("integer"), json!("number"), Rule::RequestTypeWidened),
            (ConstraintKind::Type, json!("string"), json!("integer"), Rule::TypeIncompatible),
            (ConstraintKind::Pattern, Value::Null, json!("^a"), Rule::RequestTypeNarrowed),
            (ConstraintKind::Enum, json!(["a"]), json!(["a", "b"]), Rule::RequestTypeWidened),
            (ConstraintKind::Enum, json!(["a"]), json!(["b"]), Rule::TypeIncompatible),
            (ConstraintKind::AdditionalFields, json!("allowed"), json!("forbidden"), Rule::RequestTypeNarrowed),
        ];
        for (constraint, old, new, expected) in cases {
            let entry = change(
                path.child(PathSegment::Constraint(constraint)),
                ChangeKind::Modified,
                old,
                new,
                ChangeContext::required(false, false),
            );
            assert_eq!(classify(&entry), expected, "{constraint:?}");
        }
    }

    #[test]
    fn test_alternative_rules() {
        let path = endpoint_path()
            .child(PathSegment::Response("200".to_string()))
            .child(PathSegment::Alternative("abc".to_string()));
        let nullable = change(
            path,
            ChangeKind::Added,
            Value::Null,
            json!({"kind": "primitive", "type": "null"}),
            ChangeContext::default().with_combinator(UnionKind::AnyOf),
        );
        assert_eq!(classify(&nullable), Rule::ResponseTypeWidened);
    }

    #[test]
    fn test_security_rules() {
        let path = endpoint_path().child(PathSegment::Security("bearer".to_string()));
        let newly = change(path.clone(), ChangeKind::Added, Value::Null, json!("bearer"), ChangeContext::required(false, true));
        assert_eq!(classify(&newly), Rule::SecurityNewlyRequired);
        let extra = change(path.clone(), ChangeKind::Added, Value::Null, json!("bearer"), ChangeContext::required(true, true));
        assert_eq!(classify(&extra), Rule::SecurityAlternativeAdded);
        let dropped = change(path.clone(), ChangeKind::Removed, json!("bearer"), Value::Null, ChangeContext::required(true, true));
        assert_eq!(classify(&dropped), Rule::SecurityAlternativeRemoved);
        let public = change(path.clone(), ChangeKind::Removed, json!("bearer"), Value::Null, ChangeContext::required(true, false));
        assert_eq!(classify(&public), Rule::SecurityNoLongerRequired);
        // Anonymous access is still allowed after the change.
        let optional = change(path, ChangeKind::Added, Value::Null, json!("bearer"), ChangeContext::required(false, false));
        assert_eq!(classify(&optional), Rule::SecurityAlternativeAdded);
    }

    #[test]
    fn test_impact_of_breaking_rules() {
        assert_eq!(Rule::EndpointNoDelete.impact(), Impact::Critical);
        assert_eq!(Rule::ParameterRequiredRemoved.impact(), Impact::Critical);
        assert_eq!(Rule::RequestBodyRemoved.impact(), Impact::Critical);
        assert_eq!(Rule::SecurityNewlyRequired.impact(), Impact::High);
        assert_eq!(Rule::ResponseSuccessRemoved.impact(), Impact::High);
        for rule in Rule::all() {
            if rule.impact() == Impact::Critical {
                assert_eq!(rule.severity(), Severity::Breaking, "{rule}");
            }
        }
    }

    #[test]
    fn test_response_removal_by_status_class() {
        for (status, expected) in [
            ("200", Rule::ResponseSuccessRemoved),
            ("2XX", Rule::ResponseSuccessRemoved),
            ("default", Rule::ResponseSuccessRemoved),
            ("404", Rule::ResponseErrorRemoved),
        ] {
            let entry = change(
                endpoint_path().child(PathSegment::Response(status.to_string())),
                ChangeKind::Removed,
                json!({}),
                Value::Null,
                ChangeContext::default(),
            );
            assert_eq!(classify(&entry), expected, "{status}");
        }
    }

    #[test]
    fn test_unknown_location_falls_through_to_breaking() {
        let entry = change(
            endpoint_path().child(PathSegment::Items),
            ChangeKind::Modified,
            json!(1),
            json!(2),
            ChangeContext::default(),
        );
        assert_eq!(classify(&entry), Rule::UnclassifiedChange);
        assert_eq!(classify(&entry).severity(), Severity::Breaking);
    }
}

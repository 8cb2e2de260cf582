//! Structural diff between two contract models.
//!
//! The engine walks matched positions of both models and records every
//! difference as a [`RawChange`]. It never stops at the first difference in a
//! branch. Union alternatives are matched by signature only and are added or
//! removed as a whole.
//!
//! References to recursive schemas are followed into the named-schema tables
//! when the referenced structure changed. Each pair of references is followed
//! at most once below a parameter, request body or response.

use crate::canonical::{
    AdditionalFields, ArraySchema, ContractModel, Endpoint, ObjectSchema, PrimitiveSchema,
    RequestBody, Schema, UnionKind, UnionSchema, requires_auth,
};
use crate::compat::types::{
    ChangeContext, ChangeKind, ConstraintKind, LocationPath, PathSegment, RawChange,
};
use crate::raw::SchemaId;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Below this many matched endpoints a single thread is faster.
const PARALLEL_THRESHOLD: usize = 64;

/// Computes all differences between `old` and `new`. Matched endpoints are
/// diffed on up to `parallelism` threads; the result order is unspecified.
pub fn diff_models(old: &ContractModel, new: &ContractModel, parallelism: usize) -> Vec<RawChange> {
    let root = LocationPath::root();
    let mut changes = Vec::new();

    let old_definitions = definitions_by_name(old);
    let new_definitions = definitions_by_name(new);
    let names: BTreeSet<&str> = old_definitions.keys().chain(new_definitions.keys()).copied().collect();
    for name in names {
        let path = root.child(PathSegment::Definition(name.to_string()));
        match (old_definitions.get(name), new_definitions.get(name)) {
            (Some(before), Some(after)) if before != after => {
                changes.push(modified(path, to_value(before), to_value(after), ChangeContext::default()))
            }
            (Some(before), None) => changes.push(removed(path, to_value(before), ChangeContext::default())),
            (None, Some(after)) => changes.push(added(path, to_value(after), ChangeContext::default())),
            _ => {}
        }
    }

    let mut matched = Vec::new();
    for (key, endpoint) in &old.endpoints {
        match new.endpoints.get(key) {
            Some(other) => matched.push((endpoint, other)),
            None => changes.push(removed(
                root.child(PathSegment::Endpoint(key.clone())),
                Value::String(format!("{} {}", key.method, endpoint.template())),
                ChangeContext::default(),
            )),
        }
    }
    for (key, endpoint) in &new.endpoints {
        if !old.endpoints.contains_key(key) {
            changes.push(added(
                root.child(PathSegment::Endpoint(key.clone())),
                Value::String(format!("{} {}", key.method, endpoint.template())),
                ChangeContext::default(),
            ));
        }
    }

    let changed = changed_definitions(old, new);
    let definitions = Definitions {
        old: &old.schemas,
        new: &new.schemas,
        changed: &changed,
    };

    let workers = parallelism.max(1).min(matched.len().max(1));
    if matched.len() >= PARALLEL_THRESHOLD && workers > 1 {
        tracing::debug!(endpoints = matched.len(), workers, "diffing endpoints in parallel");
        let chunk_size = matched.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = matched
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || diff_endpoints(chunk, definitions)))
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(found) => changes.extend(found),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });
    } else {
        changes.extend(diff_endpoints(&matched, definitions));
    }

    tracing::debug!(changes = changes.len(), "diff complete");
    changes
}

/// Named schemas by declared name, so moving a schema from `definitions` to
/// `components/schemas` is not a change.
fn definitions_by_name(model: &ContractModel) -> BTreeMap<&str, &Schema> {
    model.schemas.iter().map(|(id, schema)| (id.name(), schema)).collect()
}

/// Ids of named schemas whose structure differs between the models, directly
/// or through a schema they reference.
fn changed_definitions(old: &ContractModel, new: &ContractModel) -> BTreeSet<SchemaId> {
    let mut changed: BTreeSet<SchemaId> = old
        .schemas
        .keys()
        .chain(new.schemas.keys())
        .filter(|id| old.schemas.get(*id) != new.schemas.get(*id))
        .cloned()
        .collect();
    loop {
        let reaching: Vec<SchemaId> = old
            .schemas
            .iter()
            .filter(|(id, schema)| !changed.contains(*id) && schema.references_any(&changed))
            .map(|(id, _)| id.clone())
            .collect();
        if reaching.is_empty() {
            return changed;
        }
        changed.extend(reaching);
    }
}

/// Named schemas of both models, shared by every diff worker.
#[derive(Clone, Copy)]
struct Definitions<'m> {
    old: &'m BTreeMap<SchemaId, Schema>,
    new: &'m BTreeMap<SchemaId, Schema>,
    changed: &'m BTreeSet<SchemaId>,
}

/// Structure behind `id`, skipping definitions that only alias another one.
/// `None` if the id is unknown or the aliases loop.
fn definition<'m>(table: &'m BTreeMap<SchemaId, Schema>, id: &SchemaId) -> Option<&'m Schema> {
    let mut seen = BTreeSet::new();
    let mut current = id.clone();
    loop {
        match table.get(&current)? {
            Schema::Reference { id: next } => {
                if !seen.insert(next.clone()) {
                    return None;
                }
                current = next.clone();
            }
            schema => return Some(schema),
        }
    }
}

fn diff_endpoints(pairs: &[(&Endpoint, &Endpoint)], definitions: Definitions<'_>) -> Vec<RawChange> {
    let mut differ = Differ::new(definitions);
    for (old, new) in pairs {
        differ.endpoint(old, new);
    }
    differ.changes
}

/// Short, stable name for a union alternative.
pub fn alternative_hash(schema: &Schema) -> String {
    let digest = Sha256::digest(schema.signature().as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn added(path: LocationPath, value: Value, context: ChangeContext) -> RawChange {
    RawChange {
        path,
        kind: ChangeKind::Added,
        old: None,
        new: Some(value),
        context,
    }
}

fn removed(path: LocationPath, value: Value, context: ChangeContext) -> RawChange {
    RawChange {
        path,
        kind: ChangeKind::Removed,
        old: Some(value),
        new: None,
        context,
    }
}

fn modified(path: LocationPath, old: Value, new: Value, context: ChangeContext) -> RawChange {
    RawChange {
        path,
        kind: ChangeKind::Modified,
        old: Some(old),
        new: Some(new),
        context,
    }
}

struct Differ<'m> {
    definitions: Definitions<'m>,
    /// Reference pairs already followed below the current top-level schema.
    followed: BTreeSet<(SchemaId, SchemaId)>,
    changes: Vec<RawChange>,
}

impl<'m> Differ<'m> {
    fn new(definitions: Definitions<'m>) -> Self {
        Self {
            definitions,
            followed: BTreeSet::new(),
            changes: Vec::new(),
        }
    }

    fn endpoint(&mut self, old: &Endpoint, new: &Endpoint) {
        let path = LocationPath::root().child(PathSegment::Endpoint(old.key.clone()));

        if old.deprecated != new.deprecated {
            self.changes.push(modified(
                path.child(PathSegment::Deprecated),
                Value::Bool(old.deprecated),
                Value::Bool(new.deprecated),
                ChangeContext::default(),
            ));
        }

        let auth = ChangeContext::required(requires_auth(&old.security), requires_auth(&new.security));
        for signature in old.security.difference(&new.security) {
            self.changes.push(removed(
                path.child(PathSegment::Security(signature.clone())),
                Value::String(signature.clone()),
                auth,
            ));
        }
        for signature in new.security.difference(&old.security) {
            self.changes.push(added(
                path.child(PathSegment::Security(signature.clone())),
                Value::String(signature.clone()),
                auth,
            ));
        }

        self.parameters(&path, old, new);
        self.request_body(&path, old.request_body.as_ref(), new.request_body.as_ref());
        self.responses(&path, old, new);
    }

    fn parameters(&mut self, path: &LocationPath, old: &Endpoint, new: &Endpoint) {
        for (key, before) in &old.parameters {
            let param_path = path.child(PathSegment::Parameter(key.clone()));
            let Some(after) = new.parameters.get(key) else {
                self.changes.push(removed(
                    param_path,
                    to_value(before),
                    ChangeContext {
                        required_before: Some(before.required),
                        ..Default::default()
                    },
                ));
                continue;
            };
            if before.required != after.required {
                self.changes.push(modified(
                    param_path.child(PathSegment::Required),
                    Value::Bool(before.required),
                    Value::Bool(after.required),
                    ChangeContext::required(before.required, after.required),
                ));
            }
            self.root_schema(
                &param_path,
                &before.schema,
                &after.schema,
                ChangeContext::required(before.required, after.required),
            );
        }
        for (key, after) in &new.parameters {
            if !old.parameters.contains_key(key) {
                self.changes.push(added(
                    path.child(PathSegment::Parameter(key.clone())),
                    to_value(after),
                    ChangeContext {
                        required_after: Some(after.required),
                        ..Default::default()
                    },
                ));
            }
        }
    }

    fn request_body(&mut self, path: &LocationPath, old: Option<&RequestBody>, new: Option<&RequestBody>) {
        let body_path = path.child(PathSegment::RequestBody);
        match (old, new) {
            (None, None) => {}
            (Some(before), None) => self.changes.push(removed(
                body_path,
                to_value(before),
                ChangeContext {
                    required_before: Some(before.required),
                    ..Default::default()
                },
            )),
            (None, Some(after)) => self.changes.push(added(
                body_path,
                to_value(after),
                ChangeContext {
                    required_after: Some(after.required),
                    ..Default::default()
                },
            )),
            (Some(before), Some(after)) => {
                let context = ChangeContext::required(before.required, after.required);
                if before.required != after.required {
                    self.changes.push(modified(
                        body_path.child(PathSegment::Required),
                        Value::Bool(before.required),
                        Value::Bool(after.required),
                        context,
                    ));
                }
                self.media_types(&body_path, &before.media_types, &after.media_types);
                self.optional_schema(&body_path, before.schema.as_ref(), after.schema.as_ref(), context);
            }
        }
    }

    fn responses(&mut self, path: &LocationPath, old: &Endpoint, new: &Endpoint) {
        for (status, before) in &old.responses {
            let response_path = path.child(PathSegment::Response(status.clone()));
            match new.responses.get(status) {
                Some(after) => {
                    self.media_types(&response_path, &before.media_types, &after.media_types);
                    self.optional_schema(
                        &response_path,
                        before.schema.as_ref(),
                        after.schema.as_ref(),
                        ChangeContext::default(),
                    );
                }
                None => self
                    .changes
                    .push(removed(response_path, to_value(before), ChangeContext::default())),
            }
        }
        for (status, after) in &new.responses {
            if !old.responses.contains_key(status) {
                self.changes.push(added(
                    path.child(PathSegment::Response(status.clone())),
                    to_value(after),
                    ChangeContext::default(),
                ));
            }
        }
    }

    fn media_types(&mut self, path: &LocationPath, old: &BTreeSet<String>, new: &BTreeSet<String>) {
        for media in old.difference(new) {
            self.changes.push(removed(
                path.child(PathSegment::MediaType(media.clone())),
                Value::String(media.clone()),
                ChangeContext::default(),
            ));
        }
        for media in new.difference(old) {
            self.changes.push(added(
                path.child(PathSegment::MediaType(media.clone())),
                Value::String(media.clone()),
                ChangeContext::default(),
            ));
        }
    }

    /// A missing schema accepts or promises anything.
    fn optional_schema(
        &mut self,
        path: &LocationPath,
        old: Option<&Schema>,
        new: Option<&Schema>,
        context: ChangeContext,
    ) {
        let any = Schema::any();
        self.root_schema(path, old.unwrap_or(&any), new.unwrap_or(&any), context);
    }

    fn root_schema(&mut self, path: &LocationPath, old: &Schema, new: &Schema, context: ChangeContext) {
        self.followed.clear();
        self.schema(path, old, new, context);
    }

    fn schema(&mut self, path: &LocationPath, old: &Schema, new: &Schema, context: ChangeContext) {
        if old == new && !old.references_any(self.definitions.changed) {
            return;
        }
        let definitions = self.definitions;
        match (old, new) {
            (Schema::Reference { id: before }, Schema::Reference { id: after }) => {
                self.reference(path, before, after, context)
            }
            (Schema::Reference { id }, _) => match definition(definitions.old, id) {
                Some(resolved) => self.schema(path, resolved, new, context),
                None => self.type_changed(path, old, new, context),
            },
            (_, Schema::Reference { id }) => match definition(definitions.new, id) {
                Some(resolved) => self.schema(path, old, resolved, context),
                None => self.type_changed(path, old, new, context),
            },
            (Schema::Primitive(before), Schema::Primitive(after)) => {
                self.primitive(path, before, after, context)
            }
            (Schema::Object(before), Schema::Object(after)) => self.object(path, before, after, context),
            (Schema::Array(before), Schema::Array(after)) => self.array(path, before, after, context),
            (Schema::Union(before), Schema::Union(after)) => self.union(path, before, after, context),
            (Schema::Union(before), _) => {
                let lifted = lift(new, before.combinator);
                self.union(path, before, &lifted, context);
            }
            (_, Schema::Union(after)) => {
                let lifted = lift(old, after.combinator);
                self.union(path, &lifted, after, context);
            }
            _ => self.type_changed(path, old, new, context),
        }
    }

    fn type_changed(&mut self, path: &LocationPath, old: &Schema, new: &Schema, context: ChangeContext) {
        self.changes.push(modified(
            path.child(PathSegment::Constraint(ConstraintKind::Type)),
            Value::String(old.type_label().to_string()),
            Value::String(new.type_label().to_string()),
            context,
        ));
    }

    /// Compares the structures behind two references, once per pair.
    fn reference(&mut self, path: &LocationPath, before: &SchemaId, after: &SchemaId, context: ChangeContext) {
        let definitions = self.definitions;
        if before == after && !definitions.changed.contains(before) {
            return;
        }
        if !self.followed.insert((before.clone(), after.clone())) {
            return;
        }
        match (definition(definitions.old, before), definition(definitions.new, after)) {
            (Some(old), Some(new)) => self.schema(path, old, new, context),
            _ => self.changes.push(modified(
                path.child(PathSegment::Constraint(ConstraintKind::Reference)),
                Value::String(before.0.clone()),
                Value::String(after.0.clone()),
                context,
            )),
        }
    }

    fn constraint<T: Serialize + PartialEq>(
        &mut self,
        path: &LocationPath,
        kind: ConstraintKind,
        old: &T,
        new: &T,
        context: ChangeContext,
    ) {
        if old != new {
            self.changes.push(modified(
                path.child(PathSegment::Constraint(kind)),
                to_value(old),
                to_value(new),
                context,
            ));
        }
    }

    fn primitive(
        &mut self,
        path: &LocationPath,
        old: &PrimitiveSchema,
        new: &PrimitiveSchema,
        context: ChangeContext,
    ) {
        self.constraint(path, ConstraintKind::Type, &old.kind, &new.kind, context);
        self.constraint(path, ConstraintKind::Format, &old.format, &new.format, context);
        self.constraint(path, ConstraintKind::Minimum, &old.minimum, &new.minimum, context);
        self.constraint(path, ConstraintKind::Maximum, &old.maximum, &new.maximum, context);
        self.constraint(path, ConstraintKind::MultipleOf, &old.multiple_of, &new.multiple_of, context);
        self.constraint(path, ConstraintKind::MinLength, &old.min_length, &new.min_length, context);
        self.constraint(path, ConstraintKind::MaxLength, &old.max_length, &new.max_length, context);
        self.constraint(path, ConstraintKind::Pattern, &old.pattern, &new.pattern, context);
        self.constraint(path, ConstraintKind::Enum, &old.enumeration, &new.enumeration, context);
    }

    fn object(&mut self, path: &LocationPath, old: &ObjectSchema, new: &ObjectSchema, context: ChangeContext) {
        for (name, before) in &old.fields {
            let field_path = path.child(PathSegment::Field(name.clone()));
            let required_before = old.required.contains(name);
            match new.fields.get(name) {
                Some(after) => self.schema(
                    &field_path,
                    before,
                    after,
                    ChangeContext::required(required_before, new.required.contains(name)),
                ),
                None => self.changes.push(removed(
                    field_path,
                    to_value(before),
                    ChangeContext {
                        required_before: Some(required_before),
                        ..Default::default()
                    },
                )),
            }
        }
        for (name, after) in &new.fields {
            if !old.fields.contains_key(name) {
                self.changes.push(added(
                    path.child(PathSegment::Field(name.clone())),
                    to_value(after),
                    ChangeContext {
                        required_after: Some(new.required.contains(name)),
                        ..Default::default()
                    },
                ));
            }
        }

        // Requiredness of a field that was itself added or removed is already
        // carried by that field's entry.
        let declared_on_both_sides =
            |name: &String| old.fields.contains_key(name) == new.fields.contains_key(name);
        for name in old.required.difference(&new.required) {
            if declared_on_both_sides(name) {
                self.changes.push(removed(
                    path.child(PathSegment::RequiredField(name.clone())),
                    Value::String(name.clone()),
                    ChangeContext::required(true, false),
                ));
            }
        }
        for name in new.required.difference(&old.required) {
            if declared_on_both_sides(name) {
                self.changes.push(added(
                    path.child(PathSegment::RequiredField(name.clone())),
                    Value::String(name.clone()),
                    ChangeContext::required(false, true),
                ));
            }
        }

        match (&old.additional, &new.additional) {
            (AdditionalFields::Schema(before), AdditionalFields::Schema(after)) => {
                self.schema(&path.child(PathSegment::AdditionalFields), before, after, context)
            }
            (before, after) => {
                self.constraint(path, ConstraintKind::AdditionalFields, before, after, context)
            }
        }
    }

    fn array(&mut self, path: &LocationPath, old: &ArraySchema, new: &ArraySchema, context: ChangeContext) {
        self.schema(&path.child(PathSegment::Items), &old.items, &new.items, context);
        self.constraint(path, ConstraintKind::MinItems, &old.min_items, &new.min_items, context);
        self.constraint(path, ConstraintKind::MaxItems, &old.max_items, &new.max_items, context);
        self.constraint(path, ConstraintKind::UniqueItems, &old.unique_items, &new.unique_items, context);
    }

    fn union(&mut self, path: &LocationPath, old: &UnionSchema, new: &UnionSchema, context: ChangeContext) {
        self.constraint(path, ConstraintKind::Combinator, &old.combinator, &new.combinator, context);

        let index = |union: &UnionSchema| -> BTreeMap<String, Schema> {
            union
                .alternatives
                .iter()
                .map(|alt| (alternative_hash(alt), alt.clone()))
                .collect()
        };
        let before = index(old);
        let after = index(new);
        for (hash, alt) in &before {
            match after.get(hash) {
                None => self.changes.push(removed(
                    path.child(PathSegment::Alternative(hash.clone())),
                    to_value(alt),
                    context.with_combinator(old.combinator),
                )),
                // Same signature, but a referenced recursive schema changed.
                Some(other) if alt.references_any(self.definitions.changed) => self.schema(
                    &path.child(PathSegment::Alternative(hash.clone())),
                    alt,
                    other,
                    context,
                ),
                Some(_) => {}
            }
        }
        for (hash, alt) in &after {
            if !before.contains_key(hash) {
                self.changes.push(added(
                    path.child(PathSegment::Alternative(hash.clone())),
                    to_value(alt),
                    context.with_combinator(new.combinator),
                ));
            }
        }
    }
}

/// A non-union schema seen as a one-alternative union.
fn lift(schema: &Schema, combinator: UnionKind) -> UnionSchema {
    UnionSchema {
        combinator,
        alternatives: vec![schema.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{EndpointKey, Literal, Parameter, ParameterLocation, PrimitiveKind};

    fn endpoint(method: &str, path: &str) -> Endpoint {
        let key = EndpointKey::new(method, path);
        Endpoint::new(key, Vec::new())
    }

    fn model(endpoints: Vec<Endpoint>) -> ContractModel {
        ContractModel {
            endpoints: endpoints.into_iter().map(|e| (e.key.clone(), e)).collect(),
            schemas: BTreeMap::new(),
        }
    }

    fn object(fields: &[(&str, Schema)], required: &[&str]) -> Schema {
        Schema::Object(ObjectSchema {
            fields: fields.iter().map(|(n, s)| (n.to_string(), s.clone())).collect(),
            required: required.iter().map(|n| n.to_string()).collect(),
            additional: AdditionalFields::Allowed,
        })
    }

    fn with_body(mut endpoint: Endpoint, schema: Schema) -> Endpoint {
        endpoint.request_body = Some(RequestBody {
            required: true,
            media_types: BTreeSet::from(["application/json".to_string()]),
            schema: Some(schema),
        });
        endpoint
    }

    #[test]
    fn test_identical_models_have_no_changes() {
        let m = model(vec![endpoint("GET", "/a"), endpoint("POST", "/a")]);
        assert!(diff_models(&m, &m, 1).is_empty());
    }

    #[test]
    fn test_endpoint_added_and_removed() {
        let old = model(vec![endpoint("DELETE", "/orders/{id}")]);
        let new = model(vec![endpoint("GET", "/orders/{id}")]);
        let mut changes = diff_models(&old, &new, 1);
        changes.sort_by_key(|c| c.kind);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[1].kind, ChangeKind::Removed);
        assert_eq!(changes[1].old, Some(Value::String("DELETE /orders/{}".to_string())));
    }

    #[test]
    fn test_new_required_field_is_one_entry() {
        let old = model(vec![with_body(
            endpoint("POST", "/users"),
            object(&[("name", Schema::primitive(PrimitiveKind::String))], &[]),
        )]);
        let new = model(vec![with_body(
            endpoint("POST", "/users"),
            object(
                &[
                    ("name", Schema::primitive(PrimitiveKind::String)),
                    ("email", Schema::primitive(PrimitiveKind::String)),
                ],
                &["email"],
            ),
        )]);
        let changes = diff_models(&old, &new, 1);
        assert_eq!(changes.len(), 1, "{changes:?}");
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].context.required_after, Some(true));
        assert_eq!(changes[0].path.last(), Some(&PathSegment::Field("email".to_string())));
    }

    #[test]
    fn test_existing_field_becoming_required() {
        let fields = [("email", Schema::primitive(PrimitiveKind::String))];
        let old = model(vec![with_body(endpoint("POST", "/users"), object(&fields, &[]))]);
        let new = model(vec![with_body(endpoint("POST", "/users"), object(&fields, &["email"]))]);
        let changes = diff_models(&old, &new, 1);
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].path.last(),
            Some(&PathSegment::RequiredField("email".to_string()))
        );
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_all_constraint_differences_are_reported() {
        let before = Schema::Primitive(PrimitiveSchema {
            kind: PrimitiveKind::String,
            max_length: Some(10),
            enumeration: Some(BTreeSet::from([Literal::String("a".to_string())])),
            ..Default::default()
        });
        let after = Schema::Primitive(PrimitiveSchema {
            kind: PrimitiveKind::String,
            max_length: Some(5),
            pattern: Some("^a".to_string()),
            ..Default::default()
        });
        let mut a = endpoint("GET", "/a");
        a.parameters.insert(
            crate::canonical::ParameterKey {
                location: ParameterLocation::Query,
                name: "q".to_string(),
            },
            Parameter {
                name: "q".to_string(),
                location: ParameterLocation::Query,
                required: false,
                schema: before,
            },
        );
        let mut b = a.clone();
        if let Some(param) = b.parameters.values_mut().next() {
            param.schema = after;
        }
        let changes = diff_models(&model(vec![a]), &model(vec![b]), 1);
        let kinds: BTreeSet<String> = changes.iter().map(|c| c.path.render().join("/")).collect();
        assert_eq!(kinds.len(), 3, "{kinds:?}");
        assert!(kinds.contains("GET /a/query:q/constraint:maxLength"));
        assert!(kinds.contains("GET /a/query:q/constraint:pattern"));
        assert!(kinds.contains("GET /a/query:q/constraint:enum"));
    }

    #[test]
    fn test_nullable_added_is_alternative() {
        let string = Schema::primitive(PrimitiveKind::String);
        let nullable = Schema::Union(UnionSchema {
            combinator: UnionKind::AnyOf,
            alternatives: vec![Schema::primitive(PrimitiveKind::Null), string.clone()],
        });
        let old = model(vec![with_body(endpoint("POST", "/a"), string)]);
        let new = model(vec![with_body(endpoint("POST", "/a"), nullable)]);
        let changes = diff_models(&old, &new, 1);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].context.combinator, Some(UnionKind::AnyOf));
        assert!(matches!(changes[0].path.last(), Some(PathSegment::Alternative(_))));
    }

    fn reference(name: &str) -> Schema {
        Schema::Reference {
            id: SchemaId(format!("#/components/schemas/{name}")),
        }
    }

    /// `A` and `B` refer to each other; `GET /a` returns an `A`.
    fn mutual(b_fields: &[(&str, Schema)], b_required: &[&str]) -> ContractModel {
        let mut fields = vec![("a", reference("A"))];
        fields.extend(b_fields.iter().cloned());
        let mut get = endpoint("GET", "/a");
        get.responses.insert(
            "200".to_string(),
            crate::canonical::ResponseSpec {
                status: "200".to_string(),
                media_types: BTreeSet::from(["application/json".to_string()]),
                schema: Some(reference("A")),
            },
        );
        let mut m = model(vec![get]);
        m.schemas.insert(
            SchemaId("#/components/schemas/A".to_string()),
            object(&[("b", reference("B"))], &[]),
        );
        m.schemas.insert(
            SchemaId("#/components/schemas/B".to_string()),
            object(&fields, b_required),
        );
        m
    }

    #[test]
    fn test_change_behind_recursive_reference_is_reported() {
        let old = mutual(&[("x", Schema::primitive(PrimitiveKind::String))], &["x"]);
        let new = mutual(&[], &[]);
        let changes = diff_models(&old, &new, 1);
        let paths: Vec<String> = changes.iter().map(|c| c.path.render().join(" > ")).collect();
        assert_eq!(
            paths,
            vec!["definition:B", "GET /a > response:200 > field:b > field:x"],
        );
        assert_eq!(changes[1].kind, ChangeKind::Removed);
        assert_eq!(changes[1].context.required_before, Some(true));
    }

    #[test]
    fn test_unchanged_recursive_references_are_quiet() {
        let m = mutual(&[("x", Schema::primitive(PrimitiveKind::String))], &[]);
        assert!(diff_models(&m, &m.clone(), 1).is_empty());
    }

    #[test]
    fn test_renamed_recursive_schema_has_no_endpoint_change() {
        let node = |name: &str| {
            object(
                &[
                    ("name", Schema::primitive(PrimitiveKind::String)),
                    ("children", Schema::Array(ArraySchema {
                        items: Box::new(reference(name)),
                        min_items: None,
                        max_items: None,
                        unique_items: false,
                    })),
                ],
                &["name"],
            )
        };
        let build = |name: &str| {
            let mut get = endpoint("GET", "/tree");
            get.responses.insert(
                "200".to_string(),
                crate::canonical::ResponseSpec {
                    status: "200".to_string(),
                    media_types: BTreeSet::new(),
                    schema: Some(reference(name)),
                },
            );
            let mut m = model(vec![get]);
            m.schemas
                .insert(SchemaId(format!("#/components/schemas/{name}")), node(name));
            m
        };
        let changes = diff_models(&build("Node"), &build("TreeNode"), 1);
        assert!(changes.iter().all(|c| c.path.endpoint().is_none()), "{changes:?}");
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_parallel_diff_matches_sequential() {
        let build = |max: u64| {
            model(
                (0..100)
                    .map(|i| {
                        with_body(
                            endpoint("POST", &format!("/items/{i}")),
                            Schema::Primitive(PrimitiveSchema {
                                kind: PrimitiveKind::String,
                                max_length: Some(max + i),
                                ..Default::default()
                            }),
                        )
                    })
                    .collect(),
            )
        };
        let old = build(10);
        let new = build(20);
        let key = |c: &RawChange| (c.path.clone(), c.kind);
        let mut sequential = diff_models(&old, &new, 1);
        let mut parallel = diff_models(&old, &new, 4);
        sequential.sort_by_key(key);
        parallel.sort_by_key(key);
        assert_eq!(sequential.len(), 100);
        assert_eq!(sequential, parallel);
    }
}

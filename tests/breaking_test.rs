//! End-to-end classification of contract changes

use contract_diff::compat::{ChangeKind, DiffConfig, DiffReport, Severity, Verdict};
use contract_diff::{ContractFormat, compare};
use serde_json::{Value, json};
use std::fs;

fn openapi(paths: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "openapi": "3.0.3",
        "info": {"title": "Test", "version": "1"},
        "paths": paths,
    }))
    .unwrap()
}

fn diff(old: &[u8], new: &[u8]) -> DiffReport {
    compare(
        old,
        ContractFormat::OpenApiJson,
        new,
        ContractFormat::OpenApiJson,
        &DiffConfig::default(),
    )
    .unwrap()
}

fn read_fixture(file_name: &str) -> Vec<u8> {
    fs::read(format!("tests/data/{file_name}")).expect("Could not read test fixture")
}

fn user_lookup(with_verbose: bool) -> Vec<u8> {
    let mut parameters = vec![json!({"name": "id", "in": "path", "required": true, "schema": {"type": "string"}})];
    if with_verbose {
        parameters.push(json!({"name": "verbose", "in": "query", "required": false, "schema": {"type": "boolean"}}));
    }
    openapi(json!({
        "/users/{id}": {
            "get": {
                "parameters": parameters,
                "responses": {"200": {"description": "ok"}}
            }
        }
    }))
}

fn create_user(properties: Value, required: &[&str]) -> Vec<u8> {
    openapi(json!({
        "/users": {
            "post": {
                "requestBody": {
                    "required": true,
                    "content": {"application/json": {"schema": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    }}}
                },
                "responses": {"201": {"description": "created"}}
            }
        }
    }))
}

fn status_response(values: &[&str], required: bool) -> Vec<u8> {
    let required: Vec<&str> = if required { vec!["status"] } else { Vec::new() };
    openapi(json!({
        "/status": {
            "get": {
                "responses": {"200": {
                    "description": "ok",
                    "content": {"application/json": {"schema": {
                        "type": "object",
                        "required": required,
                        "properties": {"status": {"type": "string", "enum": values}}
                    }}}
                }}
            }
        }
    }))
}

#[test]
fn test_optional_query_parameter_removed() {
    let report = diff(&user_lookup(true), &user_lookup(false));

    assert_eq!(report.changes.len(), 1);
    let change = &report.changes[0];
    assert_eq!(change.kind, ChangeKind::Removed);
    assert_eq!(change.severity, Severity::NonBreaking);
    assert_eq!(change.rule, "PARAMETER_OPTIONAL_REMOVED");
    assert_eq!(change.path, vec!["GET /users/{}", "query:verbose"]);
    assert_eq!(report.verdict, Verdict::Compatible);
}

#[test]
fn test_new_required_request_field() {
    let old = create_user(json!({"name": {"type": "string"}}), &[]);
    let new = create_user(
        json!({"name": {"type": "string"}, "email": {"type": "string"}}),
        &["email"],
    );
    let report = diff(&old, &new);

    assert_eq!(report.changes.len(), 1);
    let change = &report.changes[0];
    assert_eq!(change.kind, ChangeKind::Added);
    assert_eq!(change.severity, Severity::Breaking);
    assert_eq!(change.rule, "REQUEST_FIELD_REQUIRED_ADDED");
    assert_eq!(change.path, vec!["POST /users", "requestBody", "field:email"]);
    assert_eq!(report.verdict, Verdict::Breaking);
}

#[test]
fn test_existing_request_field_becomes_required() {
    let properties = json!({"name": {"type": "string"}, "email": {"type": "string"}});
    let report = diff(
        &create_user(properties.clone(), &[]),
        &create_user(properties, &["email"]),
    );

    assert_eq!(report.changes.len(), 1);
    let change = &report.changes[0];
    assert_eq!(change.kind, ChangeKind::Added);
    assert_eq!(change.severity, Severity::Breaking);
    assert_eq!(change.rule, "REQUEST_FIELD_BECAME_REQUIRED");
    assert_eq!(change.path, vec!["POST /users", "requestBody", "required:email"]);
}

#[test]
fn test_response_enum_narrowed() {
    let report = diff(
        &status_response(&["ok", "error"], false),
        &status_response(&["ok"], false),
    );

    assert_eq!(report.changes.len(), 1);
    let change = &report.changes[0];
    assert_eq!(change.kind, ChangeKind::Modified);
    assert_eq!(change.severity, Severity::Breaking);
    assert_eq!(change.rule, "RESPONSE_TYPE_NARROWED");
    assert_eq!(
        change.path,
        vec!["GET /status", "response:200", "field:status", "constraint:enum"]
    );
    assert_eq!(change.old, json!(["error", "ok"]));
    assert_eq!(change.new, json!(["ok"]));
}

#[test]
fn test_response_narrowing_of_field_that_becomes_optional() {
    let report = diff(
        &status_response(&["ok", "error"], true),
        &status_response(&["ok"], false),
    );

    let rules: Vec<&str> = report.changes.iter().map(|c| c.rule.as_str()).collect();
    assert_eq!(
        rules,
        vec!["RESPONSE_TYPE_NARROWED_OPTIONAL", "RESPONSE_FIELD_BECAME_OPTIONAL"]
    );
    assert_eq!(report.changes[0].severity, Severity::NonBreaking);
    assert_eq!(report.changes[1].severity, Severity::Breaking);
}

#[test]
fn test_recursive_schema_compares_equal() {
    let tree = read_fixture("tree_v1.yaml");
    let report = compare(
        &tree,
        ContractFormat::OpenApiYaml,
        &tree,
        ContractFormat::OpenApiYaml,
        &DiffConfig::default(),
    )
    .unwrap();

    assert!(report.is_empty());
    assert_eq!(report.verdict, Verdict::Compatible);
}

#[test]
fn test_recursive_schema_field_added() {
    let report = compare(
        &read_fixture("tree_v1.yaml"),
        ContractFormat::OpenApiYaml,
        &read_fixture("tree_v2.yaml"),
        ContractFormat::OpenApiYaml,
        &DiffConfig::default(),
    )
    .unwrap();

    let rules: Vec<&str> = report.changes.iter().map(|c| c.rule.as_str()).collect();
    assert_eq!(rules, vec!["RESPONSE_FIELD_ADDED", "DEFINITION_CHANGED"]);
    assert_eq!(report.verdict, Verdict::Compatible);
}

#[test]
fn test_endpoint_removed() {
    let orders = |with_delete: bool| {
        let mut item = json!({"get": {"responses": {"200": {"description": "ok"}}}});
        if with_delete {
            item["delete"] = json!({
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "responses": {"204": {"description": "deleted"}}
            });
        }
        openapi(json!({"/orders/{id}": item}))
    };
    let report = diff(&orders(true), &orders(false));

    assert_eq!(report.changes.len(), 1);
    let change = &report.changes[0];
    assert_eq!(change.kind, ChangeKind::Removed);
    assert_eq!(change.severity, Severity::Breaking);
    assert_eq!(change.rule, "ENDPOINT_NO_DELETE");
    assert_eq!(change.old, json!("DELETE /orders/{id}"));
    assert_eq!(report.verdict, Verdict::Breaking);
    assert_eq!(report.verdict.exit_code(), 1);
}

#[test]
fn test_security_newly_required() {
    let doc = |security: Value| {
        openapi(json!({
            "/reports": {"get": {"security": security, "responses": {"200": {"description": "ok"}}}}
        }))
    };
    let report = diff(&doc(json!([])), &doc(json!([{"apiKey": []}])));

    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].rule, "SECURITY_NEWLY_REQUIRED");
    assert_eq!(report.changes[0].path, vec!["GET /reports", "security:apiKey"]);

    let report = diff(&doc(json!([{"apiKey": []}])), &doc(json!([{"apiKey": []}, {}])));
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].rule, "SECURITY_ALTERNATIVE_ADDED");
    assert_eq!(report.verdict, Verdict::Compatible);

    // Anonymous callers are still accepted, so the key is optional
    let report = diff(&doc(json!([])), &doc(json!([{}, {"apiKey": []}])));
    let paths: Vec<&str> = report.changes.iter().map(|c| c.path[1].as_str()).collect();
    assert_eq!(paths, vec!["security:anonymous", "security:apiKey"]);
    assert!(report.changes.iter().all(|c| c.rule == "SECURITY_ALTERNATIVE_ADDED"));
    assert_eq!(report.summary.breaking, 0);
    assert_eq!(report.verdict, Verdict::Compatible);
}

#[test]
fn test_breaking_changes_carry_impact() {
    let old = openapi(json!({
        "/orders/{id}": {"delete": {"responses": {"204": {"description": "gone"}}}},
        "/users/{id}": {"get": {"security": [], "responses": {"200": {"description": "ok"}}}}
    }));
    let new = openapi(json!({
        "/users/{id}": {"get": {"security": [{"apiKey": []}], "responses": {"200": {"description": "ok"}}}}
    }));
    let report = diff(&old, &new);

    let mut impacts: Vec<(&str, Value)> = report
        .changes
        .iter()
        .map(|c| (c.rule.as_str(), serde_json::to_value(c.impact).unwrap()))
        .collect();
    impacts.sort_by(|a, b| a.0.cmp(b.0));
    assert_eq!(
        impacts,
        vec![
            ("ENDPOINT_NO_DELETE", json!("critical")),
            ("SECURITY_NEWLY_REQUIRED", json!("high")),
        ]
    );
    assert_eq!(report.impact.critical, 1);
    assert_eq!(report.impact.high, 1);

    let text = report.to_text();
    assert!(text.contains("BREAKING (critical):\n  - DELETE /orders/{} [ENDPOINT_NO_DELETE]"), "{text}");
}

/// Every schema references every other one, so expansion along paths would explode.
fn dense_group(size: usize, extra_field: bool) -> Vec<u8> {
    let mut schemas = serde_json::Map::new();
    for i in 0..size {
        let mut properties = serde_json::Map::new();
        for j in (0..size).filter(|j| *j != i) {
            properties.insert(format!("s{j}"), json!({"$ref": format!("#/components/schemas/S{j}")}));
        }
        properties.insert("id".to_string(), json!({"type": "string"}));
        let mut required = vec!["id"];
        if extra_field && i == size - 1 {
            properties.insert("legacy".to_string(), json!({"type": "string"}));
            required.push("legacy");
        }
        schemas.insert(
            format!("S{i}"),
            json!({"type": "object", "properties": properties, "required": required}),
        );
    }
    serde_json::to_vec(&json!({
        "openapi": "3.0.3",
        "info": {"title": "Graph", "version": "1"},
        "paths": {
            "/graph": {"get": {"responses": {"200": {
                "description": "ok",
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/S0"}}}
            }}}}
        },
        "components": {"schemas": schemas},
    }))
    .unwrap()
}

#[test]
fn test_densely_recursive_schemas() {
    let current = dense_group(12, false);
    let report = diff(&current, &current);
    assert!(report.changes.is_empty());

    // Dropping a required field from the last schema of the group
    let report = diff(&dense_group(12, true), &current);
    let endpoint_changes: Vec<_> = report
        .changes
        .iter()
        .filter(|c| c.path[0] == "GET /graph")
        .collect();
    assert_eq!(endpoint_changes.len(), 1, "{:?}", report.changes);
    let change = endpoint_changes[0];
    assert_eq!(change.rule, "RESPONSE_REQUIRED_FIELD_REMOVED");
    assert_eq!(change.severity, Severity::Breaking);
    assert_eq!(change.path[1], "response:200");
    assert_eq!(change.path.last().map(String::as_str), Some("field:legacy"));
    assert_eq!(change.path[change.path.len() - 2], "field:s11");
    assert_eq!(report.verdict, Verdict::Breaking);
}

#[test]
fn test_request_body_and_media_types() {
    let doc = |required: bool, media: &str| {
        let mut content = serde_json::Map::new();
        content.insert(media.to_string(), json!({"schema": {"type": "string"}}));
        openapi(json!({
            "/upload": {"post": {
                "requestBody": {"required": required, "content": content},
                "responses": {"200": {"description": "ok"}}
            }}
        }))
    };
    let report = diff(&doc(false, "application/json"), &doc(true, "application/xml"));

    let rules: Vec<&str> = report.changes.iter().map(|c| c.rule.as_str()).collect();
    assert_eq!(
        rules,
        vec![
            "REQUEST_MEDIA_TYPE_REMOVED",
            "REQUEST_MEDIA_TYPE_ADDED",
            "REQUEST_BODY_BECAME_REQUIRED",
        ]
    );
    assert_eq!(report.summary.breaking, 2);
    assert_eq!(report.summary.non_breaking, 1);
}

#[test]
fn test_response_status_removal_depends_on_class() {
    let doc = |statuses: &[&str]| {
        let responses: serde_json::Map<String, Value> = statuses
            .iter()
            .map(|s| (s.to_string(), json!({"description": "x"})))
            .collect();
        openapi(json!({"/jobs": {"get": {"responses": responses}}}))
    };
    let report = diff(&doc(&["200", "404"]), &doc(&["200"]));
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].rule, "RESPONSE_ERROR_REMOVED");
    assert_eq!(report.changes[0].severity, Severity::Informational);

    let report = diff(&doc(&["200", "404"]), &doc(&["404"]));
    assert_eq!(report.changes[0].rule, "RESPONSE_SUCCESS_REMOVED");
    assert_eq!(report.verdict, Verdict::Breaking);
}

#[test]
fn test_request_type_widening_and_narrowing() {
    let doc = |schema: Value| {
        openapi(json!({
            "/search": {"get": {
                "parameters": [{"name": "q", "in": "query", "schema": schema}],
                "responses": {"200": {"description": "ok"}}
            }}
        }))
    };
    let report = diff(
        &doc(json!({"type": "string", "maxLength": 10})),
        &doc(json!({"type": "string", "maxLength": 50})),
    );
    assert_eq!(report.changes[0].rule, "REQUEST_TYPE_WIDENED");
    assert_eq!(report.verdict, Verdict::Compatible);

    let report = diff(
        &doc(json!({"type": "integer"})),
        &doc(json!({"type": "integer", "minimum": 1})),
    );
    assert_eq!(report.changes[0].rule, "REQUEST_TYPE_NARROWED");

    let report = diff(&doc(json!({"type": "integer"})), &doc(json!({"type": "string"})));
    assert_eq!(report.changes[0].rule, "TYPE_INCOMPATIBLE");
    assert_eq!(report.changes[0].path, vec!["GET /search", "query:q", "constraint:type"]);
}

#[test]
fn test_users_fixture_changes() {
    let report = compare(
        &read_fixture("users_v1.yaml"),
        ContractFormat::OpenApiYaml,
        &read_fixture("users_v2.yaml"),
        ContractFormat::OpenApiYaml,
        &DiffConfig::default(),
    )
    .unwrap();

    let rules: Vec<&str> = report.changes.iter().map(|c| c.rule.as_str()).collect();
    assert!(rules.contains(&"ENDPOINT_NO_DELETE"));
    assert!(rules.contains(&"ENDPOINT_ADDED"));
    assert!(rules.contains(&"PARAMETER_OPTIONAL_REMOVED"));
    assert!(rules.contains(&"REQUEST_FIELD_REQUIRED_ADDED"));
    assert_eq!(rules.iter().filter(|r| **r == "RESPONSE_TYPE_NARROWED").count(), 2);
    assert_eq!(rules.iter().filter(|r| **r == "DEFINITION_CHANGED").count(), 2);
    assert_eq!(report.changes.len(), 8);
    assert_eq!(report.summary.breaking, 4);
    assert_eq!(report.summary.non_breaking, 2);
    assert_eq!(report.summary.informational, 2);
    assert_eq!(report.verdict, Verdict::Breaking);
}

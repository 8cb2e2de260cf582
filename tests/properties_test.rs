//! Properties every comparison must satisfy regardless of input

use contract_diff::compat::{ChangeEntry, DiffConfig, DiffEngine, Verdict};
use contract_diff::{Contract, ContractFormat, compare};
use serde_json::json;
use std::path::Path;

const FIXTURES: &[&str] = &[
    "users_v1.yaml",
    "users_v1_reordered.json",
    "users_v2.yaml",
    "tree_v1.yaml",
    "tree_v2.yaml",
    "pets_swagger2.json",
    "pets_openapi3.yaml",
    "orders_v1.collection.json",
    "orders_v2.collection.json",
];

fn load_fixture(file_name: &str) -> Contract {
    Contract::from_file(Path::new(&format!("tests/data/{file_name}")), None)
        .expect("Could not load test fixture")
}

type EntryKey = (Vec<String>, &'static str, String, String);

/// Entry as it would appear if the comparison ran the other way.
fn mirrored(entry: &ChangeEntry) -> EntryKey {
    (
        entry.path.clone(),
        entry.kind.reversed().id(),
        entry.new.to_string(),
        entry.old.to_string(),
    )
}

fn plain(entry: &ChangeEntry) -> EntryKey {
    (
        entry.path.clone(),
        entry.kind.id(),
        entry.old.to_string(),
        entry.new.to_string(),
    )
}

#[test]
fn test_self_comparison_is_empty() {
    for name in FIXTURES {
        let contract = load_fixture(name);
        let report = contract.compare_with(&contract);
        assert!(report.is_empty(), "{name}: {:?}", report.changes);
        assert_eq!(report.verdict, Verdict::Compatible, "{name}");

        // Same check without the fingerprint shortcut.
        let report = DiffEngine::new().compare(&contract.model, &contract.model, &DiffConfig::default());
        assert!(report.is_empty(), "{name}: {:?}", report.changes);
    }
}

#[test]
fn test_reversed_comparison_mirrors_changes() {
    for (a, b) in [
        ("users_v1.yaml", "users_v2.yaml"),
        ("tree_v1.yaml", "tree_v2.yaml"),
        ("orders_v1.collection.json", "orders_v2.collection.json"),
    ] {
        let old = load_fixture(a);
        let new = load_fixture(b);
        let forward = old.compare_with(&new);
        let backward = new.compare_with(&old);

        let mut expected: Vec<_> = forward.changes.iter().map(mirrored).collect();
        let mut actual: Vec<_> = backward.changes.iter().map(plain).collect();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual, "{a} vs {b}");
    }
}

#[test]
fn test_reordering_and_cosmetic_edits_are_invisible() {
    let yaml = load_fixture("users_v1.yaml");
    let json = load_fixture("users_v1_reordered.json");

    assert_eq!(yaml.format, ContractFormat::OpenApiYaml);
    assert_eq!(json.format, ContractFormat::OpenApiJson);
    assert_eq!(yaml.fingerprint, json.fingerprint);
    assert!(yaml.compare_with(&json).is_empty());
}

#[test]
fn test_path_variable_rename_is_invisible() {
    let doc = |name: &str| {
        let mut paths = serde_json::Map::new();
        paths.insert(
            format!("/users/{{{name}}}/orders"),
            json!({
                "get": {
                    "parameters": [{"name": name, "in": "path", "required": true, "schema": {"type": "string"}}],
                    "responses": {"200": {"description": "ok"}}
                }
            }),
        );
        serde_json::to_vec(&json!({"openapi": "3.0.0", "paths": paths})).unwrap()
    };
    let report = compare(
        &doc("id"),
        ContractFormat::OpenApiJson,
        &doc("userId"),
        ContractFormat::OpenApiJson,
        &DiffConfig::default(),
    )
    .unwrap();

    assert!(report.is_empty(), "{:?}", report.changes);
}

#[test]
fn test_report_is_independent_of_parallelism() {
    let doc = |max_length: u64| {
        let mut paths = serde_json::Map::new();
        for i in 0..100u64 {
            paths.insert(
                format!("/items{i}/{{id}}"),
                json!({
                    "get": {
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "string"}},
                            {"name": "q", "in": "query", "schema": {"type": "string", "maxLength": max_length + i}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }),
            );
        }
        serde_json::to_vec(&json!({"openapi": "3.0.0", "paths": paths})).unwrap()
    };
    let old = doc(10);
    let new = doc(5);

    let run = |parallelism: usize| {
        let config = DiffConfig {
            parallelism: Some(parallelism),
            ..Default::default()
        };
        compare(&old, ContractFormat::OpenApiJson, &new, ContractFormat::OpenApiJson, &config)
            .unwrap()
    };
    let sequential = run(1);
    let parallel = run(8);

    assert_eq!(sequential.changes.len(), 100);
    assert_eq!(sequential.summary.breaking, 100);
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.to_text(), parallel.to_text());
}

#[test]
fn test_canonical_order_of_entries() {
    let old = load_fixture("users_v1.yaml");
    let new = load_fixture("users_v2.yaml");
    let report = old.compare_with(&new);

    let keys: Vec<_> = report
        .changes
        .iter()
        .map(|c| (c.path.clone(), c.kind, c.rule.clone()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

//! Comparison engine
//!
//! Runs the structural diff, classifies every raw change, applies the
//! configured exclusions and severity overrides, and builds the report.

use crate::canonical::{ContractModel, EndpointKey, HttpMethod, PathPart, parse_path_template};
use crate::compat::diff::diff_models;
use crate::compat::report::DiffReport;
use crate::compat::rules::{Rule, classify};
use crate::compat::types::{ChangeEntry, RawChange, Severity};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Rules whose entries are dropped from the report
    #[serde(default)]
    pub except_rules: Vec<String>,
    /// Severity to report for a rule instead of its default
    #[serde(default)]
    pub severity_overrides: BTreeMap<String, Severity>,
    /// Endpoint patterns whose changes are not reported, e.g. `GET /internal/*`
    #[serde(default)]
    pub ignore_endpoints: Vec<String>,
    /// Worker threads for per-endpoint diffing (defaults to available parallelism)
    #[serde(default)]
    pub parallelism: Option<usize>,
}

impl DiffConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        struct ConfigFile {
            breaking: Option<DiffConfig>,
        }

        let config_file: ConfigFile =
            serde_yaml::from_str(yaml).context("invalid configuration document")?;
        let config = config_file.breaking.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Rejects rule ids that no rule carries.
    pub fn validate(&self) -> anyhow::Result<()> {
        let unknown = self
            .except_rules
            .iter()
            .chain(self.severity_overrides.keys())
            .find(|id| Rule::from_id(id).is_none());
        if let Some(id) = unknown {
            anyhow::bail!("unknown rule id in configuration: {id}");
        }
        if self.parallelism == Some(0) {
            anyhow::bail!("parallelism must be at least 1");
        }
        Ok(())
    }

    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    fn severity_for(&self, rule: Rule) -> Severity {
        self.severity_overrides
            .get(rule.id())
            .copied()
            .unwrap_or_else(|| rule.severity())
    }

    fn is_excepted(&self, rule: Rule) -> bool {
        self.except_rules.iter().any(|id| id == rule.id())
    }
}

/// An `ignore_endpoints` entry: optional method (or `*`) and a canonical path,
/// where a trailing `*` matches any path below the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPattern {
    method: Option<HttpMethod>,
    path: Vec<PathPart>,
    prefix: bool,
}

impl EndpointPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        let (method, path) = match pattern.split_once(char::is_whitespace) {
            Some((method, path)) if !method.starts_with('/') => (method, path.trim()),
            _ => ("*", pattern),
        };
        let method = (method != "*").then(|| HttpMethod::parse(method));
        let (path, prefix) = match path.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (path, false),
        };
        Self {
            method,
            path: parse_path_template(path).0,
            prefix,
        }
    }

    pub fn matches(&self, key: &EndpointKey) -> bool {
        if self.method.as_ref().is_some_and(|m| *m != key.method) {
            return false;
        }
        if self.prefix {
            key.path.starts_with(&self.path)
        } else {
            key.path == self.path
        }
    }
}

/// Main engine for contract comparison
#[derive(Debug, Default)]
pub struct DiffEngine {
    // Stateless; configuration is passed per comparison
}

impl DiffEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Compare two contract models. `old` is the baseline.
    pub fn compare(&self, old: &ContractModel, new: &ContractModel, config: &DiffConfig) -> DiffReport {
        let ignored: Vec<EndpointPattern> = config
            .ignore_endpoints
            .iter()
            .map(|p| EndpointPattern::parse(p))
            .collect();

        let raw = diff_models(old, new, config.effective_parallelism());
        let entries: Vec<ChangeEntry> = raw
            .into_iter()
            .filter(|change| !is_ignored(change, &ignored))
            .filter_map(|change| {
                let rule = classify(&change);
                if config.is_excepted(rule) {
                    return None;
                }
                if rule == Rule::UnclassifiedChange {
                    tracing::warn!(path = %change.path, kind = %change.kind, "no rule matched change");
                }
                Some(entry(change, rule, config.severity_for(rule)))
            })
            .collect();

        let report = DiffReport::build(entries, Vec::new());
        tracing::info!(
            verdict = %report.verdict,
            breaking = report.summary.breaking,
            critical = report.impact.critical,
            non_breaking = report.summary.non_breaking,
            informational = report.summary.informational,
            "comparison complete"
        );
        report
    }
}

fn is_ignored(change: &RawChange, patterns: &[EndpointPattern]) -> bool {
    change
        .path
        .endpoint()
        .is_some_and(|key| patterns.iter().any(|p| p.matches(key)))
}

fn entry(change: RawChange, rule: Rule, severity: Severity) -> ChangeEntry {
    ChangeEntry {
        path: change.path.render(),
        kind: change.kind,
        severity,
        impact: (severity == Severity::Breaking).then(|| rule.impact()),
        rule: rule.id().to_string(),
        reason: rule.reason().to_string(),
        old: change.old.unwrap_or_default(),
        new: change.new.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Endpoint;
    use crate::compat::types::Impact;

    fn model(keys: &[(&str, &str)]) -> ContractModel {
        ContractModel {
            endpoints: keys
                .iter()
                .map(|(m, p)| {
                    let key = EndpointKey::new(m, p);
                    (key.clone(), Endpoint::new(key, Vec::new()))
                })
                .collect(),
            schemas: BTreeMap::new(),
        }
    }

    #[test]
    fn test_endpoint_patterns() {
        let prefix = EndpointPattern::parse("GET /internal/*");
        assert!(prefix.matches(&EndpointKey::new("GET", "/internal/jobs/{id}")));
        assert!(!prefix.matches(&EndpointKey::new("POST", "/internal/jobs")));

        let any_method = EndpointPattern::parse("/health");
        assert!(any_method.matches(&EndpointKey::new("HEAD", "/health")));
        assert!(!any_method.matches(&EndpointKey::new("GET", "/health/deep")));

        let renamed = EndpointPattern::parse("* /users/{anything}");
        assert!(renamed.matches(&EndpointKey::new("DELETE", "/users/{id}")));
    }

    #[test]
    fn test_config_parsing() {
        let yaml = r#"
breaking:
  except_rules:
    - ENDPOINT_NO_DELETE
  severity_overrides:
    RESPONSE_TYPE_WIDENED: non-breaking
  ignore_endpoints:
    - "GET /internal/*"
  parallelism: 2
"#;
        let config = DiffConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.except_rules, vec!["ENDPOINT_NO_DELETE"]);
        assert_eq!(
            config.severity_overrides.get("RESPONSE_TYPE_WIDENED"),
            Some(&Severity::NonBreaking)
        );
        assert_eq!(config.effective_parallelism(), 2);
    }

    #[test]
    fn test_missing_section_gives_defaults() {
        let config = DiffConfig::from_yaml_str("other: 1\n").unwrap();
        assert_eq!(config, DiffConfig::default());
    }

    #[test]
    fn test_unknown_rule_is_rejected() {
        let err = DiffConfig::from_yaml_str("breaking:\n  except_rules: [NO_SUCH_RULE]\n").unwrap_err();
        assert!(err.to_string().contains("NO_SUCH_RULE"), "{err}");
    }

    #[test]
    fn test_except_and_override() {
        let old = model(&[("DELETE", "/orders/{id}"), ("GET", "/internal/stats")]);
        let new = model(&[("POST", "/orders")]);
        let engine = DiffEngine::new();

        let report = engine.compare(&old, &new, &DiffConfig::default());
        assert_eq!(report.summary.breaking, 2);
        assert_eq!(report.summary.non_breaking, 1);
        for change in &report.changes {
            let expected = (change.severity == Severity::Breaking).then_some(Impact::Critical);
            assert_eq!(change.impact, expected, "{:?}", change.path);
        }

        let config = DiffConfig {
            ignore_endpoints: vec!["/internal/*".to_string()],
            severity_overrides: BTreeMap::from([(
                "ENDPOINT_NO_DELETE".to_string(),
                Severity::Informational,
            )]),
            except_rules: vec!["ENDPOINT_ADDED".to_string()],
            parallelism: Some(1),
        };
        let report = engine.compare(&old, &new, &config);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].severity, Severity::Informational);
        assert_eq!(report.changes[0].rule, "ENDPOINT_NO_DELETE");
        assert_eq!(report.changes[0].impact, None);
        assert_eq!(report.verdict.exit_code(), 0);
    }
}

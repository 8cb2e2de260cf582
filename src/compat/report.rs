//! Report builder: aggregates classified entries into a [`DiffReport`].

use crate::compat::types::{ChangeEntry, ChangeKind, Impact, Severity};
use crate::error::Warning;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Overall outcome of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Compatible,
    Breaking,
}

impl Verdict {
    pub fn id(&self) -> &'static str {
        match self {
            Verdict::Compatible => "compatible",
            Verdict::Breaking => "breaking",
        }
    }

    /// CLI exit code for a completed comparison.
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Compatible => 0,
            Verdict::Breaking => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub breaking: usize,
    pub non_breaking: usize,
    pub informational: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.breaking + self.non_breaking + self.informational
    }

    fn count(&mut self, severity: Severity) {
        match severity {
            Severity::Breaking => self.breaking += 1,
            Severity::NonBreaking => self.non_breaking += 1,
            Severity::Informational => self.informational += 1,
        }
    }
}

/// Breaking entries by impact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImpactCounts {
    pub critical: usize,
    pub high: usize,
}

impl ImpactCounts {
    pub fn is_empty(&self) -> bool {
        self.critical == 0 && self.high == 0
    }

    fn count(&mut self, impact: Impact) {
        match impact {
            Impact::Critical => self.critical += 1,
            Impact::High => self.high += 1,
        }
    }
}

/// Result of comparing two contracts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub verdict: Verdict,
    pub summary: SeverityCounts,
    #[serde(skip_serializing_if = "ImpactCounts::is_empty")]
    pub impact: ImpactCounts,
    pub changes: Vec<ChangeEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl DiffReport {
    /// Sorts entries into canonical order and derives counts and verdict. The
    /// output depends only on the set of entries, never on their input order.
    pub fn build(mut changes: Vec<ChangeEntry>, mut warnings: Vec<Warning>) -> Self {
        changes.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.rule.cmp(&b.rule))
        });
        warnings.sort();
        warnings.dedup();

        let mut summary = SeverityCounts::default();
        let mut impact = ImpactCounts::default();
        for change in &changes {
            summary.count(change.severity);
            if change.severity == Severity::Breaking {
                impact.count(entry_impact(change));
            }
        }
        let verdict = if summary.breaking > 0 {
            Verdict::Breaking
        } else {
            Verdict::Compatible
        };

        Self {
            verdict,
            summary,
            impact,
            changes,
            warnings,
        }
    }

    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new())
    }

    /// Attaches document warnings, keeping them in canonical order.
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = Warning>) -> Self {
        self.warnings.extend(warnings);
        self.warnings.sort();
        self.warnings.dedup();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.changes.iter().filter(|c| c.severity == Severity::Breaking)
    }

    /// Full report as JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Verdict, counts and only the breaking entries.
    pub fn to_summary_json(&self) -> Value {
        let breaking: Vec<&ChangeEntry> = self.breaking_changes().collect();
        let mut value = serde_json::json!({
            "verdict": self.verdict,
            "summary": self.summary,
            "changes": breaking,
        });
        if !self.impact.is_empty() {
            value["impact"] = serde_json::to_value(self.impact).unwrap_or(Value::Null);
        }
        if !self.warnings.is_empty() {
            value["warnings"] = serde_json::to_value(&self.warnings).unwrap_or(Value::Null);
        }
        value
    }

    /// Human-readable rendering.
    pub fn to_text(&self) -> String {
        let mut lines = vec![format!(
            "{} change(s): {} breaking, {} non-breaking, {} informational",
            self.summary.total(),
            self.summary.breaking,
            self.summary.non_breaking,
            self.summary.informational
        )];

        for (severity, impact, title) in [
            (Severity::Breaking, Some(Impact::Critical), "BREAKING (critical):"),
            (Severity::Breaking, Some(Impact::High), "BREAKING (high):"),
            (Severity::NonBreaking, None, "NON-BREAKING:"),
            (Severity::Informational, None, "INFORMATIONAL:"),
        ] {
            let section: Vec<String> = self
                .changes
                .iter()
                .filter(|c| c.severity == severity)
                .filter(|c| impact.is_none_or(|impact| entry_impact(c) == impact))
                .map(render_entry)
                .collect();
            if !section.is_empty() {
                lines.push(String::new());
                lines.push(title.to_string());
                lines.extend(section);
            }
        }

        if !self.warnings.is_empty() {
            lines.push(String::new());
            lines.push("WARNINGS:".to_string());
            lines.extend(self.warnings.iter().map(|w| format!("  ! {w}")));
        }

        lines.push(String::new());
        lines.push(format!("verdict: {}", self.verdict));
        lines.join("\n")
    }

    /// Renders the report in the requested mode.
    pub fn render(&self, mode: OutputMode) -> String {
        match mode {
            OutputMode::Summary => pretty(&self.to_summary_json()),
            OutputMode::FullJson => pretty(&self.to_json()),
            OutputMode::Text => self.to_text(),
        }
    }
}

/// Breaking entries built by hand may carry no impact; they count as high.
fn entry_impact(entry: &ChangeEntry) -> Impact {
    entry.impact.unwrap_or(Impact::High)
}

fn render_entry(entry: &ChangeEntry) -> String {
    let marker = match entry.kind {
        ChangeKind::Added => '+',
        ChangeKind::Removed => '-',
        ChangeKind::Modified => '~',
    };
    let mut line = format!("  {marker} {} [{}] {}", entry.path.join(" > "), entry.rule, entry.reason);
    if entry.kind == ChangeKind::Modified {
        let before = serde_json::to_string(&entry.old).unwrap_or_default();
        let after = serde_json::to_string(&entry.new).unwrap_or_default();
        line.push_str(&format!("\n      {before} -> {after}"));
    }
    line
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// How a report is written out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Summary,
    FullJson,
    Text,
}

impl OutputMode {
    pub fn id(&self) -> &'static str {
        match self {
            OutputMode::Summary => "summary",
            OutputMode::FullJson => "full-json",
            OutputMode::Text => "text",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "summary" => Some(OutputMode::Summary),
            "full-json" => Some(OutputMode::FullJson),
            "text" => Some(OutputMode::Text),
            _ => None,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("Unknown output mode: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(path: &[&str], kind: ChangeKind, severity: Severity) -> ChangeEntry {
        ChangeEntry {
            path: path.iter().map(|s| s.to_string()).collect(),
            kind,
            severity,
            impact: None,
            rule: "TEST_RULE".to_string(),
            reason: "test".to_string(),
            old: Value::Null,
            new: Value::Null,
        }
    }

    #[test]
    fn test_empty_report_is_compatible() {
        let report = DiffReport::empty();
        assert_eq!(report.verdict, Verdict::Compatible);
        assert_eq!(report.verdict.exit_code(), 0);
        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_order_does_not_depend_on_input() {
        let a = entry(&["GET /a", "response:200"], ChangeKind::Removed, Severity::Breaking);
        let b = entry(&["GET /a"], ChangeKind::Modified, Severity::Informational);
        let c = entry(&["GET /a", "response:200"], ChangeKind::Added, Severity::NonBreaking);
        let forward = DiffReport::build(vec![a.clone(), b.clone(), c.clone()], Vec::new());
        let backward = DiffReport::build(vec![c, b, a], Vec::new());
        assert_eq!(forward, backward);
        assert_eq!(forward.changes[0].path, vec!["GET /a"]);
        assert_eq!(forward.changes[1].kind, ChangeKind::Added);
        assert_eq!(forward.verdict, Verdict::Breaking);
        assert_eq!(forward.summary.breaking, 1);
        assert_eq!(forward.summary.non_breaking, 1);
        assert_eq!(forward.summary.informational, 1);
    }

    #[test]
    fn test_json_shape() {
        let report = DiffReport::build(
            vec![entry(&["DELETE /orders/{}"], ChangeKind::Removed, Severity::Breaking)],
            Vec::new(),
        );
        let value = report.to_json();
        assert_eq!(value["verdict"], json!("breaking"));
        assert_eq!(
            value["summary"],
            json!({"breaking": 1, "nonBreaking": 0, "informational": 0})
        );
        assert_eq!(value["changes"][0]["kind"], json!("removed"));
        assert_eq!(value["changes"][0]["severity"], json!("breaking"));
        assert!(value.get("warnings").is_none());
        assert_eq!(value["impact"], json!({"critical": 0, "high": 1}));
    }

    #[test]
    fn test_summary_keeps_only_breaking_entries() {
        let report = DiffReport::build(
            vec![
                entry(&["GET /a"], ChangeKind::Added, Severity::NonBreaking),
                entry(&["GET /b"], ChangeKind::Removed, Severity::Breaking),
            ],
            vec![Warning::unsupported_construct("#/not", "not")],
        );
        let summary = report.to_summary_json();
        assert_eq!(summary["changes"].as_array().map(Vec::len), Some(1));
        assert_eq!(summary["summary"]["nonBreaking"], json!(1));
        assert_eq!(summary["warnings"][0]["pointer"], json!("#/not"));
    }

    #[test]
    fn test_text_rendering() {
        let report = DiffReport::build(
            vec![entry(&["GET /b"], ChangeKind::Removed, Severity::Breaking)],
            Vec::new(),
        );
        let text = report.render(OutputMode::Text);
        assert!(text.starts_with("1 change(s): 1 breaking, 0 non-breaking, 0 informational"));
        assert!(text.contains("BREAKING (high):\n  - GET /b [TEST_RULE] test"));
        assert!(!text.contains("BREAKING (critical):"));
        assert!(text.ends_with("verdict: breaking"));
    }

    #[test]
    fn test_breaking_entries_grouped_by_impact() {
        let mut removed = entry(&["DELETE /orders/{}"], ChangeKind::Removed, Severity::Breaking);
        removed.impact = Some(Impact::Critical);
        let mut narrowed = entry(&["GET /a", "query:q"], ChangeKind::Modified, Severity::Breaking);
        narrowed.impact = Some(Impact::High);
        let added = entry(&["GET /c"], ChangeKind::Added, Severity::NonBreaking);
        let report = DiffReport::build(vec![narrowed, added, removed], Vec::new());

        assert_eq!(report.impact, ImpactCounts { critical: 1, high: 1 });
        assert_eq!(report.to_json()["impact"], json!({"critical": 1, "high": 1}));
        assert_eq!(report.to_json()["changes"][0]["impact"], json!("critical"));
        assert!(report.to_json()["changes"][2].get("impact").is_none());
        assert_eq!(report.to_summary_json()["impact"]["critical"], json!(1));

        let text = report.to_text();
        let critical = text.find("BREAKING (critical):\n  - DELETE /orders/{}").unwrap();
        let high = text.find("BREAKING (high):\n  ~ GET /a > query:q").unwrap();
        assert!(critical < high);
    }

    #[test]
    fn test_output_mode_ids() {
        for mode in [OutputMode::Summary, OutputMode::FullJson, OutputMode::Text] {
            assert_eq!(mode.id().parse::<OutputMode>(), Ok(mode));
        }
    }
}

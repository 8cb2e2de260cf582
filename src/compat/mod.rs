//! Breaking change detection for API contracts
//!
//! The diff engine walks two contract models and emits raw changes, the rule
//! table classifies each one, and the report builder orders and counts them.

pub mod categories;
pub mod diff;
pub mod engine;
pub mod report;
pub mod rules;
pub mod types;

pub use categories::LocationKind;
pub use engine::{DiffConfig, DiffEngine, EndpointPattern};
pub use report::{DiffReport, ImpactCounts, OutputMode, SeverityCounts, Verdict};
pub use rules::{Rule, classify};
pub use types::{ChangeEntry, ChangeKind, Impact, LocationPath, PathSegment, RawChange, Severity};

//! Provides the high-level Contract API for comparing API contract documents.

use crate::compat::{DiffConfig, DiffEngine, DiffReport};
use crate::error::{ContractError, Side, Warning};
use crate::generate_fingerprint;
use crate::loader::{self, ContractFormat};
use crate::normalize::normalize;
use crate::resolve::resolve;
use std::path::Path;

/// A single contract document, loaded and normalized once.
#[derive(Debug, Clone)]
pub struct Contract {
    pub format: ContractFormat,
    /// SHA-256 over the canonical model.
    pub fingerprint: String,
    pub model: crate::canonical::ContractModel,
    /// Constructs that were skipped during normalization.
    pub warnings: Vec<Warning>,
}

impl Contract {
    /// Parses, resolves and normalizes a document.
    pub fn load(bytes: &[u8], format: ContractFormat) -> Result<Self, ContractError> {
        let raw = loader::load(bytes, format)?;
        let resolved = resolve(&raw)?;
        let normalized = normalize(&resolved, format);
        for warning in &normalized.warnings {
            tracing::warn!(pointer = %warning.pointer, "{}", warning.message);
        }
        Ok(Self {
            format,
            fingerprint: generate_fingerprint(&normalized.model),
            model: normalized.model,
            warnings: normalized.warnings,
        })
    }

    /// Reads a document from disk. Without an explicit format it is detected
    /// from the file extension and content.
    pub fn from_file(path: &Path, format: Option<ContractFormat>) -> Result<Self, ContractError> {
        let bytes = std::fs::read(path).map_err(|source| ContractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let format = format.unwrap_or_else(|| ContractFormat::detect(Some(path), &bytes));
        Self::load(&bytes, format)
    }

    /// Compares this contract (the old version) with `new` using the default
    /// configuration.
    pub fn compare_with(&self, new: &Contract) -> DiffReport {
        self.compare_with_config(new, &DiffConfig::default())
    }

    pub fn compare_with_config(&self, new: &Contract, config: &DiffConfig) -> DiffReport {
        let warnings = tagged(&self.warnings, Side::Old).chain(tagged(&new.warnings, Side::New));

        // Identical fingerprints mean identical models.
        if self.fingerprint == new.fingerprint {
            tracing::debug!(fingerprint = %self.fingerprint, "contracts are identical");
            return DiffReport::empty().with_warnings(warnings);
        }

        DiffEngine::new()
            .compare(&self.model, &new.model, config)
            .with_warnings(warnings)
    }
}

fn tagged(warnings: &[Warning], side: Side) -> impl Iterator<Item = Warning> + '_ {
    warnings.iter().map(move |w| Warning {
        side: Some(side),
        ..w.clone()
    })
}

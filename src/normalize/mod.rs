//! Converts a resolved document into the canonical [`ContractModel`].
//!
//! Normalization never fails: constructs it cannot interpret become
//! [`Warning`]s and the rest of the document is still processed.

pub mod collection;
pub mod openapi;
pub mod schema;

use crate::canonical::ContractModel;
use crate::error::Warning;
use crate::loader::ContractFormat;
use crate::resolve::ResolvedDocument;

/// A normalized document together with everything it warned about.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub model: ContractModel,
    pub warnings: Vec<Warning>,
}

pub fn normalize(doc: &ResolvedDocument, format: ContractFormat) -> Normalized {
    let mut warnings = Vec::new();
    let model = match format {
        ContractFormat::OpenApiJson | ContractFormat::OpenApiYaml => {
            openapi::normalize_openapi(doc, &mut warnings)
        }
        ContractFormat::Collection => collection::normalize_collection(&doc.root, &mut warnings),
    };
    warnings.sort();
    warnings.dedup();
    tracing::debug!(
        format = %format,
        endpoints = model.endpoints.len(),
        schemas = model.schemas.len(),
        warnings = warnings.len(),
        "normalized document"
    );
    Normalized { model, warnings }
}

pub mod canonical;
pub mod compat;
pub mod contract;
pub mod error;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod raw;
pub mod resolve;
pub mod source;

pub use compat::{DiffConfig, DiffReport, OutputMode, Severity, Verdict};
pub use contract::Contract;
pub use error::{ContractError, DiffError, Side, Warning};
pub use loader::ContractFormat;

use canonical::ContractModel;
use sha2::{Digest, Sha256};

/// Generates a semantic fingerprint for a normalized contract.
///
/// The fingerprint is a SHA-256 hash of the model's canonical JSON form, so it
/// is insensitive to formatting, key order, path variable names and anything
/// else normalization erases.
///
/// # Returns
///
/// The hex-encoded SHA-256 fingerprint string.
pub fn generate_fingerprint(model: &ContractModel) -> String {
    let json_string = serde_json::to_string(model).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(json_string.as_bytes());
    let hash_result = hasher.finalize();

    format!("{:x}", hash_result)
}

/// Compares two raw documents. `old` is the baseline.
///
/// Fails if either side cannot be parsed or resolved; no partial report is
/// produced in that case.
pub fn compare(
    old: &[u8],
    old_format: ContractFormat,
    new: &[u8],
    new_format: ContractFormat,
    config: &DiffConfig,
) -> Result<DiffReport, DiffError> {
    let old = Contract::load(old, old_format).map_err(|source| DiffError::Load {
        side: Side::Old,
        source,
    })?;
    let new = Contract::load(new, new_format).map_err(|source| DiffError::Load {
        side: Side::New,
        source,
    })?;
    Ok(old.compare_with_config(&new, config))
}

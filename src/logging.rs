//! Logging initialization
//!
//! Logs always go to stderr so report output on stdout stays machine-readable.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Warnings only, human-readable
    Quiet,
    /// Debug output for this crate, human-readable
    Verbose,
    /// JSON structured output at info level
    Json,
}

static INIT_ONCE: Once = Once::new();

/// Installs the global tracing subscriber. Only the first call has an effect.
/// `RUST_LOG` takes precedence over the profile's default filter.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let default_filter = match profile {
            Profile::Quiet => "contract_diff=warn",
            Profile::Verbose => "contract_diff=debug",
            Profile::Json => "contract_diff=info",
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        // Another subscriber may already be installed by an embedding program.
        let _ = match profile {
            Profile::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish()
                .try_init(),
            Profile::Quiet | Profile::Verbose => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .finish()
                .try_init(),
        };
    });
}

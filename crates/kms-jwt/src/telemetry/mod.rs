//! Tracing subscriber setup for binaries embedding the token service.
//!
//! The library emits `tracing` events. [`crate::TokenService::from_env`] calls
//! [`init`] with the configured level; hosts with their own subscriber keep it.
//!
//! # Telemetry invariants
//!
//! - Token text, claims, plaintext and ciphertext never appear in any log field.
//! - Log level is configurable via `JWT_KMS_LOG_LEVEL` (default: `info`);
//!   `RUST_LOG` takes precedence when set.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install a JSON fmt subscriber at `log_level`.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_subscriber_is_installed_once() {
        // Whether this call or an earlier one installed the global
        // subscriber, one is set afterwards and later installs must fail.
        let _ = init("debug");
        assert!(tracing::dispatcher::has_been_set());
        assert!(init("info").is_err());
    }
}

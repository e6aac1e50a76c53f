//! [`TokenService`]: issues and verifies KMS-authenticated tokens.
//!
//! # Sign path
//!
//! 1. Stamp `iat` (and `exp` when requested) onto an owned copy of the claims.
//! 2. Encode header and claims as URL-safe base64 JSON segments.
//! 3. Encrypt `<header>.<claims>` under the caller's key; the ciphertext,
//!    base64-encoded, becomes the third segment.
//!
//! # Verify path
//!
//! Split, decode, resolve the encryption context, check `iat` / `exp`,
//! decrypt the third segment, and compare the plaintext against the raw
//! `<header>.<claims>` text. Structural and temporal failures surface as
//! `Invalid token`; everything from decryption onward as `Signature invalid`.
//!
//! Each call's only suspension point is the capability round trip. The
//! service holds no per-call state and may be cloned freely across tasks.

mod sign;
mod verify;

pub use sign::IssuedToken;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::capability::{EncryptionCapability, KmsCapability};
use crate::config::ServiceConfig;
use crate::telemetry;

/// Issues and verifies tokens through an injected [`EncryptionCapability`].
#[derive(Clone)]
pub struct TokenService {
    capability: Arc<dyn EncryptionCapability>,
}

impl TokenService {
    /// Create a service over a shared capability.
    pub fn new(capability: Arc<dyn EncryptionCapability>) -> Self {
        Self { capability }
    }

    /// Create a service that owns `capability`.
    pub fn from_capability<C>(capability: C) -> Self
    where
        C: EncryptionCapability + 'static,
    {
        Self::new(Arc::new(capability))
    }

    /// Create a service backed by AWS KMS in the configured region.
    ///
    /// # Errors
    ///
    /// Returns an error if `cfg` fails validation.
    pub async fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        cfg.validate().context("invalid token service configuration")?;
        Ok(Self::from_capability(KmsCapability::from_config(cfg).await))
    }

    /// Load [`ServiceConfig`] from the environment and build a KMS-backed service.
    ///
    /// Installs the JSON log subscriber at `log_level` unless the host process
    /// already set one.
    pub async fn from_env() -> Result<Self> {
        let cfg = ServiceConfig::from_env()?;
        if telemetry::init(&cfg.log_level).is_err() {
            debug!("tracing subscriber already installed; keeping it");
        }
        info!(region = %cfg.region, "token service starting");
        Self::from_config(&cfg).await
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Epoch helpers
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch; negative before it.
fn epoch_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}

/// Whole epoch seconds, rounded down.
fn floor_secs(t: SystemTime) -> i64 {
    epoch_millis(t).div_euclid(1000)
}

/// Whole epoch seconds, rounded up at millisecond precision.
fn ceil_secs(t: SystemTime) -> i64 {
    let ms = epoch_millis(t);
    ms.div_euclid(1000) + i64::from(ms.rem_euclid(1000) != 0)
}

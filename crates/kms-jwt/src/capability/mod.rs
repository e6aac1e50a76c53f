//! The encryption capability the token service delegates authentication to.
//!
//! Production tokens are sealed by AWS KMS ([`KmsCapability`]). The
//! [`LocalKeyring`] stand-in reproduces KMS's encryption-context binding
//! in-process so the full sign/verify path can run without network access.
//!
//! # Encryption context
//!
//! A decrypt call must present exactly the context the ciphertext was
//! produced under. Signing never attaches one, so verification succeeds only
//! when no context value is resolved from the options or the header.

pub mod keyring;
pub mod kms;

pub use keyring::LocalKeyring;
pub use kms::KmsCapability;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use common::CapabilityError;

/// Non-secret key/value pairs bound to a ciphertext.
pub type EncryptionContext = BTreeMap<String, String>;

/// Envelope-encryption service used as the token's authentication primitive.
///
/// Implementations must be safe to call concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncryptionCapability: Send + Sync {
    /// Encrypt `plaintext` under the key named by `key_id`.
    async fn encrypt(&self, plaintext: Bytes, key_id: &str) -> Result<Bytes, CapabilityError>;

    /// Decrypt `ciphertext`, presenting `context`.
    async fn decrypt(
        &self,
        ciphertext: Bytes,
        context: &EncryptionContext,
    ) -> Result<Bytes, CapabilityError>;
}

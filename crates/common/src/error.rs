//! Common error types shared across crates.

use thiserror::Error;

/// Failure classes surfaced by token verification.
///
/// Deliberately coarse: callers (and attackers) learn only whether the token
/// was unusable or whether its authentication tag did not check out.
/// - [`VerifyError::MalformedToken`] → wrong shape, undecodable segments,
///   `iat` outside the skew window, or `exp` in the past.
/// - [`VerifyError::SignatureInvalid`] → decryption failed or the decrypted
///   plaintext did not match the header and claims segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("Invalid token")]
    MalformedToken,

    #[error("Signature invalid")]
    SignatureInvalid,
}

/// Errors raised by an encryption capability (KMS or a local stand-in).
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The remote key-management service rejected or failed the call.
    #[error("kms request failed: {0}")]
    Kms(String),

    /// The requested key identifier is not known to the capability.
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// The ciphertext blob could not be parsed.
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    /// Sealing the plaintext failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Authenticated decryption failed (wrong key, wrong context, or tampered data).
    #[error("decryption failed")]
    DecryptionFailed,

    /// The service answered without the expected payload field.
    #[error("kms response missing {0}")]
    MissingField(&'static str),
}

/// Errors raised while issuing a token.
///
/// Capability failures are passed through untouched; only the verifier
/// normalises errors.
#[derive(Debug, Error)]
pub enum SignError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Header or claims could not be serialised.
    #[error("failed to encode token segment: {0}")]
    Encode(#[from] serde_json::Error),
}

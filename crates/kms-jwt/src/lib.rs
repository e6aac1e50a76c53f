//! `kms-jwt` — JWT-shaped tokens whose authentication tag is produced by AWS KMS.
//!
//! Instead of a local signature, the tag is a KMS ciphertext over the encoded
//! header and claims. Verification decrypts it and compares the plaintext with
//! the token's own `<header>.<claims>` text.
//!
//! ```ignore
//! use kms_jwt::{Claims, SignOptions, TokenService, VerifyOptions};
//!
//! let svc = TokenService::from_env().await?;
//! let mut claims = Claims::new();
//! claims.insert("sub", "user-123");
//!
//! let expires = std::time::SystemTime::now() + std::time::Duration::from_secs(300);
//! let token = svc
//!     .sign_with(claims, &SignOptions::default().expires(expires), "alias/tokens")
//!     .await?;
//! let claims = svc.verify_with(&token, &VerifyOptions::default()).await?;
//! ```

pub mod capability;
pub mod codec;
pub mod config;
pub mod service;
pub mod telemetry;

pub use capability::{EncryptionCapability, EncryptionContext, KmsCapability, LocalKeyring};
pub use common::{
    CapabilityError, Claims, Header, SignError, SignOptions, VerifyError, VerifyOptions,
};
pub use config::ServiceConfig;
pub use service::{IssuedToken, TokenService};

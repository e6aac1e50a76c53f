//! Common types, option structs, and errors shared across `kms-jwt` crates.

pub mod error;
pub mod protocol;

pub use error::{CapabilityError, SignError, VerifyError};
pub use protocol::{Claims, Header, SignOptions, VerifyOptions};

//! Token data model: header, claims, and the options accepted by sign/verify.
//!
//! Header and claims are serialised as JSON inside the first two token
//! segments; see `kms_jwt::codec` for the wire transformation.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `alg` value naming the KMS-backed scheme.
pub const ALG_KMS: &str = "KMS";

/// `typ` value carried by every issued token.
pub const TYP_JWT: &str = "JWT";

/// Key under which the context value is placed in the KMS encryption context.
pub const ENCRYPTION_CONTEXT_KEY: &str = "EncryptionContextKey";

/// Default clock-skew tolerance applied to `iat` during verification.
pub const DEFAULT_EXPIRY_TIME_SECS: u64 = 600;

/// Reserved claim: issued-at, epoch seconds.
pub const CLAIM_IAT: &str = "iat";

/// Reserved claim: expiry, epoch seconds.
pub const CLAIM_EXP: &str = "exp";

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Token header.
///
/// `alg` and `typ` accept any JSON value (or none) on decode; only `kid` is
/// consulted, as the fallback encryption-context value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    /// The header written by the signer: `{"alg":"KMS","typ":"JWT"}`.
    pub fn kms() -> Self {
        Self {
            alg: Some(Value::from(ALG_KMS)),
            typ: Some(Value::from(TYP_JWT)),
            kid: None,
        }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::kms()
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Caller-defined claims object plus the reserved `iat` / `exp` fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// `iat`, if present and not `null`.
    pub fn iat(&self) -> Option<&Value> {
        self.reserved(CLAIM_IAT)
    }

    /// `exp`, if present and not `null`.
    pub fn exp(&self) -> Option<&Value> {
        self.reserved(CLAIM_EXP)
    }

    pub fn set_iat(&mut self, secs: i64) {
        self.0.insert(CLAIM_IAT.into(), Value::from(secs));
    }

    pub fn set_exp(&mut self, secs: i64) {
        self.0.insert(CLAIM_EXP.into(), Value::from(secs));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn reserved(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Claims> for Map<String, Value> {
    fn from(claims: Claims) -> Self {
        claims.0
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for issuing a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOptions {
    /// Overrides the automatic `iat` stamp.
    pub issued_at: Option<SystemTime>,
    /// Sets `exp`; tokens without it never expire through this mechanism.
    pub expires: Option<SystemTime>,
}

impl SignOptions {
    pub fn issued_at(mut self, at: SystemTime) -> Self {
        self.issued_at = Some(at);
        self
    }

    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }
}

/// Options for verifying a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Encryption-context value; overrides the header's `kid`.
    pub arn: Option<String>,
    /// How far in the future a token's `iat` may lie.
    pub expiry_time: Duration,
}

impl VerifyOptions {
    pub fn arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn expiry_time(mut self, tolerance: Duration) -> Self {
        self.expiry_time = tolerance;
        self
    }
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            arn: None,
            expiry_time: Duration::from_secs(DEFAULT_EXPIRY_TIME_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kms_header_serialises_without_kid() {
        let json = serde_json::to_string(&Header::kms()).unwrap();
        assert_eq!(json, r#"{"alg":"KMS","typ":"JWT"}"#);
    }

    #[test]
    fn header_decodes_kid() {
        let h: Header =
            serde_json::from_str(r#"{"alg":"KMS","typ":"JWT","kid":"alias/tokens"}"#).unwrap();
        assert_eq!(h.kid.as_deref(), Some("alias/tokens"));
    }

    #[test]
    fn header_ignores_alg_and_typ_shapes() {
        let h: Header = serde_json::from_str(r#"{"alg":5,"typ":null,"kid":"k"}"#).unwrap();
        assert_eq!(h.alg, Some(json!(5)));
        assert_eq!(h.kid.as_deref(), Some("k"));

        let bare: Header = serde_json::from_str("{}").unwrap();
        assert!(bare.alg.is_none());
        assert!(bare.kid.is_none());
    }

    #[test]
    fn header_rejects_non_object() {
        assert!(serde_json::from_str::<Header>("42").is_err());
    }

    #[test]
    fn null_reserved_claims_count_as_absent() {
        let claims: Claims = serde_json::from_value(json!({"iat": null, "foo": "bar"})).unwrap();
        assert!(claims.iat().is_none());
        assert!(claims.exp().is_none());
        assert_eq!(claims.get("foo"), Some(&json!("bar")));
    }

    #[test]
    fn claims_reject_non_object() {
        assert!(serde_json::from_value::<Claims>(json!(["a", "b"])).is_err());
    }

    #[test]
    fn verify_options_default_tolerance() {
        let opts = VerifyOptions::default();
        assert_eq!(opts.expiry_time, Duration::from_secs(600));
        assert!(opts.arn.is_none());
    }
}

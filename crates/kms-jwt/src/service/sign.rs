//! Token issuance.

use std::time::SystemTime;

use bytes::Bytes;
use common::{Claims, Header, SignError, SignOptions};
use tracing::{debug, warn};

use super::{ceil_secs, floor_secs, TokenService};
use crate::codec::{encode_segment, encode_tag, join, SEPARATOR};

/// A freshly issued token together with the claims it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    /// Wire form: `<header>.<claims>.<tag>`.
    pub token: String,
    /// The caller's claims with `iat` / `exp` applied.
    pub claims: Claims,
}

impl TokenService {
    /// Issue a token over `claims` with default options.
    ///
    /// # Errors
    ///
    /// Returns the capability's own error if encryption fails.
    pub async fn sign(&self, claims: Claims, key_id: &str) -> Result<String, SignError> {
        self.sign_with(claims, &SignOptions::default(), key_id).await
    }

    /// Issue a token over `claims`, honouring `options.issued_at` / `options.expires`.
    pub async fn sign_with(
        &self,
        claims: Claims,
        options: &SignOptions,
        key_id: &str,
    ) -> Result<String, SignError> {
        Ok(self.issue_with(claims, options, key_id).await?.token)
    }

    /// Like [`TokenService::sign_with`], also returning the stamped claims.
    pub async fn issue_with(
        &self,
        claims: Claims,
        options: &SignOptions,
        key_id: &str,
    ) -> Result<IssuedToken, SignError> {
        self.issue_at(claims, options, key_id, SystemTime::now())
            .await
    }

    pub(crate) async fn issue_at(
        &self,
        claims: Claims,
        options: &SignOptions,
        key_id: &str,
        now: SystemTime,
    ) -> Result<IssuedToken, SignError> {
        let claims = stamp_claims(claims, options, now);

        let header = encode_segment(&Header::kms())?;
        let payload = encode_segment(&claims)?;
        let signed = format!("{header}{SEPARATOR}{payload}");

        let ciphertext = self
            .capability
            .encrypt(Bytes::from(signed), key_id)
            .await
            .map_err(|e| {
                warn!(key_id, error = %e, "KMS encrypt failed");
                e
            })?;

        debug!(key_id, expires = claims.exp().is_some(), "token signed");
        Ok(IssuedToken {
            token: join(&header, &payload, &encode_tag(&ciphertext)),
            claims,
        })
    }
}

/// Apply `iat` / `exp` to `claims`.
///
/// `iat` precedence: explicit option (rounded up), then a caller-supplied
/// value, then `now` (rounded down). `exp` is set only when requested.
fn stamp_claims(mut claims: Claims, options: &SignOptions, now: SystemTime) -> Claims {
    if let Some(issued_at) = options.issued_at {
        claims.set_iat(ceil_secs(issued_at));
    } else if claims.iat().is_none() {
        claims.set_iat(floor_secs(now));
    }

    if let Some(expires) = options.expires {
        claims.set_exp(ceil_secs(expires));
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    use common::CapabilityError;
    use serde_json::json;

    use crate::capability::MockEncryptionCapability;
    use crate::codec::{decode_segment, split};

    fn at_millis(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn foo_bar() -> Claims {
        serde_json::from_value(json!({"foo": "bar"})).unwrap()
    }

    #[test]
    fn stamps_now_when_no_iat() {
        let claims = stamp_claims(foo_bar(), &SignOptions::default(), at_millis(1_000_999));
        assert_eq!(claims.iat(), Some(&json!(1_000)));
        assert!(claims.exp().is_none());
        assert_eq!(claims.get("foo"), Some(&json!("bar")));
    }

    #[test]
    fn keeps_caller_iat() {
        let mut claims = foo_bar();
        claims.set_iat(42);
        let claims = stamp_claims(claims, &SignOptions::default(), at_millis(1_000_000));
        assert_eq!(claims.iat(), Some(&json!(42)));
    }

    #[test]
    fn null_caller_iat_is_replaced() {
        let mut claims = foo_bar();
        claims.insert("iat", serde_json::Value::Null);
        let claims = stamp_claims(claims, &SignOptions::default(), at_millis(5_000));
        assert_eq!(claims.iat(), Some(&json!(5)));
    }

    #[test]
    fn explicit_issued_at_overrides_and_rounds_up() {
        let mut claims = foo_bar();
        claims.set_iat(42);
        let opts = SignOptions::default().issued_at(at_millis(10_001));
        let claims = stamp_claims(claims, &opts, at_millis(1_000_000));
        assert_eq!(claims.iat(), Some(&json!(11)));
    }

    #[test]
    fn expires_rounds_up() {
        let opts = SignOptions::default().expires(at_millis(20_500));
        let claims = stamp_claims(foo_bar(), &opts, at_millis(10_000));
        assert_eq!(claims.exp(), Some(&json!(21)));
        assert_eq!(claims.iat(), Some(&json!(10)));
    }

    #[tokio::test]
    async fn encrypts_raw_header_and_claims_segments() {
        let mut mock = MockEncryptionCapability::new();
        mock.expect_encrypt()
            .withf(|plaintext, key_id| {
                key_id == "alias/tokens"
                    && std::str::from_utf8(plaintext)
                        .map(|s| s.starts_with("eyJhbGciOiJLTVMiLCJ0eXAiOiJKV1QifQ."))
                        .unwrap_or(false)
            })
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(&[0xfb, 0xff])));

        let svc = TokenService::from_capability(mock);
        let issued = svc
            .issue_at(foo_bar(), &SignOptions::default(), "alias/tokens", at_millis(7_000))
            .await
            .unwrap();

        let segs = split(&issued.token).unwrap();
        assert_eq!(segs.tag, "+/8=");
        let claims: Claims = decode_segment(segs.claims).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.iat(), Some(&json!(7)));
    }

    #[tokio::test]
    async fn capability_error_propagates_unchanged() {
        let mut mock = MockEncryptionCapability::new();
        mock.expect_encrypt()
            .returning(|_, _| Err(CapabilityError::Kms("AccessDeniedException".into())));

        let svc = TokenService::from_capability(mock);
        let err = svc.sign(foo_bar(), "alias/tokens").await.unwrap_err();
        assert!(matches!(
            err,
            SignError::Capability(CapabilityError::Kms(ref m)) if m == "AccessDeniedException"
        ));
    }
}

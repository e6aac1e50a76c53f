//! Token verification.
//!
//! Guards run in order and the first failure ends the call. Nothing after the
//! lifetime checks may report `Invalid token`, and nothing before decryption
//! may report `Signature invalid`.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use common::protocol::ENCRYPTION_CONTEXT_KEY;
use common::{Claims, Header, VerifyError, VerifyOptions};
use tracing::debug;

use super::{epoch_millis, TokenService};
use crate::capability::EncryptionContext;
use crate::codec::{decode_segment, decode_tag, split};

impl TokenService {
    /// Verify `token` with default options (600 s `iat` tolerance, context from `kid`).
    ///
    /// # Errors
    ///
    /// [`VerifyError::MalformedToken`] for structural or temporal failures,
    /// [`VerifyError::SignatureInvalid`] when the tag does not authenticate.
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        self.verify_with(token, &VerifyOptions::default()).await
    }

    /// Verify `token`, returning its decoded claims.
    pub async fn verify_with(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<Claims, VerifyError> {
        self.verify_at(token, options, SystemTime::now()).await
    }

    pub(crate) async fn verify_at(
        &self,
        token: &str,
        options: &VerifyOptions,
        now: SystemTime,
    ) -> Result<Claims, VerifyError> {
        let segments = split(token).map_err(|_| rejected("split"))?;
        let header: Header = decode_segment(segments.header).map_err(|_| rejected("decode"))?;
        let claims: Claims = decode_segment(segments.claims).map_err(|_| rejected("decode"))?;

        let context_key = options.arn.as_deref().or(header.kid.as_deref());

        check_lifetime(&claims, options.expiry_time, epoch_millis(now))?;

        let ciphertext = decode_tag(segments.tag).map_err(|_| forged("tag"))?;
        let mut context = EncryptionContext::new();
        if let Some(value) = context_key {
            context.insert(ENCRYPTION_CONTEXT_KEY.to_owned(), value.to_owned());
        }

        let plaintext = self
            .capability
            .decrypt(Bytes::from(ciphertext), &context)
            .await
            .map_err(|e| {
                debug!(error = %e, "KMS decrypt rejected token");
                forged("decrypt")
            })?;

        if plaintext.as_ref() != segments.signed_part().as_bytes() {
            return Err(forged("compare"));
        }

        debug!(has_context = context_key.is_some(), "token verified");
        Ok(claims)
    }
}

/// Reject a token issued further in the future than `tolerance`, or one whose
/// `exp` has passed.
fn check_lifetime(claims: &Claims, tolerance: Duration, now_ms: i64) -> Result<(), VerifyError> {
    let now_ms = now_ms as f64;

    if let Some(iat) = claims.iat() {
        let iat = iat.as_f64().ok_or_else(|| rejected("iat"))?;
        let earliest_ms = (iat - tolerance.as_secs_f64()) * 1000.0;
        if earliest_ms >= now_ms {
            return Err(rejected("iat"));
        }
    }

    if let Some(exp) = claims.exp() {
        let exp = exp.as_f64().ok_or_else(|| rejected("exp"))?;
        if exp * 1000.0 < now_ms {
            return Err(rejected("exp"));
        }
    }
    Ok(())
}

fn rejected(stage: &'static str) -> VerifyError {
    debug!(stage, "token rejected");
    VerifyError::MalformedToken
}

fn forged(stage: &'static str) -> VerifyError {
    debug!(stage, "token signature rejected");
    VerifyError::SignatureInvalid
}

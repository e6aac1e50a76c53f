//! Token wire format: segment encoding, joining, and splitting.
//!
//! # Token format
//!
//! ```text
//! <base64url-no-pad(header json)>.<base64url-no-pad(claims json)>.<base64(kms ciphertext)>
//! ```
//!
//! Everything here is pure and synchronous. The authenticated bytes are the
//! first two segments exactly as they appear in the token, so verification
//! never re-encodes decoded values.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Separator between token segments.
pub const SEPARATOR: char = '.';

/// URL-safe alphabet; writes no padding, tolerates it on read.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Standard alphabet for the ciphertext tag; writes padding, tolerates its absence.
const TAG_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors produced by the codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The token does not consist of exactly three non-empty segments.
    #[error("Invalid token")]
    MalformedToken,

    /// A segment is not valid base64 for its alphabet.
    #[error("segment is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    /// A segment decoded to bytes that are not the expected JSON shape.
    #[error("segment is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// The three segments of a token, borrowed from the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments<'a> {
    token: &'a str,
    pub header: &'a str,
    pub claims: &'a str,
    pub tag: &'a str,
}

impl<'a> Segments<'a> {
    /// `<header>.<claims>` exactly as it appears in the token; the bytes the
    /// authentication tag was produced over.
    pub fn signed_part(&self) -> &'a str {
        &self.token[..self.header.len() + 1 + self.claims.len()]
    }
}

/// Serialise `value` to JSON and apply URL-safe, unpadded base64.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(SEGMENT_ENGINE.encode(json))
}

/// Inverse of [`encode_segment`].
///
/// # Errors
///
/// Returns [`CodecError::InvalidBase64`] or [`CodecError::InvalidJson`].
pub fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, CodecError> {
    let bytes = SEGMENT_ENGINE.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Represent a KMS ciphertext blob as the token's third segment.
pub fn encode_tag(ciphertext: &[u8]) -> String {
    TAG_ENGINE.encode(ciphertext)
}

/// Recover the ciphertext blob from the token's third segment.
pub fn decode_tag(tag: &str) -> Result<Vec<u8>, CodecError> {
    Ok(TAG_ENGINE.decode(tag)?)
}

/// Join three encoded segments into a token string.
pub fn join(header: &str, claims: &str, tag: &str) -> String {
    let mut token = String::with_capacity(header.len() + claims.len() + tag.len() + 2);
    token.push_str(header);
    token.push(SEPARATOR);
    token.push_str(claims);
    token.push(SEPARATOR);
    token.push_str(tag);
    token
}

/// Split a token into its three segments.
///
/// # Errors
///
/// Returns [`CodecError::MalformedToken`] unless splitting on `.` yields
/// exactly three non-empty segments.
pub fn split(token: &str) -> Result<Segments<'_>, CodecError> {
    let mut parts = token.split(SEPARATOR);
    let (Some(header), Some(claims), Some(tag), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CodecError::MalformedToken);
    };
    if header.is_empty() || claims.is_empty() || tag.is_empty() {
        return Err(CodecError::MalformedToken);
    }
    Ok(Segments {
        token,
        header,
        claims,
        tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Claims, Header};
    use serde_json::json;

    #[test]
    fn header_segment_matches_known_encoding() {
        let seg = encode_segment(&Header::kms()).unwrap();
        assert_eq!(seg, "eyJhbGciOiJLTVMiLCJ0eXAiOiJKV1QifQ");
    }

    #[test]
    fn segment_has_no_padding_or_unsafe_chars() {
        let claims: Claims = serde_json::from_value(json!({"k": "??>>"})).unwrap();
        let seg = encode_segment(&claims).unwrap();
        assert!(!seg.contains('='));
        assert!(!seg.contains('+'));
        assert!(!seg.contains('/'));
        let back: Claims = decode_segment(&seg).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn decode_accepts_padded_segment() {
        // base64url("{}") with padding
        let claims: Claims = decode_segment("e30=").unwrap();
        assert!(claims.as_map().is_empty());
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert!(matches!(
            decode_segment::<Claims>("!!!"),
            Err(CodecError::InvalidBase64(_))
        ));
    }

    #[test]
    fn decode_rejects_non_json() {
        let seg = SEGMENT_ENGINE.encode(b"not json");
        assert!(matches!(
            decode_segment::<Claims>(&seg),
            Err(CodecError::InvalidJson(_))
        ));
    }

    #[test]
    fn split_three_segments() {
        let segs = split("aaa.bbb.ccc").unwrap();
        assert_eq!(segs.header, "aaa");
        assert_eq!(segs.claims, "bbb");
        assert_eq!(segs.tag, "ccc");
        assert_eq!(segs.signed_part(), "aaa.bbb");
    }

    #[test]
    fn split_rejects_wrong_segment_count() {
        assert!(split("not-a-token").is_err());
        assert!(split("a.b").is_err());
        assert!(split("a.b.c.d").is_err());
    }

    #[test]
    fn split_rejects_empty_segment() {
        assert!(split("a..c").is_err());
        assert!(split(".b.c").is_err());
        assert!(split("a.b.").is_err());
    }

    #[test]
    fn join_then_split() {
        let token = join("h", "c", "t");
        assert_eq!(token, "h.c.t");
        assert_eq!(split(&token).unwrap().signed_part(), "h.c");
    }

    #[test]
    fn tag_uses_standard_alphabet_with_padding() {
        let tag = encode_tag(&[0xfb, 0xff]);
        assert_eq!(tag, "+/8=");
        assert_eq!(decode_tag(&tag).unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_tag("+/8").unwrap(), vec![0xfb, 0xff]);
    }
}

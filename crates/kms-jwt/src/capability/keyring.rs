//! [`LocalKeyring`]: in-process stand-in for KMS, built on AES-256-GCM-SIV.
//!
//! Mirrors the KMS properties the token protocol relies on:
//! - the ciphertext blob names the key it was sealed with, so decrypt needs no key id;
//! - the encryption context is authenticated (bound as associated data), so a
//!   decrypt presenting a different context fails.
//!
//! # Ciphertext format
//!
//! ```text
//! 0x01 | u16-be key id length | key id | 12-byte nonce | ciphertext+tag
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use common::CapabilityError;

use super::{EncryptionCapability, EncryptionContext};

/// Byte length of an AES-256 key.
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce.
pub const NONCE_LEN: usize = 12;

const BLOB_VERSION: u8 = 0x01;

/// Key material, zeroed on drop and never printed.
struct KeyBytes(Box<[u8; KEY_LEN]>);

impl Drop for KeyBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyBytes([REDACTED])")
    }
}

/// Named AES-256 keys held in memory.
///
/// Cheap to clone; clones share the same key set.
#[derive(Clone, Debug, Default)]
pub struct LocalKeyring {
    keys: Arc<HashMap<String, KeyBytes>>,
}

impl LocalKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a key under `key_id`.
    pub fn with_key(self, key_id: impl Into<String>, key: [u8; KEY_LEN]) -> Self {
        let mut keys = Arc::try_unwrap(self.keys).unwrap_or_else(|shared| {
            shared
                .iter()
                .map(|(id, k)| (id.clone(), KeyBytes(k.0.clone())))
                .collect()
        });
        keys.insert(key_id.into(), KeyBytes(Box::new(key)));
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Add a key generated from the OS CSPRNG.
    pub fn with_generated_key(self, key_id: impl Into<String>) -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        self.with_key(key_id, key)
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    fn cipher(&self, key_id: &str) -> Result<Aes256GcmSiv, CapabilityError> {
        let key = self
            .keys
            .get(key_id)
            .ok_or_else(|| CapabilityError::UnknownKey(key_id.to_owned()))?;
        Aes256GcmSiv::new_from_slice(&key.0[..])
            .map_err(|_| CapabilityError::UnknownKey(key_id.to_owned()))
    }
}

fn context_aad(context: &EncryptionContext) -> Vec<u8> {
    // BTreeMap keeps the serialised form independent of insertion order.
    serde_json::to_vec(context).unwrap_or_default()
}

/// Parsed view of a keyring ciphertext blob.
struct Sealed<'a> {
    key_id: &'a str,
    nonce: &'a [u8],
    ciphertext: &'a [u8],
}

fn parse_blob(blob: &[u8]) -> Result<Sealed<'_>, CapabilityError> {
    let (&version, rest) = blob
        .split_first()
        .ok_or(CapabilityError::MalformedCiphertext)?;
    if version != BLOB_VERSION || rest.len() < 2 {
        return Err(CapabilityError::MalformedCiphertext);
    }
    let id_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
    let rest = &rest[2..];
    if rest.len() < id_len + NONCE_LEN {
        return Err(CapabilityError::MalformedCiphertext);
    }
    let (id, rest) = rest.split_at(id_len);
    let key_id = std::str::from_utf8(id).map_err(|_| CapabilityError::MalformedCiphertext)?;
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    Ok(Sealed {
        key_id,
        nonce,
        ciphertext,
    })
}

#[async_trait]
impl EncryptionCapability for LocalKeyring {
    async fn encrypt(&self, plaintext: Bytes, key_id: &str) -> Result<Bytes, CapabilityError> {
        let cipher = self.cipher(key_id)?;
        let id_len =
            u16::try_from(key_id.len()).map_err(|_| CapabilityError::UnknownKey(key_id.to_owned()))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let aad = context_aad(&EncryptionContext::new());
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext[..],
                    aad: &aad,
                },
            )
            .map_err(|_| CapabilityError::EncryptionFailed)?;

        let mut blob = BytesMut::with_capacity(3 + key_id.len() + NONCE_LEN + sealed.len());
        blob.put_u8(BLOB_VERSION);
        blob.put_u16(id_len);
        blob.put_slice(key_id.as_bytes());
        blob.put_slice(&nonce);
        blob.put_slice(&sealed);
        Ok(blob.freeze())
    }

    async fn decrypt(
        &self,
        ciphertext: Bytes,
        context: &EncryptionContext,
    ) -> Result<Bytes, CapabilityError> {
        let sealed = parse_blob(&ciphertext)?;
        let cipher = self.cipher(sealed.key_id)?;
        let aad = context_aad(context);
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(sealed.nonce),
                Payload {
                    msg: sealed.ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| CapabilityError::DecryptionFailed)?;
        Ok(Bytes::from(plaintext))
    }
}

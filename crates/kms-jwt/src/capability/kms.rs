//! [`KmsCapability`]: the AWS KMS-backed encryption capability.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kms::{config::Region, primitives::Blob};
use aws_smithy_types::error::display::DisplayErrorContext;
use bytes::Bytes;
use common::CapabilityError;
use tracing::debug;

use super::{EncryptionCapability, EncryptionContext};
use crate::config::ServiceConfig;

/// Encryption capability backed by the AWS KMS `Encrypt` / `Decrypt` APIs.
#[derive(Clone, Debug)]
pub struct KmsCapability {
    client: aws_sdk_kms::Client,
}

impl KmsCapability {
    /// Wrap an already-configured KMS client.
    pub fn new(client: aws_sdk_kms::Client) -> Self {
        Self { client }
    }

    /// Build a KMS client for the configured region.
    ///
    /// Credentials are resolved via the standard AWS credential chain. When
    /// `kms_endpoint_url` is set, every call is sent there instead of the
    /// regional endpoint (LocalStack, VPC endpoints).
    pub async fn from_config(cfg: &ServiceConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_kms::config::Builder::from(&sdk_config);
        if let Some(url) = &cfg.kms_endpoint_url {
            builder = builder.endpoint_url(url);
        }
        debug!(region = %cfg.region, custom_endpoint = cfg.kms_endpoint_url.is_some(), "KMS client configured");

        Self::new(aws_sdk_kms::Client::from_conf(builder.build()))
    }

    /// The underlying SDK client.
    pub fn client(&self) -> &aws_sdk_kms::Client {
        &self.client
    }
}

#[async_trait]
impl EncryptionCapability for KmsCapability {
    async fn encrypt(&self, plaintext: Bytes, key_id: &str) -> Result<Bytes, CapabilityError> {
        let resp = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(Blob::new(plaintext.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;

        let blob = resp
            .ciphertext_blob()
            .ok_or(CapabilityError::MissingField("CiphertextBlob"))?;
        Ok(Bytes::copy_from_slice(blob.as_ref()))
    }

    async fn decrypt(
        &self,
        ciphertext: Bytes,
        context: &EncryptionContext,
    ) -> Result<Bytes, CapabilityError> {
        let mut req = self
            .client
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext.to_vec()));
        for (key, value) in context {
            req = req.encryption_context(key, value);
        }

        let resp = req.send().await.map_err(sdk_error)?;
        let plaintext = resp
            .plaintext()
            .ok_or(CapabilityError::MissingField("Plaintext"))?;
        Ok(Bytes::copy_from_slice(plaintext.as_ref()))
    }
}

fn sdk_error<E>(err: E) -> CapabilityError
where
    E: std::error::Error + 'static,
{
    CapabilityError::Kms(DisplayErrorContext(err).to_string())
}

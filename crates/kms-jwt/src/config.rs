//! Configuration loading and validation for the token service.
//!
//! Values are read from `JWT_KMS_`-prefixed environment variables, e.g.
//! `JWT_KMS_REGION=eu-west-1`. Every field has a default, so an empty
//! environment yields a usable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "JWT_KMS";

/// Validated token service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// AWS region of the KMS keys.
    #[serde(default = "default_region")]
    pub region: String,

    /// Overrides the regional KMS endpoint (LocalStack, VPC endpoints).
    #[serde(default)]
    pub kms_endpoint_url: Option<String>,

    /// Tracing log level used by [`crate::telemetry::init`].
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_region() -> String {
    "us-east-1".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            kms_endpoint_url: None,
            log_level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("failed to build configuration from environment")?;

        let c: ServiceConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Use `region` instead of the default.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.region, "JWT_KMS_REGION")?;
        if let Some(url) = &self.kms_endpoint_url {
            ensure_non_empty(url, "JWT_KMS_KMS_ENDPOINT_URL")?;
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.region, "us-east-1");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.kms_endpoint_url.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_region() {
        let cfg = ServiceConfig::default().with_region("  ");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_endpoint() {
        let cfg = ServiceConfig {
            kms_endpoint_url: Some(String::new()),
            ..ServiceConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserialises_with_defaults() {
        let cfg: ServiceConfig = config::Config::builder()
            .set_override("region", "ap-southeast-2")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.region, "ap-southeast-2");
        assert_eq!(cfg.log_level, "info");
    }
}

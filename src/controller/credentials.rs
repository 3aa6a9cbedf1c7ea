//! Backup storage credential checks

use k8s_openapi::api::core::v1::Secret;

use super::roles::secret_value;
use crate::config::OperatorConfig;
use crate::crd::StorageProvider;
use crate::error::{Error, Result};

/// Check that `secret` carries every key the provider needs
pub fn validate_storage_secret(
    secret: &Secret,
    provider: StorageProvider,
    config: &OperatorConfig,
) -> Result<()> {
    let missing: Vec<&str> = config
        .required_credentials(provider)
        .iter()
        .filter(|key| {
            secret_value(secret, key)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        })
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::CredentialsError(format!(
            "storage credentials for {} are missing keys: {}",
            provider,
            missing.join(", ")
        )))
    }
}

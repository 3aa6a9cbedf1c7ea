//! Operator configuration
//!
//! [`OperatorConfig`] is built once at startup from built-in defaults, an
//! optional YAML file and command line overrides, then shared read-only by
//! both reconcilers.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::crd::StorageProvider;
use crate::error::{Error, Result};

/// Ports the sidecars listen on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidecarPorts {
    pub prober: u16,
    pub cql: u16,
    pub reaper: u16,
    pub icarus: u16,
}

impl Default for SidecarPorts {
    fn default() -> Self {
        Self {
            prober: 8888,
            cql: 9042,
            reaper: 8080,
            icarus: 4567,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Delay before retrying a pass that is waiting on a dependency
    pub retry_delay: Duration,
    /// Interval between passes over a converged cluster
    pub resync_period: Duration,
    /// Timeout applied to every sidecar request
    pub request_timeout: Duration,
    /// Concurrent reconciliations per controller
    pub workers: u16,
    pub ports: SidecarPorts,
    /// Provider -> keys that must be present in a backup credentials secret
    pub storage_credentials: BTreeMap<StorageProvider, Vec<String>>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn default_storage_credentials() -> BTreeMap<StorageProvider, Vec<String>> {
    let aws = ["awsaccesskeyid", "awssecretaccesskey", "awsregion"];
    let aws_compatible = ["awsaccesskeyid", "awssecretaccesskey"];
    BTreeMap::from([
        (StorageProvider::S3, keys(&aws)),
        (StorageProvider::Oracle, keys(&aws)),
        (StorageProvider::Minio, keys(&aws_compatible)),
        (StorageProvider::Ceph, keys(&aws_compatible)),
        (StorageProvider::Gcp, keys(&["gcp"])),
        (
            StorageProvider::Azure,
            keys(&["azurestorageaccount", "azurestoragekey"]),
        ),
    ])
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            retry_delay: Duration::from_secs(10),
            resync_period: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            workers: 4,
            ports: SidecarPorts::default(),
            storage_credentials: default_storage_credentials(),
        }
    }
}

/// On-disk YAML representation; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub namespace: Option<String>,
    pub retry_delay_seconds: Option<u64>,
    pub resync_period_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub workers: Option<u16>,
    #[serde(default)]
    pub ports: PortsFile,
    /// Replaces the defaults per provider
    #[serde(default)]
    pub storage_credentials: BTreeMap<StorageProvider, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PortsFile {
    pub prober: Option<u16>,
    pub cql: Option<u16>,
    pub reaper: Option<u16>,
    pub icarus: Option<u16>,
}

/// Command line / environment overrides, highest precedence
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub namespace: Option<String>,
    pub retry_delay_seconds: Option<u64>,
    pub resync_period_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub workers: Option<u16>,
}

impl OperatorConfig {
    /// Defaults, then the YAML file at `path` if given, then `overrides`
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
            })?;
            config.apply_file(Self::parse_yaml(&raw)?);
        }
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn parse_yaml(raw: &str) -> Result<ConfigFile> {
        if raw.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        serde_yaml::from_str(raw).map_err(|e| Error::ConfigError(e.to_string()))
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if file.namespace.is_some() {
            self.namespace = file.namespace;
        }
        if let Some(secs) = file.retry_delay_seconds {
            self.retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.resync_period_seconds {
            self.resync_period = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_seconds {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        let ports = file.ports;
        self.ports.prober = ports.prober.unwrap_or(self.ports.prober);
        self.ports.cql = ports.cql.unwrap_or(self.ports.cql);
        self.ports.reaper = ports.reaper.unwrap_or(self.ports.reaper);
        self.ports.icarus = ports.icarus.unwrap_or(self.ports.icarus);
        self.storage_credentials.extend(file.storage_credentials);
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if overrides.namespace.is_some() {
            self.namespace = overrides.namespace.clone();
        }
        if let Some(secs) = overrides.retry_delay_seconds {
            self.retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.resync_period_seconds {
            self.resync_period = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.request_timeout_seconds {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::ConfigError("workers must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::ConfigError(
                "requestTimeoutSeconds must be at least 1".to_string(),
            ));
        }
        if self.retry_delay.is_zero() {
            return Err(Error::ConfigError(
                "retryDelaySeconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Keys a credentials secret must carry for `provider`
    pub fn required_credentials(&self, provider: StorageProvider) -> &[String] {
        self.storage_credentials
            .get(&provider)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::load(None, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.resync_period, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.workers, 4);
        assert_eq!(config.ports, SidecarPorts::default());
        assert_eq!(
            config.required_credentials(StorageProvider::Gcp),
            &["gcp".to_string()]
        );
        assert_eq!(config.required_credentials(StorageProvider::Minio).len(), 2);
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "retryDelaySeconds: 3\nworkers: 8\nports:\n  prober: 9999\nstorageCredentials:\n  s3: [key, secret]"
        )
        .unwrap();

        let config = OperatorConfig::load(Some(file.path()), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert_eq!(config.workers, 8);
        assert_eq!(config.ports.prober, 9999);
        assert_eq!(config.ports.cql, 9042);
        assert_eq!(
            config.required_credentials(StorageProvider::S3),
            &["key".to_string(), "secret".to_string()]
        );
        assert_eq!(config.required_credentials(StorageProvider::Oracle).len(), 3);
    }

    #[test]
    fn test_cli_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: 8\nnamespace: from-file").unwrap();

        let overrides = ConfigOverrides {
            workers: Some(2),
            namespace: Some("from-cli".to_string()),
            ..Default::default()
        };
        let config = OperatorConfig::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.namespace.as_deref(), Some("from-cli"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = OperatorConfig::parse_yaml("retryDelay: 5").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let overrides = ConfigOverrides {
            workers: Some(0),
            ..Default::default()
        };
        assert!(OperatorConfig::load(None, &overrides).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = OperatorConfig::load(
            Some(Path::new("/nonexistent/operator.yaml")),
            &ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}

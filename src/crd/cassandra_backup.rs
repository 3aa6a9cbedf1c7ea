//! CassandraBackup Custom Resource Definition
//!
//! A CassandraBackup asks the Icarus backup coordinator of a ready
//! CassandraCluster to take a snapshot and upload it to object storage.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::cassandra_cluster::SpecValidationError;
use super::types::{BackupState, Condition, StorageProvider};

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "db.ibm.com",
    version = "v1alpha1",
    kind = "CassandraBackup",
    namespaced,
    status = "CassandraBackupStatus",
    shortname = "cb",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.cassandraCluster"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Progress","type":"integer","jsonPath":".status.progress"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CassandraBackupSpec {
    /// Name of the CassandraCluster in the same namespace
    pub cassandra_cluster: String,

    /// Destination such as `s3://bucket/prefix`. The scheme selects the provider
    pub storage_location: String,

    /// Secret holding the provider credentials
    pub secret_name: String,

    /// Defaults to the backup's own name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,

    /// Keyspaces or keyspace.table entities, comma separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_connections: Option<i64>,

    #[serde(default)]
    pub create_missing_bucket: bool,
}

impl CassandraBackupSpec {
    pub fn validate(&self) -> Result<(), Vec<SpecValidationError>> {
        let mut errors = Vec::new();

        if self.cassandra_cluster.is_empty() {
            errors.push(SpecValidationError::new(
                "spec.cassandraCluster",
                "Cluster reference must not be empty",
                "Set spec.cassandraCluster to the name of a CassandraCluster in this namespace.",
            ));
        }
        if StorageProvider::from_location(&self.storage_location).is_none() {
            errors.push(SpecValidationError::new(
                "spec.storageLocation",
                format!("Unsupported storage location {:?}", self.storage_location),
                "Use one of s3://, gcp://, azure://, oracle://, minio:// or ceph:// followed by a bucket.",
            ));
        }
        if self.secret_name.is_empty() {
            errors.push(SpecValidationError::new(
                "spec.secretName",
                "Storage credentials secret name must not be empty",
                "Point spec.secretName at a secret with the provider's credential keys.",
            ));
        }
        if matches!(self.concurrent_connections, Some(n) if n < 1) {
            errors.push(SpecValidationError::new(
                "spec.concurrentConnections",
                "concurrentConnections must be at least 1",
                "Remove the field or set it to a positive number.",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Status subresource for CassandraBackup
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CassandraBackupStatus {
    #[serde(default)]
    pub state: BackupState,

    /// Operation id assigned by the backup coordinator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    /// Completion percentage, 0 to 100
    #[serde(default)]
    pub progress: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl CassandraBackup {
    pub fn storage_provider(&self) -> Option<StorageProvider> {
        StorageProvider::from_location(&self.spec.storage_location)
    }

    pub fn snapshot_tag(&self) -> String {
        self.spec
            .snapshot_tag
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.name_any())
    }

    pub fn state(&self) -> BackupState {
        self.status.as_ref().map(|s| s.state).unwrap_or_default()
    }
}

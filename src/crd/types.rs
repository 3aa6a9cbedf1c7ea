//! Shared types for Cassandra cluster and backup specifications
//!
//! These types are used across the CRD definitions and controller logic.
//!
//! # Type Hierarchy
//!
//! - [`DC`] - A datacenter: an independently scaled group of Cassandra replicas
//! - [`SystemKeyspaces`] - System keyspaces whose replication follows the topology
//! - [`Repair`] - A repair schedule registered with Cassandra Reaper
//! - [`Maintenance`] - Pods or whole datacenters taken out of rotation
//! - [`StorageProvider`] - Object store kinds supported by the backup coordinator
//! - [`BackupState`] - Lifecycle of a backup job
//! - [`Condition`] - Kubernetes-style status condition

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Cassandra datacenter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DC {
    /// Datacenter name as known to Cassandra (`dc1`, `us-east`, ...)
    pub name: String,
    /// Number of Cassandra pods in the datacenter
    pub replicas: i32,
}

/// System keyspaces whose replication factor is managed by the operator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemKeyspaces {
    /// Keyspace names. Defaults to `system_auth`, `system_distributed` and `system_traces`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    /// Per-DC replication factor overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dcs: Vec<SystemKeyspaceDC>,
}

/// Replication factor override for a single datacenter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemKeyspaceDC {
    pub name: String,
    pub rf: i32,
}

pub const DEFAULT_SYSTEM_KEYSPACES: [&str; 3] =
    ["system_auth", "system_distributed", "system_traces"];

impl SystemKeyspaces {
    /// Keyspace names to reconcile, falling back to the defaults
    pub fn keyspace_names(&self) -> Vec<String> {
        if self.names.is_empty() {
            DEFAULT_SYSTEM_KEYSPACES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.names.clone()
        }
    }
}

/// Repair schedule declaration
///
/// The idempotency key of a schedule is its keyspace plus the sorted table
/// list, see [`Repair::key`]. Schedules are only ever created, never updated
/// or removed by the operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Repair {
    pub keyspace: String,

    /// Tables to repair. Empty means all tables of the keyspace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,

    /// Datacenters to repair. Empty means all datacenters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,

    /// Cadence in days
    #[serde(default = "default_schedule_days_between")]
    pub schedule_days_between: i32,

    /// First activation, ISO-8601 local time (e.g. `2024-01-01T02:00:00`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_trigger_time: Option<String>,

    #[serde(default = "default_repair_parallelism")]
    pub repair_parallelism: String,

    #[serde(default = "default_intensity")]
    pub intensity: String,

    #[serde(default)]
    pub incremental_repair: bool,
}

fn default_schedule_days_between() -> i32 {
    7
}

fn default_repair_parallelism() -> String {
    "DATACENTER_AWARE".to_string()
}

fn default_intensity() -> String {
    "1.0".to_string()
}

/// Idempotency key for a repair schedule
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepairKey {
    pub keyspace: String,
    pub tables: BTreeSet<String>,
}

impl Repair {
    pub fn key(&self) -> RepairKey {
        RepairKey {
            keyspace: self.keyspace.clone(),
            tables: self.tables.iter().cloned().collect(),
        }
    }
}

/// Maintenance selector
///
/// An empty `pods` list puts the whole datacenter into maintenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    pub dc: String,
    #[serde(default)]
    pub pods: Vec<String>,
}

/// Object stores supported by the backup coordinator
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Gcp,
    Azure,
    Oracle,
    Minio,
    Ceph,
}

impl StorageProvider {
    /// Derive the provider from a storage location such as `s3://bucket/path`
    pub fn from_location(location: &str) -> Option<Self> {
        let (scheme, rest) = location.split_once("://")?;
        if rest.is_empty() {
            return None;
        }
        match scheme.to_ascii_lowercase().as_str() {
            "s3" => Some(StorageProvider::S3),
            "gcp" => Some(StorageProvider::Gcp),
            "azure" => Some(StorageProvider::Azure),
            "oracle" => Some(StorageProvider::Oracle),
            "minio" => Some(StorageProvider::Minio),
            "ceph" => Some(StorageProvider::Ceph),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProvider::S3 => "s3",
            StorageProvider::Gcp => "gcp",
            StorageProvider::Azure => "azure",
            StorageProvider::Oracle => "oracle",
            StorageProvider::Minio => "minio",
            StorageProvider::Ceph => "ceph",
        }
    }
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backup job lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BackupState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl BackupState {
    /// Terminal states make the backup inert
    pub fn is_terminal(&self) -> bool {
        matches!(self, BackupState::Completed | BackupState::Failed)
    }
}

impl std::fmt::Display for BackupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupState::Pending => write!(f, "Pending"),
            BackupState::Running => write!(f, "Running"),
            BackupState::Completed => write!(f, "Completed"),
            BackupState::Failed => write!(f, "Failed"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "Ready")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    /// Last time the condition transitioned
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

//! Controller module for CassandraCluster and CassandraBackup reconciliation
//!
//! The engines ([`ClusterReconciler`], [`BackupReconciler`]) are written
//! against the [`ResourceStore`] and [`EventRecorder`] traits plus the
//! sidecar connectors, and [`run_controller`] wires them into kube-runtime.

mod backup;
mod cluster;
pub mod conditions;
mod credentials;
pub mod events;
mod keyspaces;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod names;
mod outcome;
mod reconciler;
mod repairs;
mod roles;
mod seeds;
mod store;

#[cfg(test)]
pub(crate) mod fakes;

pub use backup::BackupReconciler;
pub use cluster::{ClusterReconciler, STATUS_UPDATE_ATTEMPTS};
pub use events::{EventRecorder, EventType, KubeEventRecorder};
pub use outcome::ReconcileOutcome;
pub use reconciler::{run_controller, ControllerState};
pub use store::{KubeStore, ResourceStore, FIELD_MANAGER};

//! CassandraBackup reconciliation engine
//!
//! A backup is started only once its cluster reports ready and its storage
//! credentials check out. Submission is idempotent: an existing coordinator
//! operation is looked up by recorded id, then by snapshot tag and location,
//! before a new one is created. Completed and failed backups are inert.

use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::conditions::{set_condition, CONDITION_TYPE_PROGRESSING};
use super::credentials::validate_storage_secret;
use super::events::{self, EventRecorder};
use super::names;
use super::outcome::ReconcileOutcome;
use super::store::ResourceStore;
use crate::clients::{
    BackupCoordinatorClient, BackupOperation, BackupRequest, OperationState, SidecarConnectors,
};
use crate::config::OperatorConfig;
use crate::crd::{format_validation_errors, BackupState, CassandraBackup, CassandraBackupStatus};
use crate::error::{Error, Result};

use super::cluster::STATUS_UPDATE_ATTEMPTS;

pub struct BackupReconciler {
    store: Arc<dyn ResourceStore>,
    events: Arc<dyn EventRecorder>,
    sidecars: SidecarConnectors,
    config: Arc<OperatorConfig>,
}

impl BackupReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        events: Arc<dyn EventRecorder>,
        sidecars: SidecarConnectors,
        config: Arc<OperatorConfig>,
    ) -> Self {
        Self {
            store,
            events,
            sidecars,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome> {
        let Some(backup) = self.store.get_backup(namespace, name).await? else {
            debug!("CassandraBackup {}/{} no longer exists", namespace, name);
            return Ok(ReconcileOutcome::Done);
        };

        match self.run_pass(&backup).await {
            Err(e) if e.is_conflict() => {
                info!("CassandraBackup {}/{} changed during the pass: {}", namespace, name, e);
                Ok(ReconcileOutcome::RequeueNow)
            }
            Err(e) => {
                warn!("Reconciliation of backup {}/{} failed: {}", namespace, name, e);
                events::warning(self.events.as_ref(), &backup, e.reason(), &e.to_string()).await;
                Err(e)
            }
            outcome => outcome,
        }
    }

    async fn run_pass(&self, backup: &CassandraBackup) -> Result<ReconcileOutcome> {
        let retry = ReconcileOutcome::RequeueAfter(self.config.retry_delay);

        if backup.state().is_terminal() {
            debug!("Backup is {}, nothing to do", backup.state());
            return Ok(ReconcileOutcome::Done);
        }

        let provider = match (backup.spec.validate(), backup.storage_provider()) {
            (Ok(()), Some(provider)) => provider,
            (result, _) => {
                let message = match result {
                    Err(errors) => format_validation_errors(&errors),
                    Ok(()) => format!(
                        "Unsupported storage location {:?}",
                        backup.spec.storage_location
                    ),
                };
                warn!("Invalid CassandraBackup spec: {}", message);
                self.warn(backup, events::REASON_INVALID_SPEC, &message).await;
                return Ok(retry);
            }
        };

        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let cluster_name = &backup.spec.cassandra_cluster;

        let Some(cluster) = self.store.get_cluster(&namespace, cluster_name).await? else {
            let message = format!("CassandraCluster {cluster_name} not found");
            warn!("{}", message);
            self.warn(backup, events::REASON_CLUSTER_NOT_FOUND, &message)
                .await;
            return Ok(retry);
        };

        if !cluster.is_ready() {
            warn!(
                "CassandraCluster {} is not ready, not starting backup",
                cluster_name
            );
            return Ok(retry);
        }

        let secret_name = &backup.spec.secret_name;
        let Some(secret) = self.store.get_secret(&namespace, secret_name).await? else {
            let message = format!("Storage credentials secret {secret_name} not found");
            warn!("{}", message);
            self.warn(backup, events::REASON_STORAGE_SECRET_NOT_FOUND, &message)
                .await;
            return Ok(retry);
        };

        if let Err(e) = validate_storage_secret(&secret, provider, &self.config) {
            warn!("{}", e);
            self.warn(backup, events::REASON_CREDENTIALS_INVALID, &e.to_string())
                .await;
            return Ok(retry);
        }

        let Some(url) = names::backup_coordinator_url(&cluster, self.config.ports.icarus) else {
            self.warn(
                backup,
                events::REASON_INVALID_SPEC,
                "Referenced CassandraCluster declares no datacenters",
            )
            .await;
            return Ok(retry);
        };
        let coordinator = self.sidecars.backup_coordinator.connect(&url);

        let operation = match find_operation(backup, coordinator.as_ref()).await? {
            Some(op) => op,
            None => {
                let op = coordinator
                    .submit_backup(&backup_request(backup, &namespace))
                    .await?;
                let message = format!(
                    "Submitted backup {} as operation {}",
                    backup.snapshot_tag(),
                    op.id
                );
                info!("{}", message);
                events::normal(
                    self.events.as_ref(),
                    backup,
                    events::REASON_BACKUP_SUBMITTED,
                    &message,
                )
                .await;
                op
            }
        };

        let state = backup_state(operation.state);
        if let Some(previous) = self.publish_status(backup, &operation).await? {
            if previous != state {
                match state {
                    BackupState::Completed => {
                        events::normal(
                            self.events.as_ref(),
                            backup,
                            events::REASON_BACKUP_COMPLETED,
                            &format!("Backup {} completed", backup.snapshot_tag()),
                        )
                        .await
                    }
                    BackupState::Failed => {
                        self.warn(
                            backup,
                            events::REASON_BACKUP_FAILED,
                            &format!("Backup operation {} failed", operation.id),
                        )
                        .await
                    }
                    _ => {}
                }
            }
        }

        if state.is_terminal() {
            Ok(ReconcileOutcome::Done)
        } else {
            Ok(retry)
        }
    }

    async fn warn(&self, backup: &CassandraBackup, reason: &str, message: &str) {
        events::warning(self.events.as_ref(), backup, reason, message).await;
    }

    /// Conditionally record the operation; returns the previous state if written
    async fn publish_status(
        &self,
        backup: &CassandraBackup,
        operation: &BackupOperation,
    ) -> Result<Option<BackupState>> {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let name = backup.name_any();

        for attempt in 1..=STATUS_UPDATE_ATTEMPTS {
            let Some(latest) = self.store.get_backup(&namespace, &name).await? else {
                return Ok(None);
            };
            let previous = latest.state();
            if previous.is_terminal() {
                return Ok(None);
            }

            let desired = desired_status(&latest, operation);
            if latest.status.as_ref() == Some(&desired) {
                return Ok(None);
            }

            match self.store.update_backup_status(&latest, &desired).await {
                Ok(()) => return Ok(Some(previous)),
                Err(e) if e.is_conflict() => {
                    debug!("Backup status write attempt {} conflicted: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict(format!(
            "CassandraBackup {namespace}/{name} status"
        )))
    }
}

async fn find_operation(
    backup: &CassandraBackup,
    coordinator: &dyn BackupCoordinatorClient,
) -> Result<Option<BackupOperation>> {
    if let Some(id) = backup
        .status
        .as_ref()
        .and_then(|s| s.operation_id.as_deref())
    {
        if let Some(op) = coordinator.backup(id).await? {
            return Ok(Some(op));
        }
        debug!("Coordinator does not know operation {}", id);
    }

    let tag = backup.snapshot_tag();
    Ok(coordinator
        .backups()
        .await?
        .into_iter()
        .find(|op| op.snapshot_tag == tag && op.storage_location == backup.spec.storage_location))
}

fn backup_request(backup: &CassandraBackup, namespace: &str) -> BackupRequest {
    BackupRequest {
        type_: "backup".to_string(),
        storage_location: backup.spec.storage_location.clone(),
        snapshot_tag: backup.snapshot_tag(),
        dc: backup.spec.datacenter.clone(),
        entities: backup.spec.entities.clone(),
        duration: backup.spec.duration.clone(),
        bandwidth: backup.spec.bandwidth.clone(),
        concurrent_connections: backup.spec.concurrent_connections,
        create_missing_bucket: backup.spec.create_missing_bucket,
        k8s_namespace: namespace.to_string(),
        k8s_secret_name: backup.spec.secret_name.clone(),
    }
}

fn backup_state(state: OperationState) -> BackupState {
    match state {
        OperationState::Pending => BackupState::Pending,
        OperationState::Running => BackupState::Running,
        OperationState::Completed => BackupState::Completed,
        OperationState::Failed => BackupState::Failed,
    }
}

fn desired_status(latest: &CassandraBackup, operation: &BackupOperation) -> CassandraBackupStatus {
    let state = backup_state(operation.state);
    let mut status = latest.status.clone().unwrap_or_default();
    status.state = state;
    status.operation_id = Some(operation.id.clone());
    status.progress = operation.progress_percent();
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_PROGRESSING,
        !state.is_terminal(),
        &state.to_string(),
        &format!("Operation {} is {}", operation.id, state),
        latest.metadata.generation,
    );
    status
}

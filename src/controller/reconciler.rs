//! Controller wiring for CassandraCluster and CassandraBackup
//!
//! Both engines run on kube-runtime's `Controller`, which provides the work
//! queue: one in-flight pass per object, deduplicated re-queues and a
//! bounded number of concurrent passes. Dependency watches map Secrets and
//! StatefulSets back to their clusters, and clusters to their backups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams};
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info};

use super::backup::BackupReconciler;
use super::cluster::ClusterReconciler;
use super::events::KubeEventRecorder;
use super::names;
use super::outcome::ReconcileOutcome;
use super::store::KubeStore;
use crate::clients::SidecarConnectors;
use crate::config::OperatorConfig;
use crate::crd::{CassandraBackup, CassandraCluster};
use crate::error::{Error, Result};

const CLUSTER_CONTROLLER: &str = "cassandracluster";
const BACKUP_CONTROLLER: &str = "cassandrabackup";

/// Shared state for both controllers
pub struct ControllerState {
    pub client: Client,
    pub config: Arc<OperatorConfig>,
    /// Passes are skipped unless this replica holds the leader lease
    pub is_leader: Arc<AtomicBool>,
    pub clusters: ClusterReconciler,
    pub backups: BackupReconciler,
}

impl ControllerState {
    pub fn new(
        client: Client,
        config: Arc<OperatorConfig>,
        is_leader: Arc<AtomicBool>,
    ) -> Result<Self> {
        let store = Arc::new(KubeStore::new(client.clone()));
        let events = Arc::new(KubeEventRecorder::new(client.clone()));
        let sidecars = SidecarConnectors::new(config.request_timeout)?;

        Ok(Self {
            clusters: ClusterReconciler::new(
                store.clone(),
                events.clone(),
                sidecars.clone(),
                config.clone(),
            ),
            backups: BackupReconciler::new(store, events, sidecars, config.clone()),
            client,
            config,
            is_leader,
        })
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match &self.config.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Main entry point to start both controllers
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let clusters: Api<CassandraCluster> = state.api();
    let backups: Api<CassandraBackup> = state.api();

    for (kind, probe) in [
        ("CassandraCluster", clusters.list(&ListParams::default().limit(1)).await.map(|_| ())),
        ("CassandraBackup", backups.list(&ListParams::default().limit(1)).await.map(|_| ())),
    ] {
        if let Err(e) = probe {
            error!("{} CRD not found. Please install the CRDs first: {:?}", kind, e);
            return Err(Error::ConfigError(format!("{kind} CRD not installed")));
        }
    }
    info!(
        "Starting controllers with {} workers (namespace: {})",
        state.config.workers,
        state.config.namespace.as_deref().unwrap_or("all")
    );

    let controller_config = controller::Config::default().concurrency(state.config.workers);

    let cluster_controller = Controller::new(clusters.clone(), Config::default())
        .with_config(controller_config.clone());
    let cluster_store = cluster_controller.store();
    let sts_store = cluster_store.clone();

    let cluster_loop = cluster_controller
        .watches(state.api::<Secret>(), Config::default(), move |secret| {
            let namespace = secret.namespace();
            let name = secret.name_any();
            cluster_store
                .state()
                .into_iter()
                .filter(|cc| {
                    cc.namespace() == namespace
                        && (cc.spec.admin_role_secret_name == name
                            || cc.spec.roles_secret_name.as_deref() == Some(name.as_str()))
                })
                .map(|cc| ObjectRef::from_obj(&*cc))
                .collect::<Vec<_>>()
        })
        .watches(state.api::<StatefulSet>(), Config::default(), move |sts| {
            let namespace = sts.namespace();
            let name = sts.name_any();
            sts_store
                .state()
                .into_iter()
                .filter(|cc| {
                    cc.namespace() == namespace
                        && cc.spec.dcs.iter().any(|dc| names::dc(cc, &dc.name) == name)
                })
                .map(|cc| ObjectRef::from_obj(&*cc))
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(reconcile_cluster, cluster_error_policy, state.clone())
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled CassandraCluster {}", obj.name),
                Err(e) => debug!("CassandraCluster controller error: {}", e),
            }
        });

    let backup_controller =
        Controller::new(backups, Config::default()).with_config(controller_config);
    let backup_store = backup_controller.store();

    let backup_loop = backup_controller
        .watches(clusters, Config::default(), move |cc| {
            let namespace = cc.namespace();
            let name = cc.name_any();
            backup_store
                .state()
                .into_iter()
                .filter(|b| b.namespace() == namespace && b.spec.cassandra_cluster == name)
                .map(|b| ObjectRef::from_obj(&*b))
                .collect::<Vec<_>>()
        })
        .shutdown_on_signal()
        .run(reconcile_backup, backup_error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled CassandraBackup {}", obj.name),
                Err(e) => debug!("CassandraBackup controller error: {}", e),
            }
        });

    futures::join!(cluster_loop, backup_loop);
    info!("Controllers stopped");
    Ok(())
}

async fn reconcile_cluster(
    cluster: Arc<CassandraCluster>,
    ctx: Arc<ControllerState>,
) -> Result<Action> {
    if !ctx.is_leader.load(Ordering::Relaxed) {
        debug!("Not leader, skipping CassandraCluster {}", cluster.name_any());
        return Ok(Action::requeue(ctx.config.retry_delay));
    }

    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
    #[cfg(feature = "metrics")]
    let started = std::time::Instant::now();

    let result = ctx.clusters.reconcile(&namespace, &cluster.name_any()).await;

    #[cfg(feature = "metrics")]
    super::metrics::observe_reconcile_duration_seconds(
        CLUSTER_CONTROLLER,
        started.elapsed().as_secs_f64(),
    );
    result.map(ReconcileOutcome::into_action)
}

async fn reconcile_backup(backup: Arc<CassandraBackup>, ctx: Arc<ControllerState>) -> Result<Action> {
    if !ctx.is_leader.load(Ordering::Relaxed) {
        debug!("Not leader, skipping CassandraBackup {}", backup.name_any());
        return Ok(Action::requeue(ctx.config.retry_delay));
    }

    let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
    #[cfg(feature = "metrics")]
    let started = std::time::Instant::now();

    let result = ctx.backups.reconcile(&namespace, &backup.name_any()).await;

    #[cfg(feature = "metrics")]
    super::metrics::observe_reconcile_duration_seconds(
        BACKUP_CONTROLLER,
        started.elapsed().as_secs_f64(),
    );
    result.map(ReconcileOutcome::into_action)
}

fn cluster_error_policy(
    cluster: Arc<CassandraCluster>,
    error: &Error,
    ctx: Arc<ControllerState>,
) -> Action {
    error!(
        "Reconciliation error for CassandraCluster {}: {}",
        cluster.name_any(),
        error
    );
    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CLUSTER_CONTROLLER, error.reason());
    requeue_after_error(error, &ctx.config)
}

fn backup_error_policy(
    backup: Arc<CassandraBackup>,
    error: &Error,
    ctx: Arc<ControllerState>,
) -> Action {
    error!(
        "Reconciliation error for CassandraBackup {}: {}",
        backup.name_any(),
        error
    );
    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(BACKUP_CONTROLLER, error.reason());
    requeue_after_error(error, &ctx.config)
}

fn requeue_after_error(error: &Error, config: &OperatorConfig) -> Action {
    if error.is_conflict() {
        Action::requeue(Duration::ZERO)
    } else if error.is_retriable() {
        Action::requeue(config.retry_delay)
    } else {
        Action::requeue(config.resync_period)
    }
}

//! Resource store adapter
//!
//! Reads desired state and dependent objects from the control plane and
//! writes observed status back with optimistic concurrency: every status
//! write carries the resource version it was computed from, and a stale
//! version surfaces as [`Error::Conflict`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;

use crate::crd::{CassandraBackup, CassandraBackupStatus, CassandraCluster, CassandraClusterStatus};
use crate::error::{Error, Result};

pub const FIELD_MANAGER: &str = "cassandra-operator";

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<CassandraCluster>>;

    /// All clusters, or those of one namespace
    async fn list_clusters(&self, namespace: Option<&str>) -> Result<Vec<CassandraCluster>>;

    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Option<CassandraBackup>>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// `readyReplicas` of a StatefulSet, `None` if it does not exist
    async fn statefulset_ready_replicas(&self, namespace: &str, name: &str)
        -> Result<Option<i32>>;

    /// Replace the status of `cluster`, conditional on its resource version
    async fn update_cluster_status(
        &self,
        cluster: &CassandraCluster,
        status: &CassandraClusterStatus,
    ) -> Result<()>;

    /// Replace the status of `backup`, conditional on its resource version
    async fn update_backup_status(
        &self,
        backup: &CassandraBackup,
        status: &CassandraBackupStatus,
    ) -> Result<()>;
}

pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<CassandraCluster>> {
        let api: Api<CassandraCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_clusters(&self, namespace: Option<&str>) -> Result<Vec<CassandraCluster>> {
        let api: Api<CassandraCluster> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Option<CassandraBackup>> {
        let api: Api<CassandraBackup> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn statefulset_ready_replicas(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<i32>> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.map(|sts| {
            sts.status
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0)
        }))
    }

    async fn update_cluster_status(
        &self,
        cluster: &CassandraCluster,
        status: &CassandraClusterStatus,
    ) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<CassandraCluster> = Api::namespaced(self.client.clone(), &namespace);

        // Lists are spelled out so an emptied overlay clears the stored one.
        let patch = json!({
            "metadata": { "resourceVersion": cluster.resource_version() },
            "status": {
                "ready": status.ready,
                "maintenanceState": status.maintenance_state,
                "conditions": status.conditions,
                "observedGeneration": status.observed_generation,
            }
        });
        api.patch_status(
            &cluster.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(Error::from)?;
        Ok(())
    }

    async fn update_backup_status(
        &self,
        backup: &CassandraBackup,
        status: &CassandraBackupStatus,
    ) -> Result<()> {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<CassandraBackup> = Api::namespaced(self.client.clone(), &namespace);

        let patch = json!({
            "metadata": { "resourceVersion": backup.resource_version() },
            "status": {
                "state": status.state,
                "operationId": status.operation_id,
                "progress": status.progress,
                "conditions": status.conditions,
            }
        });
        api.patch_status(
            &backup.name_any(),
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(Error::from)?;
        Ok(())
    }
}

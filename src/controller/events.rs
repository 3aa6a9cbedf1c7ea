//! Kubernetes event reporting
//!
//! Events are purely informational. A failure to record one is logged and
//! never changes the outcome of a reconciliation pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use tracing::warn;

pub const REASON_INVALID_SPEC: &str = "InvalidSpec";
pub const REASON_SIDECAR_UNREACHABLE: &str = "SidecarUnreachable";
pub const REASON_SEEDS_UPDATED: &str = "SeedsUpdated";
pub const REASON_DCS_NOT_READY: &str = "DCsNotReady";
pub const REASON_ADMIN_SECRET_NOT_FOUND: &str = "AdminRoleSecretNotFound";
pub const REASON_ROLES_SECRET_NOT_FOUND: &str = "RolesSecretNotFound";
pub const REASON_CREDENTIALS_INVALID: &str = "CredentialsInvalid";
pub const REASON_ROLE_CREATED: &str = "RoleCreated";
pub const REASON_ROLE_UPDATED: &str = "RoleUpdated";
pub const REASON_REPLICATION_UPDATED: &str = "KeyspaceReplicationUpdated";
pub const REASON_REAPER_NOT_RUNNING: &str = "ReaperNotRunning";
pub const REASON_REAPER_CLUSTER_REGISTERED: &str = "ReaperClusterRegistered";
pub const REASON_REPAIR_SCHEDULED: &str = "RepairScheduleCreated";
pub const REASON_CLUSTER_READY: &str = "ClusterReady";
pub const REASON_CLUSTER_NOT_FOUND: &str = "CassandraClusterNotFound";
pub const REASON_STORAGE_SECRET_NOT_FOUND: &str = "StorageCredentialsSecretNotFound";
pub const REASON_BACKUP_SUBMITTED: &str = "BackupSubmitted";
pub const REASON_BACKUP_COMPLETED: &str = "BackupCompleted";
pub const REASON_BACKUP_FAILED: &str = "BackupFailed";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(
        &self,
        object: &ObjectReference,
        type_: EventType,
        reason: &str,
        message: &str,
    );
}

/// Record a Normal event for `obj`
pub async fn normal<K>(recorder: &dyn EventRecorder, obj: &K, reason: &str, message: &str)
where
    K: Resource<DynamicType = ()>,
{
    recorder
        .record(&obj.object_ref(&()), EventType::Normal, reason, message)
        .await;
}

/// Record a Warning event for `obj`
pub async fn warning<K>(recorder: &dyn EventRecorder, obj: &K, reason: &str, message: &str)
where
    K: Resource<DynamicType = ()>,
{
    recorder
        .record(&obj.object_ref(&()), EventType::Warning, reason, message)
        .await;
}

/// Writes core/v1 Events through the API server
pub struct KubeEventRecorder {
    client: Client,
}

impl KubeEventRecorder {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(
        &self,
        object: &ObjectReference,
        type_: EventType,
        reason: &str,
        message: &str,
    ) {
        let namespace = object
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let events: Api<Event> = Api::namespaced(self.client.clone(), &namespace);

        let time = chrono::Utc::now();
        let event = Event {
            metadata: kube::api::ObjectMeta {
                generate_name: Some(format!(
                    "{}-event-",
                    object.name.as_deref().unwrap_or("cassandra")
                )),
                ..Default::default()
            },
            type_: Some(type_.as_str().to_string()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            involved_object: object.clone(),
            first_timestamp: Some(Time(time)),
            last_timestamp: Some(Time(time)),
            count: Some(1),
            reporting_component: Some("cassandra-operator".to_string()),
            ..Default::default()
        };

        if let Err(e) = events.create(&PostParams::default(), &event).await {
            warn!(
                "Failed to record {} event {} for {:?}: {}",
                type_.as_str(),
                reason,
                object.name,
                e
            );
        }
    }
}

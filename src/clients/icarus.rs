//! HTTP client for the Icarus backup coordinator
//!
//! Icarus runs next to every Cassandra node; the operator talks to the
//! instance on pod 0 of the first datacenter, which fans the operation out
//! to the rest of the cluster.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{expect_status, read_json, send, Result};

/// Phase of a coordinator operation
///
/// Unknown phase strings are treated as `Running` so a newer coordinator
/// never makes a backup look finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum OperationState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<String> for OperationState {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => OperationState::Pending,
            "COMPLETED" => OperationState::Completed,
            "FAILED" => OperationState::Failed,
            _ => OperationState::Running,
        }
    }
}

/// Backup operation as reported by the coordinator
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupOperation {
    pub id: String,
    pub state: OperationState,
    /// Fraction complete, 0.0 to 1.0
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub storage_location: String,
    #[serde(default)]
    pub snapshot_tag: String,
}

impl BackupOperation {
    pub fn progress_percent(&self) -> i32 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as i32
    }
}

/// Body of `POST /operations` for a backup
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    #[serde(rename = "type")]
    pub type_: String,
    pub storage_location: String,
    pub snapshot_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_connections: Option<i64>,
    pub create_missing_bucket: bool,
    pub k8s_namespace: String,
    pub k8s_secret_name: String,
}

#[async_trait]
pub trait BackupCoordinatorClient: Send + Sync {
    async fn backups(&self) -> Result<Vec<BackupOperation>>;
    /// `None` when the coordinator does not know the id
    async fn backup(&self, id: &str) -> Result<Option<BackupOperation>>;
    async fn submit_backup(&self, request: &BackupRequest) -> Result<BackupOperation>;
}

pub trait BackupCoordinatorConnector: Send + Sync {
    fn connect(&self, base_url: &str) -> Arc<dyn BackupCoordinatorClient>;
}

pub struct HttpBackupCoordinatorConnector {
    http: Client,
}

impl HttpBackupCoordinatorConnector {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl BackupCoordinatorConnector for HttpBackupCoordinatorConnector {
    fn connect(&self, base_url: &str) -> Arc<dyn BackupCoordinatorClient> {
        Arc::new(HttpBackupCoordinatorClient::new(base_url, self.http.clone()))
    }
}

pub struct HttpBackupCoordinatorClient {
    base_url: String,
    http: Client,
}

impl HttpBackupCoordinatorClient {
    pub fn new(base_url: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl BackupCoordinatorClient for HttpBackupCoordinatorClient {
    async fn backups(&self) -> Result<Vec<BackupOperation>> {
        let url = self.url("/operations");
        let request = self.http.get(&url).query(&[("type", "backup")]);
        let response = send(&url, request).await?;
        let response = expect_status(&url, response, &[StatusCode::OK])?;
        read_json(&url, response).await
    }

    async fn backup(&self, id: &str) -> Result<Option<BackupOperation>> {
        let url = self.url(&format!("/operations/{id}"));
        let response = send(&url, self.http.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_status(&url, response, &[StatusCode::OK])?;
        read_json(&url, response).await.map(Some)
    }

    async fn submit_backup(&self, request: &BackupRequest) -> Result<BackupOperation> {
        let url = self.url("/operations");
        info!(
            "Submitting backup {} to {} via {}",
            request.snapshot_tag, request.storage_location, url
        );
        let response = send(&url, self.http.post(&url).json(request)).await?;
        let response = expect_status(&url, response, &[StatusCode::OK, StatusCode::CREATED])?;
        read_json(&url, response).await
    }
}

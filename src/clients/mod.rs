//! Clients for the sidecars and services a Cassandra cluster runs alongside
//!
//! - [`prober`] - per-DC seed prober (seed lists and readiness flags)
//! - [`cql`] - role and keyspace administration over CQL
//! - [`reaper`] - Cassandra Reaper repair coordination
//! - [`icarus`] - Icarus backup coordination
//!
//! Every client sits behind a trait with a connector so the reconcilers can
//! be exercised against in-memory fakes. Clients never retry internally; a
//! failed call surfaces to the reconciler, which schedules the next pass.

pub mod cql;
mod error;
pub mod icarus;
pub mod prober;
pub mod reaper;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

pub use cql::{
    CqlClient, CqlConnector, Credentials, Keyspace, LiveRole, Role, ScyllaCqlConnector,
};
pub use error::{ClientError, Result};
pub use icarus::{
    BackupCoordinatorClient, BackupCoordinatorConnector, BackupOperation, BackupRequest,
    HttpBackupCoordinatorConnector, OperationState,
};
pub use prober::{HttpProberConnector, ProberClient, ProberConnector};
pub use reaper::{
    HttpReaperConnector, ReaperClient, ReaperConnector, RepairScheduleInfo, REPAIR_OWNER,
};

/// Connectors for every sidecar the reconcilers talk to
#[derive(Clone)]
pub struct SidecarConnectors {
    pub prober: Arc<dyn ProberConnector>,
    pub cql: Arc<dyn CqlConnector>,
    pub reaper: Arc<dyn ReaperConnector>,
    pub backup_coordinator: Arc<dyn BackupCoordinatorConnector>,
}

impl SidecarConnectors {
    /// Production connectors sharing one HTTP connection pool
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = http_client(request_timeout)?;
        Ok(Self {
            prober: Arc::new(HttpProberConnector::new(http.clone())),
            cql: Arc::new(ScyllaCqlConnector::new(request_timeout)),
            reaper: Arc::new(HttpReaperConnector::new(http.clone())),
            backup_coordinator: Arc::new(HttpBackupCoordinatorConnector::new(http)),
        })
    }
}

/// Build the HTTP client used for all sidecar calls
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| ClientError::transport("http client", e))
}

pub(crate) async fn send(url: &str, request: reqwest::RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| ClientError::transport(url, e))
}

/// Fail with `UnexpectedStatus` unless the response is one of `allowed`
pub(crate) fn expect_status(
    url: &str,
    response: Response,
    allowed: &[StatusCode],
) -> Result<Response> {
    let status = response.status();
    if allowed.contains(&status) {
        Ok(response)
    } else {
        Err(ClientError::UnexpectedStatus {
            target: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Fail with `UnexpectedStatus` unless the response is any 2xx
pub(crate) fn expect_success(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::UnexpectedStatus {
            target: url.to_string(),
            status: status.as_u16(),
        })
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::transport(url, e))?;
    serde_json::from_str(&body).map_err(|e| ClientError::malformed(url, e))
}

/// Parse a plain-text `true`/`false` body, ignoring surrounding whitespace
pub(crate) async fn read_bool(url: &str, response: Response) -> Result<bool> {
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::transport(url, e))?;
    match body.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ClientError::malformed(
            url,
            format!("expected true or false, got {other:?}"),
        )),
    }
}

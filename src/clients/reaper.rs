//! HTTP client for Cassandra Reaper
//!
//! Reaper drives anti-entropy repairs. The operator registers the cluster
//! once and appends repair schedules declared in the CassandraCluster spec.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use super::{expect_status, read_json, send, Result};
use crate::crd::{Repair, RepairKey};

/// Owner recorded on schedules the operator creates
pub const REPAIR_OWNER: &str = "cassandra-operator";

/// A repair schedule as reported by Reaper
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RepairScheduleInfo {
    #[serde(default)]
    pub id: String,
    pub keyspace_name: String,
    #[serde(default)]
    pub column_families: Vec<String>,
    #[serde(default)]
    pub datacenters: Vec<String>,
    #[serde(default)]
    pub scheduled_days_between: i32,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub owner: String,
}

impl RepairScheduleInfo {
    pub fn key(&self) -> RepairKey {
        RepairKey {
            keyspace: self.keyspace_name.clone(),
            tables: self.column_families.iter().cloned().collect(),
        }
    }
}

#[async_trait]
pub trait ReaperClient: Send + Sync {
    async fn is_running(&self) -> Result<bool>;
    async fn cluster_exists(&self, cluster: &str) -> Result<bool>;
    /// Register a cluster; an already registered cluster is not an error
    async fn add_cluster(&self, cluster: &str, seed_host: &str) -> Result<()>;
    async fn repair_schedules(&self, cluster: &str) -> Result<Vec<RepairScheduleInfo>>;
    /// Create a schedule; a duplicate is not an error
    async fn create_repair_schedule(&self, cluster: &str, repair: &Repair) -> Result<()>;
}

pub trait ReaperConnector: Send + Sync {
    fn connect(&self, base_url: &str) -> Arc<dyn ReaperClient>;
}

pub struct HttpReaperConnector {
    http: Client,
}

impl HttpReaperConnector {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl ReaperConnector for HttpReaperConnector {
    fn connect(&self, base_url: &str) -> Arc<dyn ReaperClient> {
        Arc::new(HttpReaperClient::new(base_url, self.http.clone()))
    }
}

pub struct HttpReaperClient {
    base_url: String,
    http: Client,
}

impl HttpReaperClient {
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
impl ReaperClient for HttpReaperClient {
    async fn is_running(&self) -> Result<bool> {
        let url = self.url("/ping");
        let response = send(&url, self.http.get(&url)).await?;
        Ok(response.status().is_success())
    }

    async fn cluster_exists(&self, cluster: &str) -> Result<bool> {
        let url = self.url(&format!("/cluster/{cluster}"));
        let response = send(&url, self.http.get(&url)).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => expect_status(&url, response, &[]).map(|_| false),
        }
    }

    async fn add_cluster(&self, cluster: &str, seed_host: &str) -> Result<()> {
        let url = self.url(&format!("/cluster/{cluster}"));
        info!("Registering cluster {} with Reaper using seed {}", cluster, seed_host);
        let request = self.http.put(&url).query(&[("seedHost", seed_host)]);
        let response = send(&url, request).await?;
        expect_status(
            &url,
            response,
            &[
                StatusCode::OK,
                StatusCode::CREATED,
                StatusCode::NO_CONTENT,
                StatusCode::CONFLICT,
            ],
        )?;
        Ok(())
    }

    async fn repair_schedules(&self, cluster: &str) -> Result<Vec<RepairScheduleInfo>> {
        let url = self.url(&format!("/repair_schedule/cluster/{cluster}"));
        let response = send(&url, self.http.get(&url)).await?;
        let response = expect_status(&url, response, &[StatusCode::OK])?;
        read_json(&url, response).await
    }

    async fn create_repair_schedule(&self, cluster: &str, repair: &Repair) -> Result<()> {
        let url = self.url("/repair_schedule");
        let mut params: Vec<(&str, String)> = vec![
            ("clusterName", cluster.to_string()),
            ("keyspace", repair.keyspace.clone()),
            ("owner", REPAIR_OWNER.to_string()),
            (
                "scheduleDaysBetween",
                repair.schedule_days_between.to_string(),
            ),
            ("repairParallelism", repair.repair_parallelism.clone()),
            ("intensity", repair.intensity.clone()),
            ("incrementalRepair", repair.incremental_repair.to_string()),
        ];
        if !repair.tables.is_empty() {
            params.push(("tables", repair.tables.join(",")));
        }
        if !repair.datacenters.is_empty() {
            params.push(("datacenters", repair.datacenters.join(",")));
        }
        if let Some(trigger) = &repair.schedule_trigger_time {
            params.push(("scheduleTriggerTime", trigger.clone()));
        }

        debug!("Creating repair schedule for {}.{:?}", repair.keyspace, repair.tables);
        let response = send(&url, self.http.post(&url).query(&params)).await?;
        expect_status(
            &url,
            response,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::CONFLICT],
        )?;
        Ok(())
    }
}

//! Response bodies of the REST API

use serde::{Deserialize, Serialize};

use crate::crd::{CassandraCluster, Maintenance};
use kube::ResourceExt;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub name: String,
    pub namespace: String,
    pub datacenters: Vec<String>,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintenance: Vec<Maintenance>,
}

impl From<&CassandraCluster> for ClusterSummary {
    fn from(cluster: &CassandraCluster) -> Self {
        Self {
            name: cluster.name_any(),
            namespace: cluster.namespace().unwrap_or_default(),
            datacenters: cluster.spec.dcs.iter().map(|dc| dc.name.clone()).collect(),
            ready: cluster.is_ready(),
            maintenance: cluster
                .status
                .as_ref()
                .map(|s| s.maintenance_state.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterListResponse {
    pub items: Vec<ClusterSummary>,
    pub total: usize,
}

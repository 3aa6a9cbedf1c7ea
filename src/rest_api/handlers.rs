//! HTTP handlers for the REST API

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, instrument};

use crate::controller::ResourceStore;

use super::dto::{ClusterListResponse, ClusterSummary, ErrorResponse, HealthResponse};

/// State shared by the handlers
pub struct ApiState {
    pub store: Arc<dyn ResourceStore>,
    /// Namespace the operator watches, `None` for all
    pub namespace: Option<String>,
}

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List the CassandraClusters the operator manages
#[instrument(skip(state))]
pub async fn list_clusters(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ClusterListResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.store.list_clusters(state.namespace.as_deref()).await {
        Ok(clusters) => {
            let items: Vec<ClusterSummary> = clusters.iter().map(ClusterSummary::from).collect();
            let total = items.len();
            Ok(Json(ClusterListResponse { items, total }))
        }
        Err(e) => {
            error!("Failed to list clusters: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("list_failed", &e.to_string())),
            ))
        }
    }
}

/// Prometheus text exposition of the operator registry
#[cfg(feature = "metrics")]
pub async fn metrics() -> Result<String, StatusCode> {
    use prometheus_client::encoding::text::encode;
    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(buffer)
}

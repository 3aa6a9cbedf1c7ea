//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controller::ResourceStore;
use crate::{Error, Result};

use super::handlers::{self, ApiState};

/// Routes served by the operator
pub fn router(store: Arc<dyn ResourceStore>, namespace: Option<String>) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/clusters", get(handlers::list_clusters));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(handlers::metrics));

    app.layer(TraceLayer::new_for_http())
        .with_state(Arc::new(ApiState { store, namespace }))
}

/// Run the REST API server
pub async fn run_server(
    store: Arc<dyn ResourceStore>,
    namespace: Option<String>,
    port: u16,
) -> Result<()> {
    let app = router(store, namespace);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("REST API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}

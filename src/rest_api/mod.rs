//! REST API module for external integrations
//!
//! Serves liveness, Prometheus metrics and a read-only view of the managed
//! CassandraClusters.

mod dto;
mod handlers;
mod server;

pub use dto::{ClusterListResponse, ClusterSummary, ErrorResponse, HealthResponse};
pub use server::{router, run_server};

//! Cassandra-K8s: Kubernetes operator for multi-datacenter Apache Cassandra
//!
//! The operator watches `CassandraCluster` and `CassandraBackup` resources
//! and drives the sidecars each datacenter runs (seed prober, Reaper, Icarus)
//! plus the cluster's CQL endpoint toward the declared state.

pub mod clients;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};

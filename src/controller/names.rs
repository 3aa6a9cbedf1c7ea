//! Naming conventions for the workloads and sidecars of a CassandraCluster
//!
//! Every datacenter runs as a StatefulSet named `<cluster>-cassandra-<dc>`
//! behind a headless service of the same name. The seed prober, Reaper and
//! Icarus endpoints are derived from those names.

use kube::ResourceExt;

use crate::crd::CassandraCluster;

fn namespace(cluster: &CassandraCluster) -> String {
    cluster.namespace().unwrap_or_else(|| "default".to_string())
}

/// StatefulSet and headless service name of a datacenter
pub fn dc(cluster: &CassandraCluster, dc: &str) -> String {
    format!("{}-cassandra-{}", cluster.name_any(), dc)
}

/// Pod name of the given ordinal in a datacenter
pub fn pod(cluster: &CassandraCluster, dc_name: &str, ordinal: i32) -> String {
    format!("{}-{}", dc(cluster, dc_name), ordinal)
}

pub fn reaper_service(cluster: &CassandraCluster) -> String {
    format!("{}-reaper", cluster.name_any())
}

/// Base URL of the seed prober sidecar service of a datacenter
pub fn prober_url(cluster: &CassandraCluster, dc_name: &str, port: u16) -> String {
    format!(
        "http://{}-prober.{}.svc.cluster.local:{}",
        dc(cluster, dc_name),
        namespace(cluster),
        port
    )
}

/// In-cluster DNS name of a datacenter's Cassandra service
pub fn dc_host(cluster: &CassandraCluster, dc_name: &str) -> String {
    format!(
        "{}.{}.svc.cluster.local",
        dc(cluster, dc_name),
        namespace(cluster)
    )
}

/// CQL contact points, one per datacenter
pub fn cql_contact_points(cluster: &CassandraCluster, port: u16) -> Vec<String> {
    cluster
        .spec
        .dcs
        .iter()
        .map(|d| format!("{}:{}", dc_host(cluster, &d.name), port))
        .collect()
}

pub fn reaper_url(cluster: &CassandraCluster, port: u16) -> String {
    format!(
        "http://{}.{}.svc.cluster.local:{}",
        reaper_service(cluster),
        namespace(cluster),
        port
    )
}

/// Icarus sidecar of the first pod in the first declared datacenter
///
/// Returns `None` when the cluster declares no datacenters.
pub fn backup_coordinator_url(cluster: &CassandraCluster, port: u16) -> Option<String> {
    let first = cluster.spec.dcs.first()?;
    let svc = dc(cluster, &first.name);
    Some(format!(
        "http://{}-0.{}.{}.svc.cluster.local:{}",
        svc,
        svc,
        namespace(cluster),
        port
    ))
}

/// Pod name part of a seed address such as `c-cassandra-dc1-0.c-cassandra-dc1.ns.svc`
pub fn seed_pod_name(seed: &str) -> &str {
    let host = seed.split(':').next().unwrap_or(seed);
    host.split('.').next().unwrap_or(host)
}

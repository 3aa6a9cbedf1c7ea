//! System keyspace replication policy

use std::collections::BTreeMap;

use crate::clients::cql::NETWORK_TOPOLOGY_STRATEGY;
use crate::crd::CassandraClusterSpec;

/// Replication factor used when no override is declared, capped by replicas
pub const DEFAULT_MAX_RF: i32 = 3;

/// Desired per-DC replication factor for system keyspaces
///
/// Override if declared, otherwise `min(replicas, 3)`, and never more than
/// the DC's replica count. Only declared DCs appear in the map.
pub fn desired_replication(spec: &CassandraClusterSpec) -> BTreeMap<String, i32> {
    spec.dcs
        .iter()
        .map(|dc| {
            let rf = spec
                .system_keyspaces
                .dcs
                .iter()
                .find(|o| o.name == dc.name)
                .map(|o| o.rf)
                .unwrap_or(DEFAULT_MAX_RF);
            (dc.name.clone(), rf.min(dc.replicas).max(1))
        })
        .collect()
}

/// Whether live replication options already match the desired map
pub fn replication_matches(
    live: &BTreeMap<String, String>,
    desired: &BTreeMap<String, i32>,
) -> bool {
    let is_nts = live
        .get("class")
        .map(|c| c.ends_with(NETWORK_TOPOLOGY_STRATEGY))
        .unwrap_or(false);
    if !is_nts {
        return false;
    }

    let live_dcs: BTreeMap<&str, Option<i32>> = live
        .iter()
        .filter(|(k, _)| k.as_str() != "class")
        .map(|(k, v)| (k.as_str(), v.parse().ok()))
        .collect();

    live_dcs.len() == desired.len()
        && desired
            .iter()
            .all(|(dc, rf)| live_dcs.get(dc.as_str()) == Some(&Some(*rf)))
}

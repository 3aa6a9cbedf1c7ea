//! Cluster-wide seed list computation

use std::collections::BTreeSet;

use super::names::seed_pod_name;

/// Union of every datacenter's local seeds, minus pods in maintenance
///
/// The result is sorted and free of duplicates so it can be compared
/// directly against what a prober currently holds.
pub fn cluster_seeds(local: &[Vec<String>], in_maintenance: &BTreeSet<String>) -> Vec<String> {
    local
        .iter()
        .flatten()
        .filter(|seed| !in_maintenance.contains(seed_pod_name(seed)))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Order-insensitive comparison of two seed lists
pub fn same_seeds(current: &[String], desired: &[String]) -> bool {
    let current: BTreeSet<&String> = current.iter().collect();
    let desired: BTreeSet<&String> = desired.iter().collect();
    current == desired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_of_all_dcs() {
        let local = vec![
            seeds(&["c-cassandra-dc1-0.c-cassandra-dc1.ns", "c-cassandra-dc1-1.c-cassandra-dc1.ns"]),
            seeds(&["c-cassandra-dc2-0.c-cassandra-dc2.ns"]),
            seeds(&["c-cassandra-dc1-0.c-cassandra-dc1.ns"]),
        ];
        let union = cluster_seeds(&local, &BTreeSet::new());
        assert_eq!(union.len(), 3);
        assert!(union.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_maintenance_pods_excluded() {
        let local = vec![seeds(&[
            "c-cassandra-dc1-0.c-cassandra-dc1.ns",
            "c-cassandra-dc1-1.c-cassandra-dc1.ns",
        ])];
        let maintenance = BTreeSet::from(["c-cassandra-dc1-1".to_string()]);

        assert_eq!(
            cluster_seeds(&local, &maintenance),
            seeds(&["c-cassandra-dc1-0.c-cassandra-dc1.ns"])
        );
    }

    #[test]
    fn test_empty_union() {
        assert!(cluster_seeds(&[vec![], vec![]], &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_same_seeds_ignores_order() {
        assert!(same_seeds(&seeds(&["b", "a"]), &seeds(&["a", "b"])));
        assert!(!same_seeds(&seeds(&["a"]), &seeds(&["a", "b"])));
    }
}

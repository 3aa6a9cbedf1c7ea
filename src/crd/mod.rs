//! Custom Resource Definitions for the Cassandra operator
//!
//! This module defines the `db.ibm.com/v1alpha1` CRDs: CassandraCluster and
//! CassandraBackup.

mod cassandra_backup;
mod cassandra_cluster;
pub mod types;


pub use cassandra_backup::{CassandraBackup, CassandraBackupSpec, CassandraBackupStatus};
pub use cassandra_cluster::{
    format_validation_errors, CassandraCluster, CassandraClusterSpec, CassandraClusterStatus,
    SpecValidationError,
};
pub use types::*;

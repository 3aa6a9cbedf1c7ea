//! CassandraCluster Custom Resource Definition
//!
//! A CassandraCluster describes a multi-datacenter Cassandra deployment: the
//! datacenters and their sizes, the admin and application roles, system
//! keyspace replication, Reaper repair schedules and an optional maintenance
//! overlay.

use std::collections::{BTreeMap, BTreeSet};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, Maintenance, Repair, SystemKeyspaces, DC};

/// Structured validation error for CRD specs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecValidationError {
    pub field: String,
    pub message: String,
    pub how_to_fix: String,
}

impl SpecValidationError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        how_to_fix: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            how_to_fix: how_to_fix.into(),
        }
    }
}

impl std::fmt::Display for SpecValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.how_to_fix)
    }
}

/// Join validation errors into one event-friendly message
pub fn format_validation_errors(errors: &[SpecValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "db.ibm.com",
    version = "v1alpha1",
    kind = "CassandraCluster",
    namespaced,
    status = "CassandraClusterStatus",
    shortname = "cc",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"DCs","type":"string","jsonPath":".spec.dcs[*].name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CassandraClusterSpec {
    pub dcs: Vec<DC>,

    /// Secret holding `admin-role` and `admin-password`
    pub admin_role_secret_name: String,

    /// Secret whose entries are role name -> `{"password":..,"login":..,"super":..}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles_secret_name: Option<String>,

    #[serde(default)]
    pub system_keyspaces: SystemKeyspaces,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repairs: Vec<Repair>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintenance: Vec<Maintenance>,
}

impl CassandraClusterSpec {
    /// Validate the spec before any sidecar is contacted
    pub fn validate(&self) -> Result<(), Vec<SpecValidationError>> {
        let mut errors = Vec::new();

        if self.dcs.is_empty() {
            errors.push(SpecValidationError::new(
                "spec.dcs",
                "At least one datacenter must be declared",
                "Add an entry such as {name: dc1, replicas: 3} to spec.dcs.",
            ));
        }

        let mut seen = BTreeSet::new();
        for (i, dc) in self.dcs.iter().enumerate() {
            if dc.name.is_empty() {
                errors.push(SpecValidationError::new(
                    format!("spec.dcs[{i}].name"),
                    "Datacenter name must not be empty",
                    "Give every datacenter a unique, DNS-compatible name.",
                ));
            } else if !seen.insert(dc.name.as_str()) {
                errors.push(SpecValidationError::new(
                    format!("spec.dcs[{i}].name"),
                    format!("Datacenter {} is declared more than once", dc.name),
                    "Remove the duplicate datacenter entry.",
                ));
            }
            if dc.replicas < 1 {
                errors.push(SpecValidationError::new(
                    format!("spec.dcs[{i}].replicas"),
                    "Datacenter replicas must be at least 1",
                    "Set replicas to a positive number.",
                ));
            }
        }

        if self.admin_role_secret_name.is_empty() {
            errors.push(SpecValidationError::new(
                "spec.adminRoleSecretName",
                "Admin role secret name must not be empty",
                "Point spec.adminRoleSecretName at a secret with admin-role and admin-password keys.",
            ));
        }

        for (i, ks) in self.system_keyspaces.dcs.iter().enumerate() {
            if ks.rf < 1 {
                errors.push(SpecValidationError::new(
                    format!("spec.systemKeyspaces.dcs[{i}].rf"),
                    "Replication factor must be at least 1",
                    "Set rf to a positive number or remove the override.",
                ));
            }
            match self.dc(&ks.name) {
                None => errors.push(SpecValidationError::new(
                    format!("spec.systemKeyspaces.dcs[{i}].name"),
                    format!("Datacenter {} is not declared in spec.dcs", ks.name),
                    "Reference one of the datacenters listed in spec.dcs.",
                )),
                Some(dc) if ks.rf > dc.replicas => errors.push(SpecValidationError::new(
                    format!("spec.systemKeyspaces.dcs[{i}].rf"),
                    format!(
                        "Replication factor {} exceeds the {} replicas of {}",
                        ks.rf, dc.replicas, dc.name
                    ),
                    "Lower rf or scale the datacenter up first.",
                )),
                Some(_) => {}
            }
        }

        for (i, repair) in self.repairs.iter().enumerate() {
            if repair.keyspace.is_empty() {
                errors.push(SpecValidationError::new(
                    format!("spec.repairs[{i}].keyspace"),
                    "Repair keyspace must not be empty",
                    "Name the keyspace the repair schedule applies to.",
                ));
            }
            if repair.schedule_days_between < 1 {
                errors.push(SpecValidationError::new(
                    format!("spec.repairs[{i}].scheduleDaysBetween"),
                    "scheduleDaysBetween must be at least 1",
                    "Use a cadence of one day or more.",
                ));
            }
            for dc in repair.datacenters.iter().filter(|dc| self.dc(dc).is_none()) {
                errors.push(SpecValidationError::new(
                    format!("spec.repairs[{i}].datacenters"),
                    format!("Datacenter {dc} is not declared in spec.dcs"),
                    "Only list datacenters declared in spec.dcs, or leave the list empty for all.",
                ));
            }
            if let Some(trigger) = &repair.schedule_trigger_time {
                if chrono::NaiveDateTime::parse_from_str(trigger, "%Y-%m-%dT%H:%M:%S").is_err() {
                    errors.push(SpecValidationError::new(
                        format!("spec.repairs[{i}].scheduleTriggerTime"),
                        format!("Invalid trigger time {trigger}"),
                        "Use the format YYYY-MM-DDThh:mm:ss, for example 2024-01-01T02:00:00.",
                    ));
                }
            }
        }

        for (i, m) in self.maintenance.iter().enumerate() {
            if self.dc(&m.dc).is_none() {
                errors.push(SpecValidationError::new(
                    format!("spec.maintenance[{i}].dc"),
                    format!("Datacenter {} is not declared in spec.dcs", m.dc),
                    "Reference one of the datacenters listed in spec.dcs.",
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn dc(&self, name: &str) -> Option<&DC> {
        self.dcs.iter().find(|dc| dc.name == name)
    }
}

/// Status subresource for CassandraCluster
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CassandraClusterStatus {
    /// True once every datacenter reports all datacenters ready and the
    /// roles, keyspaces and repairs have been reconciled
    #[serde(default)]
    pub ready: bool,

    /// Normalized maintenance overlay that is currently in effect
    #[serde(default)]
    pub maintenance_state: Vec<Maintenance>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl CassandraCluster {
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().map(|s| s.ready).unwrap_or(false)
    }

    /// Spec validation plus the checks that need the cluster name
    ///
    /// Maintenance pods must be pods of the datacenter they are listed under.
    pub fn validate(&self) -> Result<(), Vec<SpecValidationError>> {
        let mut errors = self.spec.validate().err().unwrap_or_default();

        for (i, m) in self.spec.maintenance.iter().enumerate() {
            let Some(dc) = self.spec.dc(&m.dc) else {
                continue;
            };
            for pod in m.pods.iter().filter(|pod| !self.is_dc_pod(dc, pod)) {
                errors.push(SpecValidationError::new(
                    format!("spec.maintenance[{i}].pods"),
                    format!("Pod {pod} is not a pod of datacenter {}", dc.name),
                    format!(
                        "List pods named {}-<ordinal> with an ordinal below {}.",
                        crate::controller::names::dc(self, &dc.name),
                        dc.replicas
                    ),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn is_dc_pod(&self, dc: &DC, pod: &str) -> bool {
        (0..dc.replicas).any(|i| crate::controller::names::pod(self, &dc.name, i) == pod)
    }

    /// Maintenance overlay with duplicates merged and whole-DC entries expanded
    ///
    /// Entries for undeclared datacenters and pods outside their datacenter
    /// are dropped. The result follows the order of `spec.dcs` and lists pods
    /// sorted.
    pub fn normalized_maintenance(&self) -> Vec<Maintenance> {
        let mut by_dc: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for m in &self.spec.maintenance {
            let Some(dc) = self.spec.dc(&m.dc) else {
                continue;
            };
            let pods = by_dc.entry(dc.name.as_str()).or_default();
            if m.pods.is_empty() {
                pods.extend((0..dc.replicas).map(|i| crate::controller::names::pod(self, &dc.name, i)));
            } else {
                pods.extend(m.pods.iter().filter(|pod| self.is_dc_pod(dc, pod)).cloned());
            }
        }

        self.spec
            .dcs
            .iter()
            .filter_map(|dc| {
                by_dc.remove(dc.name.as_str()).map(|pods| Maintenance {
                    dc: dc.name.clone(),
                    pods: pods.into_iter().collect(),
                })
            })
            .collect()
    }

    /// Pod names in maintenance across all datacenters
    pub fn pods_in_maintenance(&self) -> BTreeSet<String> {
        self.normalized_maintenance()
            .into_iter()
            .flat_map(|m| m.pods)
            .collect()
    }
}

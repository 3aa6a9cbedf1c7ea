//! CassandraCluster reconciliation engine
//!
//! A pass walks the cluster's dependency chain in order and stops at the
//! first step that cannot make progress:
//!
//! 1. every datacenter's seed prober answers `/ping`
//! 2. all probers hold the cluster-wide seed union
//! 3. each prober publishes its local DC readiness from the StatefulSet
//! 4. every prober reports all DCs ready (otherwise status goes not-ready)
//! 5. roles exist and match the declared secrets
//! 6. system keyspaces replicate to every declared DC
//! 7. Reaper knows the cluster and has every declared repair schedule
//! 8. status is published as ready
//!
//! Every mutating sidecar call is preceded by a read, so a pass over a
//! converged cluster performs reads only.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::conditions::{set_condition, CONDITION_TYPE_READY};
use super::events::{self, EventRecorder};
use super::keyspaces::{desired_replication, replication_matches};
use super::names;
use super::outcome::ReconcileOutcome;
use super::repairs::missing_schedules;
use super::roles::{admin_credentials, declared_roles, plan_roles_blocking, RoleAction};
use super::seeds::{cluster_seeds, same_seeds};
use super::store::ResourceStore;
use crate::clients::{CqlClient, Credentials, ProberClient, SidecarConnectors};
use crate::config::OperatorConfig;
use crate::crd::{format_validation_errors, CassandraCluster, CassandraClusterStatus};
use crate::error::{Error, Result};

/// Conditional status writes attempted before giving up on a pass
pub const STATUS_UPDATE_ATTEMPTS: usize = 3;

struct DcProber {
    name: String,
    replicas: i32,
    client: Arc<dyn ProberClient>,
}

pub struct ClusterReconciler {
    store: Arc<dyn ResourceStore>,
    events: Arc<dyn EventRecorder>,
    sidecars: SidecarConnectors,
    config: Arc<OperatorConfig>,
}

impl ClusterReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        events: Arc<dyn EventRecorder>,
        sidecars: SidecarConnectors,
        config: Arc<OperatorConfig>,
    ) -> Self {
        Self {
            store,
            events,
            sidecars,
            config,
        }
    }

    /// Run one pass for the cluster identified by `namespace`/`name`
    #[instrument(skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome> {
        let Some(cluster) = self.store.get_cluster(namespace, name).await? else {
            debug!("CassandraCluster {}/{} no longer exists", namespace, name);
            return Ok(ReconcileOutcome::Done);
        };

        match self.run_pass(&cluster).await {
            Err(e) if e.is_conflict() => {
                info!("CassandraCluster {}/{} changed during the pass: {}", namespace, name, e);
                Ok(ReconcileOutcome::RequeueNow)
            }
            Err(e) => {
                warn!("Reconciliation of {}/{} failed: {}", namespace, name, e);
                events::warning(self.events.as_ref(), &cluster, e.reason(), &e.to_string()).await;
                Err(e)
            }
            outcome => outcome,
        }
    }

    async fn run_pass(&self, cluster: &CassandraCluster) -> Result<ReconcileOutcome> {
        let retry = ReconcileOutcome::RequeueAfter(self.config.retry_delay);

        if let Err(errors) = cluster.validate() {
            let message = format_validation_errors(&errors);
            warn!("Invalid CassandraCluster spec: {}", message);
            events::warning(
                self.events.as_ref(),
                cluster,
                events::REASON_INVALID_SPEC,
                &message,
            )
            .await;
            return Ok(retry);
        }

        let probers = self.probers(cluster);

        let unreachable = unreachable_dcs(&probers).await;
        if !unreachable.is_empty() {
            let message = format!(
                "Seed prober not reachable for DCs: {}",
                unreachable.join(", ")
            );
            info!("{}", message);
            events::warning(
                self.events.as_ref(),
                cluster,
                events::REASON_SIDECAR_UNREACHABLE,
                &message,
            )
            .await;
            return Ok(retry);
        }

        let seeds = self.sync_seeds(cluster, &probers).await?;
        self.sync_local_dc_status(cluster, &probers).await?;

        let not_ready = dcs_not_ready(&probers).await?;
        let all_ready = not_ready.is_empty();
        if !all_ready {
            let message = format!("Waiting for DCs to become ready: {}", not_ready.join(", "));
            info!("{}", message);
            self.publish_status(cluster, false, events::REASON_DCS_NOT_READY, &message)
                .await?;
        }

        let Some(admin) = self.admin_credentials(cluster).await? else {
            return Ok(retry);
        };
        let Some(roles_secret) = self.roles_secret(cluster).await? else {
            return Ok(retry);
        };
        let roles = match declared_roles(&admin, roles_secret.as_ref()) {
            Ok(roles) => roles,
            Err(e) => {
                events::warning(
                    self.events.as_ref(),
                    cluster,
                    events::REASON_CREDENTIALS_INVALID,
                    &e.to_string(),
                )
                .await;
                return Ok(retry);
            }
        };

        // The CQL endpoint is expected to be down while DCs are still joining.
        let cql = match self.connect_cql(cluster, &admin).await {
            Ok(cql) => cql,
            Err(e) if !all_ready => {
                info!("CQL not reachable yet, DCs still converging: {}", e);
                return Ok(retry);
            }
            Err(e) => return Err(e),
        };
        self.sync_roles(cluster, cql.as_ref(), &roles).await?;
        self.sync_keyspaces(cluster, cql.as_ref()).await?;

        if !all_ready {
            return Ok(retry);
        }

        if !self.sync_repairs(cluster, &seeds).await? {
            return Ok(retry);
        }

        let became_ready = self
            .publish_status(
                cluster,
                true,
                events::REASON_CLUSTER_READY,
                "All datacenters are ready",
            )
            .await?
            && !cluster.is_ready();
        if became_ready {
            events::normal(
                self.events.as_ref(),
                cluster,
                events::REASON_CLUSTER_READY,
                "All datacenters are ready",
            )
            .await;
        }

        Ok(ReconcileOutcome::RequeueAfter(self.config.resync_period))
    }

    fn probers(&self, cluster: &CassandraCluster) -> Vec<DcProber> {
        cluster
            .spec
            .dcs
            .iter()
            .map(|dc| DcProber {
                name: dc.name.clone(),
                replicas: dc.replicas,
                client: self.sidecars.prober.connect(&names::prober_url(
                    cluster,
                    &dc.name,
                    self.config.ports.prober,
                )),
            })
            .collect()
    }

    /// Push the seed union to every prober that does not hold it yet
    async fn sync_seeds(
        &self,
        cluster: &CassandraCluster,
        probers: &[DcProber],
    ) -> Result<Vec<String>> {
        let local = try_join_all(probers.iter().map(|p| p.client.local_seeds())).await?;
        let desired = cluster_seeds(&local, &cluster.pods_in_maintenance());

        let updated = try_join_all(probers.iter().map(|p| {
            let desired = &desired;
            async move {
                let current = p.client.seeds().await?;
                if same_seeds(&current, desired) {
                    return Ok::<_, Error>(None);
                }
                debug!("DC {} holds seeds {:?}, pushing {:?}", p.name, current, desired);
                p.client.update_seeds(desired).await?;
                Ok(Some(p.name.clone()))
            }
        }))
        .await?;

        let updated: Vec<String> = updated.into_iter().flatten().collect();
        if !updated.is_empty() {
            let message = format!(
                "Updated seeds of DCs {} to {}",
                updated.join(", "),
                desired.join(", ")
            );
            info!("{}", message);
            events::normal(
                self.events.as_ref(),
                cluster,
                events::REASON_SEEDS_UPDATED,
                &message,
            )
            .await;
        }
        Ok(desired)
    }

    /// Publish each DC's own readiness, derived from its StatefulSet
    ///
    /// A DC wholly in maintenance keeps whatever flag it last published.
    async fn sync_local_dc_status(
        &self,
        cluster: &CassandraCluster,
        probers: &[DcProber],
    ) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let maintenance = cluster.normalized_maintenance();

        for p in probers {
            let in_maintenance = maintenance
                .iter()
                .find(|m| m.dc == p.name)
                .map(|m| m.pods.len() as i32)
                .unwrap_or(0);
            let required = p.replicas - in_maintenance.min(p.replicas);
            if required == 0 {
                debug!("DC {} is entirely in maintenance", p.name);
                continue;
            }

            let ready_replicas = self
                .store
                .statefulset_ready_replicas(&namespace, &names::dc(cluster, &p.name))
                .await?;
            let ready = ready_replicas.map(|r| r >= required).unwrap_or(false);

            if p.client.local_dc_ready().await? != ready {
                debug!("Setting DC {} readiness to {}", p.name, ready);
                p.client.update_dc_status(ready).await?;
            }
        }
        Ok(())
    }

    async fn admin_credentials(&self, cluster: &CassandraCluster) -> Result<Option<Credentials>> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let secret_name = &cluster.spec.admin_role_secret_name;

        let Some(secret) = self.store.get_secret(&namespace, secret_name).await? else {
            let message = format!("Admin role secret {secret_name} not found");
            warn!("{}", message);
            events::warning(
                self.events.as_ref(),
                cluster,
                events::REASON_ADMIN_SECRET_NOT_FOUND,
                &message,
            )
            .await;
            return Ok(None);
        };

        match admin_credentials(&secret) {
            Ok(creds) => Ok(Some(creds)),
            Err(e) => {
                events::warning(
                    self.events.as_ref(),
                    cluster,
                    events::REASON_CREDENTIALS_INVALID,
                    &e.to_string(),
                )
                .await;
                Ok(None)
            }
        }
    }

    /// `Some(None)` when no roles secret is declared, `None` when it is missing
    async fn roles_secret(
        &self,
        cluster: &CassandraCluster,
    ) -> Result<Option<Option<Secret>>> {
        let Some(secret_name) = cluster.spec.roles_secret_name.as_deref() else {
            return Ok(Some(None));
        };
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        match self.store.get_secret(&namespace, secret_name).await? {
            Some(secret) => Ok(Some(Some(secret))),
            None => {
                let message = format!("Roles secret {secret_name} not found");
                warn!("{}", message);
                events::warning(
                    self.events.as_ref(),
                    cluster,
                    events::REASON_ROLES_SECRET_NOT_FOUND,
                    &message,
                )
                .await;
                Ok(None)
            }
        }
    }

    /// Connect as the admin role, falling back to the bootstrap defaults
    async fn connect_cql(
        &self,
        cluster: &CassandraCluster,
        admin: &Credentials,
    ) -> Result<Arc<dyn CqlClient>> {
        let contact_points = names::cql_contact_points(cluster, self.config.ports.cql);
        match self.sidecars.cql.connect(&contact_points, admin).await {
            Ok(client) => Ok(client),
            Err(admin_err) => {
                debug!(
                    "Admin login failed ({}), trying default credentials",
                    admin_err
                );
                self.sidecars
                    .cql
                    .connect(&contact_points, &Credentials::cassandra_default())
                    .await
                    .map_err(|_| Error::Sidecar(admin_err))
            }
        }
    }

    async fn sync_roles(
        &self,
        cluster: &CassandraCluster,
        cql: &dyn CqlClient,
        roles: &[crate::clients::Role],
    ) -> Result<()> {
        let live = cql.roles().await?;
        for action in plan_roles_blocking(roles.to_vec(), live).await? {
            match action {
                RoleAction::Create(role) => {
                    info!("Creating role {}", role.name);
                    cql.create_role(&role).await?;
                    events::normal(
                        self.events.as_ref(),
                        cluster,
                        events::REASON_ROLE_CREATED,
                        &format!("Created role {}", role.name),
                    )
                    .await;
                }
                RoleAction::Update(role) => {
                    info!("Updating role {}", role.name);
                    cql.update_role(&role).await?;
                    events::normal(
                        self.events.as_ref(),
                        cluster,
                        events::REASON_ROLE_UPDATED,
                        &format!("Updated role {}", role.name),
                    )
                    .await;
                }
            }
        }
        Ok(())
    }

    async fn sync_keyspaces(&self, cluster: &CassandraCluster, cql: &dyn CqlClient) -> Result<()> {
        let desired = desired_replication(&cluster.spec);
        let live = cql.keyspaces().await?;

        for name in cluster.spec.system_keyspaces.keyspace_names() {
            let Some(keyspace) = live.iter().find(|k| k.name == name) else {
                debug!("Keyspace {} does not exist, skipping", name);
                continue;
            };
            if replication_matches(&keyspace.replication, &desired) {
                continue;
            }
            info!("Updating replication of {} to {:?}", name, desired);
            cql.update_replication(&name, &desired).await?;
            events::normal(
                self.events.as_ref(),
                cluster,
                events::REASON_REPLICATION_UPDATED,
                &format!("Set replication of {name} to {desired:?}"),
            )
            .await;
        }
        Ok(())
    }

    /// Register the cluster with Reaper and add missing schedules
    ///
    /// Returns `false` when Reaper is not available yet.
    async fn sync_repairs(&self, cluster: &CassandraCluster, seeds: &[String]) -> Result<bool> {
        let reaper = self
            .sidecars
            .reaper
            .connect(&names::reaper_url(cluster, self.config.ports.reaper));

        let running = match reaper.is_running().await {
            Ok(running) => running,
            Err(e) if e.is_unreachable() => false,
            Err(e) => return Err(e.into()),
        };
        if !running {
            let message = "Waiting for Reaper to become available".to_string();
            info!("{}", message);
            events::warning(
                self.events.as_ref(),
                cluster,
                events::REASON_REAPER_NOT_RUNNING,
                &message,
            )
            .await;
            if cluster.is_ready() {
                // Stays ready; the maintenance overlay still follows the spec.
                self.publish_status(
                    cluster,
                    true,
                    events::REASON_CLUSTER_READY,
                    "All datacenters are ready",
                )
                .await?;
            } else {
                self.publish_status(cluster, false, events::REASON_REAPER_NOT_RUNNING, &message)
                    .await?;
            }
            return Ok(false);
        }

        let cluster_name = cluster.name_any();
        if !reaper.cluster_exists(&cluster_name).await? {
            let seed = seeds
                .first()
                .cloned()
                .or_else(|| {
                    cluster
                        .spec
                        .dcs
                        .first()
                        .map(|dc| names::dc_host(cluster, &dc.name))
                })
                .unwrap_or_default();
            reaper.add_cluster(&cluster_name, &seed).await?;
            events::normal(
                self.events.as_ref(),
                cluster,
                events::REASON_REAPER_CLUSTER_REGISTERED,
                &format!("Registered cluster with Reaper using seed {seed}"),
            )
            .await;
        }

        if cluster.spec.repairs.is_empty() {
            return Ok(true);
        }

        let existing = reaper.repair_schedules(&cluster_name).await?;
        for repair in missing_schedules(&cluster.spec.repairs, &existing) {
            reaper.create_repair_schedule(&cluster_name, repair).await?;
            events::normal(
                self.events.as_ref(),
                cluster,
                events::REASON_REPAIR_SCHEDULED,
                &format!("Created repair schedule for keyspace {}", repair.keyspace),
            )
            .await;
        }
        Ok(true)
    }

    /// Conditionally write the status; returns whether anything was written
    ///
    /// The object is re-read before every attempt and the write is skipped
    /// when the stored status already matches.
    async fn publish_status(
        &self,
        cluster: &CassandraCluster,
        ready: bool,
        reason: &str,
        message: &str,
    ) -> Result<bool> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let name = cluster.name_any();

        for attempt in 1..=STATUS_UPDATE_ATTEMPTS {
            let Some(latest) = self.store.get_cluster(&namespace, &name).await? else {
                return Ok(false);
            };
            if latest.metadata.generation != cluster.metadata.generation {
                return Err(Error::Conflict(format!(
                    "CassandraCluster {namespace}/{name} spec changed"
                )));
            }

            let desired = desired_status(&latest, ready, reason, message);
            if latest.status.as_ref() == Some(&desired) {
                return Ok(false);
            }

            match self.store.update_cluster_status(&latest, &desired).await {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    super::metrics::set_cluster_ready(&namespace, &name, ready);
                    return Ok(true);
                }
                Err(e) if e.is_conflict() => {
                    debug!("Status write attempt {} conflicted: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict(format!(
            "CassandraCluster {namespace}/{name} status"
        )))
    }
}

fn desired_status(
    latest: &CassandraCluster,
    ready: bool,
    reason: &str,
    message: &str,
) -> CassandraClusterStatus {
    let generation = latest.metadata.generation;
    let mut status = latest.status.clone().unwrap_or_default();
    status.ready = ready;
    status.maintenance_state = latest.normalized_maintenance();
    status.observed_generation = generation;
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        ready,
        reason,
        message,
        generation,
    );
    status
}

async fn unreachable_dcs(probers: &[DcProber]) -> Vec<String> {
    let results = join_all(probers.iter().map(|p| p.client.ready())).await;
    probers
        .iter()
        .zip(results)
        .filter(|(_, ready)| !matches!(ready, Ok(true)))
        .map(|(p, _)| p.name.clone())
        .collect()
}

async fn dcs_not_ready(probers: &[DcProber]) -> Result<Vec<String>> {
    let results = try_join_all(probers.iter().map(|p| p.client.dcs_ready())).await?;
    Ok(probers
        .iter()
        .zip(results)
        .filter(|(_, ready)| !ready)
        .map(|(p, _)| p.name.clone())
        .collect())
}

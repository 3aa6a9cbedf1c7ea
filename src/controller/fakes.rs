//! In-memory fakes of the store, event recorder and sidecars
//!
//! Used by the reconciler tests to drive full passes without a cluster.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use k8s_openapi::ByteString;
use kube::ResourceExt;

use super::backup::BackupReconciler;
use super::cluster::ClusterReconciler;
use super::events::{EventRecorder, EventType};
use super::names;
use super::roles::{ADMIN_PASSWORD_KEY, ADMIN_ROLE_KEY};
use super::store::ResourceStore;
use crate::clients::{
    BackupCoordinatorClient, BackupCoordinatorConnector, BackupOperation, BackupRequest,
    ClientError, CqlClient, CqlConnector, Credentials, Keyspace, LiveRole, OperationState,
    ProberClient, ProberConnector, ReaperClient, ReaperConnector, RepairScheduleInfo, Role,
    SidecarConnectors,
};
use crate::config::OperatorConfig;
use crate::crd::{
    CassandraBackup, CassandraBackupSpec, CassandraBackupStatus, CassandraCluster,
    CassandraClusterSpec, CassandraClusterStatus, Repair, SystemKeyspaces, DC,
};
use crate::error::{Error, Result};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn unreachable(target: &str) -> ClientError {
    ClientError::transport(target, "connection refused")
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    clusters: Mutex<BTreeMap<Key, CassandraCluster>>,
    backups: Mutex<BTreeMap<Key, CassandraBackup>>,
    secrets: Mutex<BTreeMap<Key, Secret>>,
    statefulsets: Mutex<BTreeMap<Key, i32>>,
    version: AtomicU64,
    /// Status writes that fail with a conflict after a simulated concurrent write
    pub conflicts_to_inject: AtomicUsize,
    pub status_writes: AtomicUsize,
}

impl MemoryStore {
    fn next_version(&self) -> Option<String> {
        Some((self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string())
    }

    pub fn put_cluster(&self, mut cluster: CassandraCluster) {
        cluster.metadata.resource_version = self.next_version();
        let k = key(&cluster.namespace().unwrap_or_default(), &cluster.name_any());
        self.clusters.lock().unwrap().insert(k, cluster);
    }

    pub fn cluster(&self, namespace: &str, name: &str) -> CassandraCluster {
        self.clusters.lock().unwrap()[&key(namespace, name)].clone()
    }

    /// Apply a spec edit the way the API server would: bump the generation
    pub fn edit_cluster(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut CassandraCluster)) {
        let mut cluster = self.cluster(namespace, name);
        edit(&mut cluster);
        cluster.metadata.generation = cluster.metadata.generation.map(|g| g + 1);
        self.put_cluster(cluster);
    }

    pub fn put_backup(&self, mut backup: CassandraBackup) {
        backup.metadata.resource_version = self.next_version();
        let k = key(&backup.namespace().unwrap_or_default(), &backup.name_any());
        self.backups.lock().unwrap().insert(k, backup);
    }

    pub fn backup(&self, namespace: &str, name: &str) -> CassandraBackup {
        self.backups.lock().unwrap()[&key(namespace, name)].clone()
    }

    pub fn put_secret(&self, namespace: &str, secret: Secret) {
        let k = key(namespace, &secret.name_any());
        self.secrets.lock().unwrap().insert(k, secret);
    }

    pub fn set_ready_replicas(&self, namespace: &str, statefulset: &str, ready: i32) {
        self.statefulsets
            .lock()
            .unwrap()
            .insert(key(namespace, statefulset), ready);
    }

    pub fn writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn take_injected_conflict(&self) -> bool {
        self.conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<CassandraCluster>> {
        Ok(self.clusters.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn list_clusters(&self, namespace: Option<&str>) -> Result<Vec<CassandraCluster>> {
        Ok(self
            .clusters
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| namespace.map(|n| n == ns).unwrap_or(true))
            .map(|(_, cc)| cc.clone())
            .collect())
    }

    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Option<CassandraBackup>> {
        Ok(self.backups.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secrets.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn statefulset_ready_replicas(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<i32>> {
        Ok(self
            .statefulsets
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .copied())
    }

    async fn update_cluster_status(
        &self,
        cluster: &CassandraCluster,
        status: &CassandraClusterStatus,
    ) -> Result<()> {
        let k = key(&cluster.namespace().unwrap_or_default(), &cluster.name_any());
        let mut clusters = self.clusters.lock().unwrap();
        let stored = clusters
            .get_mut(&k)
            .ok_or_else(|| Error::ValidationError("cluster not found".to_string()))?;

        if stored.metadata.resource_version != cluster.metadata.resource_version {
            return Err(Error::Conflict(cluster.name_any()));
        }
        if self.take_injected_conflict() {
            stored.metadata.resource_version = self.next_version();
            return Err(Error::Conflict(cluster.name_any()));
        }

        stored.status = Some(status.clone());
        stored.metadata.resource_version = self.next_version();
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_backup_status(
        &self,
        backup: &CassandraBackup,
        status: &CassandraBackupStatus,
    ) -> Result<()> {
        let k = key(&backup.namespace().unwrap_or_default(), &backup.name_any());
        let mut backups = self.backups.lock().unwrap();
        let stored = backups
            .get_mut(&k)
            .ok_or_else(|| Error::ValidationError("backup not found".to_string()))?;

        if stored.metadata.resource_version != backup.metadata.resource_version {
            return Err(Error::Conflict(backup.name_any()));
        }
        if self.take_injected_conflict() {
            stored.metadata.resource_version = self.next_version();
            return Err(Error::Conflict(backup.name_any()));
        }

        stored.status = Some(status.clone());
        stored.metadata.resource_version = self.next_version();
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub type_: EventType,
    pub reason: String,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }

    pub fn has(&self, reason: &str) -> bool {
        self.reasons().iter().any(|r| r == reason)
    }

    pub fn find(&self, reason: &str) -> Option<RecordedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.reason == reason)
            .cloned()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventRecorder for RecordingEvents {
    async fn record(
        &self,
        _object: &ObjectReference,
        type_: EventType,
        reason: &str,
        message: &str,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            type_,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Seed prober
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ProberState {
    pub reachable: bool,
    pub local_seeds: Vec<String>,
    pub seeds: Vec<String>,
    pub local_dc_ready: bool,
    pub dcs_ready: bool,
    pub seed_updates: usize,
    pub status_updates: usize,
}

#[derive(Default)]
pub struct FakeProber {
    pub state: Mutex<ProberState>,
}

impl FakeProber {
    fn check(&self) -> std::result::Result<(), ClientError> {
        if self.state.lock().unwrap().reachable {
            Ok(())
        } else {
            Err(unreachable("prober"))
        }
    }

    pub fn mutations(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.seed_updates + state.status_updates
    }
}

#[async_trait]
impl ProberClient for FakeProber {
    async fn ready(&self) -> crate::clients::Result<bool> {
        self.check().map(|_| true)
    }

    async fn local_seeds(&self) -> crate::clients::Result<Vec<String>> {
        self.check()?;
        Ok(self.state.lock().unwrap().local_seeds.clone())
    }

    async fn seeds(&self) -> crate::clients::Result<Vec<String>> {
        self.check()?;
        Ok(self.state.lock().unwrap().seeds.clone())
    }

    async fn update_seeds(&self, seeds: &[String]) -> crate::clients::Result<()> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.seeds = seeds.to_vec();
        state.seed_updates += 1;
        Ok(())
    }

    async fn local_dc_ready(&self) -> crate::clients::Result<bool> {
        self.check()?;
        Ok(self.state.lock().unwrap().local_dc_ready)
    }

    async fn update_dc_status(&self, ready: bool) -> crate::clients::Result<()> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.local_dc_ready = ready;
        state.status_updates += 1;
        Ok(())
    }

    async fn dcs_ready(&self) -> crate::clients::Result<bool> {
        self.check()?;
        Ok(self.state.lock().unwrap().dcs_ready)
    }
}

/// Hands out one [`FakeProber`] per base URL
#[derive(Default)]
pub struct FakeProberConnector {
    probers: Mutex<BTreeMap<String, Arc<FakeProber>>>,
}

impl FakeProberConnector {
    pub fn prober(&self, base_url: &str) -> Arc<FakeProber> {
        self.probers
            .lock()
            .unwrap()
            .entry(base_url.to_string())
            .or_default()
            .clone()
    }

    pub fn total_calls(&self) -> usize {
        self.probers
            .lock()
            .unwrap()
            .values()
            .map(|p| p.mutations())
            .sum()
    }
}

impl ProberConnector for FakeProberConnector {
    fn connect(&self, base_url: &str) -> Arc<dyn ProberClient> {
        self.prober(base_url)
    }
}

// ---------------------------------------------------------------------------
// CQL
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CqlState {
    pub reachable: bool,
    pub roles: Vec<LiveRole>,
    pub keyspaces: Vec<Keyspace>,
    pub mutations: Vec<String>,
    pub logins: Vec<String>,
}

/// A fake Cassandra that authenticates against its own role table
#[derive(Default)]
pub struct FakeCql {
    pub state: Arc<Mutex<CqlState>>,
}

impl FakeCql {
    /// A freshly bootstrapped cluster: default superuser and SimpleStrategy system_auth
    pub fn bootstrapped() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.reachable = true;
            state.roles.push(live_role("cassandra", "cassandra", true, true));
            state.keyspaces.push(Keyspace {
                name: "system_auth".to_string(),
                replication: BTreeMap::from([
                    (
                        "class".to_string(),
                        "org.apache.cassandra.locator.SimpleStrategy".to_string(),
                    ),
                    ("replication_factor".to_string(), "1".to_string()),
                ]),
            });
        }
        fake
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn role(&self, name: &str) -> Option<LiveRole> {
        self.state
            .lock()
            .unwrap()
            .roles
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    pub fn replication(&self, keyspace: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .keyspaces
            .iter()
            .find(|k| k.name == keyspace)
            .map(|k| k.replication.clone())
            .unwrap_or_default()
    }
}

pub fn live_role(name: &str, password: &str, super_user: bool, login: bool) -> LiveRole {
    LiveRole {
        name: name.to_string(),
        super_user,
        login,
        salted_hash: Some(bcrypt::hash(password, 4).expect("bcrypt hash")),
    }
}

struct FakeCqlSession {
    state: Arc<Mutex<CqlState>>,
}

#[async_trait]
impl CqlConnector for FakeCql {
    async fn connect(
        &self,
        _contact_points: &[String],
        credentials: &Credentials,
    ) -> crate::clients::Result<Arc<dyn CqlClient>> {
        let mut state = self.state.lock().unwrap();
        if !state.reachable {
            return Err(unreachable("cql"));
        }
        let authenticated = state.roles.iter().any(|r| {
            r.name == credentials.username
                && r.login
                && r.salted_hash
                    .as_deref()
                    .map(|h| bcrypt::verify(&credentials.password, h).unwrap_or(false))
                    .unwrap_or(false)
        });
        if !authenticated {
            return Err(ClientError::Query(format!(
                "Provided username {} and/or password are incorrect",
                credentials.username
            )));
        }
        state.logins.push(credentials.username.clone());
        Ok(Arc::new(FakeCqlSession {
            state: self.state.clone(),
        }))
    }
}

#[async_trait]
impl CqlClient for FakeCqlSession {
    async fn roles(&self) -> crate::clients::Result<Vec<LiveRole>> {
        Ok(self.state.lock().unwrap().roles.clone())
    }

    async fn create_role(&self, role: &Role) -> crate::clients::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.roles.push(live_role(&role.name, &role.password, role.super_user, role.login));
        state.mutations.push(format!("create:{}", role.name));
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> crate::clients::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.roles.retain(|r| r.name != role.name);
        state.roles.push(live_role(&role.name, &role.password, role.super_user, role.login));
        state.mutations.push(format!("update:{}", role.name));
        Ok(())
    }

    async fn keyspaces(&self) -> crate::clients::Result<Vec<Keyspace>> {
        Ok(self.state.lock().unwrap().keyspaces.clone())
    }

    async fn update_replication(
        &self,
        keyspace: &str,
        replication: &BTreeMap<String, i32>,
    ) -> crate::clients::Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut options = BTreeMap::from([(
            "class".to_string(),
            "org.apache.cassandra.locator.NetworkTopologyStrategy".to_string(),
        )]);
        options.extend(replication.iter().map(|(dc, rf)| (dc.clone(), rf.to_string())));
        if let Some(ks) = state.keyspaces.iter_mut().find(|k| k.name == keyspace) {
            ks.replication = options;
        }
        state.mutations.push(format!("replicate:{keyspace}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ReaperState {
    pub running: bool,
    pub clusters: BTreeMap<String, String>,
    pub schedules: Vec<RepairScheduleInfo>,
    pub mutations: Vec<String>,
    pub urls: Vec<String>,
}

#[derive(Default)]
pub struct FakeReaper {
    pub state: Arc<Mutex<ReaperState>>,
}

impl FakeReaper {
    pub fn running() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().running = true;
        fake
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }
}

struct FakeReaperClient {
    state: Arc<Mutex<ReaperState>>,
}

impl ReaperConnector for FakeReaper {
    fn connect(&self, base_url: &str) -> Arc<dyn ReaperClient> {
        self.state.lock().unwrap().urls.push(base_url.to_string());
        Arc::new(FakeReaperClient {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl ReaperClient for FakeReaperClient {
    async fn is_running(&self) -> crate::clients::Result<bool> {
        Ok(self.state.lock().unwrap().running)
    }

    async fn cluster_exists(&self, cluster: &str) -> crate::clients::Result<bool> {
        Ok(self.state.lock().unwrap().clusters.contains_key(cluster))
    }

    async fn add_cluster(&self, cluster: &str, seed_host: &str) -> crate::clients::Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .clusters
            .insert(cluster.to_string(), seed_host.to_string());
        state.mutations.push(format!("add:{cluster}"));
        Ok(())
    }

    async fn repair_schedules(
        &self,
        _cluster: &str,
    ) -> crate::clients::Result<Vec<RepairScheduleInfo>> {
        Ok(self.state.lock().unwrap().schedules.clone())
    }

    async fn create_repair_schedule(
        &self,
        _cluster: &str,
        repair: &Repair,
    ) -> crate::clients::Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = format!("schedule-{}", state.schedules.len() + 1);
        state.schedules.push(RepairScheduleInfo {
            id,
            keyspace_name: repair.keyspace.clone(),
            column_families: repair.tables.clone(),
            datacenters: repair.datacenters.clone(),
            scheduled_days_between: repair.schedule_days_between,
            state: "ACTIVE".to_string(),
            owner: crate::clients::REPAIR_OWNER.to_string(),
        });
        state.mutations.push(format!("schedule:{}", repair.keyspace));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Backup coordinator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CoordinatorState {
    pub operations: Vec<BackupOperation>,
    pub submissions: Vec<BackupRequest>,
    pub urls: Vec<String>,
    pub calls: usize,
}

#[derive(Default)]
pub struct FakeCoordinator {
    pub state: Arc<Mutex<CoordinatorState>>,
}

impl FakeCoordinator {
    pub fn set_operation_state(&self, id: &str, state: OperationState, progress: f64) {
        let mut s = self.state.lock().unwrap();
        if let Some(op) = s.operations.iter_mut().find(|op| op.id == id) {
            op.state = state;
            op.progress = progress;
        }
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions.len()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

struct FakeCoordinatorClient {
    state: Arc<Mutex<CoordinatorState>>,
}

impl BackupCoordinatorConnector for FakeCoordinator {
    fn connect(&self, base_url: &str) -> Arc<dyn BackupCoordinatorClient> {
        self.state.lock().unwrap().urls.push(base_url.to_string());
        Arc::new(FakeCoordinatorClient {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl BackupCoordinatorClient for FakeCoordinatorClient {
    async fn backups(&self) -> crate::clients::Result<Vec<BackupOperation>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        Ok(state.operations.clone())
    }

    async fn backup(&self, id: &str) -> crate::clients::Result<Option<BackupOperation>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        Ok(state.operations.iter().find(|op| op.id == id).cloned())
    }

    async fn submit_backup(
        &self,
        request: &BackupRequest,
    ) -> crate::clients::Result<BackupOperation> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let op = BackupOperation {
            id: format!("op-{}", state.operations.len() + 1),
            state: OperationState::Pending,
            progress: 0.0,
            storage_location: request.storage_location.clone(),
            snapshot_tag: request.snapshot_tag.clone(),
        };
        state.operations.push(op.clone());
        state.submissions.push(request.clone());
        Ok(op)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const NAMESPACE: &str = "default";
pub const ADMIN_SECRET: &str = "admin-role";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEvents>,
    pub probers: Arc<FakeProberConnector>,
    pub cql: Arc<FakeCql>,
    pub reaper: Arc<FakeReaper>,
    pub coordinator: Arc<FakeCoordinator>,
    pub config: Arc<OperatorConfig>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            events: Arc::new(RecordingEvents::default()),
            probers: Arc::new(FakeProberConnector::default()),
            cql: Arc::new(FakeCql::bootstrapped()),
            reaper: Arc::new(FakeReaper::running()),
            coordinator: Arc::new(FakeCoordinator::default()),
            config: Arc::new(OperatorConfig {
                retry_delay: Duration::from_secs(5),
                resync_period: Duration::from_secs(30),
                ..OperatorConfig::default()
            }),
        }
    }

    fn sidecars(&self) -> SidecarConnectors {
        SidecarConnectors {
            prober: self.probers.clone(),
            cql: self.cql.clone(),
            reaper: self.reaper.clone(),
            backup_coordinator: self.coordinator.clone(),
        }
    }

    pub fn cluster_reconciler(&self) -> ClusterReconciler {
        ClusterReconciler::new(
            self.store.clone(),
            self.events.clone(),
            self.sidecars(),
            self.config.clone(),
        )
    }

    pub fn backup_reconciler(&self) -> BackupReconciler {
        BackupReconciler::new(
            self.store.clone(),
            self.events.clone(),
            self.sidecars(),
            self.config.clone(),
        )
    }

    pub fn prober(&self, cluster: &CassandraCluster, dc: &str) -> Arc<FakeProber> {
        self.probers
            .prober(&names::prober_url(cluster, dc, self.config.ports.prober))
    }

    /// Store a cluster along with its admin secret and fully ready StatefulSets
    pub fn install_cluster(&self, cluster: &CassandraCluster) {
        self.store
            .put_secret(NAMESPACE, admin_secret(ADMIN_SECRET, "admin", "admin-password"));
        for dc in &cluster.spec.dcs {
            self.store
                .set_ready_replicas(NAMESPACE, &names::dc(cluster, &dc.name), dc.replicas);
        }
        self.store.put_cluster(cluster.clone());
    }

    /// Make every DC's prober reachable with its pods as local seeds
    pub fn probers_up(&self, cluster: &CassandraCluster, dcs_ready: bool) {
        for dc in &cluster.spec.dcs {
            let prober = self.prober(cluster, &dc.name);
            let mut state = prober.state.lock().unwrap();
            state.reachable = true;
            state.dcs_ready = dcs_ready;
            state.local_seeds = (0..dc.replicas.min(2))
                .map(|i| {
                    format!(
                        "{}.{}.{}.svc.cluster.local",
                        names::pod(cluster, &dc.name, i),
                        names::dc(cluster, &dc.name),
                        NAMESPACE
                    )
                })
                .collect();
        }
    }

    /// Bring every dependency up and run passes until the cluster is ready
    pub async fn converge(&self, cluster: &CassandraCluster) {
        self.probers_up(cluster, true);
        let reconciler = self.cluster_reconciler();
        for _ in 0..3 {
            reconciler
                .reconcile(NAMESPACE, &cluster.name_any())
                .await
                .expect("pass should succeed");
        }
        assert!(self.store.cluster(NAMESPACE, &cluster.name_any()).is_ready());
    }
}

pub fn admin_secret(name: &str, role: &str, password: &str) -> Secret {
    secret(name, &[(ADMIN_ROLE_KEY, role), (ADMIN_PASSWORD_KEY, password)])
}

pub fn secret(name: &str, entries: &[(&str, &str)]) -> Secret {
    let mut secret = Secret {
        data: Some(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    };
    secret.metadata.name = Some(name.to_string());
    secret.metadata.namespace = Some(NAMESPACE.to_string());
    secret
}

pub fn test_cluster(name: &str, dcs: &[(&str, i32)]) -> CassandraCluster {
    let mut cluster = CassandraCluster::new(
        name,
        CassandraClusterSpec {
            dcs: dcs
                .iter()
                .map(|(n, r)| DC {
                    name: n.to_string(),
                    replicas: *r,
                })
                .collect(),
            admin_role_secret_name: ADMIN_SECRET.to_string(),
            roles_secret_name: None,
            system_keyspaces: SystemKeyspaces::default(),
            repairs: vec![],
            maintenance: vec![],
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.to_string());
    cluster.metadata.generation = Some(1);
    cluster
}

pub fn test_backup(name: &str, cluster: &str) -> CassandraBackup {
    let mut backup = CassandraBackup::new(
        name,
        CassandraBackupSpec {
            cassandra_cluster: cluster.to_string(),
            storage_location: "s3://backups/test".to_string(),
            secret_name: "backup-creds".to_string(),
            snapshot_tag: None,
            datacenter: None,
            entities: None,
            duration: None,
            bandwidth: None,
            concurrent_connections: None,
            create_missing_bucket: false,
        },
    );
    backup.metadata.namespace = Some(NAMESPACE.to_string());
    backup.metadata.generation = Some(1);
    backup
}

//! CQL administration client
//!
//! Reads and writes roles in `system_auth.roles` and keyspace replication in
//! `system_schema.keyspaces`. The production implementation uses the
//! `scylla` driver, which speaks the native Cassandra protocol.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scylla::{Session, SessionBuilder};
use tracing::debug;

use super::{ClientError, Result};

pub const NETWORK_TOPOLOGY_STRATEGY: &str = "NetworkTopologyStrategy";

/// Username and password for a CQL session
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials every fresh Cassandra cluster starts with
    pub fn cassandra_default() -> Self {
        Self::new("cassandra", "cassandra")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Role as declared in the cluster's secrets
#[derive(Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub password: String,
    pub super_user: bool,
    pub login: bool,
}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.name)
            .field("super_user", &self.super_user)
            .field("login", &self.login)
            .finish()
    }
}

/// Role as stored in `system_auth.roles`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRole {
    pub name: String,
    pub super_user: bool,
    pub login: bool,
    pub salted_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyspace {
    pub name: String,
    /// Raw replication options, including `class`
    pub replication: BTreeMap<String, String>,
}

#[async_trait]
pub trait CqlClient: Send + Sync {
    async fn roles(&self) -> Result<Vec<LiveRole>>;
    async fn create_role(&self, role: &Role) -> Result<()>;
    async fn update_role(&self, role: &Role) -> Result<()>;
    async fn keyspaces(&self) -> Result<Vec<Keyspace>>;
    /// Switch a keyspace to NetworkTopologyStrategy with the given per-DC factors
    async fn update_replication(
        &self,
        keyspace: &str,
        replication: &BTreeMap<String, i32>,
    ) -> Result<()>;
}

#[async_trait]
pub trait CqlConnector: Send + Sync {
    async fn connect(
        &self,
        contact_points: &[String],
        credentials: &Credentials,
    ) -> Result<Arc<dyn CqlClient>>;
}

pub struct ScyllaCqlConnector {
    timeout: Duration,
}

impl ScyllaCqlConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CqlConnector for ScyllaCqlConnector {
    async fn connect(
        &self,
        contact_points: &[String],
        credentials: &Credentials,
    ) -> Result<Arc<dyn CqlClient>> {
        let target = contact_points.join(",");
        debug!("Opening CQL session to {} as {}", target, credentials.username);
        let session = SessionBuilder::new()
            .known_nodes(contact_points)
            .user(credentials.username.as_str(), credentials.password.as_str())
            .connection_timeout(self.timeout)
            .build()
            .await
            .map_err(|e| ClientError::transport(target, e.to_string()))?;
        Ok(Arc::new(ScyllaCqlClient { session }))
    }
}

pub struct ScyllaCqlClient {
    session: Session,
}

impl ScyllaCqlClient {
    async fn execute(&self, statement: String) -> Result<scylla::QueryResult> {
        self.session
            .query(statement, ())
            .await
            .map_err(|e| ClientError::Query(e.to_string()))
    }
}

#[async_trait]
impl CqlClient for ScyllaCqlClient {
    async fn roles(&self) -> Result<Vec<LiveRole>> {
        let result = self
            .execute(
                "SELECT role, is_superuser, can_login, salted_hash FROM system_auth.roles"
                    .to_string(),
            )
            .await?;
        let rows = result
            .rows_typed::<(String, Option<bool>, Option<bool>, Option<String>)>()
            .map_err(|e| ClientError::malformed("system_auth.roles", e))?;

        let mut roles = Vec::new();
        for row in rows {
            let (name, super_user, login, salted_hash) =
                row.map_err(|e| ClientError::malformed("system_auth.roles", e))?;
            roles.push(LiveRole {
                name,
                super_user: super_user.unwrap_or(false),
                login: login.unwrap_or(false),
                salted_hash,
            });
        }
        Ok(roles)
    }

    async fn create_role(&self, role: &Role) -> Result<()> {
        self.execute(role_statement("CREATE ROLE IF NOT EXISTS", role))
            .await
            .map(|_| ())
    }

    async fn update_role(&self, role: &Role) -> Result<()> {
        self.execute(role_statement("ALTER ROLE", role))
            .await
            .map(|_| ())
    }

    async fn keyspaces(&self) -> Result<Vec<Keyspace>> {
        let result = self
            .execute("SELECT keyspace_name, replication FROM system_schema.keyspaces".to_string())
            .await?;
        let rows = result
            .rows_typed::<(String, HashMap<String, String>)>()
            .map_err(|e| ClientError::malformed("system_schema.keyspaces", e))?;

        let mut keyspaces = Vec::new();
        for row in rows {
            let (name, replication) =
                row.map_err(|e| ClientError::malformed("system_schema.keyspaces", e))?;
            keyspaces.push(Keyspace {
                name,
                replication: replication.into_iter().collect(),
            });
        }
        Ok(keyspaces)
    }

    async fn update_replication(
        &self,
        keyspace: &str,
        replication: &BTreeMap<String, i32>,
    ) -> Result<()> {
        self.execute(replication_statement(keyspace, replication))
            .await
            .map(|_| ())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn role_statement(verb: &str, role: &Role) -> String {
    format!(
        "{} {} WITH PASSWORD = {} AND SUPERUSER = {} AND LOGIN = {}",
        verb,
        quote_identifier(&role.name),
        quote_literal(&role.password),
        role.super_user,
        role.login
    )
}

fn replication_statement(keyspace: &str, replication: &BTreeMap<String, i32>) -> String {
    let mut options = vec![format!(
        "'class': {}",
        quote_literal(NETWORK_TOPOLOGY_STRATEGY)
    )];
    options.extend(
        replication
            .iter()
            .map(|(dc, rf)| format!("{}: {}", quote_literal(dc), rf)),
    );
    format!(
        "ALTER KEYSPACE {} WITH replication = {{{}}}",
        quote_identifier(keyspace),
        options.join(", ")
    )
}

//! Role declarations and drift detection
//!
//! The admin role comes from the secret named by `adminRoleSecretName`
//! (`admin-role` / `admin-password`) and is always a superuser with login.
//! Additional roles come from the optional roles secret, one entry per role
//! with a JSON value `{"password": "...", "login": true, "super": false}`.
//! Roles are created when missing and altered when they drift; they are
//! never dropped.

use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;

use crate::clients::{Credentials, LiveRole, Role};
use crate::error::{Error, Result};

pub const ADMIN_ROLE_KEY: &str = "admin-role";
pub const ADMIN_PASSWORD_KEY: &str = "admin-password";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleAction {
    Create(Role),
    Update(Role),
}

#[derive(Deserialize)]
struct RoleEntry {
    password: String,
    #[serde(default = "default_login")]
    login: bool,
    #[serde(default, rename = "super")]
    super_user: bool,
}

fn default_login() -> bool {
    true
}

/// Value of `key`, looking at `data` first and then `stringData`
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .and_then(|v| String::from_utf8(v.0.clone()).ok())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|d| d.get(key))
                .cloned()
        })
}

/// Names of every key in the secret
pub fn secret_keys(secret: &Secret) -> Vec<String> {
    let mut keys: Vec<String> = secret
        .data
        .iter()
        .flat_map(|d| d.keys().cloned())
        .chain(secret.string_data.iter().flat_map(|d| d.keys().cloned()))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

pub fn admin_credentials(secret: &Secret) -> Result<Credentials> {
    let username = secret_value(secret, ADMIN_ROLE_KEY).filter(|v| !v.is_empty());
    let password = secret_value(secret, ADMIN_PASSWORD_KEY).filter(|v| !v.is_empty());
    match (username, password) {
        (Some(username), Some(password)) => Ok(Credentials::new(username, password)),
        _ => Err(Error::CredentialsError(format!(
            "admin role secret must contain non-empty {ADMIN_ROLE_KEY} and {ADMIN_PASSWORD_KEY}"
        ))),
    }
}

/// Every role the cluster should have, admin first
pub fn declared_roles(admin: &Credentials, roles_secret: Option<&Secret>) -> Result<Vec<Role>> {
    let mut roles = vec![Role {
        name: admin.username.clone(),
        password: admin.password.clone(),
        super_user: true,
        login: true,
    }];

    if let Some(secret) = roles_secret {
        for name in secret_keys(secret) {
            if name == admin.username {
                continue;
            }
            let raw = secret_value(secret, &name).unwrap_or_default();
            let entry: RoleEntry = serde_json::from_str(&raw).map_err(|e| {
                Error::CredentialsError(format!("role {name} in roles secret is invalid: {e}"))
            })?;
            if entry.password.is_empty() {
                return Err(Error::CredentialsError(format!(
                    "role {name} in roles secret has an empty password"
                )));
            }
            roles.push(Role {
                name,
                password: entry.password,
                super_user: entry.super_user,
                login: entry.login,
            });
        }
    }

    Ok(roles)
}

fn password_matches(password: &str, salted_hash: Option<&str>) -> bool {
    salted_hash
        .map(|hash| bcrypt::verify(password, hash).unwrap_or(false))
        .unwrap_or(false)
}

pub fn has_drifted(desired: &Role, live: &LiveRole) -> bool {
    desired.super_user != live.super_user
        || desired.login != live.login
        || !password_matches(&desired.password, live.salted_hash.as_deref())
}

/// Creates for missing roles and updates for drifted ones
pub fn plan_roles(desired: &[Role], live: &[LiveRole]) -> Vec<RoleAction> {
    desired
        .iter()
        .filter_map(|role| match live.iter().find(|l| l.name == role.name) {
            None => Some(RoleAction::Create(role.clone())),
            Some(l) if has_drifted(role, l) => Some(RoleAction::Update(role.clone())),
            Some(_) => None,
        })
        .collect()
}

/// [`plan_roles`] run on the blocking pool; password checks are bcrypt verifies
pub async fn plan_roles_blocking(
    desired: Vec<Role>,
    live: Vec<LiveRole>,
) -> Result<Vec<RoleAction>> {
    tokio::task::spawn_blocking(move || plan_roles(&desired, &live))
        .await
        .map_err(|e| Error::TaskError(format!("role planning: {e}")))
}

//! Error types for the Cassandra operator

use thiserror::Error;

use crate::clients::ClientError;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] kube::Error),

    /// Optimistic concurrency failure on a status write
    #[error("Conflict updating {0}: resource was modified concurrently")]
    Conflict(String),

    /// A sidecar or the CQL endpoint failed
    #[error("Sidecar error: {0}")]
    Sidecar(#[from] ClientError),

    /// Invalid resource spec
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Missing or malformed credentials in a referenced secret
    #[error("Credentials error: {0}")]
    CredentialsError(String),

    /// Operator configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A blocking helper task panicked or was cancelled
    #[error("Task error: {0}")]
    TaskError(String),
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref resp) if resp.code == 409 => Error::Conflict(resp.message.clone()),
            other => Error::KubeError(other),
        }
    }
}

impl Error {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Whether another pass can be expected to succeed without a spec change
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Error::ConfigError(_) | Error::SerializationError(_))
    }

    /// Short machine-readable reason used for events and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "KubeApiError",
            Error::Conflict(_) => "Conflict",
            Error::Sidecar(ClientError::Transport { .. }) => "SidecarUnreachable",
            Error::Sidecar(ClientError::UnexpectedStatus { .. }) => "SidecarUnexpectedStatus",
            Error::Sidecar(ClientError::MalformedPayload { .. }) => "SidecarMalformedPayload",
            Error::Sidecar(ClientError::Query(_)) => "CqlQueryFailed",
            Error::ValidationError(_) => "InvalidSpec",
            Error::CredentialsError(_) => "CredentialsInvalid",
            Error::ConfigError(_) => "ConfigError",
            Error::SerializationError(_) => "SerializationError",
            Error::TaskError(_) => "TaskFailed",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

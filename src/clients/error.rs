//! Error types for sidecar clients

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout and the like
    #[error("Transport failure talking to {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: BoxError,
    },

    /// The sidecar answered with a status code the protocol does not allow
    #[error("Unexpected status {status} from {target}")]
    UnexpectedStatus { target: String, status: u16 },

    /// The response body could not be parsed
    #[error("Malformed payload from {target}: {message}")]
    MalformedPayload { target: String, message: String },

    /// A CQL statement was rejected by the cluster
    #[error("CQL query failed: {0}")]
    Query(String),
}

impl ClientError {
    pub fn transport(
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        ClientError::Transport {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn malformed(target: impl Into<String>, message: impl ToString) -> Self {
        ClientError::MalformedPayload {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// The sidecar could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

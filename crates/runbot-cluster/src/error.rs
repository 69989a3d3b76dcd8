//! Error types for runbot-cluster

use std::path::PathBuf;

use runbot_core::CollabError;
use thiserror::Error;

/// Errors that can occur configuring or calling the API server
#[derive(Error, Debug)]
pub enum ClusterError {
    /// A credential or config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Kubeconfig is malformed or incomplete
    #[error("invalid kubeconfig: {0}")]
    Kubeconfig(String),

    /// Inline `*-data` field is not valid base64
    #[error("invalid base64 in kubeconfig field {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// Neither a kubeconfig nor the in-cluster environment is available
    #[error("not running in a cluster: {0}")]
    NotInCluster(String),

    /// HTTP client could not be built
    #[error("failed to create cluster api client: {0}")]
    Client(String),

    /// Request failed before a response arrived
    #[error("cluster api {operation} request failed: {message}")]
    Transport { operation: String, message: String },

    /// Non-success status code
    #[error("cluster api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("failed to decode cluster api {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl From<ClusterError> for CollabError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Status { status: 404, .. } => CollabError::not_found(err.to_string()),
            ClusterError::Status {
                status: 401 | 403, ..
            } => CollabError::Unauthorized(err.to_string()),
            ClusterError::Status { status, .. } => CollabError::Api {
                status,
                message: err.to_string(),
            },
            ClusterError::Transport { .. } => CollabError::Transport(err.to_string()),
            ClusterError::Decode { .. } => CollabError::Decode(err.to_string()),
            ClusterError::Io { .. }
            | ClusterError::Kubeconfig(_)
            | ClusterError::Base64 { .. }
            | ClusterError::NotInCluster(_)
            | ClusterError::Client(_) => CollabError::Config(err.to_string()),
        }
    }
}

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

//! Error types for runbot-github

use runbot_core::CollabError;
use thiserror::Error;

/// Errors that can occur talking to the GitHub API
#[derive(Error, Debug)]
pub enum GithubError {
    /// Token cannot be sent as a header value
    #[error("invalid github authorization header")]
    InvalidToken,

    /// HTTP client could not be built
    #[error("failed to create github api client: {0}")]
    Client(String),

    /// Request failed before a response arrived
    #[error("github api {operation} request failed: {message}")]
    Transport { operation: String, message: String },

    /// Non-success status code
    #[error("github api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("failed to decode github {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl From<GithubError> for CollabError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::Status { status: 404, .. } => CollabError::not_found(err.to_string()),
            GithubError::Status {
                status: 401 | 403, ..
            } => CollabError::Unauthorized(err.to_string()),
            GithubError::Status { status, .. } => CollabError::Api {
                status,
                message: err.to_string(),
            },
            GithubError::Transport { .. } => CollabError::Transport(err.to_string()),
            GithubError::Decode { .. } => CollabError::Decode(err.to_string()),
            GithubError::InvalidToken | GithubError::Client(_) => {
                CollabError::Config(err.to_string())
            }
        }
    }
}

/// Result type for GitHub calls
pub type Result<T> = std::result::Result<T, GithubError>;

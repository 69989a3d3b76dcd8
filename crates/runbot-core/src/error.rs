//! Error taxonomy for runbot.

use thiserror::Error;

/// Errors returned by collaborators (code host, cluster).
#[derive(Error, Debug)]
pub enum CollabError {
    /// The requested object does not exist
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Credentials missing or rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Remote API answered with an error status
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Request never got an answer
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Client could not be configured
    #[error("configuration error: {0}")]
    Config(String),
}

impl CollabError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CollabError::NotFound { what: what.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CollabError::NotFound { .. })
    }
}

/// Reasons a single trigger was not dispatched.
///
/// All variants are scoped to one trigger; the dispatch loop logs them and
/// moves on to the next match.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("pipeline '{name}' not found")]
    PipelineNotFound { name: String },

    #[error("pipeline '{name}' not found in requested namespace '{namespace}'")]
    PipelineNotInRequestedNamespace { name: String, namespace: String },

    #[error("failed to look up pipeline '{name}' in namespace '{namespace}': {source}")]
    PipelineLookup {
        name: String,
        namespace: String,
        #[source]
        source: CollabError,
    },

    #[error("no service account '{name}' or 'default' in namespace '{namespace}'")]
    IdentityNotFound { name: String, namespace: String },

    #[error("failed to look up service account '{name}' in namespace '{namespace}': {source}")]
    IdentityLookup {
        name: String,
        namespace: String,
        #[source]
        source: CollabError,
    },

    #[error("trigger '{trigger}' contains unknown arguments: {}", .keys.join(", "))]
    UnknownArguments { trigger: String, keys: Vec<String> },

    #[error("failed to create PipelineRun for '{pipeline}' in namespace '{namespace}': {source}")]
    Submission {
        pipeline: String,
        namespace: String,
        #[source]
        source: CollabError,
    },
}

/// Failures that abort a whole invocation.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("invalid pull request number '{0}'")]
    InvalidPullRequestNumber(String),

    #[error("failed to get PR details: {0}")]
    PullRequest(#[source] CollabError),

    #[error("failed to get changed files in PR: {0}")]
    ChangedFiles(#[source] CollabError),

    #[error("failed to add PR comment: {0}")]
    Comment(#[source] CollabError),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, RunError>;

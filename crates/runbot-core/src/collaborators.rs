//! Collaborator interfaces consumed by the dispatch core.
//!
//! - `CodeHost`: pull-request metadata, changed files, comments, org membership
//! - `PipelineStore`: Tekton `Pipeline` lookup
//! - `IdentityStore`: `ServiceAccount` lookup
//! - `RunSubmitter`: `PipelineRun` creation
//!
//! Every call returns [`CollabResult`], whose error separates "the object does
//! not exist" from every other failure. In-memory fakes live in
//! [`crate::fakes`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::changed_files::ChangedFile;
use crate::error::CollabError;
use crate::request::ExecutionRequest;

/// Result type for collaborator calls
pub type CollabResult<T> = std::result::Result<T, CollabError>;

// ---------------------------------------------------------------------------
// Code host
// ---------------------------------------------------------------------------

/// Identifies a pull request on the code host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// The parts of a pull request the dispatcher cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetail {
    pub head_sha: String,
    pub draft: bool,
}

#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn pull_request(&self, pr: &PullRequestRef) -> CollabResult<PullRequestDetail>;

    /// One page of the pull request's files. An empty page ends pagination.
    async fn changed_files_page(
        &self,
        pr: &PullRequestRef,
        page: u32,
        per_page: u32,
    ) -> CollabResult<Vec<ChangedFile>>;

    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> CollabResult<()>;

    /// Membership state of `user` in `org` (`active`, `pending`, ...).
    async fn org_membership_state(&self, org: &str, user: &str) -> CollabResult<String>;
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// A Tekton pipeline as seen by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub namespace: String,
    pub declared_parameter_names: BTreeSet<String>,
    pub annotations: BTreeMap<String, String>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn with_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_parameter_names
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn declares(&self, param: &str) -> bool {
        self.declared_parameter_names.contains(param)
    }

    pub fn annotation_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.annotations
            .get(key)
            .map(String::as_str)
            .unwrap_or(default)
    }
}

/// Service account a pipeline run executes as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    pub name: String,
    pub namespace: String,
}

impl ExecutionIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn get_pipeline(&self, namespace: &str, name: &str) -> CollabResult<PipelineDefinition>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> CollabResult<ExecutionIdentity>;
}

#[async_trait]
pub trait RunSubmitter: Send + Sync {
    /// Create the run in `request.namespace`, returning the generated name.
    async fn create_run(&self, request: &ExecutionRequest) -> CollabResult<String>;
}

/// Every collaborator a dispatch needs, passed explicitly.
#[derive(Clone)]
pub struct Collaborators {
    pub code_host: Arc<dyn CodeHost>,
    pub pipelines: Arc<dyn PipelineStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub submitter: Arc<dyn RunSubmitter>,
}

//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryCluster` (pipelines, service accounts, run creation) and
//! `MemoryCodeHost` (pull requests, changed files, comments, memberships).
//! Both record the calls they receive so tests can assert on lookup order
//! and call counts.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::changed_files::ChangedFile;
use crate::collaborators::*;
use crate::error::CollabError;
use crate::request::ExecutionRequest;

// ---------------------------------------------------------------------------
// MemoryCluster
// ---------------------------------------------------------------------------

/// In-memory cluster keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    pipelines: HashMap<(String, String), PipelineDefinition>,
    service_accounts: HashSet<(String, String)>,
    failing_namespaces: HashSet<String>,
    reject_runs: bool,
    pipeline_lookups: Mutex<Vec<(String, String)>>,
    service_account_lookups: Mutex<Vec<(String, String)>>,
    created: Mutex<Vec<ExecutionRequest>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline under its own namespace.
    pub fn with_pipeline(mut self, pipeline: PipelineDefinition) -> Self {
        self.pipelines
            .insert((pipeline.namespace.clone(), pipeline.name.clone()), pipeline);
        self
    }

    pub fn with_service_account(mut self, name: &str, namespace: &str) -> Self {
        self.service_accounts
            .insert((namespace.to_string(), name.to_string()));
        self
    }

    /// Every lookup in `namespace` fails with a transport error.
    pub fn failing_namespace(mut self, namespace: &str) -> Self {
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    /// Every run creation is refused by the API.
    pub fn rejecting_runs(mut self) -> Self {
        self.reject_runs = true;
        self
    }

    /// `(namespace, name)` of every pipeline lookup, in call order.
    pub fn pipeline_lookups(&self) -> Vec<(String, String)> {
        self.pipeline_lookups.lock().unwrap().clone()
    }

    /// `(namespace, name)` of every service-account lookup, in call order.
    pub fn service_account_lookups(&self) -> Vec<(String, String)> {
        self.service_account_lookups.lock().unwrap().clone()
    }

    /// Requests accepted by [`RunSubmitter::create_run`].
    pub fn created_runs(&self) -> Vec<ExecutionRequest> {
        self.created.lock().unwrap().clone()
    }

    fn check_namespace(&self, namespace: &str) -> CollabResult<()> {
        if self.failing_namespaces.contains(namespace) {
            return Err(CollabError::Transport(format!(
                "connection refused while reading namespace {namespace}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineStore for MemoryCluster {
    async fn get_pipeline(&self, namespace: &str, name: &str) -> CollabResult<PipelineDefinition> {
        self.pipeline_lookups
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        self.check_namespace(namespace)?;
        self.pipelines
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| CollabError::not_found(format!("pipeline {namespace}/{name}")))
    }
}

#[async_trait]
impl IdentityStore for MemoryCluster {
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> CollabResult<ExecutionIdentity> {
        self.service_account_lookups
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        self.check_namespace(namespace)?;
        if self
            .service_accounts
            .contains(&(namespace.to_string(), name.to_string()))
        {
            Ok(ExecutionIdentity::new(name, namespace))
        } else {
            Err(CollabError::not_found(format!(
                "serviceaccount {namespace}/{name}"
            )))
        }
    }
}

#[async_trait]
impl RunSubmitter for MemoryCluster {
    async fn create_run(&self, request: &ExecutionRequest) -> CollabResult<String> {
        if self.reject_runs {
            return Err(CollabError::Api {
                status: 422,
                message: "admission webhook denied the request".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(format!("{}{:05}", request.generate_name_prefix, created.len()))
    }
}

// ---------------------------------------------------------------------------
// MemoryCodeHost
// ---------------------------------------------------------------------------

/// In-memory code host serving a single pull request.
#[derive(Debug, Default)]
pub struct MemoryCodeHost {
    pull_request: Option<PullRequestDetail>,
    file_pages: Vec<Vec<ChangedFile>>,
    memberships: HashMap<String, String>,
    fail_files: bool,
    fail_comments: bool,
    comments: Mutex<Vec<String>>,
    page_requests: Mutex<Vec<u32>>,
    membership_lookups: Mutex<Vec<(String, String)>>,
}

impl MemoryCodeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pull_request(mut self, head_sha: &str, draft: bool) -> Self {
        self.pull_request = Some(PullRequestDetail {
            head_sha: head_sha.to_string(),
            draft,
        });
        self
    }

    /// Append one page of files; pages past the last one are empty.
    pub fn with_file_page(mut self, files: Vec<ChangedFile>) -> Self {
        self.file_pages.push(files);
        self
    }

    pub fn with_membership(mut self, user: &str, state: &str) -> Self {
        self.memberships
            .insert(user.to_string(), state.to_string());
        self
    }

    pub fn failing_files(mut self) -> Self {
        self.fail_files = true;
        self
    }

    pub fn failing_comments(mut self) -> Self {
        self.fail_comments = true;
        self
    }

    /// Bodies of comments posted so far.
    pub fn comments(&self) -> Vec<String> {
        self.comments.lock().unwrap().clone()
    }

    /// Page numbers requested from the file listing, in order.
    pub fn page_requests(&self) -> Vec<u32> {
        self.page_requests.lock().unwrap().clone()
    }

    /// `(org, user)` of every membership lookup.
    pub fn membership_lookups(&self) -> Vec<(String, String)> {
        self.membership_lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeHost for MemoryCodeHost {
    async fn pull_request(&self, pr: &PullRequestRef) -> CollabResult<PullRequestDetail> {
        self.pull_request
            .clone()
            .ok_or_else(|| CollabError::not_found(format!("pull request {pr}")))
    }

    async fn changed_files_page(
        &self,
        _pr: &PullRequestRef,
        page: u32,
        _per_page: u32,
    ) -> CollabResult<Vec<ChangedFile>> {
        self.page_requests.lock().unwrap().push(page);
        if self.fail_files {
            return Err(CollabError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        let index = page.saturating_sub(1) as usize;
        Ok(self.file_pages.get(index).cloned().unwrap_or_default())
    }

    async fn post_comment(&self, _pr: &PullRequestRef, body: &str) -> CollabResult<()> {
        if self.fail_comments {
            return Err(CollabError::Api {
                status: 403,
                message: "resource not accessible by integration".to_string(),
            });
        }
        self.comments.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn org_membership_state(&self, org: &str, user: &str) -> CollabResult<String> {
        self.membership_lookups
            .lock()
            .unwrap()
            .push((org.to_string(), user.to_string()));
        self.memberships
            .get(user)
            .cloned()
            .ok_or_else(|| CollabError::not_found(format!("membership of {user} in {org}")))
    }
}

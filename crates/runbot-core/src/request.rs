//! PipelineRun request construction.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::changed_files::ChangedFileSet;
use crate::collaborators::{ExecutionIdentity, PipelineDefinition};
use crate::context::DispatchContext;
use crate::duration::parse_go_duration;
use crate::manifest::PipelineRun;

/// Pipeline annotation overriding the run timeout (Go duration notation).
pub const TIMEOUT_ANNOTATION: &str = "tekton.dev/pipeline-timeout";
/// Pipeline annotation overriding the workspace storage class.
pub const STORAGE_CLASS_ANNOTATION: &str = "cicd.giantswarm.io/storage-class";

pub const DEFAULT_TIMEOUT: &str = "1h";
/// Shared-filesystem storage class; the only class mounted read-write-many.
pub const DEFAULT_STORAGE_CLASS: &str = "efs-sc";

pub const LABEL_REPO: &str = "cicd.giantswarm.io/repo";
pub const LABEL_PR: &str = "cicd.giantswarm.io/pr";
pub const LABEL_REVISION: &str = "cicd.giantswarm.io/revision";
pub const LABEL_TRIGGERED_BY: &str = "cicd.giantswarm.io/triggered-by";
pub const ANNOTATION_URL: &str = "cicd.giantswarm.io/url";

pub const PARAM_PR_FILES: &str = "PR_FILES";
pub const PARAM_PR_FILES_ADDED: &str = "PR_FILES_ADDED";
pub const PARAM_PR_FILES_CHANGED: &str = "PR_FILES_CHANGED";
pub const PARAM_PR_FILES_REMOVED: &str = "PR_FILES_REMOVED";

const BOT_SUFFIX: &str = "[bot]";

/// Volume access mode for the shared workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadWriteMany,
}

impl AccessMode {
    /// `ReadWriteMany` for the default shared-filesystem class, `ReadWriteOnce` otherwise.
    pub fn for_storage_class(storage_class: &str) -> Self {
        if storage_class == DEFAULT_STORAGE_CLASS {
            AccessMode::ReadWriteMany
        } else {
            AccessMode::ReadWriteOnce
        }
    }
}

/// Everything needed to create one PipelineRun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub generate_name_prefix: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub pipeline_name: String,
    pub timeout: Duration,
    pub service_account_name: String,
    pub workspace_storage_class: String,
    pub workspace_access_mode: AccessMode,
    pub params: BTreeMap<String, String>,
}

impl ExecutionRequest {
    /// Render as a `tekton.dev/v1` PipelineRun manifest.
    pub fn to_pipeline_run(&self) -> PipelineRun {
        PipelineRun::from_request(self)
    }
}

/// Timeout from [`TIMEOUT_ANNOTATION`]; an unparsable value falls back to one hour.
pub fn pipeline_timeout(pipeline: &PipelineDefinition) -> Duration {
    let raw = pipeline.annotation_or(TIMEOUT_ANNOTATION, DEFAULT_TIMEOUT);
    match parse_go_duration(raw) {
        Ok(timeout) => timeout,
        Err(err) => {
            warn!(pipeline = %pipeline.name, value = %raw, error = %err, "Invalid pipeline timeout, using default");
            Duration::from_secs(3_600)
        }
    }
}

/// Storage class from [`STORAGE_CLASS_ANNOTATION`], defaulting to [`DEFAULT_STORAGE_CLASS`].
pub fn workspace_storage_class(pipeline: &PipelineDefinition) -> String {
    pipeline
        .annotation_or(STORAGE_CLASS_ANNOTATION, DEFAULT_STORAGE_CLASS)
        .to_string()
}

/// Login usable as a label value: one trailing `[bot]` removed.
pub fn label_safe_login(login: &str) -> &str {
    login.strip_suffix(BOT_SUFFIX).unwrap_or(login)
}

/// Assemble the request for a resolved pipeline.
///
/// `context` is the per-trigger parameter set, already merged with the
/// trigger's arguments.
pub fn build_request(
    pipeline: &PipelineDefinition,
    namespace: &str,
    identity: &ExecutionIdentity,
    context: DispatchContext,
    files: &ChangedFileSet,
) -> ExecutionRequest {
    let timeout = pipeline_timeout(pipeline);
    let storage_class = workspace_storage_class(pipeline);
    let access_mode = AccessMode::for_storage_class(&storage_class);
    info!(
        pipeline = %pipeline.name,
        timeout = %crate::duration::format_go_duration(timeout),
        storage_class = %storage_class,
        "Building PipelineRun"
    );

    let labels = BTreeMap::from([
        (LABEL_REPO.to_string(), context.repo_name().to_string()),
        (LABEL_PR.to_string(), context.number().to_string()),
        (LABEL_REVISION.to_string(), context.revision().to_string()),
        (
            LABEL_TRIGGERED_BY.to_string(),
            label_safe_login(context.user_login()).to_string(),
        ),
    ]);
    let annotations = BTreeMap::from([(ANNOTATION_URL.to_string(), context.url().to_string())]);
    let generate_name_prefix = format!(
        "pr-{}-{}-{}",
        context.repo_name(),
        context.number(),
        pipeline.name
    );

    let mut params = context.into_params();
    params.insert(PARAM_PR_FILES.to_string(), files.all_files().join(","));
    params.insert(PARAM_PR_FILES_ADDED.to_string(), files.added.join(","));
    params.insert(PARAM_PR_FILES_CHANGED.to_string(), files.changed.join(","));
    params.insert(PARAM_PR_FILES_REMOVED.to_string(), files.removed.join(","));

    ExecutionRequest {
        generate_name_prefix,
        namespace: namespace.to_string(),
        labels,
        annotations,
        pipeline_name: pipeline.name.clone(),
        timeout,
        service_account_name: identity.name.clone(),
        workspace_storage_class: storage_class,
        workspace_access_mode: access_mode,
        params,
    }
}

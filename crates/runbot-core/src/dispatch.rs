//! Per-trigger dispatch loop.

use tracing::{info, warn, Instrument};

use crate::changed_files::ChangedFileSet;
use crate::collaborators::{Collaborators, PullRequestRef};
use crate::context::DispatchContext;
use crate::error::DispatchError;
use crate::params::{bind_parameters, unknown_arguments_comment};
use crate::request::{build_request, ExecutionRequest};
use crate::resolve::{resolve_identity, resolve_pipeline};
use crate::trigger::Trigger;

/// Namespace searched when the repository has no namespace of its own.
pub const DEFAULT_NAMESPACE: &str = "tekton-pipelines";

/// A PipelineRun that was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedRun {
    pub namespace: String,
    pub run_name: String,
    pub request: ExecutionRequest,
}

/// What happened to one trigger.
#[derive(Debug)]
pub struct TriggerOutcome {
    pub trigger: Trigger,
    pub result: Result<DispatchedRun, DispatchError>,
}

impl TriggerOutcome {
    pub fn dispatched(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of every trigger in a comment, in comment order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<TriggerOutcome>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn dispatched_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.dispatched()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.dispatched()).count()
    }

    /// Runs that were created.
    pub fn runs(&self) -> impl Iterator<Item = &DispatchedRun> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

/// Resolves, validates and submits triggers for one pull request.
pub struct Dispatcher {
    collaborators: Collaborators,
    pr: PullRequestRef,
    default_namespace: String,
}

impl Dispatcher {
    pub fn new(collaborators: Collaborators, pr: PullRequestRef, default_namespace: &str) -> Self {
        Self {
            collaborators,
            pr,
            default_namespace: default_namespace.to_string(),
        }
    }

    /// Process every trigger in order.
    ///
    /// A failing trigger is logged and recorded; it never stops the loop and
    /// never undoes runs created for earlier triggers. Each trigger starts
    /// from its own copy of `ambient`.
    pub async fn dispatch(
        &self,
        triggers: Vec<Trigger>,
        ambient: &DispatchContext,
        files: &ChangedFileSet,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for trigger in triggers {
            let span = crate::obs::trigger_span(&trigger.pipeline_name);
            let result = self
                .dispatch_trigger(&trigger, ambient, files)
                .instrument(span)
                .await;

            if let Err(err) = &result {
                crate::obs::emit_trigger_skipped(&trigger.pipeline_name, err);
            }
            report.outcomes.push(TriggerOutcome { trigger, result });
        }

        crate::obs::emit_dispatch_finished(
            report.outcomes.len(),
            report.dispatched_count(),
            report.skipped_count(),
        );
        report
    }

    async fn dispatch_trigger(
        &self,
        trigger: &Trigger,
        ambient: &DispatchContext,
        files: &ChangedFileSet,
    ) -> Result<DispatchedRun, DispatchError> {
        let (pipeline, namespace) = resolve_pipeline(
            self.collaborators.pipelines.as_ref(),
            &trigger.pipeline_name,
            trigger.namespace_hint(),
            ambient.repo_name(),
            &self.default_namespace,
        )
        .await?;
        info!(pipeline = %pipeline.name, namespace = %namespace, "Found Pipeline");

        let identity = resolve_identity(
            self.collaborators.identities.as_ref(),
            &trigger.pipeline_name,
            &namespace,
        )
        .await?;
        info!(service_account = %identity.name, namespace = %namespace, "Using ServiceAccount");

        let context = match bind_parameters(trigger, &pipeline, ambient).into_result(trigger) {
            Ok(context) => context,
            Err(err) => {
                if let DispatchError::UnknownArguments { trigger: text, keys } = &err {
                    self.report_unknown_arguments(text, keys).await;
                }
                return Err(err);
            }
        };

        let request = build_request(&pipeline, &namespace, &identity, context, files);
        info!(pipeline = %request.pipeline_name, "Creating new PipelineRun");

        let run_name = self
            .collaborators
            .submitter
            .create_run(&request)
            .await
            .map_err(|source| DispatchError::Submission {
                pipeline: request.pipeline_name.clone(),
                namespace: namespace.clone(),
                source,
            })?;
        crate::obs::emit_run_created(&request.pipeline_name, &namespace, &run_name);

        Ok(DispatchedRun {
            namespace,
            run_name,
            request,
        })
    }

    async fn report_unknown_arguments(&self, trigger_text: &str, keys: &[String]) {
        let body = unknown_arguments_comment(trigger_text, keys);
        if let Err(err) = self.collaborators.code_host.post_comment(&self.pr, &body).await {
            warn!(pr = %self.pr, error = %err, "Failed to add PR comment");
        }
    }
}

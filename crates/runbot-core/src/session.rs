//! One invocation: a single comment (or PR body) on a single pull request.

use tracing::info;

use crate::changed_files::{fetch_changed_files, ChangedFileSet};
use crate::collaborators::{Collaborators, PullRequestRef};
use crate::context::{DispatchContext, GIT_REVISION, USER_ID, USER_TYPE};
use crate::dispatch::{DispatchReport, Dispatcher, DEFAULT_NAMESPACE};
use crate::error::{Result, RunError};
use crate::gate::{authorize, holds_for_draft, Authorization, AuthorizationPolicy, DenialReason, DRAFT_NOTICE};
use crate::trigger::parse_triggers;

/// Settings that do not come from the pull request.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub policy: AuthorizationPolicy,
    pub default_namespace: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            policy: AuthorizationPolicy::default(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// How an invocation ended, when it did not fail.
#[derive(Debug)]
pub enum RunOutcome {
    /// The comment was empty.
    NoComment,
    /// The commenting identity may not trigger pipelines.
    Unauthorized(DenialReason),
    /// Draft PR triggered from its body; a notice was posted instead.
    DraftHeld,
    /// Triggers were processed (possibly none).
    Dispatched(DispatchReport),
}

/// Handle one comment end to end.
///
/// Order: empty-comment check, authorization, trigger parsing, PR detail,
/// revision and changed files (only when triggers exist and no revision was
/// supplied), draft gate, dispatch. Code-host failures before dispatch abort
/// the invocation; failures inside dispatch only skip their trigger.
pub async fn handle_comment(
    collaborators: &Collaborators,
    settings: &RunSettings,
    mut ambient: DispatchContext,
) -> Result<RunOutcome> {
    if ambient.comment().is_empty() {
        info!("No comment provided");
        return Ok(RunOutcome::NoComment);
    }

    info!(
        repo = %ambient.repo_name(),
        pr = %ambient.number(),
        "Filtering PR comments for valid triggers"
    );

    let verdict = authorize(
        collaborators.code_host.as_ref(),
        &settings.policy,
        ambient.user_login(),
        ambient.get(USER_ID),
        ambient.get(USER_TYPE),
    )
    .await;
    if let Authorization::Denied(reason) = verdict {
        info!(
            user = %ambient.user_login(),
            id = %ambient.get(USER_ID),
            user_type = %ambient.get(USER_TYPE),
            reason = %reason,
            "User not permitted to trigger pipelines"
        );
        return Ok(RunOutcome::Unauthorized(reason));
    }

    let triggers = parse_triggers(ambient.comment());

    let number: u64 = ambient
        .number()
        .parse()
        .map_err(|_| RunError::InvalidPullRequestNumber(ambient.number().to_string()))?;
    let pr = PullRequestRef::new(ambient.repo_org(), ambient.repo_name(), number);

    let detail = collaborators
        .code_host
        .pull_request(&pr)
        .await
        .map_err(RunError::PullRequest)?;

    // Comment events carry no revision or file list; fetch them from the API.
    let mut files = ChangedFileSet::new();
    if !triggers.is_empty() && ambient.revision().is_empty() {
        ambient.set(GIT_REVISION, detail.head_sha.clone());
        files = fetch_changed_files(collaborators.code_host.as_ref(), &pr)
            .await
            .map_err(RunError::ChangedFiles)?;
    }

    if holds_for_draft(&detail, ambient.comment_id()) {
        info!(pr = %pr, "PR is draft and was triggered from the opening comment, not triggering");
        collaborators
            .code_host
            .post_comment(&pr, DRAFT_NOTICE)
            .await
            .map_err(RunError::Comment)?;
        return Ok(RunOutcome::DraftHeld);
    }

    let dispatcher = Dispatcher::new(collaborators.clone(), pr, &settings.default_namespace);
    let report = dispatcher.dispatch(triggers, &ambient, &files).await;

    if report.is_empty() {
        info!("No triggers found, nothing to do");
    } else {
        info!(
            dispatched = report.dispatched_count(),
            skipped = report.skipped_count(),
            "All triggers processed"
        );
    }
    Ok(RunOutcome::Dispatched(report))
}

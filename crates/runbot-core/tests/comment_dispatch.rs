//! End-to-end handling of PR comments against in-memory collaborators.

use std::sync::Arc;

use runbot_core::changed_files::ChangedFile;
use runbot_core::context::{
    COMMENT, COMMENT_ID, GIT_REVISION, NUMBER, REPO_NAME, REPO_ORG, URL, USER_ID, USER_LOGIN,
    USER_TYPE,
};
use runbot_core::fakes::{MemoryCluster, MemoryCodeHost};
use runbot_core::gate::{DEFAULT_BOT_USER_ID, DRAFT_NOTICE};
use runbot_core::{
    handle_comment, Collaborators, DispatchContext, DispatchError, PipelineDefinition, RunError,
    RunOutcome, RunSettings,
};

fn ambient(comment: &str) -> DispatchContext {
    DispatchContext::new()
        .with(REPO_ORG, "giantswarm")
        .with(REPO_NAME, "runbot")
        .with(NUMBER, "7")
        .with(URL, "https://github.com/giantswarm/runbot/pull/7")
        .with(USER_LOGIN, "octocat")
        .with(USER_TYPE, "User")
        .with(USER_ID, "583231")
        .with(COMMENT_ID, "1234")
        .with(COMMENT, comment)
}

fn member_host() -> MemoryCodeHost {
    MemoryCodeHost::new()
        .with_membership("octocat", "active")
        .with_pull_request("abc123", false)
}

fn collaborators(host: &Arc<MemoryCodeHost>, cluster: &Arc<MemoryCluster>) -> Collaborators {
    Collaborators {
        code_host: host.clone(),
        pipelines: cluster.clone(),
        identities: cluster.clone(),
        submitter: cluster.clone(),
    }
}

fn lookups(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(ns, name)| (ns.to_string(), name.to_string()))
        .collect()
}

async fn run(
    host: &Arc<MemoryCodeHost>,
    cluster: &Arc<MemoryCluster>,
    ctx: DispatchContext,
) -> RunOutcome {
    handle_comment(&collaborators(host, cluster), &RunSettings::default(), ctx)
        .await
        .expect("run should not fail")
}

#[tokio::test]
async fn known_pipeline_dispatched_and_unknown_pipeline_skipped() {
    let host = Arc::new(
        member_host()
            .with_file_page(vec![
                ChangedFile::new("Dockerfile", "added"),
                ChangedFile::new("main.go", "modified"),
            ])
            .with_file_page(vec![ChangedFile::new("old.go", "removed")]),
    );
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(
                PipelineDefinition::new("build-and-publish", "tekton-pipelines")
                    .with_params(["PRIVATE_NETWORK"]),
            )
            .with_service_account("default", "tekton-pipelines"),
    );

    let outcome = run(
        &host,
        &cluster,
        ambient("/run build-and-publish PRIVATE_NETWORK=true\n/run bogus-pipeline"),
    )
    .await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.dispatched_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.outcomes[0].trigger.pipeline_name, "build-and-publish");
    let first = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(first.namespace, "tekton-pipelines");
    assert_eq!(first.run_name, "pr-runbot-7-build-and-publish00001");
    assert_eq!(report.runs().count(), 1);
    assert_eq!(report.outcomes[1].trigger.pipeline_name, "bogus-pipeline");
    assert!(matches!(
        report.outcomes[1].result,
        Err(DispatchError::PipelineNotFound { ref name }) if name == "bogus-pipeline"
    ));

    let created = cluster.created_runs();
    assert_eq!(created.len(), 1);
    let request = &created[0];
    assert_eq!(request.namespace, "tekton-pipelines");
    assert_eq!(request.generate_name_prefix, "pr-runbot-7-build-and-publish");
    assert_eq!(request.service_account_name, "default");
    assert_eq!(request.params["PRIVATE_NETWORK"], "true");
    assert_eq!(request.params[GIT_REVISION], "abc123");
    assert_eq!(request.params["PR_FILES"], "Dockerfile,main.go,old.go");
    assert_eq!(request.params["PR_FILES_ADDED"], "Dockerfile");
    assert_eq!(request.params["PR_FILES_CHANGED"], "main.go");
    assert_eq!(request.params["PR_FILES_REMOVED"], "old.go");
    assert_eq!(request.labels["cicd.giantswarm.io/revision"], "abc123");
    assert_eq!(request.labels["cicd.giantswarm.io/triggered-by"], "octocat");

    assert_eq!(
        cluster.pipeline_lookups(),
        lookups(&[
            ("runbot", "build-and-publish"),
            ("tekton-pipelines", "build-and-publish"),
            ("runbot", "bogus-pipeline"),
            ("tekton-pipelines", "bogus-pipeline"),
        ])
    );
    assert_eq!(
        cluster.service_account_lookups(),
        lookups(&[
            ("tekton-pipelines", "build-and-publish"),
            ("tekton-pipelines", "default"),
        ])
    );
    assert_eq!(host.page_requests(), vec![1, 2, 3]);
    assert!(host.comments().is_empty());
}

#[tokio::test]
async fn repository_namespace_preferred_over_default() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "runbot"))
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("build", "runbot"),
    );

    run(&host, &cluster, ambient("/run build")).await;

    let created = cluster.created_runs();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].namespace, "runbot");
    assert_eq!(created[0].service_account_name, "build");
    assert_eq!(cluster.pipeline_lookups(), lookups(&[("runbot", "build")]));
}

#[tokio::test]
async fn unknown_arguments_commented_and_not_dispatched() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines").with_params(["TAG"]))
            .with_service_account("default", "tekton-pipelines"),
    );

    let outcome = run(&host, &cluster, ambient("/run build TAG=v1 ZED=1 ALPHA=2")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(report.skipped_count(), 1);
    assert!(cluster.created_runs().is_empty());
    assert_eq!(
        host.comments(),
        vec![
            ":warning: Trigger `/run build TAG=v1 ZED=1 ALPHA=2` contains unknown arguments:\n- `ALPHA`\n- `ZED`"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn unknown_arguments_comment_failure_does_not_abort() {
    let host = Arc::new(member_host().failing_comments());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    let outcome = run(&host, &cluster, ambient("/run build FOO=1\n/run build")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(report.dispatched_count(), 1);
    assert_eq!(cluster.created_runs().len(), 1);
}

#[tokio::test]
async fn namespace_hint_is_the_only_namespace_searched() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    let outcome = run(&host, &cluster, ambient("/run build NAMESPACE=ci")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert!(matches!(
        report.outcomes[0].result,
        Err(DispatchError::PipelineNotInRequestedNamespace { ref namespace, .. }) if namespace == "ci"
    ));
    assert_eq!(cluster.pipeline_lookups(), lookups(&[("ci", "build")]));
    assert!(cluster.created_runs().is_empty());
}

#[tokio::test]
async fn namespace_hint_dispatches_into_requested_namespace() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "ci").with_params(["NAMESPACE"]))
            .with_service_account("default", "ci"),
    );

    run(&host, &cluster, ambient("/run build NAMESPACE=ci")).await;

    let created = cluster.created_runs();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].namespace, "ci");
    assert_eq!(created[0].params["NAMESPACE"], "ci");
}

#[tokio::test]
async fn namespace_hint_lookup_error_skips_trigger() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .failing_namespace("ci"),
    );

    let outcome = run(&host, &cluster, ambient("/run build NAMESPACE=ci")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert!(matches!(
        report.outcomes[0].result,
        Err(DispatchError::PipelineLookup { .. })
    ));
    assert_eq!(cluster.pipeline_lookups(), lookups(&[("ci", "build")]));
}

#[tokio::test]
async fn missing_service_account_skips_trigger() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new().with_pipeline(PipelineDefinition::new("build", "tekton-pipelines")),
    );

    let outcome = run(&host, &cluster, ambient("/run build")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert!(matches!(
        report.outcomes[0].result,
        Err(DispatchError::IdentityNotFound { .. })
    ));
    assert!(cluster.created_runs().is_empty());
}

#[tokio::test]
async fn submission_failure_does_not_stop_later_triggers() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_pipeline(PipelineDefinition::new("lint", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines")
            .rejecting_runs(),
    );

    let outcome = run(&host, &cluster, ambient("/run build\n/run lint")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(report.skipped_count(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o.result, Err(DispatchError::Submission { .. }))));
    assert_eq!(
        cluster.pipeline_lookups(),
        lookups(&[
            ("runbot", "build"),
            ("tekton-pipelines", "build"),
            ("runbot", "lint"),
            ("tekton-pipelines", "lint"),
        ])
    );
}

#[tokio::test]
async fn trigger_arguments_do_not_leak_into_later_triggers() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines").with_params(["TAG"]))
            .with_service_account("default", "tekton-pipelines"),
    );

    run(&host, &cluster, ambient("/run build TAG=v1\n/run build")).await;

    let created = cluster.created_runs();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].params["TAG"], "v1");
    assert!(!created[1].params.contains_key("TAG"));
}

#[tokio::test]
async fn positional_arguments_become_pos_args() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("e2e", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    run(&host, &cluster, ambient("/run e2e capa eks")).await;

    let created = cluster.created_runs();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].params["POS_ARGS"], "capa,eks");
}

#[tokio::test]
async fn draft_pr_body_posts_notice_instead_of_dispatching() {
    let host = Arc::new(
        MemoryCodeHost::new()
            .with_membership("octocat", "active")
            .with_pull_request("abc123", true),
    );
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    let outcome = run(&host, &cluster, ambient("/run build").with(COMMENT_ID, "")).await;

    assert!(matches!(outcome, RunOutcome::DraftHeld));
    assert_eq!(host.comments(), vec![DRAFT_NOTICE.to_string()]);
    assert!(cluster.pipeline_lookups().is_empty());
    assert!(cluster.created_runs().is_empty());
}

#[tokio::test]
async fn draft_pr_comment_still_dispatches() {
    let host = Arc::new(
        MemoryCodeHost::new()
            .with_membership("octocat", "active")
            .with_pull_request("abc123", true),
    );
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    run(&host, &cluster, ambient("/run build")).await;

    assert_eq!(cluster.created_runs().len(), 1);
    assert!(host.comments().is_empty());
}

#[tokio::test]
async fn draft_notice_failure_aborts_run() {
    let host = Arc::new(
        MemoryCodeHost::new()
            .with_membership("octocat", "active")
            .with_pull_request("abc123", true)
            .failing_comments(),
    );
    let cluster = Arc::new(MemoryCluster::new());

    let err = handle_comment(
        &collaborators(&host, &cluster),
        &RunSettings::default(),
        ambient("/run build").with(COMMENT_ID, ""),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::Comment(_)));
}

#[tokio::test]
async fn non_member_is_refused_before_any_lookup() {
    let host = Arc::new(MemoryCodeHost::new().with_pull_request("abc123", false));
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    let outcome = run(&host, &cluster, ambient("/run build")).await;

    assert!(matches!(outcome, RunOutcome::Unauthorized(_)));
    assert!(host.page_requests().is_empty());
    assert!(cluster.pipeline_lookups().is_empty());
    assert!(cluster.created_runs().is_empty());
}

#[tokio::test]
async fn allow_listed_bot_dispatches() {
    let host = Arc::new(MemoryCodeHost::new().with_pull_request("abc123", false));
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );
    let ctx = ambient("/run build")
        .with(USER_LOGIN, "renovate[bot]")
        .with(USER_TYPE, "Bot")
        .with(USER_ID, DEFAULT_BOT_USER_ID);

    run(&host, &cluster, ctx).await;

    let created = cluster.created_runs();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].labels["cicd.giantswarm.io/triggered-by"], "renovate");
    assert!(host.membership_lookups().is_empty());
}

#[tokio::test]
async fn supplied_revision_skips_file_listing() {
    let host = Arc::new(member_host().with_file_page(vec![ChangedFile::new("a", "added")]));
    let cluster = Arc::new(
        MemoryCluster::new()
            .with_pipeline(PipelineDefinition::new("build", "tekton-pipelines"))
            .with_service_account("default", "tekton-pipelines"),
    );

    run(
        &host,
        &cluster,
        ambient("/run build").with(GIT_REVISION, "feedface"),
    )
    .await;

    assert!(host.page_requests().is_empty());
    let created = cluster.created_runs();
    assert_eq!(created[0].params[GIT_REVISION], "feedface");
    assert_eq!(created[0].params["PR_FILES"], "");
}

#[tokio::test]
async fn comment_without_triggers_does_nothing() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(MemoryCluster::new());

    let outcome = run(&host, &cluster, ambient("LGTM, thanks!")).await;

    let RunOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert!(report.is_empty());
    assert!(host.page_requests().is_empty());
    assert!(cluster.pipeline_lookups().is_empty());
}

#[tokio::test]
async fn empty_comment_is_a_no_op() {
    let host = Arc::new(MemoryCodeHost::new());
    let cluster = Arc::new(MemoryCluster::new());

    let outcome = run(&host, &cluster, ambient("")).await;

    assert!(matches!(outcome, RunOutcome::NoComment));
    assert!(host.membership_lookups().is_empty());
}

#[tokio::test]
async fn invalid_pr_number_fails_run() {
    let host = Arc::new(member_host());
    let cluster = Arc::new(MemoryCluster::new());

    let err = handle_comment(
        &collaborators(&host, &cluster),
        &RunSettings::default(),
        ambient("/run build").with(NUMBER, "seven"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::InvalidPullRequestNumber(ref n) if n == "seven"));
}

#[tokio::test]
async fn changed_files_failure_fails_run() {
    let host = Arc::new(member_host().failing_files());
    let cluster = Arc::new(MemoryCluster::new());

    let err = handle_comment(
        &collaborators(&host, &cluster),
        &RunSettings::default(),
        ambient("/run build"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::ChangedFiles(_)));
    assert!(cluster.pipeline_lookups().is_empty());
}

#[tokio::test]
async fn missing_pull_request_fails_run() {
    let host = Arc::new(MemoryCodeHost::new().with_membership("octocat", "active"));
    let cluster = Arc::new(MemoryCluster::new());

    let err = handle_comment(
        &collaborators(&host, &cluster),
        &RunSettings::default(),
        ambient("/run build"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RunError::PullRequest(_)));
}

//! runbot - ChatOps dispatch for Tekton pipelines
//!
//! Runs once per pull-request comment (or opening body). The event arrives
//! through environment variables set by the webhook trigger.
//!
//! ## Commands
//!
//! - `dispatch`: authorize the commenter, parse `/run` triggers and create PipelineRuns
//! - `parse`: print the triggers found in a piece of text

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use runbot_cluster::{ClusterClient, ClusterConfig};
use runbot_core::changed_files::ChangedFile;
use runbot_core::context::{
    BODY, CHANGED_FILES, CLONE_URL, COMMENT, COMMENT_ID, COMMENT_URL, GIT_REVISION, NUMBER,
    PREVIOUS_COMMENT, REPO_NAME, REPO_ORG, TITLE, URL, USER_ID, USER_LOGIN, USER_TYPE,
};
use runbot_core::gate::{DEFAULT_BOT_USER_ID, DEFAULT_ORG};
use runbot_core::{
    handle_comment, parse_triggers, AuthorizationPolicy, CodeHost, CollabError, CollabResult,
    Collaborators, DispatchContext, ExecutionRequest, PullRequestDetail, PullRequestRef,
    RunOutcome, RunSettings, RunSubmitter, DEFAULT_NAMESPACE,
};
use runbot_github::{GithubClient, GithubConfig, DEFAULT_API_URL};

#[derive(Parser)]
#[command(name = "runbot")]
#[command(author = "Giant Swarm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dispatch Tekton pipelines from /run comments on pull requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one pull-request comment end to end
    Dispatch {
        #[command(flatten)]
        event: EventArgs,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Print PipelineRun manifests instead of creating them, and log
        /// PR comments instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the triggers found in TEXT as JSON, one per line
    Parse {
        /// Comment text (default: $COMMENT)
        #[arg(env = "COMMENT")]
        text: String,
    },
}

/// The pull-request event, as exported by the webhook trigger.
#[derive(Args, Debug, Default)]
struct EventArgs {
    /// Pull request HTML URL
    #[arg(long, env = "URL", default_value = "")]
    url: String,

    /// Pull request number
    #[arg(long, env = "NUMBER", default_value = "")]
    number: String,

    #[arg(long, env = "TITLE", default_value = "")]
    title: String,

    #[arg(long, env = "BODY", default_value = "")]
    body: String,

    /// Commit to build; the PR head is used when empty
    #[arg(long, env = "GIT_REVISION", default_value = "")]
    git_revision: String,

    #[arg(long, env = "CLONE_URL", default_value = "")]
    clone_url: String,

    #[arg(long, env = "REPO_NAME", default_value = "")]
    repo_name: String,

    /// Repository owner
    #[arg(long, env = "REPO_ORG", default_value = "")]
    repo_org: String,

    #[arg(long, env = "CHANGED_FILES", default_value = "")]
    changed_files: String,

    /// Comment (or PR body) to scan for triggers
    #[arg(long, env = "COMMENT", default_value = "")]
    comment: String,

    #[arg(long, env = "PREVIOUS_COMMENT", default_value = "")]
    previous_comment: String,

    /// Empty when the text is the PR's opening body
    #[arg(long, env = "COMMENT_ID", default_value = "")]
    comment_id: String,

    #[arg(long, env = "COMMENT_URL", default_value = "")]
    comment_url: String,

    #[arg(long, env = "USER_LOGIN", default_value = "")]
    user_login: String,

    /// `User` or `Bot`
    #[arg(long, env = "USER_TYPE", default_value = "")]
    user_type: String,

    #[arg(long, env = "USER_ID", default_value = "")]
    user_id: String,
}

impl EventArgs {
    fn into_context(self) -> DispatchContext {
        DispatchContext::new()
            .with(URL, self.url)
            .with(NUMBER, self.number)
            .with(TITLE, self.title)
            .with(BODY, self.body)
            .with(GIT_REVISION, self.git_revision)
            .with(CLONE_URL, self.clone_url)
            .with(REPO_NAME, self.repo_name)
            .with(REPO_ORG, self.repo_org)
            .with(CHANGED_FILES, self.changed_files)
            .with(COMMENT, self.comment)
            .with(PREVIOUS_COMMENT, self.previous_comment)
            .with(COMMENT_ID, self.comment_id)
            .with(COMMENT_URL, self.comment_url)
            .with(USER_LOGIN, self.user_login)
            .with(USER_TYPE, self.user_type)
            .with(USER_ID, self.user_id)
    }
}

/// Credentials and policy.
#[derive(Args, Debug)]
struct SettingsArgs {
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, default_value = "")]
    github_token: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    github_api_url: String,

    /// Organization whose active members may trigger pipelines
    #[arg(long, env = "ORG_NAME", default_value = DEFAULT_ORG)]
    org_name: String,

    /// Numeric id of the bot account allowed to trigger pipelines
    #[arg(long, env = "RENOVATE_BOT_USER_ID", default_value = DEFAULT_BOT_USER_ID)]
    bot_user_id: String,

    /// Namespace searched after the repository's own namespace
    #[arg(long, env = "DEFAULT_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    default_namespace: String,

    /// Kubeconfig to use instead of the in-cluster service account
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,
}

impl SettingsArgs {
    fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    fn run_settings(&self) -> RunSettings {
        RunSettings {
            policy: AuthorizationPolicy {
                org: self.org_name.clone(),
                bot_user_id: self.bot_user_id.clone(),
            },
            default_namespace: self.default_namespace.clone(),
        }
    }
}

/// Reads pass through; comments are logged instead of posted.
struct DryRunCodeHost {
    inner: Arc<dyn CodeHost>,
}

#[async_trait]
impl CodeHost for DryRunCodeHost {
    async fn pull_request(&self, pr: &PullRequestRef) -> CollabResult<PullRequestDetail> {
        self.inner.pull_request(pr).await
    }

    async fn changed_files_page(
        &self,
        pr: &PullRequestRef,
        page: u32,
        per_page: u32,
    ) -> CollabResult<Vec<ChangedFile>> {
        self.inner.changed_files_page(pr, page, per_page).await
    }

    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> CollabResult<()> {
        info!(pr = %pr, body = %body, "Dry run: not posting comment");
        Ok(())
    }

    async fn org_membership_state(&self, org: &str, user: &str) -> CollabResult<String> {
        self.inner.org_membership_state(org, user).await
    }
}

/// Prints each PipelineRun manifest to stdout instead of creating it.
struct PrintingSubmitter;

#[async_trait]
impl RunSubmitter for PrintingSubmitter {
    async fn create_run(&self, request: &ExecutionRequest) -> CollabResult<String> {
        let manifest = serde_json::to_string_pretty(&request.to_pipeline_run())
            .map_err(|e| CollabError::Decode(e.to_string()))?;
        println!("{manifest}");
        Ok(format!("{}dry-run", request.generate_name_prefix))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    runbot_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Dispatch {
            event,
            settings,
            dry_run,
        } => cmd_dispatch(event, settings, dry_run).await,
        Commands::Parse { text } => cmd_parse(&text),
    }
}

fn build_collaborators(settings: &SettingsArgs, dry_run: bool) -> Result<Collaborators> {
    let cluster_config = ClusterConfig::load(settings.kubeconfig())
        .context("Failed to load cluster configuration")?;
    let cluster =
        Arc::new(ClusterClient::new(&cluster_config).context("Failed to create cluster client")?);

    let github = GithubClient::new(
        GithubConfig::new(&settings.github_api_url).with_token(&settings.github_token),
    )
    .context("Failed to create GitHub client")?;
    let github: Arc<dyn CodeHost> = Arc::new(github);

    if dry_run {
        info!("Dry run: PipelineRuns will be printed, not created");
        return Ok(Collaborators {
            code_host: Arc::new(DryRunCodeHost { inner: github }),
            pipelines: cluster.clone(),
            identities: cluster,
            submitter: Arc::new(PrintingSubmitter),
        });
    }

    Ok(Collaborators {
        code_host: github,
        pipelines: cluster.clone(),
        identities: cluster.clone(),
        submitter: cluster,
    })
}

/// Handle one comment; collaborator failures before dispatch exit non-zero.
async fn cmd_dispatch(event: EventArgs, settings: SettingsArgs, dry_run: bool) -> Result<()> {
    let collaborators = build_collaborators(&settings, dry_run)?;
    let outcome = handle_comment(&collaborators, &settings.run_settings(), event.into_context())
        .await
        .context("Failed to handle PR comment")?;

    if let RunOutcome::Dispatched(report) = outcome {
        for run in report.runs() {
            println!("Created PipelineRun {}/{}", run.namespace, run.run_name);
        }
    }
    Ok(())
}

fn cmd_parse(text: &str) -> Result<()> {
    let triggers = parse_triggers(text);
    if triggers.is_empty() {
        info!("No triggers found");
    }
    for trigger in &triggers {
        println!("{}", serde_json::to_string(trigger)?);
    }
    Ok(())
}

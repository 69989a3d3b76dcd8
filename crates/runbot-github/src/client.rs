//! GitHub REST client
//!
//! Implements [`CodeHost`] over the v3 REST API: pull-request details, the
//! paginated file list, issue comments and organization membership.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use runbot_core::changed_files::ChangedFile;
use runbot_core::{CodeHost, CollabResult, PullRequestDetail, PullRequestRef};

use crate::error::{GithubError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY: usize = 800;

/// GitHub client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL
    pub api_url: String,
    /// Token sent as `Bearer`; unauthenticated when absent
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GithubConfig {
    /// Create config for a specific API endpoint
    pub fn new(api_url: &str) -> Self {
        GithubConfig {
            api_url: api_url.to_string(),
            ..Self::default()
        }
    }

    /// Set authentication token; blank tokens are ignored
    pub fn with_token(mut self, token: &str) -> Self {
        let token = token.trim();
        self.token = (!token.is_empty()).then(|| token.to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct PullRequestBody {
    head: HeadBody,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct HeadBody {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct MembershipBody {
    state: String,
}

/// GitHub client for pull-request operations
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(config: GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("runbot/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GithubError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GithubError::Client(e.to_string()))?;

        Ok(GithubClient {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn repo_url(&self, pr: &PullRequestRef) -> String {
        format!("{}/repos/{}/{}", self.api_url, pr.owner, pr.repo)
    }

    async fn get_pull_request(&self, pr: &PullRequestRef) -> Result<PullRequestDetail> {
        let url = format!("{}/pulls/{}", self.repo_url(pr), pr.number);
        let body: PullRequestBody = self.send("get pull request", self.http.get(url)).await?;
        Ok(PullRequestDetail {
            head_sha: body.head.sha,
            draft: body.draft,
        })
    }

    async fn list_files_page(
        &self,
        pr: &PullRequestRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ChangedFile>> {
        let url = format!("{}/pulls/{}/files", self.repo_url(pr), pr.number);
        let request = self
            .http
            .get(url)
            .query(&[("page", page), ("per_page", per_page)]);
        self.send("list pull request files", request).await
    }

    async fn create_issue_comment(&self, pr: &PullRequestRef, body: &str) -> Result<()> {
        let url = format!("{}/issues/{}/comments", self.repo_url(pr), pr.number);
        let request = self.http.post(url).json(&json!({ "body": body }));
        let _: IgnoredAny = self.send("create issue comment", request).await?;
        Ok(())
    }

    async fn get_membership(&self, org: &str, user: &str) -> Result<String> {
        let url = format!("{}/orgs/{}/memberships/{}", self.api_url, org, user);
        let body: MembershipBody = self.send("get org membership", self.http.get(url)).await?;
        Ok(body.state)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        debug!(operation = %operation, "Calling GitHub API");
        let response = request.send().await.map_err(|e| GithubError::Transport {
            operation: operation.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GithubError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        response.json::<T>().await.map_err(|e| GithubError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[async_trait]
impl CodeHost for GithubClient {
    async fn pull_request(&self, pr: &PullRequestRef) -> CollabResult<PullRequestDetail> {
        Ok(self.get_pull_request(pr).await?)
    }

    async fn changed_files_page(
        &self,
        pr: &PullRequestRef,
        page: u32,
        per_page: u32,
    ) -> CollabResult<Vec<ChangedFile>> {
        Ok(self.list_files_page(pr, page, per_page).await?)
    }

    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> CollabResult<()> {
        Ok(self.create_issue_comment(pr, body).await?)
    }

    async fn org_membership_state(&self, org: &str, user: &str) -> CollabResult<String> {
        Ok(self.get_membership(org, user).await?)
    }
}

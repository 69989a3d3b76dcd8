//! Run-level gates: who may trigger pipelines, and when a draft PR is held.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::{CodeHost, PullRequestDetail};

/// Organization whose active members may trigger pipelines.
pub const DEFAULT_ORG: &str = "giantswarm";
/// Numeric id of the allow-listed automation account (Renovate).
pub const DEFAULT_BOT_USER_ID: &str = "29139614";

/// Comment posted when triggers in a draft PR's body are ignored.
pub const DRAFT_NOTICE: &str = "> [!NOTE]\n> As this is a draft PR no triggers from the PR body will be handled.\n> \n> If you'd like to trigger them while draft please add them as a PR comment.";

/// Who is allowed through the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    pub org: String,
    pub bot_user_id: String,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            org: DEFAULT_ORG.to_string(),
            bot_user_id: DEFAULT_BOT_USER_ID.to_string(),
        }
    }
}

/// Why a triggering identity was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    NotActiveMember { state: String },
    MembershipLookupFailed(String),
    BotNotAllowListed,
    UnsupportedIdentity { user_type: String },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::NotActiveMember { state } => {
                write!(f, "organization membership is '{state}', not 'active'")
            }
            DenialReason::MembershipLookupFailed(err) => {
                write!(f, "failed to get org membership: {err}")
            }
            DenialReason::BotNotAllowListed => write!(f, "bot is not allow-listed"),
            DenialReason::UnsupportedIdentity { user_type } => {
                write!(f, "identity type '{user_type}' may not trigger pipelines")
            }
        }
    }
}

/// Verdict of the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Member,
    AllowListedBot,
    Denied(DenialReason),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Authorization::Denied(_))
    }
}

/// Decide whether the commenting identity may trigger pipelines.
///
/// Users need an `active` membership in the policy's organization. Bots are
/// allowed only when their numeric id matches the allow-listed id. A failed
/// membership lookup denies.
pub async fn authorize(
    host: &dyn CodeHost,
    policy: &AuthorizationPolicy,
    login: &str,
    user_id: &str,
    user_type: &str,
) -> Authorization {
    match user_type.to_lowercase().as_str() {
        "user" if !login.is_empty() => {
            match host.org_membership_state(&policy.org, login).await {
                Ok(state) if state == "active" => Authorization::Member,
                Ok(state) => Authorization::Denied(DenialReason::NotActiveMember { state }),
                Err(err) => {
                    warn!(user = %login, org = %policy.org, error = %err, "Failed to get org membership");
                    Authorization::Denied(DenialReason::MembershipLookupFailed(err.to_string()))
                }
            }
        }
        "bot" if user_id == policy.bot_user_id => {
            info!(user = %login, "Allowing allow-listed bot to trigger pipeline");
            Authorization::AllowListedBot
        }
        "bot" => Authorization::Denied(DenialReason::BotNotAllowListed),
        _ => Authorization::Denied(DenialReason::UnsupportedIdentity {
            user_type: user_type.to_string(),
        }),
    }
}

/// Triggers from a draft PR's opening body are held; comments are not.
pub fn holds_for_draft(pr: &PullRequestDetail, comment_id: &str) -> bool {
    pr.draft && comment_id.is_empty()
}

//! Ambient pull-request context.
//!
//! The context is both the source of the PR metadata used for labels and the
//! base parameter set every PipelineRun receives. Each trigger works on its
//! own copy, so arguments given to one trigger never leak into the next.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const URL: &str = "URL";
pub const NUMBER: &str = "NUMBER";
pub const TITLE: &str = "TITLE";
pub const BODY: &str = "BODY";
pub const GIT_REVISION: &str = "GIT_REVISION";
pub const CLONE_URL: &str = "CLONE_URL";
pub const REPO_NAME: &str = "REPO_NAME";
pub const REPO_ORG: &str = "REPO_ORG";
pub const CHANGED_FILES: &str = "CHANGED_FILES";
pub const COMMENT: &str = "COMMENT";
pub const PREVIOUS_COMMENT: &str = "PREVIOUS_COMMENT";
pub const COMMENT_ID: &str = "COMMENT_ID";
pub const COMMENT_URL: &str = "COMMENT_URL";
pub const USER_LOGIN: &str = "USER_LOGIN";
pub const USER_TYPE: &str = "USER_TYPE";
pub const USER_ID: &str = "USER_ID";

/// Keys every context carries, even when empty.
pub const CONTEXT_KEYS: [&str; 16] = [
    URL,
    NUMBER,
    TITLE,
    BODY,
    GIT_REVISION,
    CLONE_URL,
    REPO_NAME,
    REPO_ORG,
    CHANGED_FILES,
    COMMENT,
    PREVIOUS_COMMENT,
    COMMENT_ID,
    COMMENT_URL,
    USER_LOGIN,
    USER_TYPE,
    USER_ID,
];

/// Reserved parameter holding comma-joined positional arguments.
pub const POS_ARGS: &str = "POS_ARGS";

/// String parameters keyed by name, seeded with [`CONTEXT_KEYS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchContext {
    values: BTreeMap<String, String>,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchContext {
    /// A context with every well-known key present and empty.
    pub fn new() -> Self {
        let values = CONTEXT_KEYS
            .iter()
            .map(|key| (key.to_string(), String::new()))
            .collect();
        Self { values }
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Value for `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn repo_name(&self) -> &str {
        self.get(REPO_NAME)
    }

    pub fn repo_org(&self) -> &str {
        self.get(REPO_ORG)
    }

    pub fn number(&self) -> &str {
        self.get(NUMBER)
    }

    pub fn revision(&self) -> &str {
        self.get(GIT_REVISION)
    }

    pub fn url(&self) -> &str {
        self.get(URL)
    }

    pub fn user_login(&self) -> &str {
        self.get(USER_LOGIN)
    }

    pub fn comment(&self) -> &str {
        self.get(COMMENT)
    }

    pub fn comment_id(&self) -> &str {
        self.get(COMMENT_ID)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn into_params(self) -> BTreeMap<String, String> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_all_keys_empty() {
        let ctx = DispatchContext::new();
        assert_eq!(ctx.params().len(), CONTEXT_KEYS.len());
        assert!(ctx.params().values().all(String::is_empty));
    }

    #[test]
    fn test_set_and_get() {
        let ctx = DispatchContext::new()
            .with(REPO_NAME, "runbot")
            .with(NUMBER, "7");
        assert_eq!(ctx.repo_name(), "runbot");
        assert_eq!(ctx.number(), "7");
        assert_eq!(ctx.get("MISSING"), "");
    }

    #[test]
    fn test_copies_are_independent() {
        let ambient = DispatchContext::new().with(REPO_NAME, "runbot");
        let mut copy = ambient.clone();
        copy.set("EXTRA", "1");
        assert_eq!(ambient.get("EXTRA"), "");
        assert_eq!(copy.get("EXTRA"), "1");
    }
}

//! Files touched by a pull request, grouped by change kind.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::{CodeHost, CollabResult, PullRequestRef};

/// Page size used when listing pull-request files.
pub const FILES_PER_PAGE: u32 = 100;

/// A file entry as reported by the code host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// One of `added`, `removed`, `modified`, `renamed`, `changed`, `copied`, `unchanged`.
    pub status: String,
}

impl ChangedFile {
    pub fn new(filename: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: status.into(),
        }
    }
}

/// Added, changed and removed paths, each in the order the code host returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFileSet {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangedFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// File the path under its status. `copied`, `unchanged` and unknown
    /// statuses are ignored.
    pub fn record(&mut self, file: ChangedFile) {
        match file.status.as_str() {
            "added" => self.added.push(file.filename),
            "removed" => self.removed.push(file.filename),
            "modified" | "renamed" | "changed" => self.changed.push(file.filename),
            other => debug!(file = %file.filename, status = %other, "Ignoring changed file"),
        }
    }

    /// `added`, then `changed`, then `removed`. Not sorted or deduplicated.
    pub fn all_files(&self) -> Vec<String> {
        self.added
            .iter()
            .chain(&self.changed)
            .chain(&self.removed)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

impl FromIterator<ChangedFile> for ChangedFileSet {
    fn from_iter<I: IntoIterator<Item = ChangedFile>>(iter: I) -> Self {
        let mut set = ChangedFileSet::new();
        for file in iter {
            set.record(file);
        }
        set
    }
}

/// Page through the pull request's files until the code host returns an empty page.
pub async fn fetch_changed_files(
    host: &dyn CodeHost,
    pr: &PullRequestRef,
) -> CollabResult<ChangedFileSet> {
    let mut set = ChangedFileSet::new();
    let mut page = 1u32;
    loop {
        let files = host.changed_files_page(pr, page, FILES_PER_PAGE).await?;
        if files.is_empty() {
            break;
        }
        debug!(page = page, count = files.len(), "Fetched changed files page");
        for file in files {
            set.record(file);
        }
        page += 1;
    }
    Ok(set)
}

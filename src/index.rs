//! Commit Index / Log Reader
//!
//! Reconstructs which files each storage commit added by walking the
//! storage repository's history. Read-only.

use crate::clock::Timestamp;
use crate::error::StoreError;
use crate::vcs::{ChangeKind, CommitDetails, CommitId, VersionControl};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Directory inside a commit subfolder holding reproduction scripts.
pub const RECIPES_DIR: &str = "recipes";
/// Index of reproduction scripts inside a commit subfolder.
pub const RECIPES_INDEX: &str = "recipes.txt";

pub const TRAILER_SOURCE_COMMIT: &str = "Source-Commit";
pub const TRAILER_COMPUTATION_START: &str = "Computation-Start";
pub const TRAILER_REPRODUCE_WITH: &str = "Reproduce-With";
pub const TRAILER_TIMING: &str = "Timing";
pub const TRAILER_PATCH: &str = "Patch";

/// One storage commit and the files it added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: CommitId,
    pub timestamp: Timestamp,
    pub subject: String,
    /// Commit subfolder the added files live in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
    /// Result files and patches added, in repository order.
    pub files: Vec<String>,
    /// Reproduction scripts added alongside.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scripts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reproduce_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
}

fn trailer<'a>(message: &'a str, key: &str) -> Option<&'a str> {
    message.lines().skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim())
    })
}

fn split_subfolder(path: &Path) -> Option<(String, String)> {
    let mut components = path.components();
    let first = match components.next()? {
        Component::Normal(name) => name.to_string_lossy().to_string(),
        _ => return None,
    };
    let rest = components.as_path();
    if rest.as_os_str().is_empty() {
        return None;
    }
    Some((first, rest.to_string_lossy().replace('\\', "/")))
}

impl CommitRecord {
    /// Build a record from raw commit details.
    pub fn from_details(details: CommitDetails) -> Self {
        let mut subfolder = None;
        let mut files = Vec::new();
        let mut scripts = Vec::new();
        for change in &details.changes {
            let Some((folder, rest)) = split_subfolder(&change.path) else {
                continue;
            };
            if subfolder.is_none() {
                subfolder = Some(folder);
            }
            if change.kind != ChangeKind::Added || rest == RECIPES_INDEX {
                continue;
            }
            match rest.strip_prefix(RECIPES_DIR).and_then(|r| r.strip_prefix('/')) {
                Some(script) => scripts.push(script.to_string()),
                None => files.push(rest),
            }
        }

        let message = details.message.as_str();
        Self {
            subject: message.lines().next().unwrap_or("").to_string(),
            source_commit: trailer(message, TRAILER_SOURCE_COMMIT).map(str::to_string),
            reproduce_with: trailer(message, TRAILER_REPRODUCE_WITH).map(str::to_string),
            timing: trailer(message, TRAILER_TIMING).map(str::to_string),
            id: details.id,
            timestamp: details.timestamp,
            subfolder,
            files,
            scripts,
        }
    }

    fn matches(&self, prefix: &str) -> bool {
        if self.id.starts_with(prefix) {
            return true;
        }
        match &self.subfolder {
            Some(sub) => sub.starts_with(prefix) || prefix.starts_with(sub.as_str()),
            None => false,
        }
    }
}

/// Lazy, newest-first sequence of commit records.
pub struct CommitLog<'a> {
    vcs: &'a dyn VersionControl,
    ids: std::vec::IntoIter<CommitId>,
}

impl Iterator for CommitLog<'_> {
    type Item = Result<CommitRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        Some(self.vcs.commit_details(&id).map(CommitRecord::from_details))
    }
}

/// Records sharing one commit subfolder, as found by [`CommitIndex::lookup`].
#[derive(Debug, Clone)]
pub struct CommitLookup {
    pub subfolder: String,
    pub records: Vec<CommitRecord>,
}

/// Read access to the storage repository's history.
pub struct CommitIndex<'a> {
    vcs: &'a dyn VersionControl,
    since: Option<NaiveDate>,
}

impl<'a> CommitIndex<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs, since: None }
    }

    /// Only walk commits at or after `since`.
    pub fn since(mut self, since: Option<NaiveDate>) -> Self {
        self.since = since;
        self
    }

    /// All records, newest first. A storage root that is not (yet) a
    /// repository has an empty history.
    pub fn records(&self) -> Result<CommitLog<'a>, StoreError> {
        self.walk(self.since)
    }

    fn walk(&self, since: Option<NaiveDate>) -> Result<CommitLog<'a>, StoreError> {
        let ids = if self.vcs.is_repository() {
            self.vcs.commit_ids(since)?
        } else {
            Vec::new()
        };
        Ok(CommitLog {
            vcs: self.vcs,
            ids: ids.into_iter(),
        })
    }

    /// The record for a full commit id.
    pub fn record(&self, id: &str) -> Result<CommitRecord, StoreError> {
        self.vcs.commit_details(id).map(CommitRecord::from_details)
    }

    /// Find the commit subfolder a prefix designates. The prefix may start a
    /// storage commit id or name a subfolder (source commit). Matches in
    /// more than one subfolder are ambiguous.
    pub fn lookup(&self, prefix: &str) -> Result<CommitLookup, StoreError> {
        let prefix = prefix.trim().to_ascii_lowercase();
        let not_found = |candidates: Vec<String>| StoreError::CommitNotFound {
            prefix: prefix.clone(),
            candidates,
        };
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(not_found(Vec::new()));
        }

        let mut matched = Vec::new();
        for record in self.walk(None)? {
            let record = record?;
            if record.subfolder.is_some() && record.matches(&prefix) {
                matched.push(record);
            }
        }
        let folders: BTreeSet<String> = matched
            .iter()
            .filter_map(|r| r.subfolder.clone())
            .collect();
        match folders.len() {
            0 => Err(not_found(Vec::new())),
            1 => Ok(CommitLookup {
                subfolder: folders.into_iter().next().unwrap_or_default(),
                records: matched,
            }),
            _ => Err(not_found(folders.into_iter().collect())),
        }
    }
}

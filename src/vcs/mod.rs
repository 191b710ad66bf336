//! Version-control backend seam.
//!
//! The pipeline talks to two repositories through this trait: the source
//! repository whose code produced a result, and the storage repository that
//! records stored results. [`git::GitCli`] is the production backend.

#[cfg(test)]
pub(crate) mod fake;
pub mod git;

use crate::clock::Timestamp;
use crate::error::StoreError;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub use git::GitCli;

/// Full commit identifier (hex object id).
pub type CommitId = String;

/// Number of leading hex characters that name a commit subfolder.
pub const SHORT_ID_LEN: usize = 8;

/// Deterministic short form of a commit id.
pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Uncommitted changes of tracked files relative to the last commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeDiff {
    /// Changed paths, relative to the repository root.
    pub files: Vec<PathBuf>,
    /// Literal diff text, suitable for `git apply`.
    pub patch: String,
}

impl WorkingTreeDiff {
    pub fn is_dirty(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Change kind of a file in a commit, from the status letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Other(char),
}

impl ChangeKind {
    pub fn from_status(status: &str) -> Self {
        match status.chars().next() {
            Some('A') => ChangeKind::Added,
            Some('M') => ChangeKind::Modified,
            Some('D') => ChangeKind::Deleted,
            Some(c) => ChangeKind::Other(c),
            None => ChangeKind::Other('?'),
        }
    }
}

/// One file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Everything the pipeline reads about a single commit.
#[derive(Debug, Clone)]
pub struct CommitDetails {
    pub id: CommitId,
    pub timestamp: Timestamp,
    /// Full commit message (subject, blank line, body).
    pub message: String,
    pub changes: Vec<ChangedFile>,
}

/// Version-control operations the store, log, and diff paths need.
pub trait VersionControl {
    /// Working-tree root of the repository.
    fn root(&self) -> &Path;

    /// Whether `root` is itself the top level of a repository.
    fn is_repository(&self) -> bool;

    /// Create an empty repository at `root`.
    fn init(&self) -> Result<(), StoreError>;

    /// Current HEAD commit, `None` before the first commit.
    fn head(&self) -> Result<Option<CommitId>, StoreError>;

    /// Uncommitted changes of tracked files against HEAD.
    fn uncommitted_changes(&self) -> Result<WorkingTreeDiff, StoreError>;

    /// Commit ids reachable from HEAD, newest first.
    fn commit_ids(&self, since: Option<NaiveDate>) -> Result<Vec<CommitId>, StoreError>;

    /// Timestamp, message, and changed files of one commit.
    fn commit_details(&self, id: &str) -> Result<CommitDetails, StoreError>;

    /// Stage `paths` (relative to `root`) and commit them.
    fn add_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<CommitId, StoreError>;

    /// Undo the staging of `paths`.
    fn unstage(&self, paths: &[PathBuf]) -> Result<(), StoreError>;

    /// Expand an abbreviated commit id.
    fn resolve_prefix(&self, prefix: &str) -> Result<CommitId, StoreError>;
}

//! Working-Tree Inspector
//!
//! Builds a fresh [`SourceState`] from the source repository on every store
//! request; nothing is cached between requests.

use crate::clock::{self, Clock, Timestamp};
use crate::error::StoreError;
use crate::vcs::{short_id, ChangeKind, CommitId, VersionControl, WorkingTreeDiff};
use std::path::PathBuf;
use tracing::{debug, info};

/// Snapshot of the source repository at store time.
#[derive(Debug, Clone)]
pub struct SourceState {
    /// HEAD of the source repository.
    pub head: CommitId,
    /// Latest relevant source change; `None` when no tracked source exists.
    pub last_source_change: Option<Timestamp>,
    /// File that carries `last_source_change`, when one does.
    pub latest_source: Option<PathBuf>,
    /// Uncommitted changes of tracked files.
    pub uncommitted: WorkingTreeDiff,
}

impl SourceState {
    pub fn is_dirty(&self) -> bool {
        self.uncommitted.is_dirty()
    }

    /// Name of the storage subfolder for this code state.
    pub fn subfolder(&self) -> String {
        short_id(&self.head)
    }
}

/// Query the backend for uncommitted changes against the last commit.
pub fn inspect_working_tree(vcs: &dyn VersionControl) -> Result<WorkingTreeDiff, StoreError> {
    if !vcs.is_repository() {
        return Err(StoreError::repository(vcs.root(), "not a git repository"));
    }
    let diff = vcs.uncommitted_changes()?;
    if diff.is_dirty() {
        info!(files = ?diff.files, "Uncommitted changes in source tree");
    } else {
        debug!("No uncommitted changes found");
    }
    Ok(diff)
}

/// Read HEAD, dirtiness, and the latest source change time.
///
/// A dirty tree counts as changed "now". A clean tree uses the newest
/// modification time among the files the HEAD commit touched that still
/// exist.
pub fn snapshot_source_state(
    vcs: &dyn VersionControl,
    clock: &dyn Clock,
) -> Result<SourceState, StoreError> {
    let uncommitted = inspect_working_tree(vcs)?;
    let head = vcs
        .head()?
        .ok_or_else(|| StoreError::repository(vcs.root(), "source repository has no commits"))?;

    if uncommitted.is_dirty() {
        return Ok(SourceState {
            head,
            last_source_change: Some(clock.now()),
            latest_source: None,
            uncommitted,
        });
    }

    let details = vcs.commit_details(&head)?;
    let touched: Vec<PathBuf> = details
        .changes
        .iter()
        .filter(|c| c.kind != ChangeKind::Deleted)
        .map(|c| vcs.root().join(&c.path))
        .collect();
    let latest = clock::latest_mtime(&touched)?;
    if let Some((path, ts)) = &latest {
        info!(file = %path.display(), modified = %clock::format_timestamp(ts), "Latest source change");
    }
    let (latest_source, last_source_change) = match latest {
        Some((path, ts)) => (Some(path), Some(ts)),
        None => (None, None),
    };

    Ok(SourceState {
        head,
        last_source_change,
        latest_source,
        uncommitted,
    })
}

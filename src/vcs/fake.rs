//! In-memory backend for unit tests.

use super::{ChangeKind, ChangedFile, CommitDetails, CommitId, VersionControl, WorkingTreeDiff};
use crate::error::StoreError;
use chrono::{Local, NaiveDate, TimeZone};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub(crate) struct FakeRepo {
    pub root: PathBuf,
    pub repository: bool,
    pub diff: WorkingTreeDiff,
    /// Changes reported for the initial HEAD commit.
    pub head_changes: Vec<ChangedFile>,
    pub fail_commit: bool,
    /// File a failing commit leaves behind, like a hook writing into the tree.
    pub stray_on_failure: Option<PathBuf>,
    pub commits: RefCell<Vec<CommitDetails>>,
    pub unstaged: RefCell<Vec<PathBuf>>,
}

impl FakeRepo {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            repository: true,
            diff: WorkingTreeDiff::default(),
            head_changes: Vec::new(),
            fail_commit: false,
            stray_on_failure: None,
            commits: RefCell::new(Vec::new()),
            unstaged: RefCell::new(Vec::new()),
        }
    }

    /// A repository whose HEAD touched `changes`.
    pub fn with_head(root: &Path, changes: Vec<ChangedFile>) -> Self {
        let repo = Self::new(root);
        repo.push_commit("Initial", changes.clone());
        Self {
            head_changes: changes,
            ..repo
        }
    }

    fn push_commit(&self, message: &str, changes: Vec<ChangedFile>) -> CommitId {
        let mut commits = self.commits.borrow_mut();
        let n = commits.len() + 1;
        let id = format!("{:08x}{}", 0xabc0_0000u32 + n as u32, "0".repeat(32));
        commits.push(CommitDetails {
            id: id.clone(),
            timestamp: Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(n as i64),
            message: message.to_string(),
            changes,
        });
        id
    }
}

impl VersionControl for FakeRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_repository(&self) -> bool {
        self.repository
    }

    fn init(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn head(&self) -> Result<Option<CommitId>, StoreError> {
        if !self.repository {
            return Err(StoreError::repository(&self.root, "not a git repository"));
        }
        Ok(self.commits.borrow().last().map(|c| c.id.clone()))
    }

    fn uncommitted_changes(&self) -> Result<WorkingTreeDiff, StoreError> {
        Ok(self.diff.clone())
    }

    fn commit_ids(&self, _since: Option<NaiveDate>) -> Result<Vec<CommitId>, StoreError> {
        Ok(self
            .commits
            .borrow()
            .iter()
            .rev()
            .map(|c| c.id.clone())
            .collect())
    }

    fn commit_details(&self, id: &str) -> Result<CommitDetails, StoreError> {
        self.commits
            .borrow()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::repository(&self.root, format!("unknown commit {}", id)))
    }

    fn add_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<CommitId, StoreError> {
        if self.fail_commit {
            if let Some(stray) = &self.stray_on_failure {
                std::fs::write(stray, b"stray")?;
            }
            return Err(StoreError::Commit {
                target: format!("{} paths", paths.len()),
                message: "hook rejected commit".to_string(),
            });
        }
        let changes = paths
            .iter()
            .map(|p| ChangedFile {
                kind: ChangeKind::Added,
                path: p.clone(),
            })
            .collect();
        Ok(self.push_commit(message, changes))
    }

    fn unstage(&self, paths: &[PathBuf]) -> Result<(), StoreError> {
        self.unstaged.borrow_mut().extend(paths.iter().cloned());
        Ok(())
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<CommitId, StoreError> {
        let commits = self.commits.borrow();
        let matches: Vec<&CommitDetails> =
            commits.iter().filter(|c| c.id.starts_with(prefix)).collect();
        match matches.as_slice() {
            [one] => Ok(one.id.clone()),
            _ => Err(StoreError::CommitNotFound {
                prefix: prefix.to_string(),
                candidates: matches.iter().map(|c| c.id.clone()).collect(),
            }),
        }
    }
}

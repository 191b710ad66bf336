//! Git backend driven through the `git` executable.

use super::{ChangeKind, ChangedFile, CommitDetails, CommitId, VersionControl, WorkingTreeDiff};
use crate::error::StoreError;
use chrono::{Local, NaiveDate, TimeZone};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// A repository accessed with `git -C <root> …`.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    identity: Option<(String, String)>,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identity: None,
        }
    }

    /// The repository containing `dir`, rooted at its top level.
    ///
    /// Falls back to `dir` itself when it is not inside a work tree, so the
    /// caller's repository checks report against the directory it was given.
    pub fn discover(dir: impl Into<PathBuf>) -> Self {
        let fallback = Self::new(dir);
        match fallback.query(["rev-parse", "--show-toplevel"], "rev-parse --show-toplevel") {
            Ok(top) if !top.trim().is_empty() => {
                let top = PathBuf::from(top.trim());
                let root = dunce::canonicalize(&top).unwrap_or(top);
                debug!(dir = %fallback.root.display(), root = %root.display(), "Discovered repository root");
                Self::new(root)
            }
            _ => fallback,
        }
    }

    /// Commit as `name <email>` regardless of the user's git configuration.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.root);
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c").arg(format!("user.name={}", name));
            cmd.arg("-c").arg(format!("user.email={}", email));
        }
        cmd
    }

    fn output<I, S>(&self, args: I) -> Result<Output, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = self.command();
        cmd.args(args);
        debug!(root = %self.root.display(), command = ?cmd, "git");
        cmd.output()
            .map_err(|e| StoreError::repository(&self.root, format!("git execution failed: {}", e)))
    }

    /// Run a query and return stdout, mapping failures to repository errors.
    fn query<I, S>(&self, args: I, what: &str) -> Result<String, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(StoreError::repository(
                &self.root,
                format!(
                    "git {} failed: {}",
                    what,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn require_repository(&self) -> Result<(), StoreError> {
        if self.is_repository() {
            Ok(())
        } else {
            Err(StoreError::repository(&self.root, "not a git repository"))
        }
    }

    fn commit_failure(&self, paths: &[PathBuf], step: &str, output: &Output) -> StoreError {
        StoreError::Commit {
            target: describe_paths(paths),
            message: format!(
                "git {} failed: {}",
                step,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

fn describe_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_nul(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\0').filter(|s| !s.is_empty())
}

/// Parse `diff-tree --name-status -z` output: `status\0path\0…`.
fn parse_name_status(raw: &str) -> Vec<ChangedFile> {
    let mut tokens = split_nul(raw);
    let mut changes = Vec::new();
    while let (Some(status), Some(path)) = (tokens.next(), tokens.next()) {
        changes.push(ChangedFile {
            kind: ChangeKind::from_status(status.trim()),
            path: PathBuf::from(path),
        });
    }
    changes
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

impl VersionControl for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_repository(&self) -> bool {
        if !self.root.is_dir() {
            return false;
        }
        let Ok(output) = self.output(["rev-parse", "--show-toplevel"]) else {
            return false;
        };
        if !output.status.success() {
            return false;
        }
        let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        match (
            dunce::canonicalize(&self.root),
            dunce::canonicalize(Path::new(&toplevel)),
        ) {
            (Ok(root), Ok(top)) => root == top,
            _ => false,
        }
    }

    fn init(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        self.query(["init", "-q"], "init")?;
        Ok(())
    }

    fn head(&self) -> Result<Option<CommitId>, StoreError> {
        let output = self.output(["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])?;
        if output.status.success() {
            let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(id));
        }
        self.require_repository()?;
        Ok(None)
    }

    fn uncommitted_changes(&self) -> Result<WorkingTreeDiff, StoreError> {
        let names = self.query(
            ["diff", "--name-only", "-z", "--no-ext-diff", "HEAD"],
            "diff --name-only",
        )?;
        let files: Vec<PathBuf> = split_nul(&names).map(PathBuf::from).collect();
        if files.is_empty() {
            return Ok(WorkingTreeDiff::default());
        }
        let patch = self.query(
            ["diff", "--no-color", "--no-ext-diff", "--binary", "HEAD"],
            "diff",
        )?;
        Ok(WorkingTreeDiff { files, patch })
    }

    fn commit_ids(&self, since: Option<NaiveDate>) -> Result<Vec<CommitId>, StoreError> {
        if self.head()?.is_none() {
            return Ok(Vec::new());
        }
        let mut args = vec!["rev-list".to_string(), "HEAD".to_string()];
        if let Some(date) = since {
            args.push(format!("--since={}", date.format("%Y-%m-%d")));
        }
        let raw = self.query(&args, "rev-list")?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn commit_details(&self, id: &str) -> Result<CommitDetails, StoreError> {
        let raw = self.query(["show", "-s", "--format=%H%x00%ct%x00%B", id], "show")?;
        let mut parts = raw.splitn(3, '\0');
        let (Some(full), Some(secs), Some(message)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(StoreError::repository(
                &self.root,
                format!("unexpected git show output for {}", id),
            ));
        };
        let secs: i64 = secs.trim().parse().map_err(|_| {
            StoreError::repository(&self.root, format!("bad commit time for {}: {}", id, secs))
        })?;
        let timestamp = Local.timestamp_opt(secs, 0).single().ok_or_else(|| {
            StoreError::repository(&self.root, format!("commit time out of range for {}", id))
        })?;

        let changes = self.query(
            [
                "diff-tree",
                "--no-commit-id",
                "-r",
                "--root",
                "--name-status",
                "-z",
                id,
            ],
            "diff-tree",
        )?;

        Ok(CommitDetails {
            id: full.trim().to_string(),
            timestamp,
            message: message.trim_end().to_string(),
            changes: parse_name_status(&changes),
        })
    }

    fn add_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<CommitId, StoreError> {
        let mut add = vec![
            std::ffi::OsString::from("add"),
            std::ffi::OsString::from("--"),
        ];
        add.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        let output = self.output(&add)?;
        if !output.status.success() {
            return Err(self.commit_failure(paths, "add", &output));
        }

        let output = self.output(["commit", "-q", "-m", message])?;
        if !output.status.success() {
            return Err(self.commit_failure(paths, "commit", &output));
        }

        self.head()?.ok_or_else(|| StoreError::Commit {
            target: describe_paths(paths),
            message: "HEAD missing after commit".to_string(),
        })
    }

    fn unstage(&self, paths: &[PathBuf]) -> Result<(), StoreError> {
        let mut args: Vec<std::ffi::OsString> = if self.head()?.is_some() {
            vec!["reset".into(), "-q".into(), "HEAD".into(), "--".into()]
        } else {
            vec![
                "rm".into(),
                "--cached".into(),
                "-r".into(),
                "-q".into(),
                "--ignore-unmatch".into(),
                "--".into(),
            ]
        };
        args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        self.query(&args, "unstage")?;
        Ok(())
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<CommitId, StoreError> {
        let not_found = || StoreError::CommitNotFound {
            prefix: prefix.to_string(),
            candidates: Vec::new(),
        };
        if !is_hex(prefix) {
            return Err(not_found());
        }
        self.require_repository()?;
        let rev = format!("{}^{{commit}}", prefix);
        let output = self.output(["rev-parse", "--verify", "--quiet", rev.as_str()])?;
        if !output.status.success() {
            return Err(not_found());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

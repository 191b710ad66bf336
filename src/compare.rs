//! Comparison against stored results
//!
//! Finds the stored copy of a result in a commit subfolder and hands both
//! files to the external comparison tool. The tool's output and exit
//! status pass through unchanged.

use crate::error::StoreError;
use crate::index::CommitIndex;
use crate::patch::stamped_token;
use crate::vcs::{short_id, VersionControl};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, info};
use walkdir::WalkDir;

/// External comparison tool and its default tolerances.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTool {
    pub program: String,
    pub eps: Option<f64>,
    pub rel_eps: Option<f64>,
    /// Prefix of the file the tool writes its differences to.
    pub output_prefix: String,
}

impl Default for ComparisonTool {
    fn default() -> Self {
        Self {
            program: "gdxdiff".to_string(),
            eps: None,
            rel_eps: None,
            output_prefix: "diffile_".to_string(),
        }
    }
}

impl ComparisonTool {
    /// Default output file for comparing `file_name`.
    pub fn output_name(&self, file_name: &str) -> String {
        format!("{}{}", self.output_prefix, file_name)
    }

    /// `<program> <current> <stored> <output> [Eps=..] [RelEps=..]`
    pub fn command(&self, current: &Path, stored: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(current).arg(stored).arg(output);
        if let Some(eps) = self.eps {
            cmd.arg(format!("Eps={}", eps));
        }
        if let Some(rel_eps) = self.rel_eps {
            cmd.arg(format!("RelEps={}", rel_eps));
        }
        cmd
    }

    /// Run the tool with inherited stdio.
    pub fn run(&self, current: &Path, stored: &Path, output: &Path) -> Result<ExitStatus, StoreError> {
        let mut cmd = self.command(current, stored, output);
        info!(tool = %self.program, current = %current.display(), stored = %stored.display(), "Running comparison");
        cmd.status().map_err(|e| StoreError::ComparisonTool {
            tool: self.program.clone(),
            message: e.to_string(),
        })
    }
}

/// Resolve a commit prefix to a subfolder of `storage_root`.
///
/// Storage history is consulted first. When it has no match, the prefix is
/// resolved in the source repository and its short id is used if that
/// folder exists on disk.
pub fn resolve_subfolder(
    storage: &dyn VersionControl,
    source: &dyn VersionControl,
    prefix: &str,
) -> Result<String, StoreError> {
    match CommitIndex::new(storage).lookup(prefix) {
        Ok(found) => {
            debug!(subfolder = %found.subfolder, records = found.records.len(), "Resolved from storage history");
            Ok(found.subfolder)
        }
        Err(StoreError::CommitNotFound { prefix, candidates }) if candidates.is_empty() => {
            let folder = source
                .resolve_prefix(&prefix)
                .ok()
                .map(|id| short_id(&id))
                .filter(|folder| storage.root().join(folder).is_dir());
            folder.ok_or(StoreError::CommitNotFound { prefix, candidates })
        }
        Err(e) => Err(e),
    }
}

/// The stored copy of `file_name` in `subfolder`: the exact name, or the
/// newest timestamped variant.
pub fn locate_stored(
    storage_root: &Path,
    subfolder: &str,
    file_name: &str,
) -> Result<PathBuf, StoreError> {
    let folder = storage_root.join(subfolder);
    let exact = folder.join(file_name);
    if exact.is_file() {
        return Ok(exact);
    }

    let newest = WalkDir::new(&folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let token = stamped_token(file_name, &name)?.to_string();
            Some((token, entry.into_path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0));

    newest.map(|(_, path)| path).ok_or_else(|| StoreError::StoredArtifactNotFound {
        file: file_name.to_string(),
        subfolder: subfolder.to_string(),
    })
}

//! Storage Committer
//!
//! Copies a validated result (plus optional patch and script) into its
//! commit subfolder and records them in one storage-repository commit.
//! Either the commit succeeds or nothing the request wrote remains.

use crate::error::StoreError;
use crate::index::{CommitIndex, CommitRecord, RECIPES_DIR, RECIPES_INDEX};
use crate::patch::PatchArtifact;
use crate::vcs::VersionControl;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const RECIPES_HEADER: &str =
    "# Reproduction scripts for stored results that are not build targets\n\n";

/// Everything one store writes.
#[derive(Debug, Clone)]
pub struct StoragePlan {
    pub subfolder: String,
    /// Working-copy result file; never modified.
    pub result_source: PathBuf,
    pub stored_name: String,
    pub patch: Option<PatchArtifact>,
    /// Reproduction script to archive with the result.
    pub script: Option<PathBuf>,
    pub message: String,
}

/// Writes into a storage root backed by a repository.
pub struct StorageCommitter<'a> {
    vcs: &'a dyn VersionControl,
}

fn content_hash(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut file = fs::File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

fn file_name(path: &Path) -> Result<String, StoreError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| StoreError::artifact(path, "path has no file name"))
}

/// Files and directories written by one request, for rollback.
#[derive(Default)]
struct Staging {
    created_files: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
    /// Previous bytes of a file the request appended to (`None`: did not exist).
    modified: Vec<(PathBuf, Option<Vec<u8>>)>,
    /// Paths to commit, relative to the storage root.
    paths: Vec<PathBuf>,
}

impl Staging {
    fn create_dir(&mut self, dir: &Path) -> io::Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            self.created_dirs.push(dir.to_path_buf());
        }
        Ok(())
    }

    /// Undo everything written so far. Returns directories that could not be
    /// removed.
    fn rollback(&self, vcs: &dyn VersionControl) -> Vec<PathBuf> {
        if let Err(e) = vcs.unstage(&self.paths) {
            warn!(error = %e, "Failed to unstage paths during rollback");
        }
        for file in &self.created_files {
            if let Err(e) = fs::remove_file(file) {
                warn!(file = %file.display(), error = %e, "Failed to remove file during rollback");
            }
        }
        for (file, previous) in &self.modified {
            let restored = match previous {
                Some(bytes) => fs::write(file, bytes),
                None => fs::remove_file(file),
            };
            if let Err(e) = restored {
                warn!(file = %file.display(), error = %e, "Failed to restore file during rollback");
            }
        }
        let mut left_behind = Vec::new();
        for dir in self.created_dirs.iter().rev() {
            if let Err(e) = fs::remove_dir(dir) {
                warn!(dir = %dir.display(), error = %e, "Failed to remove directory during rollback");
                left_behind.push(dir.clone());
            }
        }
        left_behind
    }
}

impl<'a> StorageCommitter<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    pub fn root(&self) -> &Path {
        self.vcs.root()
    }

    /// Turn the storage root into a repository if it is not one yet.
    pub fn ensure_repository(&self) -> Result<(), StoreError> {
        if !self.vcs.is_repository() {
            info!(root = %self.root().display(), "Initializing storage repository");
            self.vcs.init()?;
        }
        Ok(())
    }

    pub fn destination(&self, subfolder: &str, name: &str) -> PathBuf {
        self.root().join(subfolder).join(name)
    }

    /// Fail if any destination of `plan` is already taken.
    pub fn check_conflicts(&self, plan: &StoragePlan) -> Result<(), StoreError> {
        let result_dest = self.destination(&plan.subfolder, &plan.stored_name);
        if result_dest.exists() {
            let reason = match (content_hash(&result_dest), content_hash(&plan.result_source)) {
                (Ok(a), Ok(b)) if a == b => "already stored with identical content",
                _ => "a different file is stored under this name",
            };
            return Err(StoreError::StorageConflict {
                destination: result_dest,
                reason: reason.to_string(),
            });
        }
        if let Some(patch) = &plan.patch {
            let patch_dest = self.destination(&plan.subfolder, &patch.name);
            if patch_dest.exists() {
                return Err(StoreError::StorageConflict {
                    destination: patch_dest,
                    reason: "a patch is already stored under this name".to_string(),
                });
            }
        }
        if let Some(script) = &plan.script {
            let script_dest = self
                .root()
                .join(&plan.subfolder)
                .join(RECIPES_DIR)
                .join(file_name(script)?);
            if script_dest.exists() && content_hash(&script_dest)? != content_hash(script)? {
                return Err(StoreError::StorageConflict {
                    destination: script_dest,
                    reason: "a different script is stored under this name".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Materialize `plan` and commit it.
    pub fn commit(&self, plan: &StoragePlan) -> Result<CommitRecord, StoreError> {
        self.ensure_repository()?;
        self.check_conflicts(plan)?;

        let mut staging = Staging::default();
        let outcome = self
            .materialize(plan, &mut staging)
            .and_then(|()| self.vcs.add_and_commit(&staging.paths, &plan.message));

        let id = match outcome {
            Ok(id) => id,
            Err(err) => {
                warn!(subfolder = %plan.subfolder, error = %err, "Store failed; removing copied files");
                let left_behind = staging.rollback(self.vcs);
                return Err(match err {
                    StoreError::Commit { mut message, .. } => {
                        if !left_behind.is_empty() {
                            let dirs: Vec<String> =
                                left_behind.iter().map(|d| d.display().to_string()).collect();
                            message.push_str(&format!("; left behind: {}", dirs.join(", ")));
                        }
                        StoreError::Commit {
                            target: plan.subfolder.clone(),
                            message,
                        }
                    }
                    other => other,
                });
            }
        };

        info!(commit = %id, subfolder = %plan.subfolder, "Stored result committed");
        CommitIndex::new(self.vcs).record(&id)
    }

    fn materialize(&self, plan: &StoragePlan, staging: &mut Staging) -> Result<(), StoreError> {
        let folder = self.root().join(&plan.subfolder);
        let relative = PathBuf::from(&plan.subfolder);
        staging.create_dir(&folder)?;

        let result_dest = folder.join(&plan.stored_name);
        fs::copy(&plan.result_source, &result_dest)?;
        staging.created_files.push(result_dest.clone());
        staging.paths.push(relative.join(&plan.stored_name));
        info!(file = %result_dest.display(), "File stored");

        if let Some(patch) = &plan.patch {
            let patch_dest = folder.join(&patch.name);
            fs::write(&patch_dest, patch.contents.as_bytes())?;
            staging.created_files.push(patch_dest.clone());
            staging.paths.push(relative.join(&patch.name));
            info!(file = %patch_dest.display(), "Patch saved");
        }

        if let Some(script) = &plan.script {
            let name = file_name(script)?;
            let recipes = folder.join(RECIPES_DIR);
            staging.create_dir(&recipes)?;
            let script_dest = recipes.join(&name);
            if !script_dest.exists() {
                fs::copy(script, &script_dest)?;
                staging.created_files.push(script_dest.clone());
                staging
                    .paths
                    .push(relative.join(RECIPES_DIR).join(&name));
            }

            let index = folder.join(RECIPES_INDEX);
            let previous = if index.exists() {
                Some(fs::read(&index)?)
            } else {
                None
            };
            let mut contents = previous
                .clone()
                .unwrap_or_else(|| RECIPES_HEADER.as_bytes().to_vec());
            staging.modified.push((index.clone(), previous));
            contents.extend_from_slice(
                format!("{}: {}\n", plan.stored_name, script.display()).as_bytes(),
            );
            fs::write(&index, contents)?;
            staging.paths.push(relative.join(RECIPES_INDEX));
            info!(script = %script.display(), "Reproduction script archived");
        }

        Ok(())
    }
}

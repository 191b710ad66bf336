//! Store pipeline
//!
//! One store request walks `Resolving → Inspecting → [Packaging] →
//! Validating → Committing`. Any stage may abort the request; nothing is
//! retried and nothing reaches storage before the timing check passed.

use crate::clock::{self, Clock, StartTimeSource, SystemClock, Timestamp};
use crate::error::StoreError;
use crate::index::{
    CommitRecord, TRAILER_COMPUTATION_START, TRAILER_PATCH, TRAILER_REPRODUCE_WITH,
    TRAILER_SOURCE_COMMIT, TRAILER_TIMING,
};
use crate::inspect::{snapshot_source_state, SourceState};
use crate::operator::Operator;
use crate::patch::{self, StoredNames};
use crate::provenance::{
    resolve_provenance, BuildDescription, BuildLookup, MakeDatabase, Provenance, Resolution,
};
use crate::storage::{StorageCommitter, StoragePlan};
use crate::timing::{validate_timing, TimingInput, TimingVerdict};
use crate::vcs::{GitCli, VersionControl};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Stages of one store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStage {
    Resolving,
    Inspecting,
    Packaging,
    Validating,
    Committing,
}

impl fmt::Display for StoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreStage::Resolving => "resolving",
            StoreStage::Inspecting => "inspecting",
            StoreStage::Packaging => "packaging",
            StoreStage::Validating => "validating",
            StoreStage::Committing => "committing",
        };
        f.write_str(s)
    }
}

/// Settings every store request runs with, loaded once at startup.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Source repository root; relative paths resolve against it.
    pub workspace: PathBuf,
    pub storage_root: PathBuf,
    pub build_program: String,
    pub build_args: Vec<String>,
    /// Commit identity (`name`, `email`) for the storage repository.
    pub author: Option<(String, String)>,
}

impl StoreSettings {
    pub fn new(workspace: impl Into<PathBuf>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            storage_root: storage_root.into(),
            build_program: "make".to_string(),
            build_args: Vec::new(),
            author: None,
        }
    }

    /// `path` made absolute against the workspace.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Backend for the storage repository.
    pub fn storage_repository(&self) -> GitCli {
        let git = GitCli::new(&self.storage_root);
        match &self.author {
            Some((name, email)) => git.with_identity(name, email),
            None => git,
        }
    }
}

/// One "store this file" request.
#[derive(Debug, Clone, Default)]
pub struct StoreRequest {
    pub artifact: PathBuf,
    pub script: Option<PathBuf>,
    /// Declared computation start; derived from the file when absent.
    pub computation_start: Option<Timestamp>,
    pub override_timing: bool,
}

impl StoreRequest {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            ..Default::default()
        }
    }
}

/// What a successful store did.
#[derive(Debug, Clone)]
pub struct StoreReceipt {
    pub record: CommitRecord,
    pub subfolder: String,
    pub stored_name: String,
    pub patch_name: Option<String>,
    pub provenance: Provenance,
    pub verdict: TimingVerdict,
    pub computation_start: Timestamp,
    pub start_source: StartTimeSource,
}

/// The store pipeline over injected collaborators.
pub struct StorePipeline<'a> {
    settings: &'a StoreSettings,
    source: &'a dyn VersionControl,
    storage: &'a dyn VersionControl,
    build: &'a dyn BuildDescription,
    clock: &'a dyn Clock,
}

fn stage<T>(
    stage: StoreStage,
    artifact: &Path,
    f: impl FnOnce() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    info!(stage = %stage, artifact = %artifact.display(), "Store stage");
    f().map_err(|e| {
        warn!(stage = %stage, artifact = %artifact.display(), reason = %e, "Store aborted");
        e
    })
}

impl<'a> StorePipeline<'a> {
    pub fn new(
        settings: &'a StoreSettings,
        source: &'a dyn VersionControl,
        storage: &'a dyn VersionControl,
        build: &'a dyn BuildDescription,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            settings,
            source,
            storage,
            build,
            clock,
        }
    }

    /// Run one store request to completion or abort.
    pub fn run(
        &self,
        request: &StoreRequest,
        operator: &mut dyn Operator,
    ) -> Result<StoreReceipt, StoreError> {
        let artifact = self.settings.resolve(&request.artifact);
        if !artifact.is_file() {
            return Err(StoreError::artifact(&artifact, "file does not exist"));
        }
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::artifact(&artifact, "path has no file name"))?;

        let provenance = stage(StoreStage::Resolving, &artifact, || {
            self.resolve(&artifact, request.script.as_deref(), operator)
        })?;

        let (state, computation_start, start_source) =
            stage(StoreStage::Inspecting, &artifact, || {
                let state = snapshot_source_state(self.source, self.clock)?;
                let (start, source) = match request.computation_start {
                    Some(start) => (start, StartTimeSource::Declared),
                    None => clock::derive_computation_start(&artifact)?,
                };
                info!(
                    start = %clock::format_timestamp(&start),
                    source = ?source,
                    "Computation start"
                );
                Ok((state, start, source))
            })?;

        let names = if state.is_dirty() {
            stage(StoreStage::Packaging, &artifact, || {
                self.package(&file_name, &computation_start, &state, operator)
            })?
        } else {
            patch::package(&file_name, &computation_start, None)
        };

        let verdict = stage(StoreStage::Validating, &artifact, || {
            validate_timing(&TimingInput {
                artifact: &artifact,
                computation_start,
                last_source_change: state.last_source_change,
                latest_source: state.latest_source.as_deref(),
                override_timing: request.override_timing,
            })
        })?;

        let subfolder = state.subfolder();
        let plan = StoragePlan {
            subfolder: subfolder.clone(),
            result_source: artifact.clone(),
            stored_name: names.result.clone(),
            patch: names.patch.clone(),
            script: match &provenance {
                Provenance::Script(path) => Some(path.clone()),
                Provenance::BuildStep(_) => None,
            },
            message: commit_message(
                &file_name,
                &state,
                &computation_start,
                &provenance,
                verdict,
                &names,
            ),
        };
        let record = stage(StoreStage::Committing, &artifact, || {
            StorageCommitter::new(self.storage).commit(&plan)
        })?;

        Ok(StoreReceipt {
            record,
            subfolder,
            stored_name: names.result,
            patch_name: names.patch.map(|p| p.name),
            provenance,
            verdict,
            computation_start,
            start_source,
        })
    }

    fn resolve(
        &self,
        artifact: &Path,
        script: Option<&Path>,
        operator: &mut dyn Operator,
    ) -> Result<Provenance, StoreError> {
        let script = script.map(|s| self.settings.resolve(s));
        let lookup = self.build.lookup(artifact);
        match resolve_provenance(artifact, lookup, script.as_deref())? {
            Resolution::Resolved(provenance) => Ok(provenance),
            Resolution::NeedsScript => {
                let answer = operator.reproduction_script(artifact)?.ok_or_else(|| {
                    StoreError::ProvenanceUnresolved {
                        artifact: artifact.to_path_buf(),
                        reason: "no reproduction script supplied".to_string(),
                    }
                })?;
                let answer = self.settings.resolve(&answer);
                match resolve_provenance(artifact, BuildLookup::Unrecognized, Some(&answer))? {
                    Resolution::Resolved(provenance) => Ok(provenance),
                    Resolution::NeedsScript => Err(StoreError::ProvenanceUnresolved {
                        artifact: artifact.to_path_buf(),
                        reason: "no reproduction script supplied".to_string(),
                    }),
                }
            }
        }
    }

    fn package(
        &self,
        file_name: &str,
        computation_start: &Timestamp,
        state: &SourceState,
        operator: &mut dyn Operator,
    ) -> Result<StoredNames, StoreError> {
        if operator.capture_patch(&state.uncommitted.files)? {
            let names = patch::package(file_name, computation_start, Some(&state.uncommitted));
            info!(result = %names.result, "Uncommitted changes captured as patch");
            Ok(names)
        } else {
            warn!("Storing from a dirty source tree without a patch");
            Ok(patch::package(file_name, computation_start, None))
        }
    }
}

fn commit_message(
    file_name: &str,
    state: &SourceState,
    computation_start: &Timestamp,
    provenance: &Provenance,
    verdict: TimingVerdict,
    names: &StoredNames,
) -> String {
    let mut message = format!("Store {}\n\n", file_name);
    message.push_str(&format!("{}: {}\n", TRAILER_SOURCE_COMMIT, state.head));
    message.push_str(&format!(
        "{}: {}\n",
        TRAILER_COMPUTATION_START,
        clock::format_timestamp(computation_start)
    ));
    message.push_str(&format!(
        "{}: {}\n",
        TRAILER_REPRODUCE_WITH,
        provenance.describe()
    ));
    message.push_str(&format!("{}: {}\n", TRAILER_TIMING, verdict));
    if let Some(patch) = &names.patch {
        message.push_str(&format!("{}: {}\n", TRAILER_PATCH, patch.name));
    }
    message
}

/// Run a store request against the real repositories, make database and
/// system clock described by `settings`.
pub fn store(
    settings: &StoreSettings,
    request: &StoreRequest,
    operator: &mut dyn Operator,
) -> Result<StoreReceipt, StoreError> {
    let source = GitCli::discover(&settings.workspace);
    let storage = settings.storage_repository();
    let build = MakeDatabase::load(
        &settings.build_program,
        &settings.build_args,
        &settings.workspace,
    );
    StorePipeline::new(settings, &source, &storage, &build, &SystemClock).run(request, operator)
}

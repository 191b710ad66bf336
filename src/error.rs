//! Error types for the store pipeline and the CLI layer.

use crate::clock::{format_timestamp, Timestamp};
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the store, log, and diff operations.
///
/// Every variant aborts the current request. Messages carry the timestamps
/// or identifiers that triggered them so the operator can decide whether to
/// fix the cause or override.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "{} is not a build target and no reproduction script was supplied: {reason}",
        .artifact.display()
    )]
    ProvenanceUnresolved { artifact: PathBuf, reason: String },

    #[error("Repository error in {}: {message}", .root.display())]
    RepositoryState { root: PathBuf, message: String },

    #[error(
        "Computation of {} started before the latest source change\n  latest change:   {}{}\n  execution start: {}",
        .artifact.display(),
        format_timestamp(.last_source_change),
        .latest_source.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default(),
        format_timestamp(.computation_start)
    )]
    TimingViolation {
        artifact: PathBuf,
        computation_start: Timestamp,
        last_source_change: Timestamp,
        latest_source: Option<PathBuf>,
    },

    #[error("{} already exists in storage: {reason}", .destination.display())]
    StorageConflict { destination: PathBuf, reason: String },

    #[error("Commit of {target} failed: {message}")]
    Commit { target: String, message: String },

    #[error("No stored commit matches '{prefix}'{}", describe_candidates(.candidates))]
    CommitNotFound {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("Invalid result artifact {}: {message}", .path.display())]
    Artifact { path: PathBuf, message: String },

    #[error("No stored copy of {file} in commit folder {subfolder}")]
    StoredArtifactNotFound { file: String, subfolder: String },

    #[error("Comparison tool '{tool}' failed: {message}")]
    ComparisonTool { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!(" unambiguously; candidates: {}", candidates.join(", "))
    }
}

impl StoreError {
    pub(crate) fn repository(root: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StoreError::RepositoryState {
            root: root.into(),
            message: message.into(),
        }
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StoreError::Artifact {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the CLI layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

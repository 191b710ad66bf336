//! Timing Validator
//!
//! A stored result must not claim to represent code newer than the moment
//! its computation started, unless the operator vouches for it.

use crate::clock::{format_timestamp, Timestamp};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Inputs of one timing check.
#[derive(Debug, Clone)]
pub struct TimingInput<'a> {
    pub artifact: &'a Path,
    pub computation_start: Timestamp,
    /// `None` when there are no source files to compare against.
    pub last_source_change: Option<Timestamp>,
    pub latest_source: Option<&'a Path>,
    pub override_timing: bool,
}

/// Why storage may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingVerdict {
    /// Computation started at or after the latest source change.
    Certified,
    /// The check was skipped by the operator.
    Overridden,
    /// No source files exist to compare against.
    NoSourceFiles,
}

impl fmt::Display for TimingVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimingVerdict::Certified => "certified",
            TimingVerdict::Overridden => "overridden",
            TimingVerdict::NoSourceFiles => "no-source-files",
        };
        f.write_str(s)
    }
}

/// Passes iff `computation_start >= last_source_change` or the override is
/// set. Equal instants pass.
pub fn validate_timing(input: &TimingInput<'_>) -> Result<TimingVerdict, StoreError> {
    if input.override_timing {
        warn!(artifact = %input.artifact.display(), "Timing validation skipped by operator");
        return Ok(TimingVerdict::Overridden);
    }
    let Some(last_change) = input.last_source_change else {
        info!("No source files to compare against; timing check passes");
        return Ok(TimingVerdict::NoSourceFiles);
    };
    if input.computation_start >= last_change {
        info!(
            start = %format_timestamp(&input.computation_start),
            latest_change = %format_timestamp(&last_change),
            "Execution time >= latest change"
        );
        return Ok(TimingVerdict::Certified);
    }
    Err(StoreError::TimingViolation {
        artifact: input.artifact.to_path_buf(),
        computation_start: input.computation_start,
        last_source_change: last_change,
        latest_source: input.latest_source.map(Path::to_path_buf),
    })
}

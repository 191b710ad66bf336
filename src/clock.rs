//! Clock Source
//!
//! Reads the three instants the timing check works with: file modification
//! times of tracked sources, the declared start of a computation, and "now".

use crate::error::StoreError;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Instants are kept in local time; run logs and stored-name tokens use it.
pub type Timestamp = DateTime<Local>;

/// Header layout of a run's error log, e.g. `Started 03/01/24 10:00:00`.
const ERROR_LOG_HEADER_FORMAT: &str = "%m/%d/%y %H:%M:%S";

/// Wall-clock source.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Render a timestamp for operator-facing messages.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

/// Parse a caller-declared timestamp: RFC 3339, or `YYYY-MM-DD HH:MM:SS` /
/// `YYYY-MM-DDTHH:MM:SS` in local time.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return local_from_naive(naive)
                .ok_or_else(|| format!("'{}' does not exist in the local time zone", raw));
        }
    }
    Err(format!(
        "'{}' is not a timestamp (expected RFC 3339 or YYYY-MM-DD HH:MM:SS)",
        raw
    ))
}

fn local_from_naive(naive: NaiveDateTime) -> Option<Timestamp> {
    Local.from_local_datetime(&naive).earliest()
}

fn from_system_time(time: SystemTime) -> Timestamp {
    let ts: Timestamp = time.into();
    // Sources are compared at second precision.
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Modification time of a file, truncated to whole seconds.
pub fn file_mtime(path: &Path) -> Result<Timestamp, StoreError> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(from_system_time(modified))
}

/// Latest modification time among `paths` that exist, with the file it
/// belongs to. Missing files are skipped; `None` when nothing exists.
pub fn latest_mtime(paths: &[PathBuf]) -> Result<Option<(PathBuf, Timestamp)>, StoreError> {
    let mut latest: Option<(PathBuf, Timestamp)> = None;
    for path in paths {
        if !path.is_file() {
            continue;
        }
        let mtime = file_mtime(path)?;
        let newer = latest.as_ref().map(|(_, t)| mtime > *t).unwrap_or(true);
        if newer {
            latest = Some((path.clone(), mtime));
        }
    }
    Ok(latest)
}

/// Run name of a result file: the stem after the first `_`
/// (`results_ssp2_bau.gdx` -> `ssp2_bau`).
pub fn run_name(artifact: &Path) -> Option<String> {
    let stem = artifact.file_stem()?.to_str()?;
    let (_, run) = stem.split_once('_')?;
    if run.is_empty() {
        None
    } else {
        Some(run.to_string())
    }
}

/// Path of the error log a run writes next to its result file.
pub fn error_log_path(artifact: &Path) -> Option<PathBuf> {
    let run = run_name(artifact)?;
    let dir = artifact.parent().unwrap_or_else(|| Path::new(""));
    Some(dir.join(format!("errors_{}.txt", run)))
}

/// Parse the start instant out of an error log header line.
pub fn parse_error_log_header(header: &str) -> Result<Timestamp, String> {
    let header = header.trim();
    let (_, stamp) = header
        .split_once(' ')
        .ok_or_else(|| format!("header '{}' has no timestamp", header))?;
    let naive = NaiveDateTime::parse_from_str(stamp.trim(), ERROR_LOG_HEADER_FORMAT)
        .map_err(|e| format!("cannot parse '{}': {}", stamp.trim(), e))?;
    local_from_naive(naive).ok_or_else(|| format!("'{}' does not exist locally", stamp.trim()))
}

/// Where a computation start instant came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartTimeSource {
    Declared,
    ErrorLog(PathBuf),
    FileMetadata,
}

/// Derive the computation start of `artifact` when the caller did not
/// declare one: the run's error log header if present, otherwise the file's
/// creation time (modification time where creation is unsupported).
pub fn derive_computation_start(
    artifact: &Path,
) -> Result<(Timestamp, StartTimeSource), StoreError> {
    if let Some(log) = error_log_path(artifact) {
        if log.is_file() {
            let content = std::fs::read_to_string(&log)?;
            let header = content.lines().next().unwrap_or("");
            if header.trim().is_empty() {
                return Err(StoreError::artifact(
                    artifact,
                    format!("empty error log {}", log.display()),
                ));
            }
            let start = parse_error_log_header(header).map_err(|e| {
                StoreError::artifact(
                    artifact,
                    format!("bad start time in {}: {}", log.display(), e),
                )
            })?;
            return Ok((start, StartTimeSource::ErrorLog(log)));
        }
    }

    let metadata = std::fs::metadata(artifact).map_err(|e| {
        StoreError::artifact(artifact, format!("cannot read file metadata: {}", e))
    })?;
    let time = metadata.created().or_else(|_| metadata.modified())?;
    Ok((from_system_time(time), StartTimeSource::FileMetadata))
}

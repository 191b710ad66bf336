//! Patch Packager
//!
//! Captures the uncommitted diff next to a result and derives the paired,
//! timestamp-qualified names for both files.

use crate::clock::Timestamp;
use crate::vcs::WorkingTreeDiff;
use std::path::Path;

/// Date-time token shared by a result and its patch: `YYYYMMDD-HHMMSS`.
pub fn timestamp_token(at: &Timestamp) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

fn stem_and_extension(file_name: &str) -> (&str, Option<&str>) {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let ext = path.extension().and_then(|e| e.to_str());
    (stem, ext)
}

/// `<stem>_<token>.<ext>` (or `<stem>_<token>` without an extension).
pub fn stamped_result_name(file_name: &str, token: &str) -> String {
    match stem_and_extension(file_name) {
        (stem, Some(ext)) => format!("{}_{}.{}", stem, token, ext),
        (stem, None) => format!("{}_{}", stem, token),
    }
}

/// `<stem>_<token>.patch`.
pub fn patch_name(file_name: &str, token: &str) -> String {
    let (stem, _) = stem_and_extension(file_name);
    format!("{}_{}.patch", stem, token)
}

/// Whether `candidate` is a stamped variant of `file_name`, returning its
/// token when it is.
pub fn stamped_token<'a>(file_name: &str, candidate: &'a str) -> Option<&'a str> {
    let (stem, ext) = stem_and_extension(file_name);
    let rest = candidate.strip_prefix(stem)?.strip_prefix('_')?;
    let token = match ext {
        Some(ext) => rest.strip_suffix(ext)?.strip_suffix('.')?,
        None => rest,
    };
    let valid = token.len() == 15
        && token.char_indices().all(|(i, c)| {
            if i == 8 {
                c == '-'
            } else {
                c.is_ascii_digit()
            }
        });
    valid.then_some(token)
}

/// A captured working-tree diff, named to pair with its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchArtifact {
    pub name: String,
    pub contents: String,
}

/// Names under which a result (and its optional patch) are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNames {
    pub result: String,
    pub patch: Option<PatchArtifact>,
}

/// Derive stored names; with a captured diff both files carry the token of
/// the computation start.
pub fn package(
    file_name: &str,
    computation_start: &Timestamp,
    captured: Option<&WorkingTreeDiff>,
) -> StoredNames {
    match captured {
        Some(diff) => {
            let token = timestamp_token(computation_start);
            StoredNames {
                result: stamped_result_name(file_name, &token),
                patch: Some(PatchArtifact {
                    name: patch_name(file_name, &token),
                    contents: diff.patch.clone(),
                }),
            }
        }
        None => StoredNames {
            result: file_name.to_string(),
            patch: None,
        },
    }
}

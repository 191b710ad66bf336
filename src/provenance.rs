//! Provenance Resolver
//!
//! Decides how a result file can be reproduced: either a recognized build
//! step from the make database, or a script named by the caller. It never
//! guesses.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// A build step that produces an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Rule target to invoke.
    pub target: String,
    /// Command line that reproduces the artifact.
    pub command: String,
}

/// Answer of a build-description lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildLookup {
    Recognized(BuildStep),
    Unrecognized,
}

/// "Is this output a recognized target, and what produces it?"
pub trait BuildDescription {
    fn lookup(&self, output: &Path) -> BuildLookup;
}

/// How a stored result can be reproduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    BuildStep(BuildStep),
    Script(PathBuf),
}

impl Provenance {
    /// One-line description recorded with the stored result.
    pub fn describe(&self) -> String {
        match self {
            Provenance::BuildStep(step) => step.command.clone(),
            Provenance::Script(path) => format!("script {}", path.display()),
        }
    }
}

/// Outcome of resolving provenance without operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Provenance),
    /// No build step and no script: the caller must supply one.
    NeedsScript,
}

/// Combine a build lookup with an optional caller-supplied script.
///
/// A supplied script must be an existing file.
pub fn resolve_provenance(
    artifact: &Path,
    lookup: BuildLookup,
    script: Option<&Path>,
) -> Result<Resolution, StoreError> {
    match (lookup, script) {
        (BuildLookup::Recognized(step), _) => {
            info!(artifact = %artifact.display(), step = %step.command, "Reproducible through build step");
            Ok(Resolution::Resolved(Provenance::BuildStep(step)))
        }
        (BuildLookup::Unrecognized, Some(script)) if script.is_file() => {
            info!(artifact = %artifact.display(), script = %script.display(), "Reproducible through script");
            Ok(Resolution::Resolved(Provenance::Script(script.to_path_buf())))
        }
        (BuildLookup::Unrecognized, Some(script)) => Err(StoreError::ProvenanceUnresolved {
            artifact: artifact.to_path_buf(),
            reason: format!("script {} does not exist", script.display()),
        }),
        (BuildLookup::Unrecognized, None) => Ok(Resolution::NeedsScript),
    }
}

/// One rule line of a make database: `targets: prerequisites`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeRule {
    pub targets: Vec<String>,
    pub prerequisites: Vec<String>,
}

/// Rules printed by `make -qp`.
#[derive(Debug, Clone, Default)]
pub struct MakeDatabase {
    program: String,
    rules: Vec<MakeRule>,
    workspace: PathBuf,
}

impl MakeDatabase {
    /// Run `<program> -qp <args>` in `workspace` and parse its rules.
    ///
    /// `make -q` exits non-zero whenever a target is out of date, so the exit
    /// status is ignored. A missing program yields an empty database.
    pub fn load(program: &str, args: &[String], workspace: &Path) -> Self {
        let output = Command::new(program)
            .arg("-qp")
            .args(args)
            .current_dir(workspace)
            .output();
        let rules = match output {
            Ok(output) => parse_make_database(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                warn!(program, error = %e, "Could not read make database; no artifact is a build target");
                Vec::new()
            }
        };
        debug!(rules = rules.len(), "Loaded make database");
        Self::from_rules(program, rules, workspace)
    }

    pub fn from_rules(program: &str, rules: Vec<MakeRule>, workspace: &Path) -> Self {
        Self {
            program: program.to_string(),
            rules,
            workspace: workspace.to_path_buf(),
        }
    }

    fn candidate_names(&self, output: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let relative = output.strip_prefix(&self.workspace).unwrap_or(output);
        names.push(relative.to_string_lossy().replace('\\', "/"));
        if let Some(name) = output.file_name() {
            let name = name.to_string_lossy().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn step(&self, target: &str) -> BuildStep {
        BuildStep {
            target: target.to_string(),
            command: format!("{} {}", self.program, target),
        }
    }
}

impl BuildDescription for MakeDatabase {
    fn lookup(&self, output: &Path) -> BuildLookup {
        let names = self.candidate_names(output);
        let direct = self
            .rules
            .iter()
            .flat_map(|r| r.targets.iter())
            .find(|t| names.contains(t));
        if let Some(target) = direct {
            return BuildLookup::Recognized(self.step(target));
        }
        let via = self
            .rules
            .iter()
            .find(|r| r.prerequisites.iter().any(|p| names.contains(p)));
        match via.and_then(|r| r.targets.first()) {
            Some(target) => BuildLookup::Recognized(self.step(target)),
            None => BuildLookup::Unrecognized,
        }
    }
}

/// Extract explicit rules from `make -p` output.
///
/// Skips comments, recipe lines, variable assignments (including
/// target-specific ones) and pattern or suffix rules.
pub fn parse_make_database(raw: &str) -> Vec<MakeRule> {
    raw.lines().filter_map(parse_rule_line).collect()
}

fn parse_rule_line(line: &str) -> Option<MakeRule> {
    let first = line.chars().next()?;
    if !first.is_ascii_alphanumeric() {
        return None;
    }
    let (head, rest) = line.split_once(':')?;
    if head.contains(['$', '#', '\t', '=', '%']) {
        return None;
    }
    // `::` double-colon rules; `:=` / `::=` assignments.
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    if rest.starts_with('=') || rest.contains('=') {
        return None;
    }
    let prerequisites = rest
        .split_whitespace()
        .filter(|p| *p != "|")
        .map(str::to_string)
        .collect();
    Some(MakeRule {
        targets: head.split_whitespace().map(str::to_string).collect(),
        prerequisites,
    })
}

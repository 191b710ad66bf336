//! Operator decisions
//!
//! The store pipeline suspends at two points: when a result is not a build
//! target and no script was supplied, and when the source tree is dirty.
//! Both questions go through [`Operator`] so the pipeline runs the same
//! with a terminal, preset answers, or a test double.

use crate::error::StoreError;
use std::path::{Path, PathBuf};

/// Decision callbacks the pipeline consults.
pub trait Operator {
    /// Ask for the script that reproduces `artifact`. `None` declines.
    fn reproduction_script(&mut self, artifact: &Path) -> Result<Option<PathBuf>, StoreError>;

    /// Ask whether to store the uncommitted changes of `changed` as a patch.
    fn capture_patch(&mut self, changed: &[PathBuf]) -> Result<bool, StoreError>;
}

fn prompt_failed(e: dialoguer::Error) -> StoreError {
    match e {
        dialoguer::Error::IO(io) => StoreError::Io(io),
    }
}

/// Prompts on the terminal.
#[derive(Debug, Default)]
pub struct InteractiveOperator;

impl Operator for InteractiveOperator {
    fn reproduction_script(&mut self, artifact: &Path) -> Result<Option<PathBuf>, StoreError> {
        use dialoguer::Input;

        let answer: String = Input::new()
            .with_prompt(format!(
                "{} is not a build target. Script that reproduces it (empty to abort)",
                artifact.display()
            ))
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_failed)?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| PathBuf::from(answer)))
    }

    fn capture_patch(&mut self, changed: &[PathBuf]) -> Result<bool, StoreError> {
        use dialoguer::Confirm;

        println!("Uncommitted changes in:");
        for path in changed {
            println!("  {}", path.display());
        }
        Confirm::new()
            .with_prompt("Store the uncommitted changes as a patch next to the result?")
            .default(true)
            .interact()
            .map_err(prompt_failed)
    }
}

/// Fixed answers, for non-interactive runs.
#[derive(Debug, Clone, Default)]
pub struct PresetOperator {
    pub script: Option<PathBuf>,
    pub capture_patch: bool,
}

impl PresetOperator {
    pub fn new(script: Option<PathBuf>, capture_patch: bool) -> Self {
        Self {
            script,
            capture_patch,
        }
    }
}

impl Operator for PresetOperator {
    fn reproduction_script(&mut self, _artifact: &Path) -> Result<Option<PathBuf>, StoreError> {
        Ok(self.script.clone())
    }

    fn capture_patch(&mut self, _changed: &[PathBuf]) -> Result<bool, StoreError> {
        Ok(self.capture_patch)
    }
}

/// Interactive prompts with some answers fixed up front (`--patch`,
/// `--no-patch`).
pub struct PromptingOperator {
    prompt: InteractiveOperator,
    capture_patch: Option<bool>,
}

impl PromptingOperator {
    pub fn new(capture_patch: Option<bool>) -> Self {
        Self {
            prompt: InteractiveOperator,
            capture_patch,
        }
    }
}

impl Operator for PromptingOperator {
    fn reproduction_script(&mut self, artifact: &Path) -> Result<Option<PathBuf>, StoreError> {
        self.prompt.reproduction_script(artifact)
    }

    fn capture_patch(&mut self, changed: &[PathBuf]) -> Result<bool, StoreError> {
        match self.capture_patch {
            Some(answer) => Ok(answer),
            None => self.prompt.capture_patch(changed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_prompt_failure_keeps_io_error_kind() {
        let err = prompt_failed(dialoguer::Error::IO(io::Error::new(
            io::ErrorKind::NotConnected,
            "not a terminal",
        )));
        match err {
            StoreError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotConnected),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fixed_patch_answer_skips_prompt() {
        let mut operator = PromptingOperator::new(Some(false));
        assert!(!operator.capture_patch(&[PathBuf::from("model.gms")]).unwrap());

        let mut preset = PresetOperator::new(Some(PathBuf::from("run.sh")), true);
        assert!(preset.capture_patch(&[]).unwrap());
        assert_eq!(
            preset.reproduction_script(Path::new("r.gdx")).unwrap(),
            Some(PathBuf::from("run.sh"))
        );
    }
}

//! Configuration
//!
//! Layered settings read once at startup. See [`merge::service::MergeService`]
//! for the layer order.

mod facade;

pub mod merge {
    pub mod merge_policy;
    pub mod service;
}

pub mod paths {
    pub mod xdg_root;
}

pub mod sources {
    pub mod environment;
    pub mod global_file;
    pub mod workspace_file;
}

pub use facade::ConfigLoader;

use crate::compare::ComparisonTool;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::pipeline::StoreSettings;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[storage]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root; relative paths resolve against the workspace.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Key used by legacy `config.ini` files; `root` wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_folder: Option<PathBuf>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
}

/// `[diff]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    #[serde(default = "default_diff_tool")]
    pub tool: String,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub rel_eps: Option<f64>,
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

fn default_diff_tool() -> String {
    "gdxdiff".to_string()
}

fn default_output_prefix() -> String {
    "diffile_".to_string()
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            tool: default_diff_tool(),
            eps: None,
            rel_eps: None,
            output_prefix: default_output_prefix(),
        }
    }
}

impl DiffConfig {
    pub fn comparison_tool(&self) -> ComparisonTool {
        ComparisonTool {
            program: self.tool.clone(),
            eps: self.eps,
            rel_eps: self.rel_eps,
            output_prefix: self.output_prefix.clone(),
        }
    }
}

/// `[log]`: history shown by `gdxstore log`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Hide commits before this date.
    #[serde(default)]
    pub since: Option<NaiveDate>,
}

/// `[build]`: how the make database is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_build_program() -> String {
    "make".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            args: Vec::new(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GdxStoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub log: HistoryConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GdxStoreConfig {
    /// Storage root: `cli` if given, else `[storage] root` or the legacy
    /// `storage_folder`; relative paths are taken from `workspace`.
    pub fn storage_root(&self, workspace: &Path, cli: Option<&Path>) -> Result<PathBuf, ApiError> {
        let root = cli
            .map(Path::to_path_buf)
            .or_else(|| self.storage.root.clone())
            .or_else(|| self.storage.storage_folder.clone())
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "No storage root configured: pass --storage-root or set [storage] root"
                        .to_string(),
                )
            })?;
        Ok(if root.is_absolute() {
            root
        } else {
            workspace.join(root)
        })
    }

    /// Settings for store requests in `workspace`.
    pub fn store_settings(
        &self,
        workspace: &Path,
        storage_root: Option<&Path>,
    ) -> Result<StoreSettings, ApiError> {
        let mut settings = StoreSettings::new(workspace, self.storage_root(workspace, storage_root)?);
        settings.build_program = self.build.program.clone();
        settings.build_args = self.build.args.clone();
        settings.author = match (&self.storage.author_name, &self.storage.author_email) {
            (Some(name), Some(email)) => Some((name.clone(), email.clone())),
            (None, None) => None,
            _ => {
                return Err(ApiError::ConfigError(
                    "storage.author_name and storage.author_email must be set together".to_string(),
                ))
            }
        };
        Ok(settings)
    }
}

//! CLI Tooling
//!
//! Command-line interface for storing, listing and comparing results. All
//! commands are scoped to one workspace (the source repository).

use crate::clock::{parse_timestamp, Timestamp};
use crate::compare::{locate_stored, resolve_subfolder};
use crate::config::{ConfigLoader, GdxStoreConfig};
use crate::error::{ApiError, StoreError};
use crate::index::{CommitIndex, CommitRecord};
use crate::logging::LoggingConfig;
use crate::operator::{Operator, PresetOperator, PromptingOperator};
use crate::pipeline::{store, StoreRequest, StoreSettings};
use crate::tooling::format::{
    format_log_json, format_log_table, format_log_text, format_store_receipt,
    stdout_supports_color,
};
use crate::vcs::GitCli;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

/// gdxstore - versioned storage of simulation results
#[derive(Parser, Debug)]
#[command(name = "gdxstore")]
#[command(about = "Store simulation result files in git, tied to the code that produced them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (the source repository)
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root (overrides [storage] root)
    #[arg(long, global = true, alias = "storage-folder")]
    pub storage_root: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// `base` with the command-line logging flags applied.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
            config.output = "stderr".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store result files in the commit folder of the current source commit
    Store {
        /// Result files to store
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Script that reproduces the files (when they are not make targets)
        #[arg(long)]
        script: Option<PathBuf>,
        /// Store even if sources changed after the computation started
        #[arg(long)]
        no_timing_validation: bool,
        /// Computation start (YYYY-MM-DD HH:MM:SS or RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        start_time: Option<Timestamp>,
        /// Store uncommitted changes as a patch without asking
        #[arg(long, conflicts_with = "no_patch")]
        patch: bool,
        /// Never store uncommitted changes as a patch
        #[arg(long)]
        no_patch: bool,
        /// Never prompt; missing answers abort the store
        #[arg(long)]
        non_interactive: bool,
    },
    /// Show stored results, newest first
    Log {
        /// Output format (text, table or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Hide commits before this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Show at most this many commits
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare a result file with its stored copy
    Diff {
        /// Result file in the workspace
        file: PathBuf,
        /// Storage commit or source commit (prefix)
        #[arg(long, short)]
        commit: String,
        /// File the comparison tool writes its differences to
        #[arg(long)]
        output: Option<PathBuf>,
        /// Absolute tolerance (overrides [diff] eps)
        #[arg(long)]
        eps: Option<f64>,
        /// Relative tolerance (overrides [diff] rel_eps)
        #[arg(long)]
        rel_eps: Option<f64>,
    },
}

/// Text to print and the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

/// CLI context for command execution
pub struct CliContext {
    workspace_root: PathBuf,
    config: GdxStoreConfig,
    storage_root: Option<PathBuf>,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        let workspace_root = dunce::canonicalize(&workspace_root).map_err(|e| {
            ApiError::ConfigError(format!(
                "Workspace {} is not accessible: {}",
                workspace_root.display(),
                e
            ))
        })?;
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: GdxStoreConfig) -> Self {
        Self {
            workspace_root,
            config,
            storage_root: None,
        }
    }

    /// Use `root` instead of the configured storage root.
    pub fn with_storage_root(mut self, root: Option<PathBuf>) -> Self {
        self.storage_root = root;
        self
    }

    pub fn config(&self) -> &GdxStoreConfig {
        &self.config
    }

    fn settings(&self) -> Result<StoreSettings, ApiError> {
        self.config
            .store_settings(&self.workspace_root, self.storage_root.as_deref())
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Store {
                files,
                script,
                no_timing_validation,
                start_time,
                patch,
                no_patch,
                non_interactive,
            } => {
                let interactive = !non_interactive && std::io::stdin().is_terminal();
                let mut operator: Box<dyn Operator> = if interactive {
                    let capture = match (patch, no_patch) {
                        (true, _) => Some(true),
                        (_, true) => Some(false),
                        _ => None,
                    };
                    Box::new(PromptingOperator::new(capture))
                } else {
                    Box::new(PresetOperator::new(None, *patch))
                };
                self.handle_store(
                    files,
                    script.clone(),
                    *no_timing_validation,
                    *start_time,
                    operator.as_mut(),
                )
                .map(CommandOutput::ok)
            }
            Commands::Log {
                format,
                since,
                limit,
            } => self
                .handle_log(format, *since, *limit)
                .map(CommandOutput::ok),
            Commands::Diff {
                file,
                commit,
                output,
                eps,
                rel_eps,
            } => self.handle_diff(file, commit, output.clone(), *eps, *rel_eps),
        }
    }

    /// Store each file in turn; the first failure aborts the rest.
    fn handle_store(
        &self,
        files: &[PathBuf],
        script: Option<PathBuf>,
        override_timing: bool,
        start_time: Option<Timestamp>,
        operator: &mut dyn Operator,
    ) -> Result<String, ApiError> {
        let settings = self.settings()?;
        let mut lines = Vec::new();
        for file in files {
            let request = StoreRequest {
                artifact: file.clone(),
                script: script.clone(),
                computation_start: start_time,
                override_timing,
            };
            let receipt = store(&settings, &request, operator)?;
            info!(file = %file.display(), commit = %receipt.record.id, "Store complete");
            lines.push(format_store_receipt(&receipt, stdout_supports_color()));
        }
        Ok(lines.join("\n"))
    }

    fn handle_log(
        &self,
        format: &str,
        since: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<String, ApiError> {
        let settings = self.settings()?;
        let storage = settings.storage_repository();
        let since = since.or(self.config.log.since);
        let records = CommitIndex::new(&storage)
            .since(since)
            .records()?
            .take(limit.unwrap_or(usize::MAX))
            .collect::<Result<Vec<CommitRecord>, StoreError>>()?;

        match format {
            "text" => Ok(format_log_text(&records, stdout_supports_color())),
            "table" => Ok(format_log_table(&records)),
            "json" => format_log_json(&records),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log format: {} (must be 'text', 'table' or 'json')",
                other
            ))),
        }
    }

    fn handle_diff(
        &self,
        file: &std::path::Path,
        commit: &str,
        output: Option<PathBuf>,
        eps: Option<f64>,
        rel_eps: Option<f64>,
    ) -> Result<CommandOutput, ApiError> {
        let settings = self.settings()?;
        let current = settings.resolve(file);
        if !current.is_file() {
            return Err(StoreError::artifact(&current, "file does not exist").into());
        }
        let file_name = current
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::artifact(&current, "path has no file name"))?;

        let storage = settings.storage_repository();
        let source = GitCli::discover(&settings.workspace);
        let subfolder = resolve_subfolder(&storage, &source, commit)?;
        let stored = locate_stored(&settings.storage_root, &subfolder, &file_name)?;

        let mut tool = self.config.diff.comparison_tool();
        tool.eps = eps.or(tool.eps);
        tool.rel_eps = rel_eps.or(tool.rel_eps);
        let output = output
            .map(|o| settings.resolve(&o))
            .unwrap_or_else(|| settings.workspace.join(tool.output_name(&file_name)));

        let status = tool.run(&current, &stored, &output)?;
        Ok(CommandOutput {
            text: format!(
                "Compared {} with {} ({})",
                current.display(),
                stored.display(),
                status
            ),
            exit_code: status.code().unwrap_or(1),
        })
    }
}

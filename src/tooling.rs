//! Tooling & Integration Layer
//!
//! Command-line entry points (`store`, `log`, `diff`) and their output
//! formatting.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, CommandOutput, Commands};

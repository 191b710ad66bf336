//! Integration tests against real temporary git repositories.
//!
//! Tests return early when `git` is not on PATH.

mod cli_commands;
mod commit_index;
mod store_pipeline;
mod support;

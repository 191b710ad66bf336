use clap::Parser;
use gdxstore::config::GdxStoreConfig;
use gdxstore::index::CommitRecord;
use gdxstore::tooling::cli::{Cli, CliContext, Commands};
use gdxstore::{ApiError, StoreError};
use std::fs;
use std::path::PathBuf;

use crate::support::{git_available, Workspace};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["gdxstore", "store", "results_bau.gdx"],
        vec!["gdxstore", "store", "a.gdx", "b.gdx", "--non-interactive", "--patch"],
        vec!["gdxstore", "store", "a.gdx", "--no-timing-validation"],
        vec!["gdxstore", "store", "a.gdx", "--start-time", "2024-03-01T10:00:00+01:00"],
        vec!["gdxstore", "log"],
        vec!["gdxstore", "log", "--format", "json", "--since", "2025-07-01"],
        vec!["gdxstore", "diff", "results_bau.gdx", "--commit", "1a2b3c4d"],
        vec!["gdxstore", "diff", "results_bau.gdx", "-c", "1a2b", "--eps", "0.001"],
        vec!["gdxstore", "log", "--workspace", "/tmp", "--storage-root", "/archive"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_incomplete_commands() {
    assert!(Cli::try_parse_from(["gdxstore", "store"]).is_err());
    assert!(Cli::try_parse_from(["gdxstore", "diff", "r.gdx"]).is_err());
    assert!(Cli::try_parse_from(["gdxstore", "log", "--since", "July"]).is_err());
}

fn context(ws: &Workspace, tool: &str) -> CliContext {
    let mut config = GdxStoreConfig::default();
    config.storage.root = Some(ws.storage_root());
    config.storage.author_name = Some("Results Archive".to_string());
    config.storage.author_email = Some("archive@example.org".to_string());
    config.diff.tool = tool.to_string();
    CliContext::with_config(ws.source.path().to_path_buf(), config)
}

fn store_command(start: &str) -> Commands {
    Commands::Store {
        files: vec![PathBuf::from("results_bau.gdx")],
        script: Some(PathBuf::from("run.sh")),
        no_timing_validation: false,
        start_time: Some(gdxstore::clock::parse_timestamp(start).unwrap()),
        patch: false,
        no_patch: true,
        non_interactive: true,
    }
}

#[test]
fn store_then_log_as_json() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    let ctx = context(&ws, "gdxdiff");
    let start = ws.after_source_change().to_rfc3339();

    let out = ctx.execute(&store_command(&start)).unwrap();
    assert!(out.text.contains(&ws.subfolder()), "{}", out.text);

    let out = ctx
        .execute(&Commands::Log {
            format: "json".to_string(),
            since: None,
            limit: Some(5),
        })
        .unwrap();
    let records: Vec<CommitRecord> = serde_json::from_str(&out.text).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].files, vec!["results_bau.gdx"]);
    assert_eq!(records[0].subfolder.as_deref(), Some(ws.subfolder().as_str()));
}

#[cfg(unix)]
#[test]
fn diff_passes_tool_exit_status_through() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    let start = ws.after_source_change().to_rfc3339();
    context(&ws, "true").execute(&store_command(&start)).unwrap();

    let diff = |tool: &str, commit: String| {
        context(&ws, tool).execute(&Commands::Diff {
            file: PathBuf::from("results_bau.gdx"),
            commit,
            output: None,
            eps: None,
            rel_eps: None,
        })
    };

    let out = diff("true", ws.subfolder()).unwrap();
    assert_eq!(out.exit_code, 0);
    let out = diff("false", ws.head()).unwrap();
    assert_eq!(out.exit_code, 1);

    let err = diff("true", "ffffffff".to_string()).unwrap_err();
    assert!(matches!(
        err,
        ApiError::Store(StoreError::CommitNotFound { .. })
    ));
}

#[test]
fn failed_store_reports_timing_violation() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    let ctx = context(&ws, "gdxdiff");
    let err = ctx.execute(&store_command("2000-01-01 00:00:00")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("2000-01-01 00:00:00"), "{message}");
    assert!(message.contains("latest change"), "{message}");
}

use gdxstore::index::CommitIndex;
use gdxstore::operator::PresetOperator;
use gdxstore::vcs::GitCli;
use gdxstore::{store, StoreError, StoreRequest};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::support::{git_available, run_git, Workspace};

#[test]
fn log_of_empty_storage_root_is_empty() {
    let dir = TempDir::new().unwrap();
    let missing = GitCli::new(dir.path().join("absent"));
    assert_eq!(CommitIndex::new(&missing).records().unwrap().count(), 0);

    if !git_available() {
        return;
    }
    run_git(dir.path(), &["init", "-q"]);
    let empty = GitCli::new(dir.path());
    assert_eq!(CommitIndex::new(&empty).records().unwrap().count(), 0);
}

#[test]
fn history_is_newest_first_and_lookup_finds_folders() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    fs::write(ws.source.path().join("results_ctax.gdx"), b"ctax").unwrap();
    let settings = ws.settings();
    for file in ["results_bau.gdx", "results_ctax.gdx"] {
        let request = StoreRequest {
            script: Some(PathBuf::from("run.sh")),
            computation_start: Some(ws.after_source_change()),
            ..StoreRequest::new(file)
        };
        store(&settings, &request, &mut PresetOperator::default()).unwrap();
    }

    let storage = GitCli::new(ws.storage_root());
    let index = CommitIndex::new(&storage);
    let records: Vec<_> = index
        .records()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].files, vec!["results_ctax.gdx"]);
    assert!(records[0].scripts.is_empty());
    assert_eq!(records[1].files, vec!["results_bau.gdx"]);
    assert_eq!(records[1].scripts, vec!["run.sh"]);

    let recipes = fs::read_to_string(ws.storage_root().join(ws.subfolder()).join("recipes.txt"))
        .unwrap();
    assert!(recipes.contains("results_bau.gdx: "));
    assert!(recipes.contains("results_ctax.gdx: "));

    let by_source = index.lookup(&ws.head()).unwrap();
    assert_eq!(by_source.subfolder, ws.subfolder());
    assert_eq!(by_source.records.len(), 2);

    let by_storage = index.lookup(&records[0].id[..10]).unwrap();
    assert_eq!(by_storage.subfolder, ws.subfolder());

    assert!(matches!(
        index.lookup("0000000"),
        Err(StoreError::CommitNotFound { .. })
    ));
}

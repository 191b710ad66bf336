use chrono::{Duration, Local, TimeZone};
use gdxstore::index::CommitIndex;
use gdxstore::operator::PresetOperator;
use gdxstore::timing::TimingVerdict;
use gdxstore::vcs::{GitCli, VersionControl};
use gdxstore::{store, StoreError, StoreRequest};
use std::fs;
use std::path::PathBuf;

use crate::support::{git_available, run_git, Workspace};

#[test]
fn clean_tree_store_creates_one_commit_with_one_file() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    let settings = ws.settings();
    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(ws.after_source_change()),
        ..StoreRequest::new("results_bau.gdx")
    };
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\ngams model\n").unwrap();

    let receipt = store(&settings, &request, &mut PresetOperator::default()).unwrap();

    assert_eq!(receipt.verdict, TimingVerdict::Certified);
    assert_eq!(receipt.subfolder, ws.subfolder());
    assert_eq!(receipt.record.files, vec!["results_bau.gdx"]);
    assert_eq!(receipt.record.source_commit.as_deref(), Some(ws.head().as_str()));
    assert_eq!(
        fs::read(ws.storage_root().join(ws.subfolder()).join("results_bau.gdx")).unwrap(),
        b"\x00GDX\x01bau"
    );
    assert!(ws.source.path().join("results_bau.gdx").is_file());

    let storage = GitCli::new(ws.storage_root());
    let records: Vec<_> = CommitIndex::new(&storage)
        .records()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].subject, "Store results_bau.gdx");
}

#[test]
fn dirty_tree_declined_patch_stores_only_result() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    run_git(ws.source.path(), &["add", "run.sh"]);
    run_git(ws.source.path(), &["commit", "-q", "-m", "Add runner"]);
    ws.make_dirty();

    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(Local::now() + Duration::hours(1)),
        ..StoreRequest::new("results_bau.gdx")
    };
    let receipt = store(&ws.settings(), &request, &mut PresetOperator::new(None, false)).unwrap();

    assert_eq!(receipt.record.files, vec!["results_bau.gdx"]);
    assert!(receipt.patch_name.is_none());
}

#[test]
fn dirty_tree_with_patch_stores_paired_files() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    ws.make_dirty();

    let start = Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(start),
        override_timing: true,
        ..StoreRequest::new("results_bau.gdx")
    };
    let receipt = store(&ws.settings(), &request, &mut PresetOperator::new(None, true)).unwrap();

    assert_eq!(
        receipt.record.files,
        vec![
            "results_bau_20240301-100000.gdx",
            "results_bau_20240301-100000.patch"
        ]
    );
    let patch = fs::read_to_string(
        ws.storage_root()
            .join(ws.subfolder())
            .join("results_bau_20240301-100000.patch"),
    )
    .unwrap();
    assert!(patch.contains("model.gms"));
    assert!(patch.contains("+Set i /1*4/;"));
}

#[test]
fn computation_before_source_change_is_rejected() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(ws.source_change() - Duration::seconds(30)),
        ..StoreRequest::new("results_bau.gdx")
    };

    let err = store(&ws.settings(), &request, &mut PresetOperator::default()).unwrap_err();
    assert!(matches!(err, StoreError::TimingViolation { .. }));
    assert!(!ws.storage_root().join(ws.subfolder()).exists());

    let storage = GitCli::new(ws.storage_root());
    assert_eq!(CommitIndex::new(&storage).records().unwrap().count(), 0);
}

#[test]
fn unrecognized_result_without_script_is_unresolved() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    let request = StoreRequest {
        computation_start: Some(ws.after_source_change()),
        ..StoreRequest::new("results_bau.gdx")
    };
    let err = store(&ws.settings(), &request, &mut PresetOperator::default()).unwrap_err();
    assert!(matches!(err, StoreError::ProvenanceUnresolved { .. }));
}

#[test]
fn make_target_needs_no_script() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(
        ws.source.path().join("Makefile"),
        "results_bau.gdx: model.gms\n\tgams model.gms\n",
    )
    .unwrap();
    let mut settings = ws.settings();
    settings.build_args = vec!["-f".to_string(), "Makefile".to_string()];
    let request = StoreRequest {
        computation_start: Some(ws.after_source_change()),
        ..StoreRequest::new("results_bau.gdx")
    };

    // Without a make binary everything is unrecognized.
    let make_available = std::process::Command::new("make")
        .arg("--version")
        .output()
        .is_ok();
    let result = store(&settings, &request, &mut PresetOperator::default());
    if make_available {
        let receipt = result.unwrap();
        assert_eq!(
            receipt.record.reproduce_with.as_deref(),
            Some("make results_bau.gdx")
        );
        assert!(receipt.record.scripts.is_empty());
    } else {
        assert!(matches!(result, Err(StoreError::ProvenanceUnresolved { .. })));
    }
}

#[test]
fn same_result_twice_is_a_conflict() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(ws.after_source_change()),
        ..StoreRequest::new("results_bau.gdx")
    };
    store(&ws.settings(), &request, &mut PresetOperator::default()).unwrap();

    fs::write(ws.source.path().join("results_bau.gdx"), b"\x00GDX\x02changed").unwrap();
    let err = store(&ws.settings(), &request, &mut PresetOperator::default()).unwrap_err();
    assert!(matches!(err, StoreError::StorageConflict { .. }));
    assert_eq!(
        fs::read(ws.storage_root().join(ws.subfolder()).join("results_bau.gdx")).unwrap(),
        b"\x00GDX\x01bau"
    );
}

#[cfg(unix)]
#[test]
fn rejected_commit_leaves_no_files_behind() {
    use std::os::unix::fs::PermissionsExt;

    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    fs::write(ws.source.path().join("run.sh"), "#!/bin/sh\n").unwrap();
    let root = ws.storage_root();
    fs::create_dir_all(&root).unwrap();
    run_git(&root, &["init", "-q"]);
    let hook = root.join(".git/hooks/pre-commit");
    fs::create_dir_all(hook.parent().unwrap()).unwrap();
    fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(ws.after_source_change()),
        ..StoreRequest::new("results_bau.gdx")
    };
    let err = store(&ws.settings(), &request, &mut PresetOperator::default()).unwrap_err();

    match err {
        StoreError::Commit { target, .. } => assert_eq!(target, ws.subfolder()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!root.join(ws.subfolder()).exists());
    assert_eq!(run_git(&root, &["status", "--porcelain"]), "");
    assert!(GitCli::new(&root).head().unwrap().is_none());
}

#[test]
fn workspace_below_repository_root_is_accepted() {
    if !git_available() {
        return;
    }
    let ws = Workspace::new();
    let runs = ws.source.path().join("runs");
    fs::create_dir_all(&runs).unwrap();
    fs::write(runs.join("run.sh"), "#!/bin/sh\n").unwrap();
    fs::write(runs.join("results_bau.gdx"), b"\x00GDX\x01runs").unwrap();
    run_git(ws.source.path(), &["add", "runs/run.sh"]);
    run_git(ws.source.path(), &["commit", "-q", "-m", "Add runner"]);

    let mut settings = gdxstore::StoreSettings::new(&runs, ws.storage_root());
    settings.author = Some(("Results Archive".to_string(), "archive@example.org".to_string()));
    let request = StoreRequest {
        script: Some(PathBuf::from("run.sh")),
        computation_start: Some(Local::now() + Duration::hours(1)),
        ..StoreRequest::new("results_bau.gdx")
    };
    let receipt = store(&settings, &request, &mut PresetOperator::default()).unwrap();

    assert_eq!(receipt.verdict, TimingVerdict::Certified);
    assert_eq!(receipt.subfolder, ws.subfolder());
    assert_eq!(
        fs::read(ws.storage_root().join(ws.subfolder()).join("results_bau.gdx")).unwrap(),
        b"\x00GDX\x01runs"
    );
}

use chrono::Duration;
use gdxstore::clock::{self, Timestamp};
use gdxstore::StoreSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Test Modeler",
            "-c",
            "user.email=modeler@example.org",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A source repository with one committed model file and a result file,
/// plus an empty directory to use as storage root.
pub struct Workspace {
    pub source: TempDir,
    pub storage: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let source = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        run_git(source.path(), &["init", "-q"]);
        fs::write(source.path().join("model.gms"), "Set i /1*3/;\n").unwrap();
        run_git(source.path(), &["add", "model.gms"]);
        run_git(source.path(), &["commit", "-q", "-m", "Add model"]);
        fs::write(source.path().join("results_bau.gdx"), b"\x00GDX\x01bau").unwrap();
        Self { source, storage }
    }

    pub fn storage_root(&self) -> PathBuf {
        self.storage.path().join("results")
    }

    pub fn settings(&self) -> StoreSettings {
        let mut settings = StoreSettings::new(self.source.path(), self.storage_root());
        settings.author = Some(("Results Archive".to_string(), "archive@example.org".to_string()));
        settings
    }

    pub fn head(&self) -> String {
        run_git(self.source.path(), &["rev-parse", "HEAD"])
    }

    pub fn subfolder(&self) -> String {
        self.head()[..8].to_string()
    }

    /// Modification time of the committed model file.
    pub fn source_change(&self) -> Timestamp {
        clock::file_mtime(&self.source.path().join("model.gms")).unwrap()
    }

    pub fn after_source_change(&self) -> Timestamp {
        self.source_change() + Duration::seconds(1)
    }

    /// Edit the tracked model file without committing.
    pub fn make_dirty(&self) {
        fs::write(self.source.path().join("model.gms"), "Set i /1*4/;\n").unwrap();
    }
}

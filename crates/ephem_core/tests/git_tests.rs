//! GitOps against the real git binary.
//!
//! Tests skip themselves when `git` is not available.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use ephem_core::GitOps;
use ephem_runner::ProcessRunner;
use serial_test::serial;
use tempfile::TempDir;

/// Restores the current directory when dropped.
struct CurrentDir(PathBuf);

impl CurrentDir {
    fn enter(dir: &Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CurrentDir {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A repository with one commit on `main`.
fn source_repo(root: &Path) -> Option<PathBuf> {
    let source = root.join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("main.tf"), "terraform {}\n").unwrap();

    let ok = git(&source, &["init", "-q"])
        && git(&source, &["symbolic-ref", "HEAD", "refs/heads/main"])
        && git(&source, &["add", "."])
        && git(
            &source,
            &[
                "-c",
                "user.email=ci@example.com",
                "-c",
                "user.name=ci",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "-q",
                "-m",
                "init",
            ],
        );
    ok.then_some(source)
}

#[tokio::test]
#[serial]
async fn test_sync_relative_workdir_clones_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let Some(source) = source_repo(temp_dir.path()) else {
        println!("git not available, skipping test");
        return;
    };
    let workspace = temp_dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();
    let _cwd = CurrentDir::enter(&workspace);

    let git_ops = GitOps::new(Arc::new(ProcessRunner::new()), Path::new(".ephem").join("shop-dev"));
    let url = source.to_string_lossy().to_string();

    let first = git_ops.sync(&url, "main").await.unwrap();
    assert!(first.cloned);
    assert!(first.branch);
    assert_eq!(first.commit.len(), 40);
    assert!(workspace.join(".ephem/shop-dev/.git").is_dir());
    assert!(workspace.join(".ephem/shop-dev/main.tf").is_file());
    assert!(!workspace.join(".ephem/.ephem").exists());

    let second = git_ops.sync(&url, "main").await.unwrap();
    assert!(!second.cloned);
    assert_eq!(second.commit, first.commit);
}

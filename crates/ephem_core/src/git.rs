//! Git synchronization of the infrastructure repository.
//!
//! Keeps a working directory checked out at the ref named in the variables
//! file: clone on first use, then fetch and hard-checkout on every run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ephem_runner::{CommandRunner, CommandSpec, ExecutionResult};

use crate::error::{CoreError, CoreResult};

/// Timeout for any single git command.
const GIT_TIMEOUT_SECS: u64 = 600;

/// Result of a repository sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSync {
    /// Commit checked out after the sync
    pub commit: String,
    /// Whether the repository was cloned during this sync
    pub cloned: bool,
    /// Whether the ref resolved to a remote branch
    pub branch: bool,
}

/// Git operations manager.
pub struct GitOps {
    runner: Arc<dyn CommandRunner>,
    repo_path: PathBuf,
}

impl GitOps {
    /// Create a new Git operations manager for a repository.
    pub fn new(runner: Arc<dyn CommandRunner>, repo_path: impl AsRef<Path>) -> Self {
        Self {
            runner,
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Check if Git is available on the system.
    pub async fn is_git_available(&self) -> bool {
        self.runner.is_available("git").await
    }

    /// Check if the repository is initialized.
    pub fn is_initialized(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    /// Run git with the given arguments, failing on a non-zero exit.
    async fn git(&self, args: &[&str], dir: &Path) -> CoreResult<ExecutionResult> {
        let spec = CommandSpec::new("git")
            .args(args.iter().copied())
            .workdir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(GIT_TIMEOUT_SECS);

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| CoreError::GitError(format!("Failed to run git {}: {}", args[0], e)))?;

        if !output.success() {
            return Err(CoreError::GitError(format!(
                "git {} failed: {}",
                args[0],
                output.stderr.trim()
            )));
        }

        Ok(output)
    }

    /// Clone `url` into the repository path.
    pub async fn clone_repo(&self, url: &str) -> CoreResult<()> {
        let parent = self
            .repo_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;

        info!("Cloning {} into {}", url, self.repo_path.display());
        // git runs inside `parent`, so the target is relative to it
        let target = self
            .repo_path
            .file_name()
            .unwrap_or(self.repo_path.as_os_str())
            .to_string_lossy()
            .to_string();
        self.git(&["clone", "--quiet", url, &target], &parent).await?;
        Ok(())
    }

    /// Get remote URL.
    pub async fn get_remote(&self, name: &str) -> CoreResult<String> {
        let output = self.git(&["remote", "get-url", name], &self.repo_path).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Point a remote at `url`, adding it if needed.
    pub async fn set_remote(&self, name: &str, url: &str) -> CoreResult<()> {
        match self.get_remote(name).await {
            Ok(current) if current == url => {
                debug!("Remote '{}' already points at {}", name, url);
                return Ok(());
            }
            Ok(_) => {
                self.git(&["remote", "set-url", name, url], &self.repo_path).await?;
            }
            Err(_) => {
                self.git(&["remote", "add", name, url], &self.repo_path).await?;
            }
        }

        info!("Set remote '{}' -> {}", name, url);
        Ok(())
    }

    /// Fetch branches and tags from origin.
    pub async fn fetch(&self) -> CoreResult<()> {
        self.git(&["fetch", "--quiet", "--prune", "--tags", "--force", "origin"], &self.repo_path)
            .await?;
        Ok(())
    }

    /// Whether `git_ref` names a branch on origin.
    pub async fn is_remote_branch(&self, git_ref: &str) -> bool {
        let remote_ref = format!("refs/remotes/origin/{}", git_ref);
        self.git(&["rev-parse", "--verify", "--quiet", &remote_ref], &self.repo_path)
            .await
            .is_ok()
    }

    /// Check out `git_ref`, discarding local changes.
    ///
    /// Branches track `origin/<ref>` exactly; tags and commits are checked
    /// out detached.
    pub async fn checkout(&self, git_ref: &str) -> CoreResult<bool> {
        if self.is_remote_branch(git_ref).await {
            let upstream = format!("origin/{}", git_ref);
            self.git(&["checkout", "--quiet", "--force", "-B", git_ref, &upstream], &self.repo_path)
                .await?;
            Ok(true)
        } else {
            self.git(&["checkout", "--quiet", "--force", "--detach", git_ref], &self.repo_path)
                .await?;
            Ok(false)
        }
    }

    /// Commit hash of HEAD.
    pub async fn head_commit(&self) -> CoreResult<String> {
        let output = self.git(&["rev-parse", "HEAD"], &self.repo_path).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Bring the working directory to `git_ref` of `url`.
    pub async fn sync(&self, url: &str, git_ref: &str) -> CoreResult<GitSync> {
        if !self.is_git_available().await {
            return Err(CoreError::GitError("git is not installed".to_string()));
        }

        let cloned = if self.is_initialized() {
            self.set_remote("origin", url).await?;
            self.fetch().await?;
            false
        } else {
            if self.repo_path.exists() && self.repo_path.read_dir()?.next().is_some() {
                return Err(CoreError::GitError(format!(
                    "{} exists and is not a git repository",
                    self.repo_path.display()
                )));
            }
            self.clone_repo(url).await?;
            true
        };

        let branch = self.checkout(git_ref).await?;
        let commit = self.head_commit().await?;
        info!("Repository at {} ({})", git_ref, commit);

        Ok(GitSync {
            commit,
            cloned,
            branch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ephem_runner::{MockResponse, MockRunner};
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sync_clones_fresh_directory() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("checkout");
        let mock = MockRunner::new()
            .respond_to("git", "rev-parse", MockResponse::success("abc123\n"));
        let git_ops = GitOps::new(Arc::new(mock.clone()), &repo);

        let sync = git_ops.sync("https://example.com/infra.git", "main").await.unwrap();

        assert!(sync.cloned);
        assert!(sync.branch);
        assert_eq!(sync.commit, "abc123");
        assert_eq!(mock.subcommands("git"), vec!["clone", "rev-parse", "checkout", "rev-parse"]);

        let clone = &mock.calls_to("git")[0];
        assert_eq!(clone.workdir.as_deref(), Some(temp_dir.path()));
        assert_eq!(clone.env.get("GIT_TERMINAL_PROMPT").map(String::as_str), Some("0"));
        assert_eq!(clone.args.last().map(String::as_str), Some("checkout"));
    }

    #[tokio::test]
    #[serial]
    async fn test_clone_target_is_relative_to_parent() {
        let mock = MockRunner::new();
        let git_ops = GitOps::new(Arc::new(mock.clone()), Path::new(".ephem").join("shop-dev"));

        git_ops.clone_repo("https://example.com/infra.git").await.unwrap();

        let clone = &mock.calls_to("git")[0];
        assert_eq!(clone.workdir.as_deref(), Some(Path::new(".ephem")));
        assert_eq!(clone.args.last().map(String::as_str), Some("shop-dev"));
        let _ = std::fs::remove_dir(".ephem");
    }

    #[tokio::test]
    async fn test_sync_existing_checkout_fetches() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
        let mock = MockRunner::new()
            .respond_to("git", "remote", MockResponse::success("https://example.com/infra.git\n"))
            .respond_to("git", "rev-parse", MockResponse::failure(1, ""));
        let git_ops = GitOps::new(Arc::new(mock.clone()), temp_dir.path());

        // rev-parse fails for both the branch lookup and HEAD
        let err = git_ops.sync("https://example.com/infra.git", "v1.0.0").await.unwrap_err();
        assert!(matches!(err, CoreError::GitError(_)));

        let subcommands = mock.subcommands("git");
        assert_eq!(subcommands[0], "remote");
        assert_eq!(subcommands[1], "fetch");
        let checkout = mock
            .calls_to("git")
            .into_iter()
            .find(|c| c.subcommand() == Some("checkout"))
            .unwrap();
        assert!(checkout.args.contains(&"--detach".to_string()));
    }

    #[tokio::test]
    async fn test_sync_refuses_non_repository_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("stray.txt"), "x").unwrap();
        let mock = MockRunner::new();
        let git_ops = GitOps::new(Arc::new(mock.clone()), temp_dir.path());

        let err = git_ops.sync("https://example.com/infra.git", "main").await.unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_git_missing() {
        let temp_dir = TempDir::new().unwrap();
        let mock = MockRunner::new().set_unavailable("git");
        let git_ops = GitOps::new(Arc::new(mock), temp_dir.path().join("repo"));

        let err = git_ops.sync("u", "main").await.unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}

//! Version control adapter
//!
//! Provides the [`VersionControl`] trait the acquisition orchestrator drives,
//! and [`Git`], which implements it by spawning `git` with an explicit
//! argument list. Every command runs under a deploy key supplied by the
//! caller through `GIT_SSH_COMMAND`.

use crate::error::{RepoCacheError, RepoCacheResult};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// The git operations used by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOperation {
    Clone,
    RevParse,
    Fetch,
    Checkout,
}

impl GitOperation {
    /// Subcommand name as passed to git
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::RevParse => "rev-parse",
            Self::Fetch => "fetch",
            Self::Checkout => "checkout",
        }
    }

    /// Whether the operation talks to the remote
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Clone | Self::Fetch)
    }
}

impl fmt::Display for GitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clone, inspect and update working copies under a credential
///
/// `key` is the path of a private key on disk. Failures are reported as
/// [`RepoCacheError::Git`] or, if the command could not be started,
/// [`RepoCacheError::CommandFailed`].
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `remote` into `target`, which must not exist or be empty
    async fn clone_repository(&self, key: &Path, remote: &str, target: &Path)
        -> RepoCacheResult<()>;

    /// Revision currently checked out in `dir`
    async fn current_revision(&self, key: &Path, dir: &Path) -> RepoCacheResult<String>;

    /// Fetch every remote of the working copy in `dir`
    async fn fetch_all(&self, key: &Path, dir: &Path) -> RepoCacheResult<()>;

    /// Check out `commitish` in `dir`
    async fn checkout(&self, key: &Path, dir: &Path, commitish: &str) -> RepoCacheResult<()>;
}

/// [`VersionControl`] backed by the `git` executable
pub struct Git {
    program: String,
}

impl Git {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `GIT_SSH_COMMAND` value that authenticates with `key` only
    pub fn ssh_command(key: &Path) -> String {
        format!(
            "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no",
            shell_quote(&key.to_string_lossy())
        )
    }

    /// Run git in `cwd` and return stdout, or a `Git` error with stderr
    async fn exec(
        &self,
        operation: GitOperation,
        key: &Path,
        cwd: &Path,
        args: &[&str],
    ) -> RepoCacheResult<String> {
        debug!("Executing: {} {:?} in {}", self.program, args, cwd.display());

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_SSH_COMMAND", Self::ssh_command(key))
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                RepoCacheError::command_failed(format!("{} {}", self.program, operation), e)
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(RepoCacheError::Git {
                operation,
                path: cwd.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionControl for Git {
    async fn clone_repository(
        &self,
        key: &Path,
        remote: &str,
        target: &Path,
    ) -> RepoCacheResult<()> {
        let (parent, name) = match (target.parent(), target.file_name()) {
            (Some(parent), Some(name)) => (parent, name.to_string_lossy()),
            _ => {
                return Err(RepoCacheError::Internal(format!(
                    "invalid clone target: {}",
                    target.display()
                )))
            }
        };
        self.exec(
            GitOperation::Clone,
            key,
            parent,
            &["clone", "-q", "--", remote, &name],
        )
        .await?;
        Ok(())
    }

    async fn current_revision(&self, key: &Path, dir: &Path) -> RepoCacheResult<String> {
        let stdout = self
            .exec(GitOperation::RevParse, key, dir, &["rev-parse", "HEAD"])
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn fetch_all(&self, key: &Path, dir: &Path) -> RepoCacheResult<()> {
        self.exec(GitOperation::Fetch, key, dir, &["fetch", "--all", "-q"])
            .await?;
        Ok(())
    }

    async fn checkout(&self, key: &Path, dir: &Path, commitish: &str) -> RepoCacheResult<()> {
        self.exec(
            GitOperation::Checkout,
            key,
            dir,
            &["checkout", "-q", commitish, "--"],
        )
        .await?;
        Ok(())
    }
}

/// Single-quote `value` for the POSIX shell git uses to run `GIT_SSH_COMMAND`
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn remote_operations() {
        assert!(GitOperation::Clone.is_remote());
        assert!(GitOperation::Fetch.is_remote());
        assert!(!GitOperation::RevParse.is_remote());
        assert!(!GitOperation::Checkout.is_remote());
        assert_eq!(GitOperation::RevParse.to_string(), "rev-parse");
    }

    #[test]
    fn ssh_command_quotes_key_path() {
        let cmd = Git::ssh_command(Path::new("/keys/it's here/ssh-key"));
        assert_eq!(
            cmd,
            r"ssh -i '/keys/it'\''s here/ssh-key' -o IdentitiesOnly=yes -o StrictHostKeyChecking=no"
        );
    }

    #[tokio::test]
    async fn missing_executable_is_command_failure() {
        let temp = TempDir::new().unwrap();
        let git = Git::with_program("repocache-no-such-git");

        let err = git
            .fetch_all(Path::new("/keys/none"), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoCacheError::CommandFailed { .. }));
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args([
                "-c",
                "user.name=repocache",
                "-c",
                "user.email=repocache@localhost",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    #[tokio::test]
    async fn clone_and_checkout_local_repository() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        std::fs::create_dir(&origin).unwrap();
        run(&origin, &["init", "-q"]);
        std::fs::write(origin.join("README"), "first").unwrap();
        run(&origin, &["add", "README"]);
        run(&origin, &["commit", "-q", "-m", "first"]);
        std::fs::write(origin.join("README"), "second").unwrap();
        run(&origin, &["commit", "-q", "-a", "-m", "second"]);

        let git = Git::new();
        let key = temp.path().join("unused-key");
        let mirror = temp.path().join("mirror");
        git.clone_repository(&key, &origin.to_string_lossy(), &mirror)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(mirror.join("README")).unwrap(), "second");

        let head = git.current_revision(&key, &mirror).await.unwrap();
        assert_eq!(head.len(), 40);

        git.fetch_all(&key, &mirror).await.unwrap();
        git.checkout(&key, &mirror, "HEAD~1").await.unwrap();
        assert_eq!(std::fs::read_to_string(mirror.join("README")).unwrap(), "first");
    }

    #[tokio::test]
    async fn failed_checkout_reports_stderr() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        run(temp.path(), &["init", "-q"]);

        let err = Git::new()
            .checkout(Path::new("/keys/none"), temp.path(), "no-such-ref")
            .await
            .unwrap_err();
        match err {
            RepoCacheError::Git {
                operation, stderr, ..
            } => {
                assert_eq!(operation, GitOperation::Checkout);
                assert!(!stderr.is_empty());
            }
            other => panic!("expected git error, got {:?}", other),
        }
    }
}

//! Subprocess-based inspection of the most recent commit.
//!
//! Used when the filesystem reader cannot decode the HEAD commit (for
//! example because it only exists inside a pack file).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{MetaError, Result};

/// One field per line; names, emails and subjects never contain newlines.
const LOG_FORMAT: &str = "--format=%H%n%an%n%ae%n%aI%n%cn%n%ce%n%cI%n%s";

/// A commit identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub email: String,
}

/// Summary of the most recent commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCommit {
    pub sha: String,
    pub author: Person,
    pub authored_on: String,
    pub committer: Person,
    pub committed_on: String,
    pub subject: String,
}

impl LastCommit {
    /// Parse the output of `git log -1` run with [`LOG_FORMAT`].
    pub fn parse(stdout: &str) -> Result<Self> {
        let mut lines = stdout.lines();
        let mut next = |field: &str| {
            lines
                .next()
                .map(str::to_string)
                .ok_or_else(|| MetaError::MalformedCommit(format!("missing {field}")))
        };

        let sha = next("sha")?;
        if sha.is_empty() {
            return Err(MetaError::MalformedCommit("empty sha".to_string()));
        }
        let author = Person {
            name: next("author name")?,
            email: next("author email")?,
        };
        let authored_on = next("author date")?;
        let committer = Person {
            name: next("committer name")?,
            email: next("committer email")?,
        };
        let committed_on = next("committer date")?;
        // An empty subject may leave no trailing line at all.
        let subject = next("subject").unwrap_or_default();

        Ok(Self {
            sha,
            author,
            authored_on,
            committer,
            committed_on,
            subject,
        })
    }
}

/// Source of last-commit information for a repository directory.
#[async_trait]
pub trait CommitInspector: Send + Sync {
    async fn last_commit(&self, repo_dir: &Path) -> Result<LastCommit>;
}

/// Runs `git log -1` in the repository directory.
#[derive(Debug, Clone)]
pub struct GitCliInspector {
    git: PathBuf,
    timeout: Option<Duration>,
}

impl Default for GitCliInspector {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
            timeout: None,
        }
    }
}

impl GitCliInspector {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            timeout: None,
        }
    }

    /// Bound the subprocess. Without a timeout a hung `git` stalls forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommitInspector for GitCliInspector {
    async fn last_commit(&self, repo_dir: &Path) -> Result<LastCommit> {
        let child = Command::new(&self.git)
            .args(["log", "-1", LOG_FORMAT])
            .current_dir(repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MetaError::GitCommand(format!("failed to run git: {e}")))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| MetaError::GitTimeout {
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MetaError::GitCommand(format!(
                "git log -1 failed: {}",
                stderr.trim()
            )));
        }

        LastCommit::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

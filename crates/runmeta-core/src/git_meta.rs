//! Version-control metadata for the current checkout.
//!
//! [`GitMetadataCollector::collect`] never fails. Every failure path
//! (no repository, subprocess error, unreadable config, malformed commit
//! data) yields [`RepositoryMetadata::default`], which serializes to `{}`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::git_config::{read_remotes, Remote};
use crate::git_dir::{absolutize, find_git_config};
use crate::last_commit::{CommitInspector, GitCliInspector, Person};
use crate::obs;
use crate::repo_info::{read_repo_info, RepoInfo};

/// Characters stripped from fallback author and committer identities.
const STRAY_QUOTES: &[char] = &['\u{201C}'];

/// Repository state attached to a test-run report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_git_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worktree_git_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits_since_last_tag: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remotes: Option<Vec<Remote>>,
}

impl RepositoryMetadata {
    /// True for the record produced outside a repository or after a failure.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn from_parts(info: RepoInfo, remotes: Vec<Remote>) -> Self {
        Self {
            name: Some("git".to_string()),
            sha: info.sha,
            short_sha: info.abbreviated_sha,
            branch: info.branch,
            tag: info.tag,
            committer: info.committer,
            committer_date: info.committer_date,
            author: info.author,
            author_date: info.author_date,
            commit_message: info.commit_message,
            root: info.root,
            common_git_dir: info.common_git_dir,
            worktree_git_dir: info.worktree_git_dir,
            last_tag: info.last_tag,
            commits_since_last_tag: info.commits_since_last_tag,
            remotes: Some(remotes),
        }
    }
}

/// Where and how to collect.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub cwd: PathBuf,
    pub git: PathBuf,
    pub timeout: Option<Duration>,
}

impl CollectorOptions {
    /// A relative `cwd` is resolved against the process working directory.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: absolutize(cwd.into()),
            git: PathBuf::from("git"),
            timeout: None,
        }
    }

    /// Options for the process working directory.
    pub fn from_current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gathers [`RepositoryMetadata`] for a working directory.
///
/// Each call to [`collect`](Self::collect) does all the work again;
/// concurrent calls are not deduplicated.
pub struct GitMetadataCollector<I = GitCliInspector> {
    cwd: PathBuf,
    inspector: I,
}

impl GitMetadataCollector<GitCliInspector> {
    pub fn new(options: CollectorOptions) -> Self {
        let inspector = GitCliInspector::new(options.git).with_timeout(options.timeout);
        Self {
            cwd: options.cwd,
            inspector,
        }
    }
}

impl<I: CommitInspector> GitMetadataCollector<I> {
    /// Use a custom last-commit inspector for the fallback.
    pub fn with_inspector(cwd: impl Into<PathBuf>, inspector: I) -> Self {
        Self {
            cwd: absolutize(cwd.into()),
            inspector,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    /// Collect metadata, collapsing any failure to an empty record.
    pub async fn collect(&self) -> RepositoryMetadata {
        match self.try_collect().await {
            Ok(Some(meta)) => {
                obs::emit_git_collected(meta.sha.as_deref(), meta.branch.as_deref());
                meta
            }
            Ok(None) => {
                tracing::debug!(cwd = %self.cwd.display(), "unable to find a git directory");
                RepositoryMetadata::default()
            }
            Err(e) => {
                obs::emit_collector_failed("git", &e);
                RepositoryMetadata::default()
            }
        }
    }

    async fn try_collect(&self) -> Result<Option<RepositoryMetadata>> {
        let Some(mut info) = read_repo_info(&self.cwd)? else {
            return Ok(None);
        };
        let Some(common_dir) = info.common_git_dir.clone() else {
            return Ok(None);
        };

        if info.author.is_none() {
            if let Some(repo_dir) = find_git_config(&self.cwd) {
                obs::emit_git_fallback(&repo_dir);
                let commit = self.inspector.last_commit(&repo_dir).await?;
                info.author.get_or_insert_with(|| identity(&commit.author));
                info.author_date.get_or_insert(commit.authored_on);
                info.committer.get_or_insert_with(|| identity(&commit.committer));
                info.committer_date.get_or_insert(commit.committed_on);
                info.commit_message.get_or_insert(commit.subject);
            }
        }

        let remotes = read_remotes(&common_dir)?;
        Ok(Some(RepositoryMetadata::from_parts(info, remotes)))
    }
}

/// `Name <email>` with stray opening smart quotes removed.
fn identity(person: &Person) -> String {
    format!(
        "{} <{}>",
        strip_stray_quotes(&person.name),
        strip_stray_quotes(&person.email)
    )
}

fn strip_stray_quotes(s: &str) -> String {
    s.replace(STRAY_QUOTES, "")
}

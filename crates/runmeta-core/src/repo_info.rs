//! Repository state read through `gix`.
//!
//! Discovery, HEAD, tags and the HEAD commit are read from the object
//! database without spawning `git`. When the HEAD commit cannot be found or
//! decoded, author and committer data are left unset and the collector falls
//! back to [`crate::last_commit`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use gix::actor::SignatureRef;
use gix::bstr::ByteSlice;
use gix::ObjectId;
use tracing::debug;

use crate::error::{MetaError, Result};

/// Upper bound on first-parent steps when searching for the last tag.
const MAX_TAG_WALK: u64 = 10_000;

/// Length of the abbreviated sha.
pub const SHORT_SHA_LEN: usize = 10;

/// Tag names keyed by the commit they peel to, sorted by name.
type TagMap = BTreeMap<ObjectId, Vec<String>>;

/// Repository state as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoInfo {
    pub sha: Option<String>,
    pub abbreviated_sha: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub author_date: Option<String>,
    pub committer: Option<String>,
    pub committer_date: Option<String>,
    pub commit_message: Option<String>,
    pub root: Option<PathBuf>,
    pub common_git_dir: Option<PathBuf>,
    pub worktree_git_dir: Option<PathBuf>,
    pub last_tag: Option<String>,
    pub commits_since_last_tag: Option<u64>,
}

/// Read repository state for the repository enclosing `cwd`.
///
/// Returns `Ok(None)` when `cwd` is not inside a repository.
pub fn read_repo_info(cwd: &Path) -> Result<Option<RepoInfo>> {
    let repo = match gix::discover(cwd) {
        Ok(repo) => repo,
        Err(e) => {
            debug!(cwd = %cwd.display(), error = %e, "no repository found");
            return Ok(None);
        }
    };

    let mut info = RepoInfo {
        root: repo.work_dir().map(Path::to_path_buf),
        common_git_dir: Some(repo.common_dir().to_path_buf()),
        worktree_git_dir: Some(repo.git_dir().to_path_buf()),
        ..RepoInfo::default()
    };

    info.branch = repo
        .head_name()
        .map_err(repository_error)?
        .map(|name| name.shorten().to_string());

    // Take the id HEAD names without peeling, so a missing object still
    // reports its sha.
    let Some(head) = repo.head().map_err(repository_error)?.id() else {
        // Unborn branch: no commits yet.
        debug!("HEAD does not point at a commit");
        return Ok(Some(info));
    };
    let head = head.detach();
    let sha = head.to_string();

    let tags = collect_tags(&repo)?;
    info.abbreviated_sha = Some(head.to_hex_with_len(SHORT_SHA_LEN).to_string());
    info.tag = tags.get(&head).and_then(|names| names.first().cloned());

    match summarize_commit(&repo, head) {
        Ok(commit) => {
            info.author = Some(commit.author);
            info.author_date = commit.author_date;
            info.committer = Some(commit.committer);
            info.committer_date = commit.committer_date;
            info.commit_message = Some(commit.message);
        }
        Err(e) => debug!(sha = %sha, error = %e, "unable to decode HEAD commit"),
    }

    if let Some((tag, distance)) = find_last_tag(&repo, &tags, head) {
        info.last_tag = Some(tag);
        info.commits_since_last_tag = Some(distance);
    }

    info.sha = Some(sha);
    Ok(Some(info))
}

fn repository_error(e: impl std::fmt::Display) -> MetaError {
    MetaError::Repository(e.to_string())
}

/// Author, committer and message of one commit, rendered for the report.
struct CommitSummary {
    author: String,
    author_date: Option<String>,
    committer: String,
    committer_date: Option<String>,
    message: String,
}

fn summarize_commit(repo: &gix::Repository, id: ObjectId) -> Result<CommitSummary> {
    let commit = repo
        .find_object(id)
        .map_err(repository_error)?
        .try_into_commit()
        .map_err(repository_error)?;
    let author = commit.author().map_err(repository_error)?;
    let committer = commit.committer().map_err(repository_error)?;
    let message = commit.message_raw().map_err(repository_error)?;

    Ok(CommitSummary {
        author: signature_identity(&author),
        author_date: format_git_time(author.time),
        committer: signature_identity(&committer),
        committer_date: format_git_time(committer.time),
        message: message.to_str_lossy().trim().to_string(),
    })
}

fn signature_identity(signature: &SignatureRef<'_>) -> String {
    format!("{} <{}>", signature.name, signature.email)
}

/// Every tag, peeled through annotated tag objects to the commit it names.
fn collect_tags(repo: &gix::Repository) -> Result<TagMap> {
    let mut tags = TagMap::new();
    let references = repo.references().map_err(repository_error)?;

    for reference in references.tags().map_err(repository_error)? {
        let mut reference = match reference {
            Ok(reference) => reference,
            Err(e) => {
                debug!(error = %e, "skipping unreadable tag");
                continue;
            }
        };
        let name = reference.name().shorten().to_string();
        match reference.peel_to_id_in_place() {
            Ok(id) => tags.entry(id.detach()).or_default().push(name),
            Err(e) => debug!(tag = %name, error = %e, "unable to peel tag"),
        }
    }

    for names in tags.values_mut() {
        names.sort();
    }
    Ok(tags)
}

/// Walk first-parent history from `head` until a tagged commit is found.
///
/// Gives up (returns `None`) on a missing or undecodable commit.
fn find_last_tag(repo: &gix::Repository, tags: &TagMap, head: ObjectId) -> Option<(String, u64)> {
    if tags.is_empty() {
        return None;
    }
    let mut current = head;
    for distance in 0..MAX_TAG_WALK {
        if let Some(name) = tags.get(&current).and_then(|names| names.first()) {
            return Some((name.clone(), distance));
        }
        let commit = repo.find_object(current).ok()?.try_into_commit().ok()?;
        current = commit.parent_ids().next()?.detach();
    }
    None
}

/// Render a signature time as RFC 3339 in the signer's own offset.
///
/// Offsets chrono cannot represent yield `None` rather than a wrong date.
fn format_git_time(time: gix::date::Time) -> Option<String> {
    let tz = FixedOffset::east_opt(time.offset)?;
    let utc = DateTime::from_timestamp(time.seconds, 0)?;
    Some(utc.with_timezone(&tz).to_rfc3339())
}

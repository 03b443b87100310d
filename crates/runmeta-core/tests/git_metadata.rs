//! Integration tests for the git metadata collector against real repositories.

use std::path::Path;
use std::process::Command as StdCommand;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use runmeta_core::{
    find_git_config, CollectorOptions, CommitInspector, GitCliInspector, GitMetadataCollector,
    LastCommit, MetaError, Person, RepositoryMetadata,
};

fn run_git(repo_dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(repo_dir)
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

fn make_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init", "-q"]);
    run_git(dir.path(), &["checkout", "-q", "-b", "main"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
    run_git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "initial"]);
    dir
}

/// Inspector returning canned data and counting calls.
struct FakeInspector {
    result: fn() -> runmeta_core::Result<LastCommit>,
    calls: AtomicUsize,
}

impl FakeInspector {
    fn new(result: fn() -> runmeta_core::Result<LastCommit>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitInspector for FakeInspector {
    async fn last_commit(&self, _repo_dir: &Path) -> runmeta_core::Result<LastCommit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.result)()
    }
}

fn smart_quoted_commit() -> runmeta_core::Result<LastCommit> {
    Ok(LastCommit {
        sha: "deadbeef".to_string(),
        author: Person {
            name: "\u{201C}Quoted Author".to_string(),
            email: "\u{201C}author@example.com".to_string(),
        },
        authored_on: "2024-01-02T03:04:05+00:00".to_string(),
        committer: Person {
            name: "Quoted\u{201C} Committer".to_string(),
            email: "committer@example.com\u{201C}".to_string(),
        },
        committed_on: "2024-01-02T03:04:06+00:00".to_string(),
        subject: "from the fallback".to_string(),
    })
}

fn failing_commit() -> runmeta_core::Result<LastCommit> {
    Err(MetaError::GitCommand("simulated failure".to_string()))
}

fn malformed_commit() -> runmeta_core::Result<LastCommit> {
    LastCommit::parse("only-a-sha\n")
}

/// Pack every object so the HEAD commit is no longer loose.
fn pack_objects(repo: &Path) {
    run_git(repo, &["gc", "-q", "--prune=now"]);
}

/// Delete the loose HEAD commit so only the fallback can describe it.
fn drop_head_object(repo: &Path) {
    let head = run_git(repo, &["rev-parse", "HEAD"]);
    let object = repo
        .join(".git")
        .join("objects")
        .join(&head[..2])
        .join(&head[2..]);
    std::fs::remove_file(object).unwrap();
}

/// Point `main` at a hand-written commit object and return its sha.
fn commit_literally(repo: &Path, body: &str) -> String {
    let file = repo.join("commit-object");
    std::fs::write(&file, body).unwrap();
    let sha = run_git(
        repo,
        &["hash-object", "-t", "commit", "-w", "--literally", "commit-object"],
    );
    std::fs::remove_file(&file).unwrap();
    run_git(repo, &["update-ref", "refs/heads/main", &sha]);
    sha
}

#[tokio::test]
async fn test_loose_commit_is_read_without_fallback() {
    let repo = make_git_repo();
    run_git(
        repo.path(),
        &["remote", "add", "origin", "https://example.com/acme/app.git"],
    );

    let inspector = FakeInspector::new(failing_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    let meta = collector.collect().await;

    assert_eq!(meta.name.as_deref(), Some("git"));
    assert_eq!(meta.branch.as_deref(), Some("main"));
    assert_eq!(meta.sha.as_ref().map(String::len), Some(40));
    assert_eq!(meta.short_sha.as_ref().map(String::len), Some(10));
    assert!(meta.sha.as_ref().unwrap().starts_with(meta.short_sha.as_ref().unwrap()));
    assert_eq!(meta.author.as_deref(), Some("test-user <test@example.com>"));
    assert_eq!(meta.committer.as_deref(), Some("test-user <test@example.com>"));
    assert_eq!(meta.commit_message.as_deref(), Some("initial"));
    assert!(meta.author_date.is_some());

    let remotes = meta.remotes.expect("remotes");
    assert_eq!(remotes.len(), 1);
    assert_eq!(remotes[0].name, "origin");
    assert_eq!(remotes[0].url.as_deref(), Some("https://example.com/acme/app.git"));

    assert_eq!(collector.inspector().calls(), 0);
}

#[tokio::test]
async fn test_packed_repository_is_read_without_fallback() {
    let repo = make_git_repo();
    run_git(repo.path(), &["tag", "v0.1.0"]);
    run_git(repo.path(), &["commit", "-q", "--allow-empty", "-m", "second"]);
    pack_objects(repo.path());

    let inspector = FakeInspector::new(failing_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    let meta = collector.collect().await;

    assert_eq!(collector.inspector().calls(), 0);
    assert_eq!(meta.author.as_deref(), Some("test-user <test@example.com>"));
    assert_eq!(meta.committer.as_deref(), Some("test-user <test@example.com>"));
    assert_eq!(meta.commit_message.as_deref(), Some("second"));
    assert!(meta.committer_date.is_some());
    // Tag refs are packed too, but the tagged commit sits one step back.
    assert_eq!(meta.tag, None);
    assert_eq!(meta.last_tag.as_deref(), Some("v0.1.0"));
    assert_eq!(meta.commits_since_last_tag, Some(1));
    assert_eq!(meta.remotes, Some(Vec::new()));
}

#[tokio::test]
async fn test_fallback_strips_smart_quotes() {
    let repo = make_git_repo();
    drop_head_object(repo.path());

    let inspector = FakeInspector::new(smart_quoted_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    let meta = collector.collect().await;

    assert_eq!(collector.inspector().calls(), 1);
    assert_eq!(meta.author.as_deref(), Some("Quoted Author <author@example.com>"));
    assert_eq!(meta.committer.as_deref(), Some("Quoted Committer <committer@example.com>"));
    assert_eq!(meta.commit_message.as_deref(), Some("from the fallback"));
    assert_eq!(meta.author_date.as_deref(), Some("2024-01-02T03:04:05+00:00"));
}

#[tokio::test]
async fn test_fallback_failure_collapses_to_empty() {
    let repo = make_git_repo();
    drop_head_object(repo.path());

    let inspector = FakeInspector::new(failing_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    let meta = collector.collect().await;
    assert_eq!(meta, RepositoryMetadata::default());
}

#[tokio::test]
async fn test_malformed_fallback_collapses_to_empty() {
    let repo = make_git_repo();
    drop_head_object(repo.path());

    let inspector = FakeInspector::new(malformed_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    assert!(collector.collect().await.is_empty());
}

#[tokio::test]
async fn test_fallback_runs_from_nested_directory() {
    let repo = make_git_repo();
    drop_head_object(repo.path());
    let nested = repo.path().join("src").join("lib");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(find_git_config(&nested).as_deref(), Some(repo.path()));

    let inspector = FakeInspector::new(smart_quoted_commit);
    let collector = GitMetadataCollector::with_inspector(&nested, inspector);
    let meta = collector.collect().await;
    let root = meta.root.as_deref().expect("root");
    assert_eq!(
        std::fs::canonicalize(root).unwrap(),
        std::fs::canonicalize(repo.path()).unwrap()
    );
    assert_eq!(meta.author.as_deref(), Some("Quoted Author <author@example.com>"));
}

#[tokio::test]
async fn test_each_collect_repeats_the_work() {
    let repo = make_git_repo();
    drop_head_object(repo.path());

    let inspector = FakeInspector::new(smart_quoted_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    let first = collector.collect().await;
    let second = collector.collect().await;
    assert_eq!(first, second);
    assert_eq!(collector.inspector().calls(), 2);
}

#[tokio::test]
async fn test_outside_repository_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    if find_git_config(dir.path()).is_some() {
        // Scratch space lives inside a checkout on this machine.
        return;
    }
    let inspector = FakeInspector::new(smart_quoted_commit);
    let collector = GitMetadataCollector::with_inspector(dir.path(), inspector);
    let meta = collector.collect().await;
    assert!(meta.is_empty());
    assert_eq!(collector.inspector().calls(), 0);
    assert_eq!(serde_json::to_string(&meta).unwrap(), "{}");
}

#[tokio::test]
async fn test_tag_on_head_and_distance() {
    let repo = make_git_repo();
    run_git(repo.path(), &["tag", "v1.0.0"]);

    let collector = GitMetadataCollector::new(CollectorOptions::new(repo.path()));
    let meta = collector.collect().await;
    assert_eq!(meta.tag.as_deref(), Some("v1.0.0"));
    assert_eq!(meta.last_tag.as_deref(), Some("v1.0.0"));
    assert_eq!(meta.commits_since_last_tag, Some(0));

    run_git(repo.path(), &["commit", "-q", "--allow-empty", "-m", "next"]);
    run_git(repo.path(), &["commit", "-q", "--allow-empty", "-m", "after"]);
    let meta = collector.collect().await;
    assert_eq!(meta.tag, None);
    assert_eq!(meta.last_tag.as_deref(), Some("v1.0.0"));
    assert_eq!(meta.commits_since_last_tag, Some(2));
}

#[tokio::test]
async fn test_unusual_signature_offset_does_not_panic() {
    let repo = make_git_repo();
    let sha = commit_literally(
        repo.path(),
        "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
         author A <a@b> 1700000000 +1\u{e9}1\n\
         committer A <a@b> 1700000000 +1\u{e9}1\n\
         \n\
         odd offset\n",
    );

    let inspector = FakeInspector::new(smart_quoted_commit);
    let collector = GitMetadataCollector::with_inspector(repo.path(), inspector);
    let meta = collector.collect().await;

    // Whether or not the header decodes, the commit is still described.
    assert_eq!(meta.sha.as_deref(), Some(sha.as_str()));
    assert!(meta.author.is_some());
    assert!(collector.inspector().calls() <= 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_git_timeout_collapses_to_empty() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    let repo = make_git_repo();
    drop_head_object(repo.path());

    let scripts = tempfile::tempdir().unwrap();
    let slow_git = scripts.path().join("slow-git");
    std::fs::write(&slow_git, "#!/bin/sh\nsleep 5\n").unwrap();
    std::fs::set_permissions(&slow_git, std::fs::Permissions::from_mode(0o755)).unwrap();

    let inspector = GitCliInspector::new(&slow_git).with_timeout(Some(Duration::from_secs(1)));
    let err = inspector.last_commit(repo.path()).await.unwrap_err();
    assert!(matches!(err, MetaError::GitTimeout { secs: 1 }), "{err}");

    let options = CollectorOptions::new(repo.path())
        .with_git(&slow_git)
        .with_timeout(Some(Duration::from_secs(1)));
    let meta = GitMetadataCollector::new(options).collect().await;
    assert_eq!(meta, RepositoryMetadata::default());
}

//! Structured events for collector lifecycle.
//!
//! Successful resolutions are emitted at `info!`, recoverable failures at
//! `debug!`. Filter with `RUST_LOG` (for example `RUST_LOG=runmeta_core=debug`).

use std::path::Path;

use tracing::{debug, info};

/// Emit event: git metadata collected.
pub fn emit_git_collected(sha: Option<&str>, branch: Option<&str>) {
    debug!(
        event = "git.collected",
        sha = sha.unwrap_or_default(),
        branch = branch.unwrap_or_default(),
    );
}

/// Emit event: HEAD commit unreadable from disk, asking `git` instead.
pub fn emit_git_fallback(repo_dir: &Path) {
    debug!(event = "git.fallback", repo_dir = %repo_dir.display());
}

/// Emit event: CI platform identified.
pub fn emit_ci_detected(platform: &str, build_number: Option<&str>) {
    debug!(
        event = "ci.detected",
        platform = %platform,
        build_number = build_number.unwrap_or_default(),
    );
}

/// Emit event: dependency version resolved from `source`.
pub fn emit_package_resolved(package: &str, source: &str, version: &str) {
    info!(
        event = "package.resolved",
        package = %package,
        source = %source,
        version = %version,
    );
}

/// Emit event: a collector failed and fell back to its empty result.
pub fn emit_collector_failed(collector: &str, error: &dyn std::error::Error) {
    debug!(event = "collector.failed", collector = %collector, error = %error);
}

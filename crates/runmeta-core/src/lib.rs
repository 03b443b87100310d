//! runmeta core - environment metadata for test-run reports
//!
//! Three independent collectors, composed by callers:
//! - [`git_meta`]: commit, branch, tag and remote state of the checkout
//! - [`ci_env`]: which CI platform (if any) the process runs under
//! - [`package_version`]: installed version of a named dependency
//!
//! None of the collectors surface errors. Failures are logged at debug level
//! and collapse to an empty record or an absent value.

pub mod ci_env;
pub mod config;
pub mod env;
pub mod error;
pub mod git_config;
pub mod git_dir;
pub mod git_meta;
pub mod last_commit;
pub mod obs;
pub mod package_version;
pub mod repo_info;
pub mod report;
pub mod telemetry;

pub use ci_env::{detect_ci, detect_ci_from_process, CiInfo, CiPlatform};
pub use config::{automation_enabled, RunConfig, RunSettings};
pub use env::EnvSnapshot;
pub use error::{MetaError, Result};
pub use git_config::Remote;
pub use git_dir::{absolutize, find_git_config};
pub use git_meta::{CollectorOptions, GitMetadataCollector, RepositoryMetadata};
pub use last_commit::{CommitInspector, GitCliInspector, LastCommit, Person};
pub use package_version::{PackageVersionResolver, VersionSource};
pub use report::{collect_run_metadata, PackageRequest, RunMetadata};
pub use telemetry::init_tracing;

/// runmeta version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of this tool, reported alongside collected metadata.
pub fn agent_version() -> &'static str {
    VERSION
}

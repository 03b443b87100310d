//! Combined metadata record for a test-run report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ci_env::{detect_ci, CiInfo};
use crate::config::RunConfig;
use crate::env::EnvSnapshot;
use crate::git_meta::{GitMetadataCollector, RepositoryMetadata};
use crate::last_commit::CommitInspector;
use crate::package_version::PackageVersionResolver;

/// Everything collected at test-run initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub agent_version: String,
    pub git: RepositoryMetadata,
    pub ci: Option<CiInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, Option<String>>,
}

/// What to resolve besides git and CI state.
#[derive(Debug, Default)]
pub struct PackageRequest<'a> {
    pub resolver: Option<&'a PackageVersionResolver>,
    pub names: &'a [String],
    pub config: Option<&'a RunConfig>,
}

/// Collect git metadata and CI identity concurrently, then resolve the
/// requested package versions.
pub async fn collect_run_metadata<I: CommitInspector>(
    collector: &GitMetadataCollector<I>,
    env: &EnvSnapshot,
    packages: PackageRequest<'_>,
) -> RunMetadata {
    let (git, ci) = tokio::join!(collector.collect(), async { detect_ci(env) });

    let packages = match packages.resolver {
        Some(resolver) => packages
            .names
            .iter()
            .map(|name| (name.clone(), resolver.resolve(name, packages.config)))
            .collect(),
        None => BTreeMap::new(),
    };

    RunMetadata {
        agent_version: crate::agent_version().to_string(),
        git,
        ci,
        packages,
    }
}

//! Installed-version lookup for named dependencies.
//!
//! Sources are tried in order, first hit wins:
//!
//! 1. the dependency's own manifest (`node_modules/<name>/package.json`,
//!    nearest to the project directory),
//! 2. `run_settings.npm_dependencies` of the run configuration, only in
//!    automation mode,
//! 3. `dependencies` / `devDependencies` of the project manifest.
//!
//! Resolved versions are cached per resolver for its whole lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Deserialize;
use serde_json::Value;

use crate::config::{automation_enabled, RunConfig};
use crate::env::EnvSnapshot;
use crate::error::Result;
use crate::git_dir::absolutize;
use crate::obs;

const MANIFEST: &str = "package.json";

/// Where a version was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    ModuleManifest,
    RunConfig,
    ProjectManifest,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::ModuleManifest => "module_manifest",
            VersionSource::RunConfig => "run_config",
            VersionSource::ProjectManifest => "project_manifest",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    dependencies: Option<HashMap<String, Value>>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: Option<HashMap<String, Value>>,
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn version_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Resolves and caches dependency versions for one project directory.
#[derive(Debug)]
pub struct PackageVersionResolver {
    project_dir: PathBuf,
    env: EnvSnapshot,
    cache: Mutex<HashMap<String, String>>,
}

impl PackageVersionResolver {
    /// A relative `project_dir` is resolved against the process working directory.
    pub fn new(project_dir: impl Into<PathBuf>, env: EnvSnapshot) -> Self {
        Self {
            project_dir: absolutize(project_dir.into()),
            env,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver for the process working directory and environment.
    pub fn from_process() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?, EnvSnapshot::from_process()))
    }

    /// Version of `name`, or `None` if no source knows it.
    ///
    /// A cached version wins over every source, including a `config`
    /// override that differs from the first call's.
    pub fn resolve(&self, name: &str, config: Option<&RunConfig>) -> Option<String> {
        if let Some(hit) = self.cached(name) {
            return Some(hit);
        }

        let (version, source) = self.lookup(name, config)?;
        obs::emit_package_resolved(name, source.as_str(), &version);
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another thread may have resolved the same name first; keep its value.
        Some(cache.entry(name.to_string()).or_insert(version).clone())
    }

    /// Cached version of `name`, without probing.
    pub fn cached(&self, name: &str) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    fn lookup(&self, name: &str, config: Option<&RunConfig>) -> Option<(String, VersionSource)> {
        let steps: [(VersionSource, &dyn Fn() -> Result<Option<String>>); 3] = [
            (VersionSource::ModuleManifest, &|| self.from_module_manifest(name)),
            (VersionSource::RunConfig, &|| Ok(self.from_run_config(name, config))),
            (VersionSource::ProjectManifest, &|| self.from_project_manifest(name)),
        ];

        for (source, step) in steps {
            match step() {
                Ok(Some(version)) => return Some((version, source)),
                Ok(None) => {}
                Err(e) => tracing::debug!(
                    package = %name,
                    source = source.as_str(),
                    error = %e,
                    "package version lookup failed"
                ),
            }
        }
        None
    }

    fn from_module_manifest(&self, name: &str) -> Result<Option<String>> {
        let Some(path) = self
            .project_dir
            .ancestors()
            .map(|dir| dir.join("node_modules").join(name).join(MANIFEST))
            .find(|p| p.is_file())
        else {
            tracing::debug!(package = %name, "no module manifest found");
            return Ok(None);
        };
        Ok(read_manifest(&path)?.version.as_ref().and_then(version_text))
    }

    fn from_run_config(&self, name: &str, config: Option<&RunConfig>) -> Option<String> {
        if !automation_enabled(&self.env) {
            return None;
        }
        config?.dependency_override(name)
    }

    fn from_project_manifest(&self, name: &str) -> Result<Option<String>> {
        let path = self.project_dir.join(MANIFEST);
        if !path.is_file() {
            return Ok(None);
        }
        let manifest = read_manifest(&path)?;
        let lookup = |deps: &Option<HashMap<String, Value>>| {
            deps.as_ref()?.get(name).and_then(version_text)
        };
        Ok(lookup(&manifest.dependencies).or_else(|| lookup(&manifest.dev_dependencies)))
    }
}

//! runmeta - environment metadata for test-run reports
//!
//! ## Commands
//!
//! - `locate`: nearest directory holding `.git/config`
//! - `git`: commit, branch, tag and remote metadata
//! - `ci`: detected CI platform and build identifiers
//! - `package`: installed versions of named dependencies
//! - `collect`: all of the above as one record

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use runmeta_core::{
    absolutize, collect_run_metadata, detect_ci, find_git_config, CollectorOptions, EnvSnapshot,
    GitMetadataCollector, PackageRequest, PackageVersionResolver, RunConfig,
};

#[derive(Parser)]
#[command(name = "runmeta")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Collect git, CI and dependency metadata for test-run reports", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory to inspect (default: current directory)
    #[arg(long, global = true, env = "RUNMETA_CWD")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the nearest ancestor directory containing `.git/config`
    Locate {
        /// Starting path (default: --cwd or current directory)
        path: Option<PathBuf>,
    },

    /// Print repository metadata as JSON (`{}` outside a repository)
    Git {
        #[command(flatten)]
        git: GitArgs,
    },

    /// Print the detected CI platform as JSON (`null` when none)
    Ci,

    /// Print installed versions of the named dependencies as JSON
    Package {
        /// Dependency names
        #[arg(required = true)]
        names: Vec<String>,

        /// Run configuration file (JSON) with `run_settings.npm_dependencies`
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print git, CI and dependency metadata as one JSON record
    Collect {
        #[command(flatten)]
        git: GitArgs,

        /// Dependency to report; repeatable
        #[arg(short, long = "package")]
        packages: Vec<String>,

        /// Run configuration file (JSON) with `run_settings.npm_dependencies`
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct GitArgs {
    /// git executable used for the last-commit fallback
    #[arg(long, default_value = "git", env = "RUNMETA_GIT")]
    git_binary: PathBuf,

    /// Abort the last-commit fallback after this many seconds (default: wait forever)
    #[arg(long)]
    git_timeout_secs: Option<u64>,
}

impl GitArgs {
    fn options(&self, cwd: &Path) -> CollectorOptions {
        CollectorOptions::new(cwd)
            .with_git(&self.git_binary)
            .with_timeout(self.git_timeout_secs.map(Duration::from_secs))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    runmeta_core::init_tracing(cli.json, level);

    let cwd = match cli.cwd {
        Some(dir) => absolutize(dir),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    match cli.command {
        Commands::Locate { path } => cmd_locate(path.as_deref().unwrap_or(&cwd)),
        Commands::Git { git } => cmd_git(git.options(&cwd)).await,
        Commands::Ci => cmd_ci(&EnvSnapshot::from_process()),
        Commands::Package { names, config } => cmd_package(&cwd, &names, config.as_deref()),
        Commands::Collect {
            git,
            packages,
            config,
        } => cmd_collect(git.options(&cwd), &packages, config.as_deref()).await,
    }
}

fn cmd_locate(start: &Path) -> Result<()> {
    print_json(&find_git_config(&absolutize(start.to_path_buf())))
}

async fn cmd_git(options: CollectorOptions) -> Result<()> {
    let meta = GitMetadataCollector::new(options).collect().await;
    print_json(&meta)
}

fn cmd_ci(env: &EnvSnapshot) -> Result<()> {
    print_json(&detect_ci(env))
}

fn cmd_package(cwd: &Path, names: &[String], config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let resolver = PackageVersionResolver::new(cwd, EnvSnapshot::from_process());
    let versions: BTreeMap<&str, Option<String>> = names
        .iter()
        .map(|name| (name.as_str(), resolver.resolve(name, config.as_ref())))
        .collect();
    print_json(&versions)
}

async fn cmd_collect(
    options: CollectorOptions,
    packages: &[String],
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let env = EnvSnapshot::from_process();
    let resolver = PackageVersionResolver::new(&options.cwd, env.clone());
    let collector = GitMetadataCollector::new(options);

    let meta = collect_run_metadata(
        &collector,
        &env,
        PackageRequest {
            resolver: Some(&resolver),
            names: packages,
            config: config.as_ref(),
        },
    )
    .await;
    print_json(&meta)
}

fn load_config(path: Option<&Path>) -> Result<Option<RunConfig>> {
    path.map(|p| {
        RunConfig::load(p).with_context(|| format!("Failed to load run configuration: {:?}", p))
    })
    .transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

fn render_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

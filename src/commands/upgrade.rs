//! # Upgrade Command Implementation
//!
//! This module implements the `upgrade` subcommand, which moves an existing
//! installation to a new profile version while keeping local edits.
//!
//! The installation record tells which profile and version is installed.
//! Catalog installations look the new version up in the catalog index;
//! direct installations move to the matching tag. Conflicting edits are left
//! in the files as conflict markers and listed, and the command still
//! succeeds so they can be resolved by hand.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use pctl::catalog::{CatalogClient, FileCatalog, NoCatalog};
use pctl::output::{emoji, OutputConfig};
use pctl::phases::GitRepositoryRef;
use pctl::repository::{DefaultGitOperations, MergeOutcome};
use pctl::upgrade::UpgradeWorkflow;

/// Upgrade an installation to a new version
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Installation directory holding profile-installation.yaml
    #[arg(value_name = "INSTALL_DIR")]
    pub install_dir: PathBuf,

    /// Version to upgrade to
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Catalog index file
    #[arg(long, value_name = "FILE", env = "PCTL_CATALOG_FILE")]
    pub catalog_file: Option<PathBuf>,

    /// Flux GitRepository the installation is committed to
    #[arg(long, value_name = "NAMESPACE/NAME", env = "PCTL_GIT_REPOSITORY")]
    pub git_repository: Option<GitRepositoryRef>,

    /// Path of the installation inside the flux repository (defaults to INSTALL_DIR)
    #[arg(long, value_name = "DIR")]
    pub root_dir: Option<String>,
}

/// Execute the `upgrade` command.
pub fn execute(args: UpgradeArgs, out: &OutputConfig) -> Result<()> {
    let catalog: Box<dyn CatalogClient> = match &args.catalog_file {
        Some(path) => Box::new(FileCatalog::from_file(path)?),
        None => Box::new(NoCatalog),
    };
    let root_dir = args
        .root_dir
        .clone()
        .unwrap_or_else(|| args.install_dir.to_string_lossy().into_owned());

    println!(
        "{} Upgrading {} to {}",
        emoji(out, "🔄", "[UPGRADE]"),
        args.install_dir.display(),
        args.version
    );

    let git = DefaultGitOperations;
    let report = UpgradeWorkflow::new(&git, catalog.as_ref())
        .with_root_dir(&root_dir)
        .with_git_repository(args.git_repository.clone())
        .upgrade(&args.install_dir, &args.version)?;

    match &report.outcome {
        MergeOutcome::Clean => {
            println!(
                "{} Upgraded to {}",
                emoji(out, "✅", "[OK]"),
                report.version
            );
        }
        MergeOutcome::Conflicts(files) => {
            println!(
                "{} Upgraded to {} with {} conflicting files:",
                emoji(out, "⚠️", "[WARN]"),
                report.version,
                files.len()
            );
            for file in files {
                println!("   {}", out.path(args.install_dir.join(file).display()));
            }
            println!("   Resolve the conflict markers in these files before committing.");
        }
    }
    Ok(())
}

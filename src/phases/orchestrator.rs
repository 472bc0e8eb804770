//! Orchestrator for the complete install operation
//!
//! This module coordinates all phases to provide a clean API for installing
//! a profile.

use std::path::Path;

use log::{info, warn};

use super::build::{BuildConfig, Builder};
use super::resolve::Resolver;
use super::write::Writer;
use super::{flatten, BuiltArtifact};
use crate::error::Result;
use crate::installation::Installation;
use crate::repository::{GitOperations, RepositoryManager};

/// Execute the complete install operation
///
/// This orchestrates the complete install pipeline:
/// 1. Resolve the installation's profile and its nested profiles
/// 2. Flatten the tree into leaf artifacts
/// 3. Build the flux objects of every artifact
/// 4. Write artifacts, copied files and the installation record to `out`
///
/// Nothing is written unless phases 1-3 all succeed. Every clone made during
/// the pass is removed before returning, on success and on failure.
pub fn execute_install(
    installation: &Installation,
    config: &BuildConfig,
    git_ops: &dyn GitOperations,
    out: &Path,
) -> Result<Vec<BuiltArtifact>> {
    let repos = RepositoryManager::new(git_ops);
    let result = run(installation, config, &repos, out);

    let cleanup = repos.finish();
    let built = result?;
    cleanup?;
    Ok(built)
}

fn run(
    installation: &Installation,
    config: &BuildConfig,
    repos: &RepositoryManager<'_>,
    out: &Path,
) -> Result<Vec<BuiltArtifact>> {
    let source = installation.source()?;

    // Phase 1: Resolve
    let tree = Resolver::new(repos).resolve(source)?;
    info!(
        "resolved profile {} from {}",
        tree.definition.name,
        source.repo_key()
    );

    // Phase 2: Flatten
    let artifacts = flatten::flatten(&tree)?;
    if artifacts.is_empty() {
        warn!("profile {} has no artifacts", tree.definition.name);
    }

    // Phase 3: Build
    let built = Builder::new(config.clone()).build(&artifacts)?;

    // Phase 4: Write
    Writer::new(repos).write(installation, &built, out)?;
    info!(
        "wrote {} artifacts for installation {} to {}",
        built.len(),
        installation.name(),
        out.display()
    );

    Ok(built)
}

//! Upgrading an installation to a new profile version.
//!
//! An upgrade is a three-way merge carried out in a scratch git repository:
//!
//! 1. `base`: a fresh install of the currently recorded version.
//! 2. `user-changes`: branched from `base`, holding the installation
//!    directory as the user left it.
//! 3. `update-changes`: branched from `base`, holding a fresh install of the
//!    requested version.
//!
//! `user-changes` is then merged into `update-changes`. Upstream changes
//! land wherever the user did not edit, and user edits survive wherever
//! upstream did not touch the same lines. Overlapping edits leave conflict
//! markers, which are reported but do not fail the upgrade. The merged tree
//! is copied back over the installation directory with the record bumped to
//! the new version.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempDir;

use crate::catalog::CatalogClient;
use crate::defaults::{BASE_BRANCH, INCOMING_BRANCH, USER_BRANCH};
use crate::error::Result;
use crate::installation::Installation;
use crate::phases::build::BuildConfig;
use crate::phases::orchestrator::execute_install;
use crate::phases::write::{copy_tree, replace_tree};
use crate::phases::GitRepositoryRef;
use crate::repository::{GitOperations, MergeOutcome, WorkingCopy};

/// What an upgrade did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub previous_version: Option<String>,
    pub version: String,
    pub outcome: MergeOutcome,
}

impl UpgradeReport {
    pub fn conflicts(&self) -> &[PathBuf] {
        self.outcome.conflicts()
    }
}

/// Upgrades installations through a scratch git repository.
pub struct UpgradeWorkflow<'a> {
    git_ops: &'a dyn GitOperations,
    catalog: &'a dyn CatalogClient,
    root_dir: String,
    git_repository: Option<GitRepositoryRef>,
}

impl<'a> UpgradeWorkflow<'a> {
    pub fn new(git_ops: &'a dyn GitOperations, catalog: &'a dyn CatalogClient) -> Self {
        Self {
            git_ops,
            catalog,
            root_dir: String::new(),
            git_repository: None,
        }
    }

    /// Path of the installation inside the flux repository, used in
    /// generated object paths.
    pub fn with_root_dir(mut self, root_dir: &str) -> Self {
        self.root_dir = root_dir.to_string();
        self
    }

    pub fn with_git_repository(mut self, git_repository: Option<GitRepositoryRef>) -> Self {
        self.git_repository = git_repository;
        self
    }

    /// Upgrades the installation in `install_dir` to `version`.
    pub fn upgrade(&self, install_dir: &Path, version: &str) -> Result<UpgradeReport> {
        let current = Installation::load(install_dir)?;
        let next = current.upgraded_to(version, self.catalog)?;
        let previous_version = current.version().map(str::to_string);
        info!(
            "upgrading {} from {} to {}",
            current.name(),
            previous_version.as_deref().unwrap_or("unversioned source"),
            version
        );

        let old_install = TempDir::new()?;
        self.install(&current, old_install.path())?;
        let new_install = TempDir::new()?;
        self.install(&next, new_install.path())?;

        let scratch = TempDir::new()?;
        let repo = self.git_ops.init(scratch.path())?;
        let outcome = self.merge(
            repo.as_ref(),
            old_install.path(),
            install_dir,
            new_install.path(),
        )?;

        // The record moves to the new version even when the merge conflicted.
        next.save(repo.path())?;
        repo.commit(&format!("upgrade to {}", version))?;

        replace_tree(repo.path(), install_dir)?;

        if let MergeOutcome::Conflicts(files) = &outcome {
            for file in files {
                warn!("merge conflict in {}", file.display());
            }
        }

        Ok(UpgradeReport {
            previous_version,
            version: version.to_string(),
            outcome,
        })
    }

    fn install(&self, installation: &Installation, out: &Path) -> Result<()> {
        let config =
            BuildConfig::for_installation(installation, &self.root_dir, self.git_repository.clone());
        execute_install(installation, &config, self.git_ops, out)?;
        Ok(())
    }

    fn merge(
        &self,
        repo: &dyn WorkingCopy,
        base: &Path,
        user: &Path,
        incoming: &Path,
    ) -> Result<MergeOutcome> {
        repo.create_branch(BASE_BRANCH)?;
        copy_tree(base, repo.path())?;
        repo.commit("base")?;
        debug!("committed base installation on {}", BASE_BRANCH);

        repo.create_branch(USER_BRANCH)?;
        repo.remove_all_tracked()?;
        copy_tree(user, repo.path())?;
        repo.commit("user changes")?;

        repo.checkout(BASE_BRANCH)?;
        repo.create_branch(INCOMING_BRANCH)?;
        repo.remove_all_tracked()?;
        copy_tree(incoming, repo.path())?;
        repo.commit("update changes")?;

        debug!("merging {} into {}", USER_BRANCH, INCOMING_BRANCH);
        repo.merge(USER_BRANCH)
    }
}

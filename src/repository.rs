//! # Repository Capabilities
//!
//! This module provides the seams between the pipeline and git:
//!
//! - **`GitOperations`**: fetching a repository at a revision, and creating
//!   fresh working copies. The resolver and writer only ever clone; the
//!   upgrade workflow also initializes a scratch repository.
//!
//! - **`WorkingCopy`**: the operations available on one working directory
//!   bound at construction (checkout, branch, add, remove-all, commit,
//!   merge, query-changes).
//!
//! - **`RepositoryManager`**: clones repositories on demand and memoizes the
//!   result in a [`CloneCache`] for the remainder of one pass.
//!
//! In the main application `DefaultGitOperations` wraps the `git` executable.
//! Tests swap in mock implementations that copy fixture directories, so no
//! real git operation is needed to exercise resolution.

use std::path::{Path, PathBuf};

use log::debug;

use crate::cache::CloneCache;
use crate::error::Result;
use crate::git::GitWorkingCopy;

/// Result of merging one branch into the checked-out branch.
///
/// Conflicts are a successful outcome: the working tree holds the conflict
/// markers and the caller decides how to report them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum MergeOutcome {
    Clean,
    Conflicts(Vec<PathBuf>),
}

impl MergeOutcome {
    /// Conflicting paths, relative to the working copy root.
    pub fn conflicts(&self) -> &[PathBuf] {
        match self {
            MergeOutcome::Clean => &[],
            MergeOutcome::Conflicts(files) => files,
        }
    }
}

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Clones a repository at a branch or tag into `target_dir`.
    ///
    /// This is expected to be a shallow clone to optimize for speed and disk
    /// space.
    fn clone_shallow(&self, url: &str, ref_name: &str, target_dir: &Path) -> Result<()>;

    /// Initializes an empty repository in `dir` ready for commits.
    fn init(&self, dir: &Path) -> Result<Box<dyn WorkingCopy>>;
}

/// Operations on a single working directory.
pub trait WorkingCopy {
    /// Root of the working tree.
    fn path(&self) -> &Path;

    fn current_branch(&self) -> Result<String>;

    fn checkout(&self, branch: &str) -> Result<()>;

    /// Creates and checks out `name`. No-op when `name` is already checked out.
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Stages every file in the working tree.
    fn add_all(&self) -> Result<()>;

    /// Removes every tracked file from the index and the working tree.
    fn remove_all_tracked(&self) -> Result<()>;

    /// Whether the working tree differs from HEAD.
    fn has_changes(&self) -> Result<bool>;

    /// Stages and commits everything. No-op when there is nothing to commit.
    fn commit(&self, message: &str) -> Result<()>;

    /// Merges `branch` into the checked-out branch.
    fn merge(&self, branch: &str) -> Result<MergeOutcome>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_shallow(&self, url: &str, ref_name: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone_shallow(url, ref_name, target_dir)
    }

    fn init(&self, dir: &Path) -> Result<Box<dyn WorkingCopy>> {
        Ok(Box::new(GitWorkingCopy::init(dir)?))
    }
}

/// Fetches repositories, cloning each distinct `(url, reference)` at most
/// once per pass.
pub struct RepositoryManager<'a> {
    git_ops: &'a dyn GitOperations,
    cache: CloneCache,
}

impl<'a> RepositoryManager<'a> {
    pub fn new(git_ops: &'a dyn GitOperations) -> Self {
        Self {
            git_ops,
            cache: CloneCache::new(),
        }
    }

    /// Returns a local checkout of `url` at `reference`, cloning into a fresh
    /// temporary directory on the first request.
    pub fn fetch_repository(&self, url: &str, reference: &str) -> Result<PathBuf> {
        if let Some(dir) = self.cache.get(url, reference)? {
            debug!("clone cache hit for {}:{}", url, reference);
            return Ok(dir);
        }

        let scratch = tempfile::Builder::new().prefix("pctl-clone-").tempdir()?;
        let target = scratch.path().join("repo");
        self.git_ops.clone_shallow(url, reference, &target)?;
        self.cache.put(url, reference, scratch)?;
        Ok(target)
    }

    /// Number of distinct clones made so far in this pass.
    pub fn clone_count(&self) -> Result<usize> {
        self.cache.len()
    }

    /// Removes every clone made during this pass.
    pub fn finish(self) -> Result<()> {
        self.cache.evict_all()
    }
}

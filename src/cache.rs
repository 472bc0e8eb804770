//! In-process cache of repository clones for one resolution pass

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, warn};
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::profile::repo_key;

/// Maps `url:reference` to the temporary directory holding its clone.
///
/// Entries live until [`CloneCache::evict_all`] runs or the cache is
/// dropped, whichever comes first, so clones are removed even when the
/// pass that created them fails partway.
#[derive(Debug, Default)]
pub struct CloneCache {
    entries: Mutex<HashMap<String, TempDir>>,
}

impl CloneCache {
    /// Create a new empty clone cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the clone of `url` at `reference`, if one was registered.
    pub fn get(&self, url: &str, reference: &str) -> Result<Option<PathBuf>> {
        let entries = self.lock()?;
        Ok(entries
            .get(&repo_key(url, reference))
            .map(|dir| dir.path().join("repo")))
    }

    /// Registers the scratch directory holding a clone of `url` at `reference`.
    ///
    /// The clone itself lives in the `repo` sub-directory of `dir`.
    pub fn put(&self, url: &str, reference: &str, dir: TempDir) -> Result<()> {
        let key = repo_key(url, reference);
        debug!("caching clone {} at {}", key, dir.path().display());
        let previous = self.lock()?.insert(key, dir);
        if let Some(previous) = previous {
            previous.close()?;
        }
        Ok(())
    }

    /// Removes every cached clone from the filesystem.
    pub fn evict_all(&self) -> Result<()> {
        let drained: Vec<(String, TempDir)> = self.lock()?.drain().collect();
        for (key, dir) in drained {
            debug!("evicting clone {}", key);
            dir.close()?;
        }
        Ok(())
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, TempDir>>> {
        self.entries.lock().map_err(|_| Error::Cache {
            message: "Cache lock poisoned".to_string(),
        })
    }
}

impl Drop for CloneCache {
    fn drop(&mut self) {
        if let Err(e) = self.evict_all() {
            warn!("failed to remove cached clones: {}", e);
        }
    }
}

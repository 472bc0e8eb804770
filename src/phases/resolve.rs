//! Phase 1: Resolve
//!
//! This is the first phase of the pctl install pipeline. It fetches the
//! requested profile definition and, for every nested-profile artifact,
//! recursively fetches the definition that artifact points at, producing a
//! [`ProfileNode`] tree.
//!
//! ## Process
//!
//! 1.  **Fetch**: each `(url, reference)` is cloned at most once per pass
//!     through the `RepositoryManager`'s clone cache.
//!
//! 2.  **Decode**: `profile.yaml` is read from the definition directory of
//!     the clone. A missing file is a not-found error, an undecodable one a
//!     parse error.
//!
//! 3.  **Cycle Detection**: the keys of the repositories on the path from
//!     the root to the current node are carried down the recursion. Meeting
//!     a key already on that path is a recursive-artifact error. The path is
//!     rebuilt per branch of the tree, so unrelated siblings may reference
//!     the same nested profile.

use std::collections::BTreeMap;
use std::fs::File;

use log::debug;

use super::ProfileNode;
use crate::defaults::DEFINITION_FILE;
use crate::error::{Error, Result};
use crate::profile::{self, ArtifactKind, ProfileDefinition, ProfileSource};
use crate::repository::RepositoryManager;

/// Resolves profile definitions through a repository manager.
pub struct Resolver<'m, 'g> {
    repos: &'m RepositoryManager<'g>,
}

impl<'m, 'g> Resolver<'m, 'g> {
    pub fn new(repos: &'m RepositoryManager<'g>) -> Self {
        Self { repos }
    }

    /// Resolves the definition at `source` and every nested profile under it.
    pub fn resolve(&self, source: &ProfileSource) -> Result<ProfileNode> {
        self.resolve_on_path(source, &[])
    }

    fn resolve_on_path(&self, source: &ProfileSource, active: &[String]) -> Result<ProfileNode> {
        let key = source.repo_key();
        if active.contains(&key) {
            return Err(Error::RecursiveArtifact {
                url: source.url.clone(),
                reference: source.reference().to_string(),
            });
        }

        let definition = self.fetch_definition(source)?;

        let path: Vec<String> = active.iter().cloned().chain([key]).collect();
        let mut nested = BTreeMap::new();
        for artifact in &definition.artifacts {
            if let ArtifactKind::Profile(profile) = &artifact.kind {
                debug!(
                    "resolving nested profile {} of {} from {}",
                    artifact.name,
                    definition.name,
                    profile.source.repo_key()
                );
                let child = self.resolve_on_path(&profile.source, &path)?;
                nested.insert(artifact.name.clone(), child);
            }
        }

        Ok(ProfileNode {
            source: source.clone(),
            definition,
            nested,
        })
    }

    /// Fetches and decodes the single definition at `source`.
    pub fn fetch_definition(&self, source: &ProfileSource) -> Result<ProfileDefinition> {
        let reference = source.reference();
        let checkout = self.repos.fetch_repository(&source.url, reference)?;
        let relative = super::join_path(&[&source.definition_dir(), DEFINITION_FILE]);
        let file_path = checkout.join(&relative);

        if !file_path.is_file() {
            return Err(Error::ProfileNotFound {
                url: source.url.clone(),
                reference: reference.to_string(),
                path: relative,
            });
        }

        let parse_error = |message: String| Error::ProfileParse {
            url: source.url.clone(),
            reference: reference.to_string(),
            path: relative.clone(),
            message,
        };

        let file = File::open(&file_path).map_err(|e| parse_error(e.to_string()))?;
        profile::from_reader(file).map_err(|e| match e {
            Error::Yaml(e) => parse_error(e.to_string()),
            Error::Io(e) => parse_error(e.to_string()),
            other => other,
        })
    }
}

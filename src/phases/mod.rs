//! Implementation of the phases of the pctl install pipeline.
//!
//! ## Overview
//!
//! An install follows 4 phases:
//! 1. Resolve - Fetch the profile definition and, recursively, every nested profile
//! 2. Flatten - Walk the definition tree into an ordered list of leaf artifacts
//! 3. Build - Translate each leaf artifact into typed flux objects
//! 4. Write - Materialize the objects, copied files and the installation record
//!
//! Note: Clones are memoized by the `RepositoryManager` for the whole pass,
//! so the write phase reuses the clones made while resolving.
//!
//! Each phase depends only on the previous phases and the foundation modules.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::profile::{Chart, DependsOn, Kustomize, ProfileDefinition, ProfileSource};
use crate::resources::{DependencyReference, Resource};

// Phase modules
pub mod build;
pub mod flatten;
pub mod orchestrator;
pub mod resolve;
pub mod write;

/// A resolved definition together with its resolved nested profiles.
#[derive(Debug, Clone)]
pub struct ProfileNode {
    /// Where this definition was loaded from.
    pub source: ProfileSource,
    pub definition: ProfileDefinition,
    /// Nested profiles, keyed by the name of the artifact that references them.
    pub nested: BTreeMap<String, ProfileNode>,
}

/// A leaf artifact kind. Nested profiles never survive flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafKind {
    Chart(Chart),
    Kustomize(Kustomize),
}

/// A leaf artifact annotated with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifact {
    /// Artifact name within its owning definition.
    pub artifact_name: String,
    pub kind: LeafKind,
    pub depends_on: Vec<DependsOn>,
    /// Name of the definition that declares this artifact.
    pub profile_name: String,
    /// Names of the nesting artifacts joined with `/`, empty at the top level.
    pub nested_prefix: String,
    /// Repository the owning definition was loaded from.
    pub source: ProfileSource,
    /// `url:reference` of `source`.
    pub repo_key: String,
    /// Chart and kustomize artifact names declared by the owning definition.
    pub sibling_names: Vec<String>,
}

impl ResolvedArtifact {
    /// Output name: `nested_prefix/artifact_name`.
    pub fn name(&self) -> String {
        join_path(&[&self.nested_prefix, &self.artifact_name])
    }
}

/// A flux GitRepository object, addressed as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepositoryRef {
    pub namespace: String,
    pub name: String,
}

impl FromStr for GitRepositoryRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => Ok(Self {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            _ => Err(Error::Installation {
                message: format!(
                    "git repository reference must be in the form <namespace>/<name>, got {:?}",
                    s
                ),
            }),
        }
    }
}

impl fmt::Display for GitRepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One generated object and the sub-directory of the artifact it goes in.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltObject {
    pub resource: Resource,
    pub sub_path: Option<String>,
}

/// Files to copy out of a profile repository into the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCopy {
    pub repo_url: String,
    pub reference: String,
    /// Directory of the repository the paths are relative to.
    pub sparse_root: String,
    pub paths: Vec<String>,
}

/// The output of building one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltArtifact {
    /// Output name, `nested_prefix/artifact_name`.
    pub name: String,
    pub objects: Vec<BuiltObject>,
    /// Ordering edges carried by the wrapper Kustomization.
    pub depends_on: Vec<DependencyReference>,
    pub copy: Option<RepoCopy>,
}

impl BuiltArtifact {
    /// The outer flux Kustomization of this artifact.
    pub fn wrapper(&self) -> Option<&crate::resources::Kustomization> {
        self.objects
            .iter()
            .filter(|o| o.sub_path.is_none())
            .find_map(|o| match &o.resource {
                Resource::Kustomization(k) => Some(k),
                _ => None,
            })
    }
}

/// Joins slash-separated path segments, skipping empty ones.
pub fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Last `/`-separated segment of a name.
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

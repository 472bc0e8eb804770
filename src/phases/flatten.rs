//! Phase 2: Flatten
//!
//! Walks a resolved [`ProfileNode`] tree depth-first and produces the ordered
//! list of leaf artifacts to build.
//!
//! ## Process
//!
//! 1.  **Order**: artifacts are emitted in the order their definition lists
//!     them. A nested-profile artifact is replaced, in place, by the leaf
//!     artifacts of the profile it references.
//!
//! 2.  **Naming**: every leaf carries the chain of nesting artifact names
//!     that led to it, so `outer/inner/leaf` stays unique across the tree.
//!
//! 3.  **Dependencies**: every `dependsOn` entry must name a chart or
//!     kustomize sibling in the same definition. Anything else fails the
//!     pass, including a nested-profile sibling, which has no wrapper of its
//!     own.

use log::trace;

use super::{join_path, LeafKind, ProfileNode, ResolvedArtifact};
use crate::error::{Error, Result};
use crate::profile::{ArtifactKind, ProfileDefinition};

/// Flattens a resolved tree into its leaf artifacts.
pub fn flatten(node: &ProfileNode) -> Result<Vec<ResolvedArtifact>> {
    let mut out = Vec::new();
    flatten_under(node, "", &mut out)?;
    Ok(out)
}

fn flatten_under(node: &ProfileNode, prefix: &str, out: &mut Vec<ResolvedArtifact>) -> Result<()> {
    let definition = &node.definition;
    check_dependencies(definition)?;

    let sibling_names: Vec<String> = definition
        .artifacts
        .iter()
        .filter(|a| !matches!(a.kind, ArtifactKind::Profile(_)))
        .map(|a| a.name.clone())
        .collect();
    let repo_key = node.source.repo_key();

    for artifact in &definition.artifacts {
        let kind = match &artifact.kind {
            ArtifactKind::Profile(_) => {
                let child = node.nested.get(&artifact.name).ok_or_else(|| Error::ProfileNotFound {
                    url: node.source.url.clone(),
                    reference: node.source.reference().to_string(),
                    path: artifact.name.clone(),
                })?;
                flatten_under(child, &join_path(&[prefix, &artifact.name]), out)?;
                continue;
            }
            ArtifactKind::Chart(chart) => LeafKind::Chart(chart.clone()),
            ArtifactKind::Kustomize(kustomize) => LeafKind::Kustomize(kustomize.clone()),
        };

        trace!("flattened {} from {}", join_path(&[prefix, &artifact.name]), repo_key);
        out.push(ResolvedArtifact {
            artifact_name: artifact.name.clone(),
            kind,
            depends_on: artifact.depends_on.clone(),
            profile_name: definition.name.clone(),
            nested_prefix: prefix.to_string(),
            source: node.source.clone(),
            repo_key: repo_key.clone(),
            sibling_names: sibling_names.clone(),
        });
    }
    Ok(())
}

fn check_dependencies(definition: &ProfileDefinition) -> Result<()> {
    for artifact in &definition.artifacts {
        for dep in &artifact.depends_on {
            match definition.artifact(&dep.name).map(|target| &target.kind) {
                None => {
                    return Err(Error::DependencyNotFound {
                        artifact: artifact.name.clone(),
                        dependency: dep.name.clone(),
                    })
                }
                Some(ArtifactKind::Profile(_)) => {
                    return Err(Error::DependencyOnProfile {
                        artifact: artifact.name.clone(),
                        dependency: dep.name.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

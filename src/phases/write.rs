//! Phase 4: Write
//!
//! This is the final phase of the pctl install pipeline. It materializes the
//! built artifacts and the installation record under the output directory.
//!
//! ## Layout
//!
//! ```text
//! <out>/profile-installation.yaml
//! <out>/artifacts/<name>/kustomization.yaml
//! <out>/artifacts/<name>/Kustomization.yaml
//! <out>/artifacts/<name>/<sub_path>/<Kind>.yaml
//! <out>/artifacts/<name>/<copied path>/...
//! ```
//!
//! The top-level `kustomization.yaml` of each artifact lists only the wrapper
//! Kustomization, so flux applies the inner objects through it.
//!
//! Copied files come from the clones already made while resolving; the
//! `RepositoryManager` only clones again when a repository was never seen.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::Path;

use log::debug;
use walkdir::WalkDir;

use super::{BuiltArtifact, RepoCopy};
use crate::defaults::{ARTIFACTS_DIR, KUSTOMIZATION_FILE};
use crate::error::{Error, Result};
use crate::installation::Installation;
use crate::repository::RepositoryManager;
use crate::resources::{KustomizeConfig, Resource};

/// Writes built artifacts to disk.
pub struct Writer<'m, 'g> {
    repos: &'m RepositoryManager<'g>,
}

impl<'m, 'g> Writer<'m, 'g> {
    pub fn new(repos: &'m RepositoryManager<'g>) -> Self {
        Self { repos }
    }

    /// Writes every artifact and then the installation record into `out`.
    pub fn write(
        &self,
        installation: &Installation,
        artifacts: &[BuiltArtifact],
        out: &Path,
    ) -> Result<()> {
        for artifact in artifacts {
            self.write_artifact(artifact, out)?;
        }
        installation.save(out)
    }

    fn write_artifact(&self, artifact: &BuiltArtifact, out: &Path) -> Result<()> {
        let dir = out.join(ARTIFACTS_DIR).join(&artifact.name);
        debug!("writing artifact {} to {}", artifact.name, dir.display());

        let mut wrappers = Vec::new();
        for object in &artifact.objects {
            let target_dir = match &object.sub_path {
                Some(sub_path) => dir.join(sub_path),
                None => {
                    wrappers.push(object.resource.file_name());
                    dir.clone()
                }
            };
            write_resource(&object.resource, &target_dir)?;
        }

        let config = KustomizeConfig::new(wrappers);
        write_file(&dir.join(KUSTOMIZATION_FILE), &serde_yaml::to_string(&config)?)?;

        if let Some(copy) = &artifact.copy {
            self.copy_from_repository(copy, &dir)?;
        }
        Ok(())
    }

    fn copy_from_repository(&self, copy: &RepoCopy, dir: &Path) -> Result<()> {
        let checkout = self.repos.fetch_repository(&copy.repo_url, &copy.reference)?;
        let sparse = checkout.join(&copy.sparse_root);
        // Profiles kept at the repository root have no sub-directory to narrow to.
        let root = if sparse.is_dir() { sparse } else { checkout };

        for path in &copy.paths {
            let source = root.join(path);
            if !source.exists() {
                return Err(Error::Filesystem {
                    message: format!(
                        "path {} not found in {} at {}",
                        path, copy.repo_url, copy.reference
                    ),
                });
            }
            copy_path(&source, &dir.join(path))?;
        }
        Ok(())
    }
}

fn write_resource(resource: &Resource, dir: &Path) -> Result<()> {
    write_file(&dir.join(resource.file_name()), &resource.to_yaml()?)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }
    fs::write(path, content).map_err(|e| Error::Filesystem {
        message: format!("Failed to write file '{}': {}", path.display(), e),
    })
}

/// Copies a file, or a directory recursively, to `target`.
pub fn copy_path(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        copy_tree(source, target)
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, target).map_err(|e| Error::Filesystem {
            message: format!(
                "Failed to copy '{}' to '{}': {}",
                source.display(),
                target.display(),
                e
            ),
        })?;
        Ok(())
    }
}

/// Copies the contents of `source` into `target`, skipping `.git`.
pub fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    let walker = WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to walk '{}': {}", source.display(), e),
        })?;
        let relative = entry.path().strip_prefix(source).map_err(|e| Error::Filesystem {
            message: e.to_string(),
        })?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            copy_path(entry.path(), &destination)?;
        }
    }
    Ok(())
}

/// Makes `target` hold exactly the contents of `source`, keeping its `.git`.
///
/// `source` is first copied into a staging directory inside `target`, so a
/// failed copy leaves `target` untouched. The old entries are then moved
/// aside and the staged ones moved in. When a move fails, the old entries are
/// moved back; when that also fails, they are kept on disk and the error
/// names where.
pub fn replace_tree(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(target)?;
    copy_tree(source, staging.path())?;

    let backup = tempfile::Builder::new()
        .prefix(BACKUP_PREFIX)
        .tempdir_in(target)?;
    let skip = |name: &OsStr| {
        name == ".git"
            || Some(name) == staging.path().file_name()
            || Some(name) == backup.path().file_name()
    };

    let mut old = Vec::new();
    let swapped = move_entries(target, backup.path(), &skip, &mut old).and_then(|()| {
        let mut new = Vec::new();
        move_entries(staging.path(), target, &|_: &OsStr| false, &mut new).inspect_err(|_| {
            for name in &new {
                let _ = remove_path(&target.join(name));
            }
        })
    });

    if let Err(e) = swapped {
        let mut restored = Vec::new();
        if move_entries(backup.path(), target, &|_: &OsStr| false, &mut restored).is_err() {
            let kept = backup.keep();
            return Err(Error::Filesystem {
                message: format!(
                    "Failed to replace '{}': {}; previous contents kept in '{}'",
                    target.display(),
                    e,
                    kept.display()
                ),
            });
        }
        return Err(e);
    }
    debug!("replaced {} ({} entries)", target.display(), old.len());
    Ok(())
}

const STAGING_PREFIX: &str = ".pctl-staging-";
const BACKUP_PREFIX: &str = ".pctl-backup-";

/// Renames every entry of `from` not matched by `skip` into `to`, recording
/// each name once it has moved.
fn move_entries(
    from: &Path,
    to: &Path,
    skip: &dyn Fn(&OsStr) -> bool,
    moved: &mut Vec<OsString>,
) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let name = entry?.file_name();
        if skip(&name) {
            continue;
        }
        fs::rename(from.join(&name), to.join(&name)).map_err(|e| Error::Filesystem {
            message: format!(
                "Failed to move '{}' to '{}': {}",
                from.join(&name).display(),
                to.display(),
                e
            ),
        })?;
        moved.push(name);
    }
    Ok(())
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

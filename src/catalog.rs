//! Catalog lookups.
//!
//! A catalog maps `(catalog, profile, version)` coordinates to the git
//! location of a profile. The HTTP catalog service is an external
//! collaborator reached through [`CatalogClient`]; [`FileCatalog`] serves
//! the same lookups from a local YAML index:
//!
//! ```yaml
//! profiles:
//!   - catalog: nginx-catalog
//!     name: nginx
//!     version: v0.1.0
//!     url: https://github.com/weaveworks/nginx-profile
//!     tag: nginx/v0.1.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::ProfileSource;

/// Looks profiles up by catalog coordinate.
pub trait CatalogClient {
    /// Returns the source of `profile` in `catalog` at `version`, or at the
    /// latest version when `version` is `None`.
    fn show_profile(&self, catalog: &str, profile: &str, version: Option<&str>)
        -> Result<ProfileSource>;
}

/// One published profile version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub catalog: String,
    pub name: String,
    pub version: String,
    pub url: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A catalog index loaded from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCatalog {
    #[serde(default)]
    profiles: Vec<CatalogEntry>,
}

impl FileCatalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Catalog {
            message: format!("failed to read catalog index {}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| Error::Catalog {
            message: format!("failed to parse catalog index {}: {}", path.display(), e),
        })
    }

    /// Adds a published version.
    pub fn with_profile(
        mut self,
        catalog: &str,
        name: &str,
        version: &str,
        url: &str,
        tag: &str,
    ) -> Self {
        self.profiles.push(CatalogEntry {
            catalog: catalog.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            url: url.to_string(),
            tag: tag.to_string(),
            path: None,
        });
        self
    }
}

impl CatalogClient for FileCatalog {
    fn show_profile(
        &self,
        catalog: &str,
        profile: &str,
        version: Option<&str>,
    ) -> Result<ProfileSource> {
        // Later entries are newer.
        let entry = self
            .profiles
            .iter()
            .rev()
            .filter(|e| e.catalog == catalog && e.name == profile)
            .find(|e| version.is_none_or(|v| e.version == v))
            .ok_or_else(|| Error::Catalog {
                message: format!(
                    "profile {}/{} not found at version {}",
                    catalog,
                    profile,
                    version.unwrap_or("latest")
                ),
            })?;
        Ok(ProfileSource::tag(&entry.url, &entry.tag, entry.path.as_deref()))
    }
}

/// A catalog client for installations that never consult a catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

impl CatalogClient for NoCatalog {
    fn show_profile(&self, catalog: &str, profile: &str, _version: Option<&str>) -> Result<ProfileSource> {
        Err(Error::Catalog {
            message: format!(
                "no catalog index configured to look up {}/{} (pass --catalog-file)",
                catalog, profile
            ),
        })
    }
}

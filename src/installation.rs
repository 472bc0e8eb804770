//! The installation record.
//!
//! One `profile-installation.yaml` sits at the root of every materialized
//! installation. `install` writes it, `upgrade` reads it back, bumps the
//! version and writes it again.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogClient;
use crate::defaults::INSTALLATION_FILE;
use crate::error::{Error, Result};
use crate::profile::ProfileSource;

pub const API_VERSION: &str = "weave.works/v1alpha1";
pub const KIND: &str = "ProfileInstallation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub api_version: String,
    pub kind: String,
    pub metadata: InstallationMetadata,
    pub spec: InstallationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationMetadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// Where the profile is fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProfileSource>,
    /// Catalog coordinate the source was looked up from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogRef>,
    /// ConfigMap holding installation-supplied values, keyed by artifact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
}

/// A profile addressed through a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRef {
    pub catalog: String,
    pub profile: String,
    pub version: String,
}

impl Installation {
    /// An installation fetched straight from a repository.
    pub fn from_source(name: &str, namespace: &str, source: ProfileSource) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: InstallationMetadata {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            spec: InstallationSpec {
                source: Some(source),
                ..Default::default()
            },
        }
    }

    /// An installation addressed through a catalog; the source is looked up now.
    pub fn from_catalog(
        name: &str,
        namespace: &str,
        catalog_ref: CatalogRef,
        catalog: &dyn CatalogClient,
    ) -> Result<Self> {
        let source = catalog.show_profile(
            &catalog_ref.catalog,
            &catalog_ref.profile,
            Some(&catalog_ref.version),
        )?;
        let mut installation = Self::from_source(name, namespace, source);
        installation.spec.catalog = Some(catalog_ref);
        Ok(installation)
    }

    pub fn with_config_map(mut self, config_map: Option<String>) -> Self {
        self.spec.config_map = config_map.filter(|c| !c.is_empty());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// The profile source this installation resolves from.
    pub fn source(&self) -> Result<&ProfileSource> {
        self.spec.source.as_ref().ok_or_else(|| Error::Installation {
            message: format!("installation {} has no profile source", self.metadata.name),
        })
    }

    /// The installed version: the catalog version, else the source tag.
    pub fn version(&self) -> Option<&str> {
        match &self.spec.catalog {
            Some(catalog) => Some(catalog.version.as_str()),
            None => self.spec.source.as_ref().and_then(|s| s.tag.as_deref()),
        }
    }

    /// Returns a copy of this record pointing at `version`.
    ///
    /// Catalog installations look the new version up in the catalog. Direct
    /// installations move to the tag `<prefix>/<version>`, keeping the
    /// prefix of the current tag when there is one.
    pub fn upgraded_to(&self, version: &str, catalog: &dyn CatalogClient) -> Result<Self> {
        let mut next = self.clone();
        match &self.spec.catalog {
            Some(catalog_ref) => {
                let source =
                    catalog.show_profile(&catalog_ref.catalog, &catalog_ref.profile, Some(version))?;
                next.spec.source = Some(source);
                next.spec.catalog = Some(CatalogRef {
                    version: version.to_string(),
                    ..catalog_ref.clone()
                });
            }
            None => {
                let mut source = self.source()?.clone();
                source.tag = Some(next_tag(source.tag.as_deref(), version));
                next.spec.source = Some(source);
            }
        }
        Ok(next)
    }

    /// Reads the record from the root of an installation directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INSTALLATION_FILE);
        let content = fs::read_to_string(&path).map_err(|e| Error::Installation {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| Error::Installation {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Writes the record to the root of an installation directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(INSTALLATION_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

fn next_tag(current: Option<&str>, version: &str) -> String {
    if version.contains('/') {
        return version.to_string();
    }
    match current.and_then(|tag| tag.rsplit_once('/')) {
        Some((prefix, _)) => format!("{}/{}", prefix, version),
        None => version.to_string(),
    }
}

//! # Install Command Implementation
//!
//! This module implements the `install` subcommand, which materializes a
//! profile as flux manifests in an installation directory.
//!
//! ## Functionality
//!
//! - **Direct sources**: `--url` with `--branch` or `--tag` (and an optional
//!   `--path` inside the repository) installs straight from git.
//! - **Catalog sources**: `--catalog <CATALOG/PROFILE> --version <VERSION>`
//!   looks the git location up in the catalog index given by
//!   `--catalog-file`.
//! - **Output**: `<out>/profile-installation.yaml` plus one directory per
//!   artifact under `<out>/artifacts/`.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use pctl::catalog::FileCatalog;
use pctl::defaults::{default_output_dir, DEFAULT_BRANCH, DEFAULT_NAMESPACE};
use pctl::installation::{CatalogRef, Installation};
use pctl::output::{emoji, OutputConfig};
use pctl::phases::build::BuildConfig;
use pctl::phases::orchestrator;
use pctl::phases::GitRepositoryRef;
use pctl::profile::ProfileSource;
use pctl::repository::DefaultGitOperations;

/// Install a profile
#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("profile_source")
        .required(true)
        .args(["url", "catalog"]),
))]
pub struct InstallArgs {
    /// Name of the installation
    #[arg(long, value_name = "NAME", default_value = "pctl-profile")]
    pub name: String,

    /// Namespace the generated objects are created in
    #[arg(long, value_name = "NAMESPACE", env = "PCTL_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Directory to write the installation to
    #[arg(long, value_name = "DIR", default_value_os_t = default_output_dir())]
    pub out: PathBuf,

    /// Git URL of the profile repository
    #[arg(long, value_name = "URL", conflicts_with = "catalog")]
    pub url: Option<String>,

    /// Branch of the profile repository
    #[arg(long, value_name = "BRANCH", default_value = DEFAULT_BRANCH)]
    pub branch: String,

    /// Tag of the profile repository; takes precedence over --branch
    #[arg(long, value_name = "TAG", requires = "url")]
    pub tag: Option<String>,

    /// Directory of the profile definition inside the repository
    #[arg(long, value_name = "PATH", requires = "url")]
    pub path: Option<String>,

    /// Catalog coordinate of the profile
    #[arg(long, value_name = "CATALOG/PROFILE", requires_all = ["version", "catalog_file"])]
    pub catalog: Option<String>,

    /// Profile version to install from the catalog
    #[arg(long, value_name = "VERSION", requires = "catalog")]
    pub version: Option<String>,

    /// Catalog index file
    #[arg(long, value_name = "FILE", env = "PCTL_CATALOG_FILE")]
    pub catalog_file: Option<PathBuf>,

    /// ConfigMap holding values for the installation's charts
    #[arg(long, value_name = "NAME")]
    pub config_map: Option<String>,

    /// Flux GitRepository the installation is committed to
    #[arg(long, value_name = "NAMESPACE/NAME", env = "PCTL_GIT_REPOSITORY")]
    pub git_repository: Option<GitRepositoryRef>,

    /// Path of the installation inside the flux repository (defaults to --out)
    #[arg(long, value_name = "DIR")]
    pub root_dir: Option<String>,
}

impl InstallArgs {
    fn installation(&self) -> Result<Installation> {
        let installation = match (&self.url, &self.catalog) {
            (Some(url), _) => {
                let source = match &self.tag {
                    Some(tag) => ProfileSource::tag(url, tag, self.path.as_deref()),
                    None => ProfileSource::branch(url, &self.branch, self.path.as_deref()),
                };
                Installation::from_source(&self.name, &self.namespace, source)
            }
            (None, Some(coordinate)) => {
                let (catalog, profile) = coordinate
                    .split_once('/')
                    .filter(|(c, p)| !c.is_empty() && !p.is_empty())
                    .with_context(|| {
                        format!("catalog coordinate must be CATALOG/PROFILE, got {:?}", coordinate)
                    })?;
                let version = self
                    .version
                    .clone()
                    .context("--version is required with --catalog")?;
                let index_path = self
                    .catalog_file
                    .as_ref()
                    .context("--catalog-file is required with --catalog")?;
                let index = FileCatalog::from_file(index_path)?;
                Installation::from_catalog(
                    &self.name,
                    &self.namespace,
                    CatalogRef {
                        catalog: catalog.to_string(),
                        profile: profile.to_string(),
                        version,
                    },
                    &index,
                )?
            }
            (None, None) => anyhow::bail!("either --url or --catalog must be provided"),
        };
        Ok(installation.with_config_map(self.config_map.clone()))
    }

    fn root_dir(&self) -> String {
        self.root_dir
            .clone()
            .unwrap_or_else(|| self.out.to_string_lossy().into_owned())
    }
}

/// Execute the `install` command.
pub fn execute(args: InstallArgs, out: &OutputConfig) -> Result<()> {
    let installation = args.installation()?;
    let source = installation.source()?;
    println!(
        "{} Installing {} from {} at {}",
        emoji(out, "📦", "[INSTALL]"),
        installation.name(),
        source.url,
        source.reference()
    );

    let config = BuildConfig::for_installation(
        &installation,
        &args.root_dir(),
        args.git_repository.clone(),
    );
    let git = DefaultGitOperations;

    match orchestrator::execute_install(&installation, &config, &git, &args.out) {
        Ok(built) => {
            println!(
                "{} Installed {} artifacts to {}",
                emoji(out, "✅", "[OK]"),
                built.len(),
                args.out.display()
            );
            for artifact in &built {
                println!("   {}", artifact.name);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Install failed", emoji(out, "❌", "[ERR]"));
            Err(e.into())
        }
    }
}

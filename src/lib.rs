//! # pctl Library
//!
//! This library provides the core functionality for installing git-hosted
//! deployment profiles as flux manifests and for upgrading installations
//! while keeping local edits. It is designed to be used by the `pctl`
//! command-line tool but can also be integrated into other applications.
//!
//! ## Quick Example
//!
//! ```
//! use pctl::profile::{self, ArtifactKind};
//!
//! let definition = profile::parse(r#"
//! metadata:
//!   name: nginx
//! spec:
//!   artifacts:
//!     - name: server
//!       chart:
//!         url: https://charts.example.com
//! "#).unwrap();
//!
//! assert_eq!(definition.name, "nginx");
//! assert!(matches!(definition.artifacts[0].kind, ArtifactKind::Chart(_)));
//! ```
//!
//! ## Core Concepts
//!
//! - **Profiles (`profile`)**: The `profile.yaml` definition format, its
//!   validation, and where a definition lives (`ProfileSource`).
//! - **Installations (`installation`)**: The `profile-installation.yaml`
//!   record written at the root of every installation.
//! - **Resources (`resources`)**: Typed flux and Kubernetes objects.
//! - **Phases (`phases`)**: The install pipeline, from resolving nested
//!   profiles to writing the installation directory.
//! - **Repository Management (`repository`, `git`, `cache`)**: Cloning
//!   repositories and memoizing clones for one pass.
//! - **Upgrades (`upgrade`)**: The three-way merge that moves an installation
//!   to a new version.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator::execute_install`:
//!
//! 1.  **Resolve**: Fetch the definition and every nested profile.
//! 2.  **Flatten**: Order the leaf artifacts depth-first.
//! 3.  **Build**: Generate flux objects for each artifact.
//! 4.  **Write**: Materialize objects, copied files and the record.

pub mod cache;
pub mod catalog;
pub mod defaults;
pub mod error;
pub mod git;
pub mod installation;
pub mod output;
pub mod phases;
pub mod profile;
pub mod repository;
pub mod resources;
pub mod upgrade;

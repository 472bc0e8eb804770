//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for `pctl`.
//! It uses the `thiserror` library to create a comprehensive `Error` enum
//! that covers every failure the resolve, build, write and upgrade pipeline
//! can hit, with enough context (repository URL, reference, path, artifact
//! name) to act on the message without re-running anything.
//!
//! ## Taxonomy
//!
//! - **Not found**: the profile definition file is absent at the requested
//!   path (`ProfileNotFound`).
//! - **Parse**: the definition payload is malformed or empty (`ProfileParse`).
//! - **Validation**: mutually exclusive descriptor fields, missing git source
//!   references, unresolved dependencies and unknown artifact kinds.
//! - **Recursion**: a nested profile points back at a repository already on
//!   the active resolution path (`RecursiveArtifact`).
//! - **VCS**: clone or working-copy failures from the `git` executable.
//!
//! Merge conflicts are not errors: the upgrade
//! workflow reports them through [`crate::repository::MergeOutcome`].

use thiserror::Error;

/// Main error type for pctl operations
#[derive(Error, Debug)]
pub enum Error {
    /// The profile definition file does not exist at the requested location.
    #[error("profile definition not found at {url}@{reference}: {path}")]
    ProfileNotFound {
        url: String,
        reference: String,
        path: String,
    },

    /// The profile definition could not be decoded.
    #[error("failed to parse profile definition {url}@{reference}:{path}: {message}")]
    ProfileParse {
        url: String,
        reference: String,
        path: String,
        message: String,
    },

    /// Two mutually exclusive fields were both supplied on one artifact.
    #[error("validation error for artifact {artifact}: expected exactly one, got both: {first}, {second}")]
    MultipleOneOf {
        artifact: String,
        first: String,
        second: String,
    },

    /// None of a set of required alternatives was supplied.
    #[error("validation error for artifact {artifact}: expected exactly one of: {fields}")]
    MissingOneOf { artifact: String, fields: String },

    /// Two artifacts of one definition share a name.
    #[error("validation error for profile {profile}: duplicate artifact name {artifact}")]
    DuplicateArtifact { profile: String, artifact: String },

    /// The artifact has no chart, kustomize or profile block.
    #[error("validation error for artifact {artifact}: no artifact type set")]
    NoArtifactType { artifact: String },

    /// A local chart or kustomize artifact was built without a flux git source.
    #[error("validation error for artifact {artifact}: in case of local resources, the flux gitrepository object's details must be provided")]
    MissingGitRepository { artifact: String },

    /// A `dependsOn` entry names an artifact that is not a sibling.
    #[error("validation error for artifact {artifact}: dependency {dependency} not found in profile (depended on by {artifact})")]
    DependencyNotFound { artifact: String, dependency: String },

    /// A `dependsOn` entry names a sibling that is a nested profile, which
    /// produces no object of its own to wait on.
    #[error("validation error for artifact {artifact}: dependency {dependency} is a nested profile and cannot be depended on")]
    DependencyOnProfile { artifact: String, dependency: String },

    /// A nested profile references a repository already on the active path.
    #[error("recursive artifact detected: profile {url} on branch {reference} contains an artifact that points recursively back at itself")]
    RecursiveArtifact { url: String, reference: String },

    /// An error occurred while cloning a Git repository.
    #[error("Git clone error for {url}@{r#ref}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        r#ref: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// A git command failed inside a working copy.
    #[error("Git command failed in {dir}: git {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// An error occurred with a clone cache operation.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// The installation record is missing or invalid.
    #[error("Installation error: {message}")]
    Installation { message: String },

    /// A catalog lookup failed.
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    /// An error occurred while materializing files.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

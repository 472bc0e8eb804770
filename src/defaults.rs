//! Default values and well-known names shared across the pipeline.
//!
//! Centralizing them keeps the builder, the writer and the upgrade
//! workflow in agreement about on-disk layout.

use std::path::PathBuf;

/// File holding a profile definition inside a profile repository.
pub const DEFINITION_FILE: &str = "profile.yaml";

/// File holding the installation record at the root of an installation.
pub const INSTALLATION_FILE: &str = "profile-installation.yaml";

/// Directory under the installation root that holds every artifact.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Sub-directory of an artifact that holds chart-backed objects.
pub const HELM_CHART_DIR: &str = "helm-chart";

/// Kustomize config file that limits what flux sees of an artifact directory.
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Reconciliation interval written on generated flux objects.
pub const RECONCILE_INTERVAL: &str = "0s";

/// Key under which inline chart default values are stored in their ConfigMap.
pub const DEFAULT_VALUES_KEY: &str = "default-values.yaml";

/// Suffix appended to a release name to name its default-values ConfigMap.
pub const DEFAULT_VALUES_SUFFIX: &str = "defaultvalues";

/// Buffer size of the streaming definition decoder.
pub const DECODER_BUFFER_SIZE: usize = 4096;

/// Branch names used by the upgrade workflow's scratch repository.
pub const BASE_BRANCH: &str = "base";
pub const USER_BRANCH: &str = "user-changes";
pub const INCOMING_BRANCH: &str = "update-changes";

/// Default namespace for installations.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default branch used when a direct source names neither branch nor tag.
pub const DEFAULT_BRANCH: &str = "main";

/// Returns the default output directory for `install`.
pub fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

//! Typed flux and Kubernetes objects emitted by the artifact builder.
//!
//! Only the fields the builder populates are modelled. Each object
//! serializes to the YAML flux expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::defaults::RECONCILE_INTERVAL;
use crate::error::Result;

pub const HELM_REPOSITORY_API_VERSION: &str = "source.toolkit.fluxcd.io/v1beta1";
pub const HELM_RELEASE_API_VERSION: &str = "helm.toolkit.fluxcd.io/v2beta1";
pub const KUSTOMIZATION_API_VERSION: &str = "kustomize.toolkit.fluxcd.io/v1beta1";
pub const KUSTOMIZE_CONFIG_API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";
pub const GIT_REPOSITORY_KIND: &str = "GitRepository";
pub const HELM_REPOSITORY_KIND: &str = "HelmRepository";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectMeta {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }
}

/// Reference to a flux source object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Dependency edge between flux Kustomizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepository {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: HelmRepositorySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmRepositorySpec {
    pub url: String,
    pub interval: String,
}

impl HelmRepository {
    pub fn new(name: &str, namespace: &str, url: &str) -> Self {
        Self {
            api_version: HELM_REPOSITORY_API_VERSION.to_string(),
            kind: HELM_REPOSITORY_KIND.to_string(),
            metadata: ObjectMeta::new(name, namespace),
            spec: HelmRepositorySpec {
                url: url.to_string(),
                interval: RECONCILE_INTERVAL.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRelease {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: HelmReleaseSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    pub interval: String,
    pub chart: HelmChartTemplate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelmChartTemplate {
    pub spec: HelmChartTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartTemplateSpec {
    /// Chart name for Helm repositories, chart directory for git sources.
    pub chart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub source_ref: SourceReference,
}

/// Where a release takes a values document from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesReference {
    pub kind: String,
    pub name: String,
    pub values_key: String,
}

impl ValuesReference {
    pub fn config_map(name: &str, key: &str) -> Self {
        Self {
            kind: "ConfigMap".to_string(),
            name: name.to_string(),
            values_key: key.to_string(),
        }
    }
}

impl HelmRelease {
    pub fn new(name: &str, namespace: &str, chart: HelmChartTemplateSpec) -> Self {
        Self {
            api_version: HELM_RELEASE_API_VERSION.to_string(),
            kind: "HelmRelease".to_string(),
            metadata: ObjectMeta::new(name, namespace),
            spec: HelmReleaseSpec {
                interval: RECONCILE_INTERVAL.to_string(),
                chart: HelmChartTemplate { spec: chart },
                values_from: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(name: &str, namespace: &str, key: &str, value: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ObjectMeta::new(name, namespace),
            data: BTreeMap::from([(key.to_string(), value.to_string())]),
        }
    }
}

/// A flux Kustomization: the wrapper that carries ordering edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: KustomizationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KustomizationSpec {
    pub path: String,
    pub interval: String,
    pub prune: bool,
    pub target_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<SourceReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependencyReference>,
}

impl Kustomization {
    pub fn new(name: &str, namespace: &str, path: &str, source_ref: Option<SourceReference>) -> Self {
        Self {
            api_version: KUSTOMIZATION_API_VERSION.to_string(),
            kind: "Kustomization".to_string(),
            metadata: ObjectMeta::new(name, namespace),
            spec: KustomizationSpec {
                path: path.to_string(),
                interval: RECONCILE_INTERVAL.to_string(),
                prune: true,
                target_namespace: namespace.to_string(),
                source_ref,
                depends_on: Vec::new(),
            },
        }
    }
}

/// The plain kustomize config that limits which files flux applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KustomizeConfig {
    pub api_version: String,
    pub kind: String,
    pub resources: Vec<String>,
}

impl KustomizeConfig {
    pub fn new(resources: Vec<String>) -> Self {
        Self {
            api_version: KUSTOMIZE_CONFIG_API_VERSION.to_string(),
            kind: "Kustomization".to_string(),
            resources,
        }
    }
}

/// Any object the builder emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    HelmRepository(HelmRepository),
    HelmRelease(HelmRelease),
    ConfigMap(ConfigMap),
    Kustomization(Kustomization),
}

impl Resource {
    pub fn kind(&self) -> &str {
        match self {
            Resource::HelmRepository(r) => &r.kind,
            Resource::HelmRelease(r) => &r.kind,
            Resource::ConfigMap(r) => &r.kind,
            Resource::Kustomization(r) => &r.kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::HelmRepository(r) => &r.metadata.name,
            Resource::HelmRelease(r) => &r.metadata.name,
            Resource::ConfigMap(r) => &r.metadata.name,
            Resource::Kustomization(r) => &r.metadata.name,
        }
    }

    /// File name the writer gives this object.
    pub fn file_name(&self) -> String {
        format!("{}.yaml", self.kind())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

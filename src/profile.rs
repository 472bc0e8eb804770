//! # Profile Definition Schema and Parsing
//!
//! This module defines the data structures that represent a `profile.yaml`
//! definition file, as well as the logic for decoding it.
//!
//! ## Key Components
//!
//! - **`ProfileDefinition`**: the decoded definition: a name, a description
//!   and an ordered list of artifacts.
//! - **`Artifact`**: one deployable unit. Its kind is the closed sum type
//!   [`ArtifactKind`], so a descriptor can never be a chart and a kustomize
//!   overlay at the same time once it has been decoded.
//! - **`ProfileSource`**: a pointer at a profile in a git repository, shared
//!   by nested-profile artifacts and installation records.
//!
//! ## Decoding
//!
//! The wire shape has one optional block per kind (`chart`, `kustomize`,
//! `profile`). [`from_reader`] decodes into that shape first and then
//! converts each entry into an [`Artifact`], rejecting descriptors that set
//! zero or several kinds with an error naming exactly the conflicting
//! fields. YAML and JSON payloads are both accepted.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read};

use serde::{Deserialize, Serialize};

use crate::defaults::{DECODER_BUFFER_SIZE, DEFAULT_BRANCH};
use crate::error::{Error, Result};

/// Location of a profile inside a git repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSource {
    /// Repository URL (anything `git clone` accepts).
    pub url: String,
    /// Branch to check out. Ignored when `tag` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Tag to check out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Directory holding `profile.yaml`, relative to the repository root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ProfileSource {
    /// Source pinned to a branch.
    pub fn branch(url: &str, branch: &str, path: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            branch: Some(branch.to_string()),
            tag: None,
            path: path.map(str::to_string),
        }
    }

    /// Source pinned to a tag.
    pub fn tag(url: &str, tag: &str, path: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            branch: None,
            tag: Some(tag.to_string()),
            path: path.map(str::to_string),
        }
    }

    /// The git reference to clone: the tag if set, else the branch.
    pub fn reference(&self) -> &str {
        non_empty(&self.tag)
            .or_else(|| non_empty(&self.branch))
            .unwrap_or(DEFAULT_BRANCH)
    }

    /// Key identifying this repository revision, `url:reference`.
    pub fn repo_key(&self) -> String {
        repo_key(&self.url, self.reference())
    }

    /// Directory of the definition inside the repository.
    ///
    /// An explicit `path` wins. Otherwise a tag of the form `<dir>/<version>`
    /// implies `<dir>`. Anything else is the repository root.
    pub fn definition_dir(&self) -> String {
        if let Some(path) = non_empty(&self.path) {
            return path.trim_matches('/').to_string();
        }
        match non_empty(&self.tag).and_then(|tag| tag.split_once('/')) {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        }
    }
}

/// Builds the literal `url:reference` key used for cache and cycle tracking.
pub fn repo_key(url: &str, reference: &str) -> String {
    format!("{}:{}", url, reference)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A decoded, validated profile definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDefinition {
    pub name: String,
    pub description: String,
    pub artifacts: Vec<Artifact>,
}

impl ProfileDefinition {
    /// Looks up an artifact by name.
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

/// One artifact of a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Unique within the owning definition.
    pub name: String,
    pub kind: ArtifactKind,
    /// Names of sibling artifacts that must be ready first.
    pub depends_on: Vec<DependsOn>,
}

/// The kind of an artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    Chart(Chart),
    Kustomize(Kustomize),
    Profile(NestedProfile),
}

impl ArtifactKind {
    /// The wire name of this kind.
    pub fn field_name(&self) -> &'static str {
        match self {
            ArtifactKind::Chart(_) => "chart",
            ArtifactKind::Kustomize(_) => "kustomize",
            ArtifactKind::Profile(_) => "profile",
        }
    }
}

/// A Helm chart artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub source: ChartSource,
    /// Inline values document applied before installation-supplied values.
    pub default_values: Option<String>,
}

/// Where a chart comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartSource {
    /// A chart served by a Helm repository.
    Remote {
        url: String,
        name: String,
        version: Option<String>,
    },
    /// A chart directory inside the profile repository.
    Local { path: String },
}

/// A kustomize overlay directory inside the profile repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kustomize {
    pub path: String,
}

/// A reference to another profile, resolved recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedProfile {
    pub source: ProfileSource,
}

/// A dependency on a sibling artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    pub name: String,
}

////// WIRE FORMAT //////

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    #[serde(default)]
    #[allow(dead_code)]
    api_version: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    kind: Option<String>,
    metadata: RawMetadata,
    #[serde(default)]
    spec: RawSpec,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawSpec {
    #[serde(default)]
    description: String,
    #[serde(default)]
    artifacts: Vec<RawArtifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    name: String,
    #[serde(default)]
    chart: Option<RawChart>,
    #[serde(default)]
    kustomize: Option<Kustomize>,
    #[serde(default)]
    profile: Option<NestedProfile>,
    #[serde(default)]
    depends_on: Vec<DependsOn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChart {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    default_values: Option<String>,
}

impl RawArtifact {
    fn into_artifact(self) -> Result<Artifact> {
        let set: Vec<&str> = [
            ("chart", self.chart.is_some()),
            ("kustomize", self.kustomize.is_some()),
            ("profile", self.profile.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, present)| present.then_some(field))
        .collect();

        if let [first, second, ..] = set.as_slice() {
            return Err(Error::MultipleOneOf {
                artifact: self.name,
                first: first.to_string(),
                second: second.to_string(),
            });
        }

        let kind = match (self.chart, self.kustomize, self.profile) {
            (Some(chart), _, _) => ArtifactKind::Chart(chart.into_chart(&self.name)?),
            (_, Some(kustomize), _) => ArtifactKind::Kustomize(kustomize),
            (_, _, Some(profile)) => ArtifactKind::Profile(profile),
            (None, None, None) => return Err(Error::NoArtifactType { artifact: self.name }),
        };

        Ok(Artifact {
            name: self.name,
            kind,
            depends_on: self.depends_on,
        })
    }
}

impl RawChart {
    fn into_chart(self, artifact: &str) -> Result<Chart> {
        let source = match (non_empty(&self.path), non_empty(&self.url)) {
            (Some(_), Some(_)) => {
                return Err(Error::MultipleOneOf {
                    artifact: artifact.to_string(),
                    first: "chart.path".to_string(),
                    second: "chart.url".to_string(),
                })
            }
            (Some(path), None) => ChartSource::Local {
                path: path.to_string(),
            },
            (None, Some(url)) => ChartSource::Remote {
                url: url.to_string(),
                name: non_empty(&self.name).unwrap_or(artifact).to_string(),
                version: self.version.clone(),
            },
            (None, None) => {
                return Err(Error::MissingOneOf {
                    artifact: artifact.to_string(),
                    fields: "chart.path, chart.url".to_string(),
                })
            }
        };
        Ok(Chart {
            source,
            default_values: self.default_values,
        })
    }
}

impl RawDefinition {
    fn into_definition(self) -> Result<ProfileDefinition> {
        let mut seen = HashSet::new();
        let mut artifacts = Vec::with_capacity(self.spec.artifacts.len());
        for raw in self.spec.artifacts {
            if !seen.insert(raw.name.clone()) {
                return Err(Error::DuplicateArtifact {
                    profile: self.metadata.name,
                    artifact: raw.name,
                });
            }
            artifacts.push(raw.into_artifact()?);
        }
        Ok(ProfileDefinition {
            name: self.metadata.name,
            description: self.spec.description,
            artifacts,
        })
    }
}

/// Decodes a definition from a YAML or JSON stream.
///
/// Syntax errors and empty payloads are reported as `Error::Yaml`; callers
/// that know where the stream came from attach that context. Validation
/// failures are returned as their specific variants.
pub fn from_reader<R: Read>(reader: R) -> Result<ProfileDefinition> {
    let mut reader = BufReader::with_capacity(DECODER_BUFFER_SIZE, reader);
    if reader.fill_buf()?.is_empty() {
        return Err(Error::Yaml(serde::de::Error::custom(
            "profile definition is empty",
        )));
    }
    let raw: RawDefinition = serde_yaml::from_reader(reader)?;
    raw.into_definition()
}

/// Decodes a definition from a string.
pub fn parse(content: &str) -> Result<ProfileDefinition> {
    from_reader(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX: &str = r#"
apiVersion: weave.works/v1alpha1
kind: ProfileDefinition
metadata:
  name: nginx
spec:
  description: nginx with a database
  artifacts:
    - name: nginx-server
      chart:
        url: https://charts.bitnami.com/bitnami
        name: nginx
        version: "8.9.1"
        defaultValues: |
          replicaCount: 3
      dependsOn:
        - name: nginx-deployment
    - name: nginx-deployment
      kustomize:
        path: nginx/deployment
    - name: local-chart
      chart:
        path: nginx/chart
    - name: nested
      profile:
        source:
          url: https://github.com/weaveworks/nested-profile
          tag: bitnami-nginx/v0.0.1
"#;

    fn artifact_yaml(body: &str) -> String {
        format!(
            "metadata:\n  name: p\nspec:\n  artifacts:\n    - name: a\n{}",
            body
        )
    }

    #[test]
    fn test_parse_full_definition() {
        let def = parse(NGINX).unwrap();
        assert_eq!(def.name, "nginx");
        assert_eq!(def.description, "nginx with a database");
        assert_eq!(def.artifacts.len(), 4);

        match &def.artifacts[0].kind {
            ArtifactKind::Chart(chart) => {
                assert_eq!(
                    chart.source,
                    ChartSource::Remote {
                        url: "https://charts.bitnami.com/bitnami".to_string(),
                        name: "nginx".to_string(),
                        version: Some("8.9.1".to_string()),
                    }
                );
                assert_eq!(chart.default_values.as_deref(), Some("replicaCount: 3\n"));
            }
            other => panic!("expected chart, got {:?}", other),
        }
        assert_eq!(def.artifacts[0].depends_on[0].name, "nginx-deployment");
        assert!(matches!(def.artifacts[1].kind, ArtifactKind::Kustomize(_)));
        assert!(matches!(
            &def.artifacts[2].kind,
            ArtifactKind::Chart(Chart { source: ChartSource::Local { path }, .. }) if path == "nginx/chart"
        ));
        assert!(matches!(def.artifacts[3].kind, ArtifactKind::Profile(_)));
    }

    #[test]
    fn test_parse_json_definition() {
        let json = r#"{"metadata":{"name":"j"},"spec":{"artifacts":[{"name":"k","kustomize":{"path":"x"}}]}}"#;
        let def = parse(json).unwrap();
        assert_eq!(def.name, "j");
        assert_eq!(def.artifact("k").unwrap().kind.field_name(), "kustomize");
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(parse(""), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_parse_malformed_is_error() {
        assert!(matches!(parse("metadata: [unclosed"), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_every_kind_pair_is_rejected() {
        let blocks = [
            ("chart", "      chart:\n        path: c\n"),
            ("kustomize", "      kustomize:\n        path: k\n"),
            (
                "profile",
                "      profile:\n        source:\n          url: https://example.com/p\n",
            ),
        ];
        for i in 0..blocks.len() {
            for j in (i + 1)..blocks.len() {
                let yaml = artifact_yaml(&format!("{}{}", blocks[i].1, blocks[j].1));
                match parse(&yaml) {
                    Err(Error::MultipleOneOf { first, second, .. }) => {
                        assert_eq!(first, blocks[i].0);
                        assert_eq!(second, blocks[j].0);
                    }
                    other => panic!("expected MultipleOneOf, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_chart_path_and_url_rejected() {
        let yaml = artifact_yaml("      chart:\n        path: c\n        url: https://charts\n");
        match parse(&yaml) {
            Err(Error::MultipleOneOf { first, second, .. }) => {
                assert_eq!(first, "chart.path");
                assert_eq!(second, "chart.url");
            }
            other => panic!("expected MultipleOneOf, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_without_source_rejected() {
        let yaml = artifact_yaml("      chart:\n        version: 1.0.0\n");
        assert!(matches!(parse(&yaml), Err(Error::MissingOneOf { .. })));
    }

    #[test]
    fn test_artifact_without_kind_rejected() {
        let yaml = artifact_yaml("      dependsOn:\n        - name: b\n");
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().contains("no artifact type set"));
    }

    #[test]
    fn test_duplicate_artifact_rejected() {
        let yaml = "metadata:\n  name: p\nspec:\n  artifacts:\n    - name: a\n      kustomize:\n        path: x\n    - name: a\n      kustomize:\n        path: y\n";
        assert!(matches!(parse(yaml), Err(Error::DuplicateArtifact { .. })));
    }

    #[test]
    fn test_remote_chart_name_defaults_to_artifact() {
        let yaml = artifact_yaml("      chart:\n        url: https://charts\n");
        let def = parse(&yaml).unwrap();
        match &def.artifacts[0].kind {
            ArtifactKind::Chart(Chart {
                source: ChartSource::Remote { name, .. },
                ..
            }) => assert_eq!(name, "a"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_source_reference_prefers_tag() {
        let mut source = ProfileSource::branch("https://example.com/r", "main", None);
        assert_eq!(source.reference(), "main");
        source.tag = Some("v1".to_string());
        assert_eq!(source.reference(), "v1");
        assert_eq!(source.repo_key(), "https://example.com/r:v1");
    }

    #[test]
    fn test_source_reference_defaults_to_main() {
        let source = ProfileSource {
            url: "u".to_string(),
            ..Default::default()
        };
        assert_eq!(source.reference(), "main");
    }

    #[test]
    fn test_definition_dir_from_tag() {
        let source = ProfileSource::tag("u", "bitnami-nginx/v0.0.1", None);
        assert_eq!(source.definition_dir(), "bitnami-nginx");

        let source = ProfileSource::tag("u", "v0.0.1", None);
        assert_eq!(source.definition_dir(), "");

        let source = ProfileSource::tag("u", "bitnami-nginx/v0.0.1", Some("explicit/"));
        assert_eq!(source.definition_dir(), "explicit");
    }
}

//! Phase 3: Build
//!
//! Translates each flattened leaf artifact into the flux objects that deploy
//! it. Building is pure: it needs no repository access, and nothing is
//! written until every artifact of the pass has built.
//!
//! ## Objects per artifact kind
//!
//! - **Remote chart**: a HelmRepository and a HelmRelease under `helm-chart/`,
//!   plus a wrapper Kustomization pointing at that directory.
//! - **Local chart**: a HelmRelease sourced from the flux GitRepository
//!   under `helm-chart/`, the wrapper Kustomization, and a copy of the chart
//!   directory.
//! - **Kustomize**: one Kustomization pointing at the copied overlay.
//!
//! Every object is named `<installation>-<definition>-<leaf>`. Ordering
//! edges from `dependsOn` go on the wrapper Kustomization only.

use std::collections::BTreeMap;

use log::warn;

use super::{
    basename, join_path, BuiltArtifact, BuiltObject, GitRepositoryRef, LeafKind, RepoCopy,
    ResolvedArtifact,
};
use crate::defaults::{ARTIFACTS_DIR, DEFAULT_VALUES_KEY, DEFAULT_VALUES_SUFFIX, HELM_CHART_DIR};
use crate::error::{Error, Result};
use crate::installation::Installation;
use crate::profile::{Chart, ChartSource, Kustomize};
use crate::resources::{
    ConfigMap, DependencyReference, HelmChartTemplateSpec, HelmRelease, HelmRepository,
    Kustomization, Resource, SourceReference, ValuesReference, GIT_REPOSITORY_KIND,
    HELM_REPOSITORY_KIND,
};

/// Parameters shared by every artifact of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub installation_name: String,
    pub namespace: String,
    /// Path of the installation inside the flux git repository.
    pub root_dir: String,
    /// The flux GitRepository the installation is committed to.
    pub git_repository: Option<GitRepositoryRef>,
    /// ConfigMap of installation-supplied values, keyed by leaf name.
    pub config_map: Option<String>,
}

impl BuildConfig {
    /// Takes name, namespace and config map from an installation record.
    pub fn for_installation(
        installation: &Installation,
        root_dir: &str,
        git_repository: Option<GitRepositoryRef>,
    ) -> Self {
        Self {
            installation_name: installation.name().to_string(),
            namespace: installation.namespace().to_string(),
            root_dir: root_dir.to_string(),
            git_repository,
            config_map: installation.spec.config_map.clone(),
        }
    }
}

/// Builds flux objects for flattened artifacts.
pub struct Builder {
    config: BuildConfig,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Builds every artifact, failing on the first invalid one.
    pub fn build(&self, artifacts: &[ResolvedArtifact]) -> Result<Vec<BuiltArtifact>> {
        let built: Vec<BuiltArtifact> = artifacts
            .iter()
            .map(|a| self.build_artifact(a))
            .collect::<Result<_>>()?;
        for (name, owners) in duplicate_wrapper_names(&built) {
            warn!(
                "artifacts {} all build flux objects named {}; only one will be applied",
                owners.join(", "),
                name
            );
        }
        Ok(built)
    }

    pub fn build_artifact(&self, artifact: &ResolvedArtifact) -> Result<BuiltArtifact> {
        let depends_on = self.dependencies(artifact)?;
        let mut built = match &artifact.kind {
            LeafKind::Chart(chart) => self.build_chart(artifact, chart)?,
            LeafKind::Kustomize(kustomize) => self.build_kustomize(artifact, kustomize)?,
        };

        for object in &mut built.objects {
            if let (None, Resource::Kustomization(wrapper)) = (&object.sub_path, &mut object.resource) {
                wrapper.spec.depends_on = depends_on.clone();
            }
        }
        built.depends_on = depends_on;
        Ok(built)
    }

    /// `<installation>-<definition>-<leaf>`.
    pub fn object_name(&self, profile_name: &str, leaf: &str) -> String {
        [self.config.installation_name.as_str(), profile_name, basename(leaf)].join("-")
    }

    fn dependencies(&self, artifact: &ResolvedArtifact) -> Result<Vec<DependencyReference>> {
        artifact
            .depends_on
            .iter()
            .map(|dep| {
                if !artifact.sibling_names.iter().any(|s| s == &dep.name) {
                    return Err(Error::DependencyNotFound {
                        artifact: artifact.artifact_name.clone(),
                        dependency: dep.name.clone(),
                    });
                }
                Ok(DependencyReference {
                    name: self.object_name(&artifact.profile_name, &dep.name),
                    namespace: Some(self.config.namespace.clone()),
                })
            })
            .collect()
    }

    fn artifact_path(&self, artifact: &ResolvedArtifact, sub_path: &str) -> String {
        join_path(&[&self.config.root_dir, ARTIFACTS_DIR, &artifact.name(), sub_path])
    }

    fn git_source(&self, artifact: &ResolvedArtifact) -> Result<SourceReference> {
        let git = self
            .config
            .git_repository
            .as_ref()
            .ok_or_else(|| Error::MissingGitRepository {
                artifact: artifact.name(),
            })?;
        Ok(SourceReference {
            kind: GIT_REPOSITORY_KIND.to_string(),
            name: git.name.clone(),
            namespace: Some(git.namespace.clone()),
        })
    }

    fn optional_git_source(&self) -> Option<SourceReference> {
        self.config.git_repository.as_ref().map(|git| SourceReference {
            kind: GIT_REPOSITORY_KIND.to_string(),
            name: git.name.clone(),
            namespace: Some(git.namespace.clone()),
        })
    }

    fn repo_copy(&self, artifact: &ResolvedArtifact, path: &str) -> RepoCopy {
        RepoCopy {
            repo_url: artifact.source.url.clone(),
            reference: artifact.source.reference().to_string(),
            sparse_root: artifact.profile_name.clone(),
            paths: vec![path.to_string()],
        }
    }

    fn build_chart(&self, artifact: &ResolvedArtifact, chart: &Chart) -> Result<BuiltArtifact> {
        let name = self.object_name(&artifact.profile_name, &artifact.name());
        let namespace = self.config.namespace.as_str();
        let helm_dir = Some(HELM_CHART_DIR.to_string());
        let mut objects = Vec::new();

        let (chart_spec, wrapper_source, copy) = match &chart.source {
            ChartSource::Remote { url, name: chart_name, version } => {
                objects.push(BuiltObject {
                    resource: Resource::HelmRepository(HelmRepository::new(&name, namespace, url)),
                    sub_path: helm_dir.clone(),
                });
                let spec = HelmChartTemplateSpec {
                    chart: chart_name.clone(),
                    version: version.clone(),
                    source_ref: SourceReference {
                        kind: HELM_REPOSITORY_KIND.to_string(),
                        name: name.clone(),
                        namespace: Some(namespace.to_string()),
                    },
                };
                (spec, self.optional_git_source(), None)
            }
            ChartSource::Local { path } => {
                let source = self.git_source(artifact)?;
                let spec = HelmChartTemplateSpec {
                    chart: self.artifact_path(artifact, path),
                    version: None,
                    source_ref: source.clone(),
                };
                (spec, Some(source), Some(self.repo_copy(artifact, path)))
            }
        };

        let mut release = HelmRelease::new(&name, namespace, chart_spec);
        if let Some(values) = &chart.default_values {
            let config_map_name = format!("{}-{}", name, DEFAULT_VALUES_SUFFIX);
            objects.push(BuiltObject {
                resource: Resource::ConfigMap(ConfigMap::new(
                    &config_map_name,
                    namespace,
                    DEFAULT_VALUES_KEY,
                    values,
                )),
                sub_path: helm_dir.clone(),
            });
            release
                .spec
                .values_from
                .push(ValuesReference::config_map(&config_map_name, DEFAULT_VALUES_KEY));
        }
        if let Some(config_map) = &self.config.config_map {
            release
                .spec
                .values_from
                .push(ValuesReference::config_map(config_map, basename(&artifact.artifact_name)));
        }
        objects.push(BuiltObject {
            resource: Resource::HelmRelease(release),
            sub_path: helm_dir,
        });

        objects.push(BuiltObject {
            resource: Resource::Kustomization(Kustomization::new(
                &name,
                namespace,
                &self.artifact_path(artifact, HELM_CHART_DIR),
                wrapper_source,
            )),
            sub_path: None,
        });

        Ok(BuiltArtifact {
            name: artifact.name(),
            objects,
            depends_on: Vec::new(),
            copy,
        })
    }

    fn build_kustomize(
        &self,
        artifact: &ResolvedArtifact,
        kustomize: &Kustomize,
    ) -> Result<BuiltArtifact> {
        let source = self.git_source(artifact)?;
        let name = self.object_name(&artifact.profile_name, &artifact.name());
        let wrapper = Kustomization::new(
            &name,
            &self.config.namespace,
            &self.artifact_path(artifact, &kustomize.path),
            Some(source),
        );
        Ok(BuiltArtifact {
            name: artifact.name(),
            objects: vec![BuiltObject {
                resource: Resource::Kustomization(wrapper),
                sub_path: None,
            }],
            depends_on: Vec::new(),
            copy: Some(self.repo_copy(artifact, &kustomize.path)),
        })
    }
}

/// Wrapper object names shared by more than one artifact, with the names of
/// the artifacts sharing each.
///
/// Sibling subtrees nesting the same upstream profile name their objects
/// after that profile, so their leaves collide.
pub fn duplicate_wrapper_names(built: &[BuiltArtifact]) -> Vec<(String, Vec<String>)> {
    let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for artifact in built {
        if let Some(wrapper) = artifact.wrapper() {
            by_name
                .entry(wrapper.metadata.name.as_str())
                .or_default()
                .push(artifact.name.clone());
        }
    }
    by_name
        .into_iter()
        .filter(|(_, artifacts)| artifacts.len() > 1)
        .map(|(name, artifacts)| (name.to_string(), artifacts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{DependsOn, ProfileSource};
    use proptest::prelude::*;

    fn config() -> BuildConfig {
        BuildConfig {
            installation_name: "inst".to_string(),
            namespace: "default".to_string(),
            root_dir: "root".to_string(),
            git_repository: Some(GitRepositoryRef {
                namespace: "flux-system".to_string(),
                name: "repo".to_string(),
            }),
            config_map: None,
        }
    }

    fn resolved(name: &str, kind: LeafKind) -> ResolvedArtifact {
        ResolvedArtifact {
            artifact_name: name.to_string(),
            kind,
            depends_on: Vec::new(),
            profile_name: "nginx".to_string(),
            nested_prefix: String::new(),
            source: ProfileSource::branch("https://github.com/org/nginx", "main", None),
            repo_key: "https://github.com/org/nginx:main".to_string(),
            sibling_names: vec![name.to_string()],
        }
    }

    fn remote_chart(default_values: Option<&str>) -> LeafKind {
        LeafKind::Chart(Chart {
            source: ChartSource::Remote {
                url: "https://charts.example.com".to_string(),
                name: "nginx-server".to_string(),
                version: Some("1.2.3".to_string()),
            },
            default_values: default_values.map(str::to_string),
        })
    }

    fn local_chart() -> LeafKind {
        LeafKind::Chart(Chart {
            source: ChartSource::Local {
                path: "charts/nginx".to_string(),
            },
            default_values: None,
        })
    }

    fn kustomize() -> LeafKind {
        LeafKind::Kustomize(Kustomize {
            path: "nginx/deployment".to_string(),
        })
    }

    fn release(built: &BuiltArtifact) -> &HelmRelease {
        built
            .objects
            .iter()
            .find_map(|o| match &o.resource {
                Resource::HelmRelease(r) => Some(r),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_remote_chart_objects() {
        let built = Builder::new(config())
            .build_artifact(&resolved("server", remote_chart(None)))
            .unwrap();

        let kinds: Vec<&str> = built.objects.iter().map(|o| o.resource.kind()).collect();
        assert_eq!(kinds, vec!["HelmRepository", "HelmRelease", "Kustomization"]);
        assert!(built.copy.is_none());

        for object in &built.objects {
            assert_eq!(object.resource.name(), "inst-nginx-server");
        }

        let release = release(&built);
        assert_eq!(release.spec.chart.spec.chart, "nginx-server");
        assert_eq!(release.spec.chart.spec.version.as_deref(), Some("1.2.3"));
        assert_eq!(release.spec.chart.spec.source_ref.kind, HELM_REPOSITORY_KIND);
        assert!(release.spec.values_from.is_empty());

        let wrapper = built.wrapper().unwrap();
        assert_eq!(wrapper.spec.path, "root/artifacts/server/helm-chart");
    }

    #[test]
    fn test_remote_chart_without_git_repository() {
        let mut config = config();
        config.git_repository = None;
        let built = Builder::new(config)
            .build_artifact(&resolved("server", remote_chart(None)))
            .unwrap();
        assert!(built.wrapper().unwrap().spec.source_ref.is_none());
    }

    #[test]
    fn test_default_values_come_first() {
        let mut config = config();
        config.config_map = Some("user-values".to_string());
        let built = Builder::new(config)
            .build_artifact(&resolved("server", remote_chart(Some("replicas: 2\n"))))
            .unwrap();

        let config_map = built
            .objects
            .iter()
            .find_map(|o| match &o.resource {
                Resource::ConfigMap(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(config_map.metadata.name, "inst-nginx-server-defaultvalues");
        assert_eq!(config_map.data[DEFAULT_VALUES_KEY], "replicas: 2\n");

        let values = &release(&built).spec.values_from;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].name, "inst-nginx-server-defaultvalues");
        assert_eq!(values[0].values_key, DEFAULT_VALUES_KEY);
        assert_eq!(values[1].name, "user-values");
        assert_eq!(values[1].values_key, "server");
    }

    #[test]
    fn test_local_chart_uses_git_source_and_copies_chart() {
        let built = Builder::new(config())
            .build_artifact(&resolved("server", local_chart()))
            .unwrap();

        let kinds: Vec<&str> = built.objects.iter().map(|o| o.resource.kind()).collect();
        assert_eq!(kinds, vec!["HelmRelease", "Kustomization"]);

        let chart = &release(&built).spec.chart.spec;
        assert_eq!(chart.chart, "root/artifacts/server/charts/nginx");
        assert_eq!(chart.source_ref.kind, GIT_REPOSITORY_KIND);
        assert_eq!(chart.source_ref.name, "repo");
        assert_eq!(chart.source_ref.namespace.as_deref(), Some("flux-system"));

        let copy = built.copy.unwrap();
        assert_eq!(copy.sparse_root, "nginx");
        assert_eq!(copy.paths, vec!["charts/nginx"]);
        assert_eq!(copy.reference, "main");
    }

    #[test]
    fn test_local_artifacts_require_git_repository() {
        let mut config = config();
        config.git_repository = None;
        let builder = Builder::new(config);

        for kind in [local_chart(), kustomize()] {
            match builder.build_artifact(&resolved("server", kind)).unwrap_err() {
                Error::MissingGitRepository { artifact } => assert_eq!(artifact, "server"),
                other => panic!("expected MissingGitRepository, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_kustomize_single_object() {
        let built = Builder::new(config())
            .build_artifact(&resolved("deploy", kustomize()))
            .unwrap();
        assert_eq!(built.objects.len(), 1);
        let wrapper = built.wrapper().unwrap();
        assert_eq!(wrapper.metadata.name, "inst-nginx-deploy");
        assert_eq!(wrapper.spec.path, "root/artifacts/deploy/nginx/deployment");
        assert_eq!(wrapper.spec.source_ref.as_ref().unwrap().kind, GIT_REPOSITORY_KIND);
        assert_eq!(built.copy.unwrap().paths, vec!["nginx/deployment"]);
    }

    #[test]
    fn test_dependencies_only_on_wrapper() {
        let mut artifact = resolved("server", remote_chart(None));
        artifact.depends_on.push(DependsOn {
            name: "db".to_string(),
        });
        artifact.sibling_names.push("db".to_string());

        let built = Builder::new(config()).build_artifact(&artifact).unwrap();
        let wrapper = built.wrapper().unwrap();
        assert_eq!(wrapper.spec.depends_on.len(), 1);
        assert_eq!(wrapper.spec.depends_on[0].name, "inst-nginx-db");
        assert_eq!(wrapper.spec.depends_on[0].namespace.as_deref(), Some("default"));
        assert_eq!(built.depends_on, wrapper.spec.depends_on);

        let inner_edges = built
            .objects
            .iter()
            .filter(|o| o.sub_path.is_some())
            .filter(|o| match &o.resource {
                Resource::Kustomization(k) => !k.spec.depends_on.is_empty(),
                _ => false,
            })
            .count();
        assert_eq!(inner_edges, 0);
    }

    #[test]
    fn test_unknown_dependency_fails_build() {
        let mut artifact = resolved("server", remote_chart(None));
        artifact.depends_on.push(DependsOn {
            name: "missing".to_string(),
        });
        assert!(matches!(
            Builder::new(config()).build_artifact(&artifact).unwrap_err(),
            Error::DependencyNotFound { .. }
        ));
    }

    #[test]
    fn test_nested_artifact_paths_and_names() {
        let mut artifact = resolved("server", kustomize());
        artifact.nested_prefix = "outer/inner".to_string();
        artifact.profile_name = "inner-profile".to_string();

        let built = Builder::new(config()).build_artifact(&artifact).unwrap();
        assert_eq!(built.name, "outer/inner/server");
        let wrapper = built.wrapper().unwrap();
        assert_eq!(wrapper.metadata.name, "inst-inner-profile-server");
        assert_eq!(
            wrapper.spec.path,
            "root/artifacts/outer/inner/server/nginx/deployment"
        );
        assert_eq!(built.copy.unwrap().sparse_root, "inner-profile");
    }

    proptest! {
        #[test]
        fn prop_object_name_joins_with_dashes(
            inst in "[a-z][a-z0-9]{0,8}",
            def in "[a-z][a-z0-9]{0,8}",
            prefix in proptest::collection::vec("[a-z]{1,5}", 0..3),
            leaf in "[a-z][a-z0-9]{0,8}",
        ) {
            let mut config = config();
            config.installation_name = inst.clone();
            let builder = Builder::new(config);
            let mut segments = prefix.clone();
            segments.push(leaf.clone());
            let name = builder.object_name(&def, &segments.join("/"));
            prop_assert_eq!(name, format!("{}-{}-{}", inst, def, leaf));
        }

        #[test]
        fn prop_every_object_shares_the_release_name(
            leaf in "[a-z][a-z0-9]{0,8}",
            with_values in any::<bool>(),
        ) {
            let values = if with_values { Some("a: 1\n") } else { None };
            let built = Builder::new(config())
                .build_artifact(&resolved(&leaf, remote_chart(values)))
                .unwrap();
            let expected = format!("inst-nginx-{}", leaf);
            for object in &built.objects {
                prop_assert!(object.resource.name().starts_with(&expected));
            }
        }
    }

    #[test]
    fn test_sibling_subtrees_sharing_a_profile_collide() {
        let mut first = resolved("db", kustomize());
        first.nested_prefix = "first".to_string();
        let mut second = resolved("db", kustomize());
        second.nested_prefix = "second".to_string();
        let other = resolved("web", kustomize());

        let built = Builder::new(config()).build(&[first, second, other]).unwrap();
        assert_eq!(
            duplicate_wrapper_names(&built),
            vec![(
                "inst-nginx-db".to_string(),
                vec!["first/db".to_string(), "second/db".to_string()]
            )]
        );
    }

    #[test]
    fn test_distinct_wrappers_have_no_duplicates() {
        let built = Builder::new(config())
            .build(&[resolved("db", kustomize()), resolved("web", kustomize())])
            .unwrap();
        assert!(duplicate_wrapper_names(&built).is_empty());
    }
}

//! Transitive dependency resolution.
//!
//! Resolution is greedy and never backtracks: each project gets the version
//! the [`VersionSelector`] picks, and the dependencies that version declares
//! are queued in turn. A project is resolved at most once, so the role it is
//! first reached with is the one it keeps, and dependency cycles terminate.
//!
//! Dependencies declared only by a pinned version id are traced back to their
//! project through one batch version lookup; the project then goes through
//! the selector like any other, so the installed version always matches the
//! server's loader and game version.

use std::collections::{HashMap, HashSet, VecDeque};

use moddock_common::error::{ModdockError, Result};
use moddock_common::types::{Loader, ProjectId, ResolvedMod, Role, VersionId};
use moddock_registry::{DependencyType, VersionInfo, VersionSelector};

use crate::graph::DependencyGraph;

/// Maximum number of ids sent in one batch project lookup.
const TITLE_BATCH: usize = 100;

/// Outcome of one resolution run.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Newly resolved mods, in discovery order.
    pub mods: Vec<ResolvedMod>,
    /// Every project discovered and the edges between them.
    pub graph: DependencyGraph,
}

/// Resolves requested mods and their dependencies for one target.
#[derive(Debug, Clone)]
pub struct Resolver {
    selector: VersionSelector,
}

impl Resolver {
    /// Creates a resolver around a version selector.
    #[must_use]
    pub const fn new(selector: VersionSelector) -> Self {
        Self { selector }
    }

    /// Resolves `requested` and everything they depend on.
    ///
    /// # Errors
    ///
    /// Fails as a whole, returning no partial result, when any reached
    /// project has no compatible version or the registry fails.
    pub async fn resolve(
        &self,
        loader: Loader,
        game_version: &str,
        requested: &[ProjectId],
    ) -> Result<Resolution> {
        self.resolve_from(loader, game_version, requested, &[]).await
    }

    /// Resolves `requested` on top of projects a server already has.
    ///
    /// Projects in `known` count as visited: they are never queried again
    /// and never appear in the result, whatever role they would be reached
    /// with.
    ///
    /// # Errors
    ///
    /// Fails as a whole, returning no partial result, when any reached
    /// project has no compatible version or the registry fails.
    pub async fn resolve_from(
        &self,
        loader: Loader,
        game_version: &str,
        requested: &[ProjectId],
        known: &[ProjectId],
    ) -> Result<Resolution> {
        let mut graph = DependencyGraph::new();
        let mut visited: HashSet<ProjectId> = known.iter().cloned().collect();
        let mut selected: Vec<(ProjectId, VersionInfo, Role)> = Vec::new();
        let mut worklist: VecDeque<(ProjectId, Role)> = requested
            .iter()
            .map(|id| (id.clone(), Role::Requested))
            .collect();

        while let Some((project, role)) = worklist.pop_front() {
            if visited.contains(&project) {
                continue;
            }
            let version = match self.selector.select(&project, loader, game_version).await {
                Ok(version) => version,
                Err(ModdockError::NoCompatibleVersion {
                    project: name,
                    loader,
                    game_version,
                    ..
                }) => {
                    return Err(ModdockError::NoCompatibleVersion {
                        required_by: graph
                            .dependents_of(&project)
                            .iter()
                            .map(ToString::to_string)
                            .collect(),
                        project: name,
                        loader,
                        game_version,
                    });
                }
                Err(e) => return Err(e),
            };
            let _ = visited.insert(project.clone());
            let _ = graph.add_project(&project);

            let mut edges: Vec<(ProjectId, DependencyType)> = Vec::new();
            let mut pinned: Vec<(VersionId, DependencyType)> = Vec::new();
            for dep in &version.dependencies {
                if !matches!(
                    dep.dependency_type,
                    DependencyType::Required | DependencyType::Optional
                ) {
                    continue;
                }
                match (&dep.project_id, &dep.version_id) {
                    (Some(dep_id), _) => edges.push((dep_id.clone(), dep.dependency_type)),
                    (None, Some(version_id)) => pinned.push((version_id.clone(), dep.dependency_type)),
                    (None, None) => tracing::warn!(
                        project = %project,
                        "skipping dependency declared without a project or version"
                    ),
                }
            }
            edges.extend(self.pinned_projects(&project, pinned).await?);

            for (dep_id, kind) in edges {
                let dep_role = if kind == DependencyType::Required {
                    Role::RequiredDependency
                } else {
                    Role::OptionalDependency
                };
                graph.add_dependency(&project, &dep_id, kind);
                if !visited.contains(&dep_id) {
                    worklist.push_back((dep_id, dep_role));
                }
            }
            selected.push((project, version, role));
        }

        let titles = self.titles(&selected).await?;
        let mods = selected
            .into_iter()
            .map(|(project, version, role)| ResolvedMod {
                title: titles
                    .get(&project)
                    .cloned()
                    .unwrap_or_else(|| project.to_string()),
                project_id: project,
                version_id: version.id,
                version_name: version.name,
                game_versions: version.game_versions,
                download_url: version.download_url,
                role,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            %loader,
            game_version,
            requested = requested.len(),
            resolved = mods.len(),
            cyclic = graph.has_cycle(),
            "dependency resolution complete"
        );
        Ok(Resolution { mods, graph })
    }

    /// Maps dependencies declared by version id to the projects owning those
    /// versions, in one registry call.
    ///
    /// An unknown pinned version fails the resolution when it is required
    /// and is skipped when it is optional.
    async fn pinned_projects(
        &self,
        dependent: &ProjectId,
        pinned: Vec<(VersionId, DependencyType)>,
    ) -> Result<Vec<(ProjectId, DependencyType)>> {
        if pinned.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<VersionId> = pinned.iter().map(|(id, _)| id.clone()).collect();
        let owners: HashMap<VersionId, ProjectId> = self
            .selector
            .registry()
            .versions(&ids)
            .await?
            .into_iter()
            .filter_map(|v| v.project_id.map(|project| (v.id, project)))
            .collect();

        let mut projects = Vec::with_capacity(pinned.len());
        for (version, kind) in pinned {
            match owners.get(&version) {
                Some(owner) => projects.push((owner.clone(), kind)),
                None if kind == DependencyType::Required => {
                    return Err(ModdockError::not_found("version", &version));
                }
                None => tracing::warn!(
                    project = %dependent,
                    version = %version,
                    "skipping optional dependency on an unknown version"
                ),
            }
        }
        Ok(projects)
    }

    /// Looks up display titles for every selected project.
    async fn titles(
        &self,
        selected: &[(ProjectId, VersionInfo, Role)],
    ) -> Result<HashMap<ProjectId, String>> {
        let ids: Vec<ProjectId> = selected.iter().map(|(id, _, _)| id.clone()).collect();
        let mut titles = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(TITLE_BATCH) {
            for project in self.selector.registry().projects(chunk).await? {
                let _ = titles.insert(project.id, project.title);
            }
        }
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use moddock_common::config::SelectionPolicy;
    use moddock_common::error::ErrorKind;
    use moddock_registry::client::ensure_all_found;
    use moddock_registry::{Collection, Dependency, ModRegistry, Project, Version, VersionFile};

    use super::*;

    /// In-memory registry: every project has at most one version.
    #[derive(Default)]
    struct FakeRegistry {
        projects: HashMap<ProjectId, (Vec<String>, Vec<Dependency>)>,
        version_queries: AtomicUsize,
    }

    impl FakeRegistry {
        fn with(mut self, id: &str, loaders: &[&str], deps: Vec<Dependency>) -> Self {
            let loaders = loaders.iter().map(ToString::to_string).collect();
            let _ = self.projects.insert(ProjectId::new(id), (loaders, deps));
            self
        }

        fn fabric(self, id: &str, deps: Vec<Dependency>) -> Self {
            self.with(id, &["fabric"], deps)
        }

        fn queries(&self) -> usize {
            self.version_queries.load(Ordering::SeqCst)
        }

        fn version_of(&self, id: &ProjectId, game_versions: &[String]) -> Option<Version> {
            let (loaders, deps) = self.projects.get(id)?;
            Some(Version {
                id: VersionId::new(format!("{id}-v1")),
                project_id: Some(id.clone()),
                name: format!("{id} 1.0"),
                loaders: loaders.clone(),
                game_versions: game_versions.to_vec(),
                dependencies: deps.clone(),
                files: vec![VersionFile {
                    url: format!("https://cdn.example/{id}.jar"),
                    filename: None,
                    primary: true,
                }],
                date_published: None,
            })
        }
    }

    #[async_trait]
    impl ModRegistry for FakeRegistry {
        async fn projects(&self, ids: &[ProjectId]) -> Result<Vec<Project>> {
            let found: Vec<Project> = ids
                .iter()
                .filter(|id| self.projects.contains_key(*id))
                .map(|id| Project {
                    id: id.clone(),
                    title: format!("Title {id}"),
                    project_type: "mod".into(),
                })
                .collect();
            ensure_all_found(ids, &found)?;
            Ok(found)
        }

        async fn project_versions(
            &self,
            id: &ProjectId,
            game_versions: &[String],
        ) -> Result<Vec<Version>> {
            let _ = self.version_queries.fetch_add(1, Ordering::SeqCst);
            self.version_of(id, game_versions)
                .map(|v| vec![v])
                .ok_or_else(|| ModdockError::not_found("project", id))
        }

        async fn versions(&self, ids: &[VersionId]) -> Result<Vec<Version>> {
            Ok(ids
                .iter()
                .filter_map(|v| v.as_str().strip_suffix("-v1"))
                .filter_map(|p| self.version_of(&ProjectId::new(p), &["1.19.2".to_string()]))
                .collect())
        }

        async fn collection(&self, id: &str) -> Result<Collection> {
            Err(ModdockError::not_found("collection", id))
        }
    }

    fn resolver(registry: &Arc<FakeRegistry>) -> Resolver {
        let registry: Arc<dyn ModRegistry> = registry.clone();
        Resolver::new(VersionSelector::new(registry, SelectionPolicy::RegistryOrder))
    }

    fn ids(list: &[&str]) -> Vec<ProjectId> {
        list.iter().map(|s| ProjectId::new(*s)).collect()
    }

    fn req(id: &str) -> Dependency {
        Dependency::on(id, DependencyType::Required)
    }

    fn opt(id: &str) -> Dependency {
        Dependency::on(id, DependencyType::Optional)
    }

    fn roles(resolution: &Resolution) -> Vec<(String, Role)> {
        resolution
            .mods
            .iter()
            .map(|m| (m.project_id.to_string(), m.role))
            .collect()
    }

    #[tokio::test]
    async fn mod_without_dependencies_resolves_alone() {
        let registry = Arc::new(FakeRegistry::default().fabric("a", vec![]));
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a"]))
            .await
            .expect("resolve");
        assert_eq!(roles(&resolution), vec![("a".into(), Role::Requested)]);
        assert_eq!(resolution.mods[0].title, "Title a");
    }

    #[tokio::test]
    async fn required_and_optional_dependencies_get_their_roles() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![req("b"), opt("c")])
                .fabric("b", vec![])
                .fabric("c", vec![]),
        );
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a"]))
            .await
            .expect("resolve");

        assert_eq!(
            roles(&resolution),
            vec![
                ("a".into(), Role::Requested),
                ("b".into(), Role::RequiredDependency),
                ("c".into(), Role::OptionalDependency),
            ]
        );
        for m in &resolution.mods {
            assert_eq!(m.version_id.as_str(), format!("{}-v1", m.project_id));
            assert!(m.download_url.ends_with(".jar"));
        }
    }

    #[tokio::test]
    async fn mutual_requirement_terminates_with_both_mods() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("x", vec![req("y")])
                .fabric("y", vec![req("x")]),
        );
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["x"]))
            .await
            .expect("resolve");
        assert_eq!(
            roles(&resolution),
            vec![
                ("x".into(), Role::Requested),
                ("y".into(), Role::RequiredDependency)
            ]
        );
        assert!(resolution.graph.has_cycle());
        assert_eq!(registry.queries(), 2);
    }

    #[tokio::test]
    async fn missing_transitive_version_aborts_everything() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![req("b")])
                .fabric("b", vec![req("paper-lib")])
                .with("paper-lib", &["paper"], vec![]),
        );
        let err = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let msg = err.to_string();
        assert!(msg.contains("paper-lib"), "got: {msg}");
        assert!(msg.ends_with("(required by b)"), "got: {msg}");
    }

    #[tokio::test]
    async fn requested_mod_without_version_names_no_dependent() {
        let registry = Arc::new(FakeRegistry::default().with("p", &["paper"], vec![]));
        let err = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["p"]))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("required by"), "got: {err}");
    }

    #[tokio::test]
    async fn first_seen_role_wins() {
        // `b` is requested directly and also optional for `a`.
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![opt("b"), req("c")])
                .fabric("b", vec![])
                .fabric("c", vec![opt("b")]),
        );
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a", "b"]))
            .await
            .expect("resolve");
        let b = resolution
            .mods
            .iter()
            .find(|m| m.project_id.as_str() == "b")
            .expect("b");
        assert_eq!(b.role, Role::Requested);
        assert_eq!(resolution.mods.len(), 3);
    }

    #[tokio::test]
    async fn known_projects_are_not_queried_again() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![req("lib")])
                .fabric("lib", vec![])
                .fabric("new", vec![req("lib")]),
        );
        let resolution = resolver(&registry)
            .resolve_from(
                Loader::Fabric,
                "1.20.1",
                &ids(&["a", "new"]),
                &ids(&["a", "lib"]),
            )
            .await
            .expect("resolve");
        assert_eq!(roles(&resolution), vec![("new".into(), Role::Requested)]);
        assert_eq!(registry.queries(), 1);
    }

    #[tokio::test]
    async fn incompatible_and_embedded_dependencies_are_ignored() {
        let registry = Arc::new(FakeRegistry::default().fabric(
            "a",
            vec![
                Dependency::on("bad", DependencyType::Incompatible),
                Dependency::on("inside", DependencyType::Embedded),
            ],
        ));
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a"]))
            .await
            .expect("resolve");
        assert_eq!(roles(&resolution), vec![("a".into(), Role::Requested)]);
        assert_eq!(registry.queries(), 1);
    }

    fn pinned(version: &str, dependency_type: DependencyType) -> Dependency {
        Dependency {
            project_id: None,
            version_id: Some(VersionId::new(version)),
            dependency_type,
        }
    }

    #[tokio::test]
    async fn dependency_pinned_by_version_resolves_its_project() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![pinned("lib-v1", DependencyType::Required)])
                .fabric("lib", vec![]),
        );
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a"]))
            .await
            .expect("resolve");
        assert_eq!(
            roles(&resolution),
            vec![
                ("a".into(), Role::Requested),
                ("lib".into(), Role::RequiredDependency)
            ]
        );
        let lib = &resolution.mods[1];
        assert_eq!(lib.game_versions, vec!["1.20.1"]);
        assert_eq!(resolution.graph.dependents_of(&ProjectId::new("lib")), ids(&["a"]));
    }

    #[tokio::test]
    async fn pinned_dependency_on_known_project_is_not_queried_again() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![pinned("lib-v1", DependencyType::Optional)])
                .fabric("lib", vec![]),
        );
        let resolution = resolver(&registry)
            .resolve_from(Loader::Fabric, "1.20.1", &ids(&["a"]), &ids(&["lib"]))
            .await
            .expect("resolve");
        assert_eq!(roles(&resolution), vec![("a".into(), Role::Requested)]);
        assert_eq!(registry.queries(), 1);
    }

    #[tokio::test]
    async fn unknown_pinned_version_fails_only_when_required() {
        let registry = Arc::new(
            FakeRegistry::default()
                .fabric("a", vec![pinned("gone-v9", DependencyType::Optional)])
                .fabric("b", vec![pinned("gone-v9", DependencyType::Required)]),
        );
        let resolution = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["a"]))
            .await
            .expect("optional pin is skipped");
        assert_eq!(roles(&resolution), vec![("a".into(), Role::Requested)]);

        let err = resolver(&registry)
            .resolve(Loader::Fabric, "1.20.1", &ids(&["b"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("gone-v9"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_request_resolves_to_nothing() {
        let registry = Arc::new(FakeRegistry::default());
        let resolution = resolver(&registry)
            .resolve(Loader::Paper, "1.20.1", &[])
            .await
            .expect("resolve");
        assert!(resolution.mods.is_empty());
        assert!(resolution.graph.is_empty());
    }
}

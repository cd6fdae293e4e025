//! Dependency graph management using `petgraph`.
//!
//! Every project discovered during resolution gets one node, indexed by its
//! project id. Edges point from the dependent to the dependency and carry the
//! declared dependency type. Cycles are legal: two mods may require each
//! other.

use std::collections::HashMap;

use moddock_common::types::ProjectId;
use moddock_registry::DependencyType;
use petgraph::Direction;
use petgraph::graph::NodeIndex;

/// Arena of discovered projects and the dependencies between them.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<ProjectId, DependencyType>,
    /// Node lookup by project id.
    index: HashMap<ProjectId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project node, returning the existing node if already present.
    pub fn add_project(&mut self, id: &ProjectId) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        let _ = self.index.insert(id.clone(), idx);
        idx
    }

    /// Records that `dependent` declares `dependency` with the given type.
    ///
    /// Both nodes are created if missing; a repeated declaration is ignored.
    pub fn add_dependency(
        &mut self,
        dependent: &ProjectId,
        dependency: &ProjectId,
        kind: DependencyType,
    ) {
        let from = self.add_project(dependent);
        let to = self.add_project(dependency);
        if self.graph.find_edge(from, to).is_none() {
            let _ = self.graph.add_edge(from, to, kind);
        }
    }

    /// Whether a project has been discovered.
    #[must_use]
    pub fn contains(&self, id: &ProjectId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of discovered projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether no project has been discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Projects that declare a dependency on `id`, sorted.
    #[must_use]
    pub fn dependents_of(&self, id: &ProjectId) -> Vec<ProjectId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut dependents: Vec<ProjectId> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        dependents.sort();
        dependents
    }

    /// Whether any dependency cycle exists.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}

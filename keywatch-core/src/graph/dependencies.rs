//! Computed Dependency Graph
//!
//! Records which keypaths every computed property reads from, so that a
//! binding which would feed back into itself is rejected before it is wired.
//!
//! # Edges
//!
//! Keypaths are hierarchical. Writing `stats.total` also changes `stats`, and
//! writing `stats` can change `stats.total`. A computed target therefore
//! affects every computed property with a dependency *related* to it (equal,
//! ancestor, or descendant), not only those naming it exactly:
//!
//! ```text
//! computed("summary", ["stats"])        stats.total ──> summary
//! computed("stats.total", ["stats.a"])
//! ```
//!
//! A new binding is accepted only if, after adding it, its target cannot reach
//! itself through these edges.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::Node;
use crate::error::{ObserveError, Result};
use crate::keypath;

/// Dependency graph of the computed properties of one model.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// All nodes in the graph, indexed by keypath.
    nodes: IndexMap<String, Node>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_computed(&self, path: &str) -> bool {
        self.nodes.get(path).is_some_and(Node::is_computed)
    }

    /// Register a computed property.
    ///
    /// Fails without modifying the graph if `target` is already computed or
    /// the binding would close a cycle.
    pub fn bind(&mut self, target: &str, dependencies: &[String]) -> Result<()> {
        if self.is_computed(target) {
            return Err(ObserveError::ComputedExists(target.to_string()));
        }

        let snapshot = self.nodes.clone();

        self.nodes
            .entry(target.to_string())
            .or_insert_with(|| Node::source(target))
            .mark_computed();
        for dependency in dependencies {
            self.add_edge(dependency, target);
        }

        if self.reaches_itself(target) {
            self.nodes = snapshot;
            tracing::warn!(computed = target, ?dependencies, "rejected cyclic computed binding");
            return Err(ObserveError::CyclicDependency {
                path: target.to_string(),
            });
        }
        Ok(())
    }

    /// Undo a successful [`bind`](Self::bind) of `target`.
    ///
    /// The target stays in the graph as a plain source while other computed
    /// properties still read from it. Unknown or non-computed targets are
    /// ignored.
    pub fn unbind(&mut self, target: &str) {
        let Some(node) = self.nodes.get_mut(target) else {
            return;
        };
        if !node.is_computed() {
            return;
        }
        let dependencies = node.dependencies().clone();
        node.demote();

        for dependency in &dependencies {
            if let Some(node) = self.nodes.get_mut(dependency) {
                node.remove_dependent(target);
            }
        }
        self.nodes
            .retain(|_, node| node.is_computed() || !node.dependents().is_empty());
        tracing::debug!(computed = target, "unbound computed property");
    }

    /// Add a dependency edge: `dependent` is computed from `dependency`.
    fn add_edge(&mut self, dependency: &str, dependent: &str) {
        self.nodes
            .entry(dependency.to_string())
            .or_insert_with(|| Node::source(dependency))
            .add_dependent(dependent);
        if let Some(node) = self.nodes.get_mut(dependent) {
            node.add_dependency(dependency);
        }
    }

    /// Computed targets that must be recomputed when `path` is written: the
    /// dependents of every node related to `path`.
    pub fn affected_by(&self, path: &str) -> Vec<String> {
        let mut affected = Vec::new();
        for node in self.nodes.values() {
            if !keypath::is_related(node.path(), path) {
                continue;
            }
            for dependent in node.dependents() {
                if !affected.contains(dependent) {
                    affected.push(dependent.clone());
                }
            }
        }
        affected
    }

    /// BFS over "writing X recomputes Y" edges, starting at `target`.
    fn reaches_itself(&self, target: &str) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = self.affected_by(target).into();

        while let Some(path) = queue.pop_front() {
            if path == target {
                return true;
            }
            if !visited.insert(path.clone()) {
                continue;
            }
            queue.extend(self.affected_by(&path));
        }
        false
    }

    /// Computed targets ordered so that every computed property comes after
    /// the computed properties it reads from.
    pub fn evaluation_order(&self) -> Vec<String> {
        let computed: Vec<&str> = self
            .nodes
            .values()
            .filter(|node| node.is_computed())
            .map(Node::path)
            .collect();

        let mut edges: HashMap<&str, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> =
            computed.iter().map(|path| (path.to_string(), 0)).collect();

        for &path in &computed {
            let successors: Vec<String> = self
                .affected_by(path)
                .into_iter()
                .filter(|next| next != path)
                .collect();
            for next in &successors {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree += 1;
                }
            }
            edges.insert(path, successors);
        }

        // Kahn's algorithm, seeded in registration order
        let mut queue: VecDeque<String> = computed
            .iter()
            .filter(|path| in_degree.get(**path) == Some(&0))
            .map(|path| path.to_string())
            .collect();
        let mut result = Vec::new();

        while let Some(path) = queue.pop_front() {
            if let Some(successors) = edges.get(path.as_str()) {
                for next in successors {
                    if let Some(degree) = in_degree.get_mut(next) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(next.clone());
                        }
                    }
                }
            }
            result.push(path);
        }

        result
    }
}

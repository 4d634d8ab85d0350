//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use indexmap::IndexSet;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain keypath that some computed property reads from.
    Source,

    /// The target keypath of a computed property.
    Computed,
}

/// A keypath in the dependency graph.
#[derive(Debug, Clone)]
pub struct Node {
    path: String,

    kind: NodeKind,

    /// Keypaths this node is computed from, in declared order.
    dependencies: IndexSet<String>,

    /// Computed keypaths that read from this node.
    dependents: IndexSet<String>,
}

impl Node {
    pub fn new(path: &str, kind: NodeKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    pub fn source(path: &str) -> Self {
        Self::new(path, NodeKind::Source)
    }

    pub fn computed(path: &str) -> Self {
        Self::new(path, NodeKind::Computed)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_computed(&self) -> bool {
        self.kind == NodeKind::Computed
    }

    /// Promote a source node once a computed property targets it.
    pub fn mark_computed(&mut self) {
        self.kind = NodeKind::Computed;
    }

    /// Turn a computed node back into a plain source, forgetting what it was
    /// computed from.
    pub fn demote(&mut self) {
        self.kind = NodeKind::Source;
        self.dependencies.clear();
    }

    pub fn add_dependency(&mut self, path: &str) {
        self.dependencies.insert(path.to_string());
    }

    pub fn dependencies(&self) -> &IndexSet<String> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, path: &str) {
        self.dependents.insert(path.to_string());
    }

    pub fn remove_dependent(&mut self, path: &str) -> bool {
        self.dependents.shift_remove(path)
    }

    pub fn dependents(&self) -> &IndexSet<String> {
        &self.dependents
    }
}

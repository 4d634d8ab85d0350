//! Dependency Graph
//!
//! This module tracks the relationships between computed properties and the
//! keypaths they read from.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are keypaths, either plain sources or computed targets
//! - Edges represent dependencies: if computed `C` reads `P`, there is an
//!   edge from `P` to `C`
//!
//! Notification itself runs through path observers; the graph exists so a
//! model can refuse bindings that would recompute forever and can report the
//! order computed properties settle in.

mod dependencies;
mod node;

pub use dependencies::DependencyGraph;
pub use node::{Node, NodeKind};

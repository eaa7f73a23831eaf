//! Validated dependency graph produced by the [GraphResolver](crate::resolver::GraphResolver).

use crate::binding::{Binding, BindingId};
use crate::node::{DependencyNode, Injection, NodeId};
use crate::setup::{Accumulator, Hints, RootKind};
use crate::types::Location;

/// Edge between a requesting node and the node satisfying one of its slots.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Dependency {
    /// The requesting node.
    pub target: NodeId,
    pub slot: usize,
    pub injection: Injection,
    /// The node satisfying the request.
    pub source: NodeId,
}

/// Resolved composition root.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Root {
    pub name: String,
    pub node: NodeId,
    pub injection: Injection,
    /// Declaration order among roots.
    pub index: usize,
    pub kind: RootKind,
    pub location: Location,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    pub(crate) name: String,
    pub(crate) nodes: Vec<DependencyNode>,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) dependencies: Vec<Vec<Dependency>>,
    pub(crate) dependents: Vec<Vec<Dependency>>,
    pub(crate) roots: Vec<Root>,
    pub(crate) hints: Hints,
    pub(crate) accumulators: Vec<Accumulator>,
}

impl DependencyGraph {
    /// Name of the compiled setup.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    /// All nodes, including unselected variants.
    #[inline]
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    #[inline]
    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0]
    }

    /// Resolved dependencies of a node in slot order. Unresolved optional slots are absent.
    #[inline]
    pub fn dependencies(&self, id: NodeId) -> &[Dependency] {
        &self.dependencies[id.0]
    }

    /// Edges pointing at given node.
    #[inline]
    pub fn dependents(&self, id: NodeId) -> &[Dependency] {
        &self.dependents[id.0]
    }

    #[inline]
    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    #[inline]
    pub fn hints(&self) -> &Hints {
        &self.hints
    }

    #[inline]
    pub fn accumulators(&self) -> &[Accumulator] {
        &self.accumulators
    }
}

//! Resolution of node injections into graph edges. Resolution starts at the composition roots and
//! proceeds as a deterministic worklist, so bindings no root reaches are never validated.

mod cycle;

use crate::binding::{BindingId, ConstructKind, Implementation};
use crate::binding_registry::BindingRegistry;
use crate::error::CompileError;
use crate::fallback::FallbackChain;
use crate::graph::{Dependency, DependencyGraph, Root};
use crate::node::{DependencyNode, Injection, NodeId, NodeKind};
use crate::node_builder::DependencyNodeBuilder;
use crate::oracle::{is_open, TypeOracle};
use crate::setup::Setup;
use crate::types::{Substitution, TypeRef};
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Outcome of resolving a single injection.
enum Resolution {
    Resolved(NodeId),
    /// The satisfying binding failed to build - its errors are already reported.
    Failed,
    Missing,
}

/// Turns canonical bindings into a validated [DependencyGraph].
pub struct GraphResolver<'a> {
    oracle: &'a dyn TypeOracle,
    registry: BindingRegistry,
    builder: DependencyNodeBuilder,
    fallbacks: FallbackChain,
    nodes: Vec<DependencyNode>,
    selected: FxHashMap<BindingId, Option<NodeId>>,
    dependencies: FxHashMap<NodeId, Vec<Dependency>>,
    errors: Vec<CompileError>,
}

impl<'a> GraphResolver<'a> {
    pub fn new(
        registry: BindingRegistry,
        builder: DependencyNodeBuilder,
        fallbacks: FallbackChain,
        oracle: &'a dyn TypeOracle,
    ) -> Self {
        Self {
            oracle,
            registry,
            builder,
            fallbacks,
            nodes: vec![],
            selected: Default::default(),
            dependencies: Default::default(),
            errors: vec![],
        }
    }

    /// Resolves every root of the setup. All errors found are returned together.
    pub fn resolve(mut self, setup: &Setup) -> Result<DependencyGraph, Vec<CompileError>> {
        let mut roots = vec![];
        let mut pending = VecDeque::new();

        for (index, root) in setup.roots.iter().enumerate() {
            let injection = Injection::new(root.ty.clone(), root.tag.clone());
            match self.resolve_injection(&injection, false) {
                Resolution::Resolved(node) => {
                    pending.push_back(node);
                    roots.push(Root {
                        name: root.name.clone(),
                        node,
                        injection,
                        index,
                        kind: root.kind,
                        location: root.location.clone(),
                    });
                }
                Resolution::Failed => {}
                Resolution::Missing => self.errors.push(CompileError::MissingBinding {
                    injection,
                    requester: format!("the composition root {}", root.name),
                    location: root.location.clone(),
                }),
            }
        }

        let mut processed = FxHashSet::default();
        while let Some(node) = pending.pop_front() {
            if processed.insert(node) {
                let dependencies = self.resolve_node(node);
                pending.extend(dependencies.iter().map(|dependency| dependency.source));
                self.dependencies.insert(node, dependencies);
            }
        }

        debug!(
            "Resolved {} root(s) of {} using {} node(s).",
            roots.len(),
            setup.name,
            processed.len()
        );

        let (graph, mut errors) = self.into_graph(setup, roots);
        errors.extend(cycle::find_cycles(&graph));

        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(errors)
        }
    }

    fn into_graph(mut self, setup: &Setup, roots: Vec<Root>) -> (DependencyGraph, Vec<CompileError>) {
        let mut dependencies = vec![vec![]; self.nodes.len()];
        let mut dependents = vec![vec![]; self.nodes.len()];

        for (node, node_dependencies) in self.dependencies.drain().sorted_by_key(|(node, _)| *node) {
            for dependency in &node_dependencies {
                dependents[dependency.source.0].push(dependency.clone());
            }

            dependencies[node.0] = node_dependencies;
        }

        for node_dependents in &mut dependents {
            node_dependents.sort_by_key(|dependency: &Dependency| (dependency.target, dependency.slot));
        }

        (
            DependencyGraph {
                name: setup.name.clone(),
                nodes: self.nodes,
                bindings: self.registry.bindings().to_vec(),
                dependencies,
                dependents,
                roots,
                hints: setup.hints.clone(),
                accumulators: setup.accumulators.clone(),
            },
            self.errors,
        )
    }

    fn resolve_node(&mut self, id: NodeId) -> Vec<Dependency> {
        let node = self.nodes[id.0].clone();
        let mut dependencies = vec![];

        for slot in node.slots() {
            let resolution = match slot.pinned {
                Some(binding) => self.select(binding),
                None => self.resolve_injection(slot.injection, slot.is_optional),
            };

            match resolution {
                Resolution::Resolved(source) => {
                    trace!(
                        "{} slot {} resolved as {}.",
                        node,
                        slot.index,
                        self.nodes[source.0]
                    );

                    dependencies.push(Dependency {
                        target: id,
                        slot: slot.index,
                        injection: slot.injection.clone(),
                        source,
                    });
                }
                Resolution::Failed => {}
                Resolution::Missing if slot.is_optional => {
                    trace!("{} slot {} left to its default value.", node, slot.index);
                }
                Resolution::Missing => self.errors.push(CompileError::MissingBinding {
                    injection: slot.injection.clone(),
                    requester: node.to_string(),
                    location: node.location.clone(),
                }),
            }
        }

        dependencies
    }

    /// Finds a node for the injection: a matching binding, then the fallback chain and finally an
    /// `OnCannotResolve` construct. Optional requests never use fallbacks, since their default
    /// value takes precedence.
    fn resolve_injection(&mut self, injection: &Injection, optional: bool) -> Resolution {
        if let Some(binding) = self.find_binding(injection, false) {
            return self.select(binding);
        }

        if optional {
            return Resolution::Missing;
        }

        if let Some(handler) = self.fallbacks.find(injection, self.oracle).cloned() {
            let binding = self.registry.fallback_binding(&handler, injection);
            return self.select(binding);
        }

        match self.find_binding(injection, true) {
            Some(binding) => self.select(binding),
            None => Resolution::Missing,
        }
    }

    fn find_binding(&mut self, injection: &Injection, on_cannot_resolve: bool) -> Option<BindingId> {
        let (binding, substitution) =
            Self::best_match(&self.registry, self.oracle, injection, on_cannot_resolve)?;

        if self.registry.is_generic(binding, self.oracle) {
            Some(self.registry.specialize(binding, &substitution))
        } else {
            Some(binding)
        }
    }

    /// Picks the best declared binding: specific tag, then wildcard, then untagged default; exact
    /// contracts beat generic ones and the last registered binding wins among equals.
    fn best_match(
        registry: &BindingRegistry,
        oracle: &dyn TypeOracle,
        injection: &Injection,
        on_cannot_resolve: bool,
    ) -> Option<(BindingId, Substitution)> {
        registry
            .declared_bindings()
            .iter()
            .filter(|binding| {
                matches!(
                    binding.implementation,
                    Implementation::Construct(ConstructKind::OnCannotResolve)
                ) == on_cannot_resolve
            })
            .filter_map(|binding| {
                let rank = binding.tag_rank(&injection.tag)?;
                let generic = is_open(oracle, &binding.contract);
                let substitution = Self::match_contract(oracle, &binding.contract, &injection.ty, generic)?;
                Some((rank, generic, binding.id, substitution))
            })
            .min_by_key(|(rank, generic, id, _)| (*rank, *generic, Reverse(*id)))
            .map(|(_, _, id, substitution)| (id, substitution))
    }

    fn match_contract(
        oracle: &dyn TypeOracle,
        contract: &TypeRef,
        requested: &TypeRef,
        generic: bool,
    ) -> Option<Substitution> {
        if contract == requested {
            Some(Default::default())
        } else if generic {
            oracle.unify(contract, requested)
        } else {
            None
        }
    }

    /// Checks if an injection has any candidate, without building or specializing anything.
    fn can_resolve(
        registry: &BindingRegistry,
        fallbacks: &FallbackChain,
        oracle: &dyn TypeOracle,
        injection: &Injection,
    ) -> bool {
        Self::best_match(registry, oracle, injection, false).is_some()
            || fallbacks.find(injection, oracle).is_some()
            || Self::best_match(registry, oracle, injection, true).is_some()
    }

    /// Returns the selected variant of a binding, building its nodes on first use.
    fn select(&mut self, binding: BindingId) -> Resolution {
        if let Some(selected) = self.selected.get(&binding) {
            return match selected {
                Some(node) => Resolution::Resolved(*node),
                None => Resolution::Failed,
            };
        }

        let selected = self.build_and_select(binding);
        self.selected.insert(binding, selected);

        match selected {
            Some(node) => Resolution::Resolved(node),
            None => Resolution::Failed,
        }
    }

    fn build_and_select(&mut self, binding: BindingId) -> Option<NodeId> {
        let first_id = NodeId(self.nodes.len());
        let registry = &self.registry;
        let fallbacks = &self.fallbacks;
        let oracle = self.oracle;
        let can_resolve =
            |injection: &Injection| Self::can_resolve(registry, fallbacks, oracle, injection);

        let mut nodes = match self
            .builder
            .build(registry.binding(binding), first_id, &can_resolve)
        {
            Ok(nodes) => nodes,
            Err(mut errors) => {
                self.errors.append(&mut errors);
                return None;
            }
        };

        for node in &mut nodes {
            self.collect_items(node);
        }

        let selected = nodes
            .iter()
            .find(|node| {
                node.slots().iter().all(|slot| {
                    slot.is_optional
                        || slot.pinned.is_some()
                        || Self::can_resolve(&self.registry, &self.fallbacks, self.oracle, slot.injection)
                })
            })
            .or_else(|| nodes.first())
            .map(|node| node.id);

        if let Some(selected) = selected {
            trace!(
                "Selected variant {} of {}.",
                selected.0 - first_id.0,
                self.registry.binding(binding).contract
            );
        }

        self.nodes.append(&mut nodes);
        selected
    }

    /// Gathers collection items: every declared binding of the element type, in registration
    /// order, each pinned to its binding.
    fn collect_items(&mut self, node: &mut DependencyNode) {
        let NodeKind::Construct(construct) = &mut node.kind else {
            return;
        };

        if !construct.kind.is_collection() {
            return;
        }

        let Some(element) = construct.ty.element().cloned() else {
            return;
        };

        let candidates = self
            .registry
            .declared_bindings()
            .iter()
            .filter(|binding| !matches!(binding.implementation, Implementation::Construct(_)))
            .filter_map(|binding| {
                let generic = is_open(self.oracle, &binding.contract);
                Self::match_contract(self.oracle, &binding.contract, &element, generic)
                    .map(|substitution| (binding.id, generic, substitution))
            })
            .collect_vec();

        let mut items = vec![];
        for (binding, generic, substitution) in candidates {
            let binding = if generic {
                self.registry.specialize(binding, &substitution)
            } else {
                binding
            };

            let tag = self
                .registry
                .binding(binding)
                .tags
                .first()
                .cloned()
                .unwrap_or_default();
            items.push((Injection::new(element.clone(), tag), binding));
        }

        trace!("Collected {} item(s) for {}.", items.len(), construct.ty);
        construct.items = items;
    }
}

//! Traversal of a validated graph into ordered instantiation blocks.
//!
//! Each root is walked with two stacks: the outer one holds block roots, the inner one walks the
//! subgraph of the current block up to the next block root boundary. Variables are created
//! according to the lifetime of their nodes:
//!
//! * args are cached for the whole composition,
//! * singletons own a single storage variable per composition; the first use within each root roots
//!   a block, later uses link to the storage,
//! * scoped and per-resolve instances own a single variable per root, scoped ones rooting a block,
//! * transient and per-block instances are created per use, unless used more than once - then
//!   they are hoisted to a block root shared by the whole block which discovered them.

use crate::binding::ConstructKind;
use crate::cancellation::CancellationToken;
use crate::error::CompileError;
use crate::graph::{DependencyGraph, Root};
use crate::node::{Injection, NodeId};
use crate::types::Lifetime;
use crate::variable::{Argument, Block, Instantiation, RootPlan, VariableArena, VariableId, VariableKey};
use fxhash::FxHashMap;
use itertools::Itertools;
use tracing::{debug, trace};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Placement {
    /// Created within the current block.
    Inline,
    /// Created by its own block.
    BlockRoot,
    /// Refers to an already scheduled variable.
    Reference,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Mark {
    New,
    Visiting,
    Done,
}

pub struct CodeGraphWalker<'a> {
    graph: &'a DependencyGraph,
    cancellation: CancellationToken,
}

impl<'a> CodeGraphWalker<'a> {
    pub fn new(graph: &'a DependencyGraph, cancellation: CancellationToken) -> Self {
        Self {
            graph,
            cancellation,
        }
    }

    /// Builds plans for all roots in declaration order. On failure the arena is restored to its
    /// state from before the call.
    pub fn visit(&self, arena: &mut VariableArena) -> Result<Vec<RootPlan>, CompileError> {
        let snapshot = arena.clone();

        let result = self
            .graph
            .roots()
            .iter()
            .map(|root| self.visit_root(root, arena))
            .collect::<Result<Vec<_>, _>>();

        if result.is_err() {
            debug!("Walking {} failed, restoring variables.", self.graph.name());
            *arena = snapshot;
        }

        result
    }

    #[inline]
    fn check(&self) -> Result<(), CompileError> {
        self.cancellation.check(self.graph.name())
    }

    fn visit_root(&self, root: &Root, arena: &mut VariableArena) -> Result<RootPlan, CompileError> {
        self.check()?;

        let (variable, _) = self.create_variable(arena, root.node, root.injection.clone(), None);
        let root_variable = arena.variable_mut(variable);
        root_variable.is_block_root = true;
        root_variable.is_created = true;

        let mut pending = vec![variable];
        let mut blocks = vec![];
        let mut deferred_targets = FxHashMap::default();
        while let Some(block_root) = pending.pop() {
            self.check()?;
            blocks.push(self.visit_block(
                arena,
                block_root,
                &mut pending,
                &mut deferred_targets,
            )?);
        }

        let blocks = Self::order_blocks(arena, blocks);

        debug!(
            "Root {} of {} requires {} block(s).",
            root.name,
            self.graph.name(),
            blocks.len()
        );

        let graph = self.graph;
        arena.evict(|variable| {
            let node = graph.node(variable.node);
            node.lifetime == Lifetime::Singleton || node.is_arg()
        });

        Ok(RootPlan {
            name: root.name.clone(),
            variable,
            blocks,
        })
    }

    /// Walks a single block. Dependencies of deferred nodes always root their own blocks, which are
    /// shared by all deferred uses of the same node within the root, so recursion through a
    /// deferred factory terminates.
    fn visit_block(
        &self,
        arena: &mut VariableArena,
        block_root: VariableId,
        pending: &mut Vec<VariableId>,
        deferred_targets: &mut FxHashMap<NodeId, VariableId>,
    ) -> Result<Block, CompileError> {
        let mut targets = vec![block_root];
        let mut instantiations = vec![];

        while let Some(target) = targets.pop() {
            self.check()?;

            let node = self.graph.node(arena.variable(target).node);
            let mut arguments = vec![];

            for dependency in self.graph.dependencies(node.id) {
                let is_deferred_target =
                    node.is_deferred() && !self.graph.node(dependency.source).is_arg();

                let (variable, placement) = match deferred_targets.get(&dependency.source) {
                    Some(&existing) if is_deferred_target => (
                        arena.allocate(
                            dependency.source,
                            dependency.injection.clone(),
                            Some(existing),
                        ),
                        Placement::Reference,
                    ),
                    _ => self.create_variable(
                        arena,
                        dependency.source,
                        dependency.injection.clone(),
                        Some(block_root),
                    ),
                };

                let placement = if placement == Placement::Inline && is_deferred_target {
                    arena.variable_mut(variable).is_block_root = true;
                    Placement::BlockRoot
                } else {
                    placement
                };

                if is_deferred_target && placement == Placement::BlockRoot {
                    deferred_targets.insert(dependency.source, variable);
                }

                match placement {
                    Placement::Inline => {
                        self.check()?;
                        targets.push(variable);
                    }
                    Placement::BlockRoot => {
                        self.check()?;
                        pending.push(variable);
                    }
                    Placement::Reference => {}
                }

                // enumerable items are created lazily, but storage of shared instances is created
                // by its own block
                if node.construct_kind() == Some(ConstructKind::Enumerable) {
                    let source = self.graph.node(dependency.source);
                    if !source.lifetime.is_composition_wide() && !source.is_arg() {
                        arena.variable_mut(variable).is_created = false;
                    }
                }

                arguments.push(Argument {
                    slot: dependency.slot,
                    injection: dependency.injection.clone(),
                    variable,
                });
            }

            instantiations.push(Instantiation { target, arguments });
        }

        instantiations.reverse();

        trace!(
            "Block of {} has {} instantiation(s).",
            self.graph.node(arena.variable(block_root).node),
            instantiations.len()
        );

        Ok(Block {
            root: block_root,
            instantiations,
            steps: vec![],
        })
    }

    fn create_variable(
        &self,
        arena: &mut VariableArena,
        node_id: NodeId,
        injection: Injection,
        block: Option<VariableId>,
    ) -> (VariableId, Placement) {
        let node = self.graph.node(node_id);
        let key = VariableKey::Binding(node.key);

        if node.is_arg() {
            let variable = match arena.lookup(&key) {
                Some(variable) => variable,
                None => {
                    let variable = arena.allocate(node_id, injection, None);
                    arena.variable_mut(variable).is_declared = true;
                    arena.insert(key, variable);
                    variable
                }
            };

            return Self::schedule(arena, variable, Placement::Inline);
        }

        match node.lifetime {
            Lifetime::Singleton | Lifetime::Scoped => match arena.lookup(&key) {
                Some(storage) if arena.variable(storage).is_created => (
                    arena.allocate(node_id, injection, Some(storage)),
                    Placement::Reference,
                ),
                Some(storage) => {
                    arena.variable_mut(storage).is_created = true;
                    let variable = arena.allocate(node_id, injection, Some(storage));
                    Self::promote(arena, variable)
                }
                None => {
                    let variable = arena.allocate(node_id, injection, None);
                    arena.variable_mut(variable).is_declared = true;
                    arena.insert(key, variable);
                    Self::promote(arena, variable)
                }
            },
            Lifetime::PerResolve => match arena.lookup(&key) {
                Some(existing) => (
                    arena.allocate(node_id, injection, Some(existing)),
                    Placement::Reference,
                ),
                None => {
                    let variable = arena.allocate(node_id, injection, None);
                    arena.insert(key, variable);
                    if self.weight(node_id) > 1 {
                        Self::promote(arena, variable)
                    } else {
                        Self::schedule(arena, variable, Placement::Inline)
                    }
                }
            },
            Lifetime::Transient | Lifetime::PerBlock => match block {
                Some(block) if self.weight(node_id) > 1 => {
                    let hoisted = VariableKey::Hoisted {
                        binding: node.key,
                        block,
                    };

                    match arena.lookup(&hoisted) {
                        Some(existing) => (
                            arena.allocate(node_id, injection, Some(existing)),
                            Placement::Reference,
                        ),
                        None => {
                            let variable = arena.allocate(node_id, injection, None);
                            arena.insert(hoisted, variable);
                            Self::promote(arena, variable)
                        }
                    }
                }
                _ => {
                    let variable = arena.allocate(node_id, injection, None);
                    Self::schedule(arena, variable, Placement::Inline)
                }
            },
        }
    }

    fn promote(arena: &mut VariableArena, variable: VariableId) -> (VariableId, Placement) {
        arena.variable_mut(variable).is_block_root = true;
        Self::schedule(arena, variable, Placement::BlockRoot)
    }

    fn schedule(
        arena: &mut VariableArena,
        variable: VariableId,
        placement: Placement,
    ) -> (VariableId, Placement) {
        let variable_ref = arena.variable_mut(variable);
        if variable_ref.is_created {
            (variable, Placement::Reference)
        } else {
            variable_ref.is_created = true;
            (variable, placement)
        }
    }

    /// Effective number of uses of a node. Factories count twice, since they can use their
    /// dependencies more than once.
    fn weight(&self, node: NodeId) -> usize {
        self.graph
            .dependents(node)
            .iter()
            .map(|dependency| {
                if self.graph.node(dependency.target).is_factory() {
                    2
                } else {
                    1
                }
            })
            .sum()
    }

    /// Orders blocks so that every block comes after the blocks creating variables it uses. The
    /// first block is the one of the root.
    fn order_blocks(arena: &VariableArena, blocks: Vec<Block>) -> Vec<Block> {
        let mut block_of = FxHashMap::default();
        for (index, block) in blocks.iter().enumerate() {
            for instantiation in &block.instantiations {
                block_of.insert(instantiation.target, index);
                block_of
                    .entry(arena.variable(instantiation.target).storage())
                    .or_insert(index);
            }
        }

        let requires = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| {
                block
                    .instantiations
                    .iter()
                    .flat_map(|instantiation| instantiation.arguments.iter())
                    .filter_map(|argument| {
                        block_of
                            .get(&arena.variable(argument.variable).storage())
                            .copied()
                    })
                    .filter(|required| *required != index)
                    .unique()
                    .collect_vec()
            })
            .collect_vec();

        let mut marks = vec![Mark::New; blocks.len()];
        let mut order = Vec::with_capacity(blocks.len());

        for start in 0..blocks.len() {
            if marks[start] != Mark::New {
                continue;
            }

            marks[start] = Mark::Visiting;
            let mut stack = vec![(start, 0usize)];

            while let Some(&(index, next)) = stack.last() {
                match requires[index].get(next) {
                    Some(&required) => {
                        if let Some(top) = stack.last_mut() {
                            top.1 += 1;
                        }

                        if marks[required] == Mark::New {
                            marks[required] = Mark::Visiting;
                            stack.push((required, 0));
                        }
                    }
                    None => {
                        marks[index] = Mark::Done;
                        order.push(index);
                        stack.pop();
                    }
                }
            }
        }

        let mut blocks = blocks.into_iter().map(Some).collect_vec();
        order
            .into_iter()
            .filter_map(|index| blocks[index].take())
            .collect()
    }
}

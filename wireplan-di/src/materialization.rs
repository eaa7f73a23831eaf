//! Annotation of blocks with the steps the emitter has to perform around instantiations:
//! double-checked locking for composition-wide storage and feeding of accumulators.

use crate::graph::DependencyGraph;
use crate::oracle::TypeOracle;
use crate::variable::{Block, RootPlan, VariableArena, VariableId};
use itertools::Itertools;
use tracing::trace;

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum MaterializationStep {
    /// Skip the block if its storage is already created.
    CheckCreated,
    AcquireLock,
    /// Check the storage again after acquiring the lock.
    RecheckCreated,
    /// Run block instantiations.
    Construct,
    /// Add a created variable to the accumulator at given index.
    Accumulate {
        accumulator: usize,
        variable: VariableId,
    },
    /// Store the created value in its storage.
    Publish,
    ReleaseLock,
}

pub struct MaterializationPlanner<'a> {
    oracle: &'a dyn TypeOracle,
    thread_safe: bool,
}

impl<'a> MaterializationPlanner<'a> {
    pub fn new(oracle: &'a dyn TypeOracle, thread_safe: bool) -> Self {
        Self {
            oracle,
            thread_safe,
        }
    }

    pub fn annotate(&self, graph: &DependencyGraph, arena: &VariableArena, plans: &mut [RootPlan]) {
        for block in plans.iter_mut().flat_map(|plan| plan.blocks.iter_mut()) {
            block.steps = self.steps(graph, arena, block);
        }
    }

    fn steps(
        &self,
        graph: &DependencyGraph,
        arena: &VariableArena,
        block: &Block,
    ) -> Vec<MaterializationStep> {
        let accumulations = self.accumulations(graph, arena, block);
        let root_node = graph.node(arena.variable(block.root).node);
        let mut steps = vec![];

        if root_node.lifetime.is_composition_wide() && !root_node.is_arg() {
            steps.push(MaterializationStep::CheckCreated);
            if self.thread_safe {
                steps.push(MaterializationStep::AcquireLock);
                steps.push(MaterializationStep::RecheckCreated);
            }

            steps.push(MaterializationStep::Construct);
            steps.extend(accumulations);
            steps.push(MaterializationStep::Publish);

            if self.thread_safe {
                steps.push(MaterializationStep::ReleaseLock);
            }
        } else {
            steps.push(MaterializationStep::Construct);
            if !accumulations.is_empty() {
                let locked = self.thread_safe;
                if locked {
                    steps.push(MaterializationStep::AcquireLock);
                }

                steps.extend(accumulations);

                if locked {
                    steps.push(MaterializationStep::ReleaseLock);
                }
            }
        }

        trace!("Block steps: {:?}.", steps);
        steps
    }

    fn accumulations(
        &self,
        graph: &DependencyGraph,
        arena: &VariableArena,
        block: &Block,
    ) -> Vec<MaterializationStep> {
        block
            .instantiations
            .iter()
            .map(|instantiation| instantiation.target)
            .cartesian_product(graph.accumulators().iter().enumerate())
            .filter(|(variable, (_, accumulator))| {
                let node = graph.node(arena.variable(*variable).node);
                !node.is_arg()
                    && accumulator.captures_lifetime(node.lifetime)
                    && self
                        .oracle
                        .is_assignable(node.instance_type(), &accumulator.captured)
            })
            .map(|(variable, (accumulator, _))| MaterializationStep::Accumulate {
                accumulator,
                variable,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::Implementation;
    use crate::binding_registry::BindingRegistry;
    use crate::cancellation::CancellationToken;
    use crate::fallback::FallbackChain;
    use crate::materialization::{MaterializationPlanner, MaterializationStep};
    use crate::metadata::TypeDescriptor;
    use crate::node_builder::DependencyNodeBuilder;
    use crate::oracle::MockTypeOracle;
    use crate::resolver::GraphResolver;
    use crate::setup::{Accumulator, RawBinding, RootDescriptor, Setup};
    use crate::types::{Lifetime, TypeRef};
    use crate::variable::VariableArena;
    use crate::walker::CodeGraphWalker;

    fn plan_steps(lifetime: Lifetime, thread_safe: bool) -> Vec<MaterializationStep> {
        let setup = Setup::new("Composition")
            .with_binding(
                RawBinding::new(
                    [TypeRef::new("Service")],
                    Implementation::Constructor(TypeDescriptor::new(TypeRef::new("Service"))),
                )
                .with_lifetime(lifetime),
            )
            .with_accumulator(Accumulator::new(
                "disposables",
                TypeRef::new("IDisposable"),
                TypeRef::new("Owned"),
                [Lifetime::Transient],
            ))
            .with_root(RootDescriptor::new("Root", TypeRef::new("Service")));

        let mut oracle = MockTypeOracle::new();
        oracle.expect_is_marker().return_const(false);
        oracle.expect_is_assignable().return_const(true);

        let graph = GraphResolver::new(
            BindingRegistry::register(&setup, &oracle),
            DependencyNodeBuilder::default(),
            FallbackChain::default(),
            &oracle,
        )
        .resolve(&setup)
        .unwrap();

        let mut arena = VariableArena::default();
        let mut plans = CodeGraphWalker::new(&graph, CancellationToken::new())
            .visit(&mut arena)
            .unwrap();

        MaterializationPlanner::new(&oracle, thread_safe).annotate(&graph, &arena, &mut plans);
        plans[0].blocks[0].steps.clone()
    }

    #[test]
    fn should_use_double_checked_locking_for_singletons() {
        assert_eq!(
            plan_steps(Lifetime::Singleton, true),
            vec![
                MaterializationStep::CheckCreated,
                MaterializationStep::AcquireLock,
                MaterializationStep::RecheckCreated,
                MaterializationStep::Construct,
                MaterializationStep::Publish,
                MaterializationStep::ReleaseLock,
            ]
        );
    }

    #[test]
    fn should_omit_locks_without_thread_safety() {
        assert_eq!(
            plan_steps(Lifetime::Singleton, false),
            vec![
                MaterializationStep::CheckCreated,
                MaterializationStep::Construct,
                MaterializationStep::Publish,
            ]
        );
    }

    #[test]
    fn should_lock_accumulations() {
        let steps = plan_steps(Lifetime::Transient, true);

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], MaterializationStep::Construct);
        assert_eq!(steps[1], MaterializationStep::AcquireLock);
        assert!(matches!(
            steps[2],
            MaterializationStep::Accumulate { accumulator: 0, .. }
        ));
        assert_eq!(steps[3], MaterializationStep::ReleaseLock);
    }
}

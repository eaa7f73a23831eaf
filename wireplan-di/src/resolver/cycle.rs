//! Cycle detection over a resolved graph. Edges leaving a deferred factory are an indirection
//! boundary: they are not followed from the current path, but their targets are walked as new
//! starting points.

use crate::error::CompileError;
use crate::graph::DependencyGraph;
use crate::node::NodeId;
use std::collections::VecDeque;
use std::iter::once;
use tracing::trace;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Color {
    White,
    Gray,
    Black,
}

/// Returns an error for every cycle reachable from the roots.
pub(crate) fn find_cycles(graph: &DependencyGraph) -> Vec<CompileError> {
    let mut colors = vec![Color::White; graph.nodes().len()];
    let mut starts: VecDeque<NodeId> = graph.roots().iter().map(|root| root.node).collect();
    let mut errors = vec![];

    while let Some(start) = starts.pop_front() {
        if colors[start.0] != Color::White {
            continue;
        }

        colors[start.0] = Color::Gray;
        let mut stack = vec![(start, 0usize)];

        while let Some(&(node, edge)) = stack.last() {
            let dependencies = graph.dependencies(node);

            if graph.node(node).is_deferred() {
                starts.extend(dependencies.iter().map(|dependency| dependency.source));
                colors[node.0] = Color::Black;
                stack.pop();
                continue;
            }

            let Some(dependency) = dependencies.get(edge) else {
                colors[node.0] = Color::Black;
                stack.pop();
                continue;
            };

            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            match colors[dependency.source.0] {
                Color::White => {
                    colors[dependency.source.0] = Color::Gray;
                    stack.push((dependency.source, 0));
                }
                Color::Gray => {
                    let position = stack
                        .iter()
                        .position(|(id, _)| *id == dependency.source)
                        .unwrap_or_default();
                    let path = stack[position..]
                        .iter()
                        .map(|(id, _)| *id)
                        .chain(once(dependency.source))
                        .map(|id| graph.node(id).to_string())
                        .collect::<Vec<_>>();

                    trace!("Found cycle: {:?}.", path);

                    errors.push(CompileError::Cycle {
                        path,
                        location: graph.node(dependency.source).location.clone(),
                    });
                }
                Color::Black => {}
            }
        }
    }

    errors
}

//! Dependency trees, one per root task.
//!
//! A tree records every task reachable from its root through declared inputs,
//! together with the deepest level at which that task is discovered. A task
//! reached through several paths keeps the longest one, which is what the
//! scheduler needs: if `T` consumes `U`, then `U` is always discovered at least
//! one level deeper than `T`.
//!
//! Shared subtrees are not copied. Each tree is a memoized depth table computed
//! from a single depth-first walk, which also detects cycles.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::NodeIndex;

use crate::core::Kind;
use crate::engine::TaskGraph;
use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Active,
    Done,
}

/// The tasks upstream of one root, with their discovery depth.
#[derive(Debug, Clone)]
pub struct DependencyTree {
    root: String,
    /// `(task, depth)` with the root first and every task before its inputs.
    entries: Vec<(String, usize)>,
    depths: HashMap<NodeIndex, usize>,
}

impl DependencyTree {
    pub(crate) fn build(graph: &TaskGraph, root: NodeIndex) -> Result<Self, LoadError> {
        let mut state = HashMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();

        visit(graph, root, &mut state, &mut path, &mut order)?;

        // `order` is a post-order over inputs, so reversed it lists every task
        // before all of its inputs. Relaxing edges in that order yields the
        // longest path from the root to each task.
        let mut depths = HashMap::with_capacity(order.len());
        depths.insert(root, 0);

        for &index in order.iter().rev() {
            let depth = depths.get(&index).copied().unwrap_or(0);
            for input in graph.neighbors_directed(index, Direction::Incoming) {
                let entry = depths.entry(input).or_insert(0);
                *entry = (*entry).max(depth + 1);
            }
        }

        let entries = order
            .iter()
            .rev()
            .map(|index| (graph[*index].id.clone(), depths[index]))
            .collect();

        Ok(Self {
            root: graph[root].id.clone(),
            entries,
            depths,
        })
    }

    /// Identifier of the root task.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Discovery depth of a task in this tree, `None` if it is not upstream of
    /// the root.
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(task, _)| task == id)
            .map(|(_, depth)| *depth)
    }

    /// `(task, depth)` pairs, root first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(id, depth)| (id.as_str(), *depth))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest depth in the tree.
    pub fn height(&self) -> usize {
        self.depths.values().copied().max().unwrap_or(0)
    }

    pub(crate) fn depth_of(&self, index: NodeIndex) -> Option<usize> {
        self.depths.get(&index).copied()
    }
}

fn visit(
    graph: &TaskGraph,
    index: NodeIndex,
    state: &mut HashMap<NodeIndex, Visit>,
    path: &mut Vec<NodeIndex>,
    order: &mut Vec<NodeIndex>,
) -> Result<(), LoadError> {
    match state.get(&index) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::Active) => {
            let start = path.iter().position(|&n| n == index).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&n| graph[n].id.clone())
                .collect();
            cycle.push(graph[index].id.clone());
            return Err(LoadError::Cycle { path: cycle });
        }
        None => {}
    }

    state.insert(index, Visit::Active);
    path.push(index);

    for input in graph.neighbors_directed(index, Direction::Incoming) {
        visit(graph, input, state, path, order)?;
    }

    path.pop();
    state.insert(index, Visit::Done);
    order.push(index);

    Ok(())
}

/// Builds one tree per task whose kind is in `root_kinds`, in declaration order.
///
/// Tasks that nobody consumes but whose kind is not a root kind would never be
/// scheduled; they are promoted to implicit roots with a warning. A task that
/// still ends up in no tree can only lead into a cycle, which is reported with
/// its full path.
pub(crate) fn build_trees(
    graph: &TaskGraph,
    root_kinds: &[Kind],
) -> Result<Vec<DependencyTree>, LoadError> {
    let mut trees = Vec::new();

    for index in graph.node_indices() {
        if root_kinds.contains(&graph[index].spec.kind) {
            trees.push(DependencyTree::build(graph, index)?);
        }
    }

    for index in graph.node_indices() {
        let task = &graph[index];
        let is_sink = graph
            .neighbors_directed(index, Direction::Outgoing)
            .next()
            .is_none();

        if is_sink && !root_kinds.contains(&task.spec.kind) {
            tracing::warn!(
                task = %task.id,
                kind = %task.spec.kind,
                "task is not upstream of any root, scheduling it as an implicit root"
            );
            trees.push(DependencyTree::build(graph, index)?);
        }
    }

    // In an acyclic graph every task flows into a sink, and every sink now has
    // a tree. A task left out therefore leads into a cycle, and the walk from
    // any node on that cycle reports its path.
    let is_stray = |trees: &[DependencyTree], index: NodeIndex| {
        trees.iter().all(|tree| tree.depth_of(index).is_none())
    };

    let cycle = graph
        .node_indices()
        .any(|index| is_stray(trees.as_slice(), index))
        .then(|| petgraph::algo::toposort(graph, None).err())
        .flatten();

    if let Some(cycle) = cycle {
        DependencyTree::build(graph, cycle.node_id())?;
    }

    for index in graph.node_indices() {
        if is_stray(trees.as_slice(), index) {
            trees.push(DependencyTree::build(graph, index)?);
        }
    }

    Ok(trees)
}

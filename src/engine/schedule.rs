use std::cmp::Reverse;
use std::collections::HashSet;

use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};

use crate::engine::{DependencyTree, TaskGraph};

/// The execution order of a model: deepest tasks first, ties in declaration
/// order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallStack {
    order: Vec<NodeIndex>,
    /// Scheduling depth, indexed by node.
    depths: Vec<usize>,
    /// For each stack position, the positions whose outputs a task reads, in
    /// the order they are merged: upstream tasks first, in call-stack order,
    /// then the declared inputs, in declaration order.
    scopes: Vec<Vec<usize>>,
}

impl CallStack {
    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.order.iter().copied()
    }

    pub fn depth(&self, index: NodeIndex) -> usize {
        self.depths.get(index.index()).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn position(&self, index: NodeIndex) -> Option<usize> {
        self.order.iter().position(|&n| n == index)
    }

    /// Stack positions visible to the task at `position`.
    pub fn scope(&self, position: usize) -> &[usize] {
        self.scopes.get(position).map_or(&[], Vec::as_slice)
    }
}

/// Merges the dependency trees into one call stack.
///
/// A task's depth is the largest depth it has in any tree. Sorting by
/// decreasing depth places every input before all of its consumers, since an
/// input is always discovered strictly deeper than the task consuming it. The
/// sort is stable, so node indices (declaration order) break ties.
pub(crate) fn schedule(graph: &TaskGraph, trees: &[DependencyTree]) -> CallStack {
    let depths: Vec<usize> = graph
        .node_indices()
        .map(|index| {
            trees
                .iter()
                .filter_map(|tree| tree.depth_of(index))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut order: Vec<NodeIndex> = graph.node_indices().collect();
    order.sort_by_key(|index| Reverse(depths[index.index()]));

    let mut positions = vec![0; order.len()];
    for (position, index) in order.iter().enumerate() {
        positions[index.index()] = position;
    }

    let scopes = order
        .iter()
        .map(|&index| scope(graph, index, &positions))
        .collect();

    CallStack {
        order,
        depths,
        scopes,
    }
}

/// Everything upstream of `index`, as stack positions.
///
/// Declared inputs come last, in declaration order: on a key clash they
/// override tasks further up, and a later input overrides an earlier one.
fn scope(graph: &TaskGraph, index: NodeIndex, positions: &[usize]) -> Vec<usize> {
    let sources = graph[index].spec.inputs.iter().filter_map(|input| {
        graph
            .node_indices()
            .find(|&n| graph[n].id == *input)
            .map(|n| positions[n.index()])
    });

    let mut inputs: Vec<usize> = Vec::new();
    for source in sources {
        if !inputs.contains(&source) {
            inputs.push(source);
        }
    }

    let direct: HashSet<usize> = inputs.iter().copied().collect();
    let reversed = Reversed(graph);
    let mut dfs = Dfs::new(reversed, index);
    let mut upstream = Vec::new();

    while let Some(n) = dfs.next(reversed) {
        let position = positions[n.index()];
        if n != index && !direct.contains(&position) {
            upstream.push(position);
        }
    }

    upstream.sort_unstable();
    upstream.extend(inputs);
    upstream
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::core::Kind;
    use crate::descriptor::{ModelDescriptor, TaskSpec};
    use crate::engine::tests::{graph, index};
    use crate::engine::{build_graph, build_trees};

    fn ids(graph: &TaskGraph, stack: &CallStack) -> Vec<String> {
        stack.iter().map(|index| graph[index].id.clone()).collect()
    }

    #[test]
    fn test_chain_runs_inputs_first() {
        let graph = graph(
            r#"{
                "A": { "kind": "objective", "inputs": "B" },
                "B": { "kind": "transform", "inputs": "C" },
                "C": { "kind": "array" }
            }"#,
        );
        let trees = build_trees(&graph, &Kind::ROOTS).unwrap();
        let stack = schedule(&graph, &trees);

        assert_eq!(ids(&graph, &stack), vec!["C", "B", "A"]);
        assert_eq!(stack.depth(index(&graph, "C")), 2);
        assert_eq!(stack.depth(index(&graph, "A")), 0);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let graph = graph(
            r#"{
                "obj": { "kind": "objective", "inputs": ["y", "x", "z"] },
                "x": { "kind": "array" },
                "y": { "kind": "array" },
                "z": { "kind": "array" }
            }"#,
        );
        let trees = build_trees(&graph, &Kind::ROOTS).unwrap();
        let stack = schedule(&graph, &trees);

        assert_eq!(ids(&graph, &stack), vec!["x", "y", "z", "obj"]);
    }

    #[test]
    fn test_observable_consumed_by_objective() {
        let graph = graph(
            r#"{
                "likelihood": { "kind": "objective", "inputs": "lightcurve" },
                "lightcurve": { "kind": "observable", "inputs": ["engine", "times"] },
                "engine": { "kind": "engine", "inputs": "times" },
                "times": { "kind": "array" }
            }"#,
        );
        let trees = build_trees(&graph, &Kind::ROOTS).unwrap();
        let stack = schedule(&graph, &trees);

        assert_eq!(
            ids(&graph, &stack),
            vec!["times", "engine", "lightcurve", "likelihood"]
        );
        assert_eq!(stack.depth(index(&graph, "lightcurve")), 1);
        assert_eq!(stack.depth(index(&graph, "times")), 3);
    }

    #[test]
    fn test_scheduling_is_deterministic() {
        let graph = graph(
            r#"{
                "o1": { "kind": "observable", "inputs": ["a", "b"] },
                "o2": { "kind": "objective", "inputs": ["b", "c"] },
                "a": { "kind": "transform", "inputs": "c" },
                "b": { "kind": "array" },
                "c": { "kind": "array" }
            }"#,
        );
        let trees = build_trees(&graph, &Kind::ROOTS).unwrap();

        let first = ids(&graph, &schedule(&graph, &trees));
        let second = ids(&graph, &schedule(&graph, &trees));
        assert_eq!(first, second);
        assert_eq!(schedule(&graph, &trees).len(), 5);
    }

    #[test]
    fn test_scope_is_upstream_only() {
        let graph = graph(
            r#"{
                "obj": { "kind": "objective", "inputs": "lc" },
                "other": { "kind": "observable", "inputs": "engine" },
                "lc": { "kind": "observable", "inputs": ["engine", "t"] },
                "engine": { "kind": "engine", "inputs": "t" },
                "t": { "kind": "array" }
            }"#,
        );
        let trees = build_trees(&graph, &Kind::ROOTS).unwrap();
        let stack = schedule(&graph, &trees);
        assert_eq!(ids(&graph, &stack), vec!["t", "engine", "lc", "obj", "other"]);

        let position = |id: &str| stack.position(index(&graph, id)).unwrap();
        let names = |id: &str| -> Vec<String> {
            stack
                .scope(position(id))
                .iter()
                .map(|&p| ids(&graph, &stack)[p].clone())
                .collect()
        };

        assert_eq!(names("t"), Vec::<String>::new());
        assert_eq!(names("lc"), vec!["engine", "t"]);
        assert_eq!(names("other"), vec!["t", "engine"]);
        assert_eq!(names("obj"), vec!["t", "engine", "lc"]);
    }

    /// Random DAGs declared in shuffled order: every task appears exactly
    /// once, after all of its inputs.
    #[test]
    fn test_random_dags_respect_dependencies() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let n = rng.gen_range(2..20);
            let names: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();

            // Edges only go from lower to higher rank, so the graph is acyclic.
            let mut specs: Vec<(String, TaskSpec)> = Vec::new();
            for (rank, name) in names.iter().enumerate() {
                let kind = if rank == n - 1 {
                    Kind::Objective
                } else {
                    Kind::Transform
                };
                let mut spec = TaskSpec::new(kind);
                for input in names.iter().take(rank) {
                    if rng.gen_bool(0.3) {
                        spec = spec.input(input.clone());
                    }
                }
                specs.push((name.clone(), spec));
            }
            specs.shuffle(&mut rng);

            let descriptor = specs
                .into_iter()
                .fold(ModelDescriptor::new(), |d, (id, spec)| d.with_task(id, spec));
            let graph = build_graph(&descriptor).unwrap();
            let trees = build_trees(&graph, &Kind::ROOTS).unwrap();
            let stack = schedule(&graph, &trees);

            assert_eq!(stack.len(), n);
            let mut seen: Vec<_> = stack.iter().collect();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), n);

            for edge in graph.raw_edges() {
                let input = stack.position(edge.source()).unwrap();
                let consumer = stack.position(edge.target()).unwrap();
                assert!(
                    input < consumer,
                    "{} must run before {}",
                    graph[edge.source()].id,
                    graph[edge.target()].id
                );
            }
        }
    }
}

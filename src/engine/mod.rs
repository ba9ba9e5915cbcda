//! Model-graph construction and execution.
//!
//! A [`Model`] is built once from a [`ModelDescriptor`] by a
//! [`Blueprint`](crate::Blueprint):
//!
//! 1. the descriptor becomes a graph with one edge per declared input, pointing
//!    from the input to its consumer;
//! 2. one [`DependencyTree`] is built for every root task, recording the
//!    deepest level at which each upstream task is discovered;
//! 3. the trees are merged into a single call stack, deepest tasks first;
//! 4. every task is resolved to a [`Module`] instance.
//!
//! After that the model is immutable and can be evaluated from any number of
//! threads at once, each evaluation owning its own [`Namespace`](crate::Namespace).

mod diagnostics;
mod runner;
mod schedule;
mod tree;

use std::collections::HashMap;
use std::fmt::{self, Display};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::Kind;
use crate::descriptor::{ModelDescriptor, TaskSpec};
use crate::error::LoadError;
use crate::registry::Module;
use crate::Blueprint;

pub use diagnostics::{Diagnostics, TaskExecution};
pub use runner::{Evaluation, OBJECTIVE_KEY};
pub(crate) use schedule::{CallStack, schedule};
pub use tree::DependencyTree;
pub(crate) use tree::build_trees;

/// Node weight of the task graph.
#[derive(Debug, Clone)]
pub(crate) struct TaskNode {
    pub id: String,
    pub spec: TaskSpec,
}

/// Edges point from an input to the task consuming it. Node indices follow
/// declaration order.
pub(crate) type TaskGraph = DiGraph<TaskNode, ()>;

pub(crate) fn build_graph(descriptor: &ModelDescriptor) -> Result<TaskGraph, LoadError> {
    let mut graph = TaskGraph::with_capacity(descriptor.len(), descriptor.len());
    let mut lookup = HashMap::with_capacity(descriptor.len());

    for (id, spec) in descriptor.iter() {
        let index = graph.add_node(TaskNode {
            id: id.to_string(),
            spec: spec.clone(),
        });
        lookup.insert(id, index);
    }

    for (id, spec) in descriptor.iter() {
        let target = lookup[id];
        for input in &spec.inputs {
            let source = lookup
                .get(input.as_str())
                .copied()
                .ok_or_else(|| LoadError::DanglingInput {
                    task: id.to_string(),
                    input: input.clone(),
                })?;

            graph.add_edge(source, target, ());
        }
    }

    Ok(graph)
}

/// A loaded model, ready to be evaluated.
pub struct Model {
    pub(crate) graph: TaskGraph,
    pub(crate) trees: Vec<DependencyTree>,
    pub(crate) stack: CallStack,
    /// One instance per task, aligned with `stack`.
    pub(crate) modules: Vec<Box<dyn Module>>,
    pub(crate) objective: NodeIndex,
}

impl Model {
    /// Starts building a model from a descriptor.
    pub fn design(descriptor: ModelDescriptor) -> Blueprint {
        Blueprint::new(descriptor)
    }

    /// Task identifiers in execution order.
    pub fn call_stack(&self) -> Vec<&str> {
        self.stack
            .iter()
            .map(|index| self.graph[index].id.as_str())
            .collect()
    }

    /// The scheduling depth of a task; 0 for roots nobody consumes.
    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.index_of(id).map(|index| self.stack.depth(index))
    }

    /// Position of a task in the call stack.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index_of(id).and_then(|index| self.stack.position(index))
    }

    /// Dependency trees, one per root, in declaration order of the roots.
    pub fn trees(&self) -> &[DependencyTree] {
        &self.trees
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.index_of(id).map(|index| &self.graph[index].spec)
    }

    /// Identifier of the task producing the log-probability.
    pub fn objective(&self) -> &str {
        &self.graph[self.objective].id
    }

    pub fn tasks_of_kind(&self, kind: Kind) -> impl Iterator<Item = &str> {
        self.graph
            .node_weights()
            .filter(move |task| task.spec.kind == kind)
            .map(|task| task.id.as_str())
    }

    /// Identifiers of the tasks consuming the output of `id`.
    pub fn consumers(&self, id: &str) -> Vec<&str> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };

        let mut consumers: Vec<_> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect();
        consumers.sort();
        consumers.dedup();
        consumers
            .into_iter()
            .map(|index| self.graph[index].id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&index| self.graph[index].id == id)
    }

    pub(crate) fn is_output(&self, index: NodeIndex) -> bool {
        matches!(
            self.graph[index].spec.kind,
            Kind::Observable | Kind::Objective
        )
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("call_stack", &self.call_stack())
            .field("objective", &self.objective())
            .finish()
    }
}

/// Renders the task graph as a Mermaid diagram.
impl Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.stack.iter() {
            let task = &self.graph[index];
            let name = task.id.replace('"', "\\\"");
            writeln!(f, "    {}[\"{} ({})\"]", index.index(), name, task.spec.kind)?;

            if self.is_output(index) {
                writeln!(f, "    {} --> Output", index.index())?;
            }
        }

        writeln!(f, "    Output[Output]")?;

        for edge in self.graph.raw_edges() {
            writeln!(
                f,
                "    {} --> {}",
                edge.source().index(),
                edge.target().index()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::Namespace;
    use crate::error::ModuleResult;
    use crate::registry::Registry;

    pub(crate) fn graph(json: &str) -> TaskGraph {
        build_graph(&ModelDescriptor::from_json_str(json).unwrap()).unwrap()
    }

    /// A model where every task publishes `value = 0`.
    pub(crate) fn model(json: &str) -> Model {
        let descriptor = ModelDescriptor::from_json_str(json).unwrap();
        let mut registry = Registry::new();
        for (id, spec) in descriptor.iter() {
            registry.register(spec.kind, spec.class_name(id), |_: &TaskSpec| {
                Ok(|_: &Namespace| -> ModuleResult<Namespace> {
                    Ok([(OBJECTIVE_KEY, 0.0)].into_iter().collect())
                })
            });
        }

        Model::design(descriptor).registry(registry).finish().unwrap()
    }

    const SMALL: &str = r#"{
        "obj": { "kind": "objective", "inputs": "lc" },
        "lc": { "kind": "observable", "class": "curve", "inputs": "t", "zero_point": 25.0 },
        "t": { "kind": "array" }
    }"#;

    pub(crate) fn index(graph: &TaskGraph, id: &str) -> NodeIndex {
        graph
            .node_indices()
            .find(|&index| graph[index].id == id)
            .unwrap()
    }

    #[test]
    fn test_graph_edges_follow_inputs() {
        let graph = graph(
            r#"{
                "A": { "kind": "objective", "inputs": ["B", "C"] },
                "B": { "kind": "transform", "inputs": "C" },
                "C": { "kind": "array" }
            }"#,
        );

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.contains_edge(index(&graph, "C"), index(&graph, "B")));
        assert!(graph.contains_edge(index(&graph, "B"), index(&graph, "A")));
        assert!(graph.contains_edge(index(&graph, "C"), index(&graph, "A")));
        assert_eq!(graph[NodeIndex::new(1)].id, "B");
    }

    #[test]
    fn test_dangling_input() {
        let descriptor = ModelDescriptor::from_json_str(
            r#"{ "A": { "kind": "objective", "inputs": ["B", "ghost"] }, "B": { "kind": "array" } }"#,
        )
        .unwrap();

        match build_graph(&descriptor) {
            Err(LoadError::DanglingInput { task, input }) => {
                assert_eq!(task, "A");
                assert_eq!(input, "ghost");
            }
            other => panic!("expected a dangling input, got {other:?}"),
        }
    }

    #[test]
    fn test_lookups() {
        let model = model(SMALL);

        let lc = model.task("lc").unwrap();
        assert_eq!(lc.kind, Kind::Observable);
        assert_eq!(lc.class_name("lc"), "curve");
        assert_eq!(lc.get_option::<f64>("zero_point").unwrap(), Some(25.0));
        assert!(model.task("ghost").is_none());

        assert_eq!(model.tasks_of_kind(Kind::Array).collect::<Vec<_>>(), ["t"]);
        assert_eq!(model.tasks_of_kind(Kind::Observable).collect::<Vec<_>>(), ["lc"]);
        assert_eq!(model.tasks_of_kind(Kind::Engine).count(), 0);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_display_follows_call_stack() {
        let mermaid = model(SMALL).to_string();
        assert!(mermaid.starts_with("graph LR\n"));

        // Node indices follow declaration order, lines follow the call stack.
        let t = mermaid.find("    2[\"t (array)\"]\n").unwrap();
        let lc = mermaid.find("    1[\"lc (observable)\"]\n").unwrap();
        let obj = mermaid.find("    0[\"obj (objective)\"]\n").unwrap();
        assert!(t < lc && lc < obj, "{mermaid}");

        for line in ["    2 --> 1\n", "    1 --> 0\n", "    1 --> Output\n", "    0 --> Output\n"] {
            assert!(mermaid.contains(line), "missing {line:?} in {mermaid}");
        }
        assert!(!mermaid.contains("    2 --> Output"), "{mermaid}");
    }
}

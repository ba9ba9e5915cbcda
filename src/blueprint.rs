use std::fmt;

use camino::Utf8Path;

use crate::core::Kind;
use crate::descriptor::{ModelDescriptor, TaskSpec};
use crate::engine::{Model, build_graph, build_trees, schedule};
use crate::error::{LoadError, ModuleResult};
use crate::registry::{Module, Registry};

/// The blueprint of a model.
///
/// A `Blueprint` pairs a [`ModelDescriptor`] with the [`Registry`] its tasks
/// are resolved against. Calling [`Blueprint::finish`] checks the descriptor,
/// derives the call stack and instantiates every module, producing a
/// [`Model`] that can be evaluated.
///
/// # Example
///
/// ```rust
/// use friendlyfit::{Kind, Model, ModelDescriptor, TaskSpec};
///
/// let descriptor = ModelDescriptor::new()
///     .with_task("densetimes", TaskSpec::new(Kind::Array))
///     .with_task("engine", TaskSpec::new(Kind::Engine).class("exponential").input("densetimes"))
///     .with_task("lightcurve", TaskSpec::new(Kind::Observable).input("engine"))
///     .with_task("likelihood", TaskSpec::new(Kind::Objective).input("lightcurve"));
///
/// let model = Model::design(descriptor).finish().unwrap();
/// assert_eq!(model.call_stack(), ["densetimes", "engine", "lightcurve", "likelihood"]);
/// ```
pub struct Blueprint {
    descriptor: ModelDescriptor,
    registry: Registry,
    root_kinds: Vec<Kind>,
}

impl Blueprint {
    /// Starts from the built-in registry and the default root kinds.
    pub fn new(descriptor: ModelDescriptor) -> Self {
        Self {
            descriptor,
            registry: Registry::builtin(),
            root_kinds: Kind::ROOTS.to_vec(),
        }
    }

    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, LoadError> {
        Ok(Self::new(ModelDescriptor::from_path(path)?))
    }

    /// Replaces the registry entirely.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a single implementation to the current registry.
    pub fn register<F, M>(mut self, kind: Kind, class: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&TaskSpec) -> ModuleResult<M> + Send + Sync + 'static,
        M: Module + 'static,
    {
        self.registry.register(kind, class, factory);
        self
    }

    /// Kinds whose tasks terminate a dependency tree.
    pub fn root_kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        self.root_kinds = kinds.into_iter().collect();
        self
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn finish(self) -> Result<Model, LoadError> {
        let graph = build_graph(&self.descriptor)?;
        let trees = build_trees(&graph, &self.root_kinds)?;
        let stack = schedule(&graph, &trees);

        let mut objectives = graph
            .node_indices()
            .filter(|&index| graph[index].spec.kind == Kind::Objective);
        let objective = objectives.next().ok_or(LoadError::MissingObjective)?;
        if let Some(other) = objectives.next() {
            return Err(LoadError::MultipleObjectives(
                graph[objective].id.clone(),
                graph[other].id.clone(),
            ));
        }

        let mut modules = Vec::with_capacity(stack.len());
        for index in stack.iter() {
            let task = &graph[index];
            modules.push(self.registry.resolve(&task.id, &task.spec)?);
            tracing::debug!(
                task = %task.id,
                kind = %task.spec.kind,
                class = task.spec.class_name(&task.id),
                depth = stack.depth(index),
                "resolved module"
            );
        }

        let model = Model {
            graph,
            trees,
            stack,
            modules,
            objective,
        };

        tracing::info!(
            tasks = model.len(),
            roots = model.trees.len(),
            objective = model.objective(),
            "model loaded"
        );
        tracing::debug!(call_stack = ?model.call_stack());

        Ok(model)
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("descriptor", &self.descriptor)
            .field("registry", &self.registry)
            .field("root_kinds", &self.root_kinds)
            .finish()
    }
}

/// Renders the declared tasks as a Mermaid diagram, before any checks.
impl fmt::Display for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for (i, (id, spec)) in self.descriptor.iter().enumerate() {
            let name = id.replace('"', "\\\"");
            writeln!(f, "    {i}[\"{name} ({})\"]", spec.kind)?;
        }

        for (i, (_, spec)) in self.descriptor.iter().enumerate() {
            for input in &spec.inputs {
                match self.descriptor.position(input) {
                    Some(source) => writeln!(f, "    {source} --> {i}")?,
                    None => writeln!(f, "    missing_{i}[\"{input}?\"] -.-> {i}")?,
                }
            }
        }

        Ok(())
    }
}

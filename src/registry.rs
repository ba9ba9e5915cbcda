//! Module implementations and the registry resolving tasks to them.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{Kind, Namespace};
use crate::descriptor::TaskSpec;
use crate::error::{LoadError, ModuleResult};

/// A unit of computation bound to a task.
///
/// `process` receives the seeds and the outputs of every task upstream of its
/// own, and returns the entries this module produces. Outputs of the declared
/// inputs are merged last, in declaration order, so they win any key clash.
/// Tasks that are not upstream are never visible, whatever their position in
/// the call stack.
///
/// Instances are shared by every evaluation running at the same time, so
/// `process` takes `&self` and must not mutate anything observable across
/// calls.
///
/// A panic inside `process` is caught and turned into
/// [`EvalError::Panic`](crate::EvalError::Panic), but the process-wide panic
/// hook still runs first and by default prints the message to stderr. Prefer
/// returning an error for rejections that happen routinely, or install a quiet
/// hook with [`std::panic::set_hook`] before sampling.
pub trait Module: Send + Sync {
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace>;
}

/// Plain functions and closures are modules.
impl<F> Module for F
where
    F: Fn(&Namespace) -> ModuleResult<Namespace> + Send + Sync,
{
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace> {
        self(inputs)
    }
}

type Factory = Arc<dyn Fn(&TaskSpec) -> ModuleResult<Box<dyn Module>> + Send + Sync>;

/// Implementations keyed by task kind and class name.
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<(Kind, String), Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the modules shipped with this crate, see
    /// [`modules`](crate::modules).
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::modules::register_builtin(&mut registry);
        registry
    }

    /// Registers a factory for `(kind, class)`, replacing any previous one.
    ///
    /// The factory is called once per task at load time, with the task's
    /// specification so it can read its options.
    pub fn register<F, M>(&mut self, kind: Kind, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&TaskSpec) -> ModuleResult<M> + Send + Sync + 'static,
        M: Module + 'static,
    {
        // Erase the concrete module type here, once.
        let factory: Factory = Arc::new(move |spec: &TaskSpec| -> ModuleResult<Box<dyn Module>> {
            Ok(Box::new(factory(spec)?))
        });
        self.factories.insert((kind, class.into()), factory);
        self
    }

    pub fn contains(&self, kind: Kind, class: &str) -> bool {
        self.factories.contains_key(&(kind, class.to_string()))
    }

    /// Registered `(kind, class)` pairs, sorted.
    pub fn classes(&self) -> Vec<(Kind, &str)> {
        let mut classes: Vec<_> = self
            .factories
            .keys()
            .map(|(kind, class)| (*kind, class.as_str()))
            .collect();
        classes.sort();
        classes
    }

    /// Instantiates the module for task `id`.
    pub fn resolve(&self, id: &str, spec: &TaskSpec) -> Result<Box<dyn Module>, LoadError> {
        let class = spec.class_name(id);
        let factory = self
            .factories
            .get(&(spec.kind, class.to_string()))
            .ok_or_else(|| LoadError::MissingImplementation {
                task: id.to_string(),
                kind: spec.kind,
                class: class.to_string(),
            })?;

        factory(spec).map_err(|source| LoadError::Init {
            task: id.to_string(),
            class: class.to_string(),
            source,
        })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.classes()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(spec: &TaskSpec) -> ModuleResult<impl Module + use<>> {
        let value: f64 = spec
            .get_option("value")?
            .ok_or_else(|| anyhow::anyhow!("missing option 'value'"))?;

        Ok(move |_: &Namespace| -> ModuleResult<Namespace> {
            Ok([("constant", value)].into_iter().collect())
        })
    }

    #[test]
    fn test_resolve_by_class_then_id() {
        let mut registry = Registry::new();
        registry.register(Kind::Array, "constant", constant);

        let by_class = TaskSpec::new(Kind::Array).class("constant").option("value", 2.0);
        let module = registry.resolve("anything", &by_class).unwrap();
        let out = module.process(&Namespace::new()).unwrap();
        assert_eq!(out.scalar("constant").unwrap(), 2.0);

        let by_id = TaskSpec::new(Kind::Array).option("value", 3.0);
        assert!(registry.resolve("constant", &by_id).is_ok());
    }

    #[test]
    fn test_kind_is_part_of_the_key() {
        let mut registry = Registry::new();
        registry.register(Kind::Array, "constant", constant);

        let spec = TaskSpec::new(Kind::Transform).option("value", 1.0);
        match registry.resolve("constant", &spec) {
            Err(LoadError::MissingImplementation { task, kind, class }) => {
                assert_eq!(task, "constant");
                assert_eq!(kind, Kind::Transform);
                assert_eq!(class, "constant");
            }
            other => panic!("expected a missing implementation, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_factory_failure_names_task() {
        let mut registry = Registry::new();
        registry.register(Kind::Array, "constant", constant);

        let spec = TaskSpec::new(Kind::Array).class("constant");
        let err = registry.resolve("c0", &spec).err().unwrap();
        assert!(matches!(err, LoadError::Init { ref task, .. } if task == "c0"));
        assert!(err.to_string().contains("missing option 'value'"), "{err}");
    }

    #[test]
    fn test_builtin_classes() {
        let registry = Registry::builtin();
        assert!(registry.contains(Kind::Array, "densetimes"));
        assert!(registry.contains(Kind::Objective, "likelihood"));
        assert!(!registry.contains(Kind::Engine, "densetimes"));
    }
}

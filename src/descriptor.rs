//! The declarative model document.
//!
//! A descriptor maps task identifiers to task specifications:
//!
//! ```json
//! {
//!     "densetimes": { "kind": "array" },
//!     "engine":     { "kind": "engine", "class": "exponential", "inputs": "densetimes" },
//!     "lightcurve": { "kind": "observable", "inputs": ["engine", "densetimes"] },
//!     "likelihood": { "kind": "objective", "inputs": "lightcurve" }
//! }
//! ```
//!
//! Only `kind`, `class` and `inputs` are interpreted by the engine. Every other
//! field is kept in [`TaskSpec::options`] and handed to the module factory.

use camino::Utf8Path;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{Kind, OrderedMap};
use crate::error::LoadError;

/// Specification of a single task, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: Kind,
    /// Implementation selector; defaults to the task identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Identifiers of the tasks this task depends on.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inputs: Vec<String>,
    /// Uninterpreted module options.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl TaskSpec {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            class: None,
            inputs: Vec::new(),
            options: serde_json::Map::new(),
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The key used to look up this task's implementation.
    pub fn class_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.class.as_deref().unwrap_or(id)
    }

    /// Reads a typed module option, `None` when absent.
    pub fn get_option<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.options.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| anyhow::anyhow!("option '{key}': {err}")),
            None => Ok(None),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(input) => vec![input],
        OneOrMany::Many(inputs) => inputs,
    })
}

/// The full task mapping, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDescriptor {
    tasks: Vec<(String, TaskSpec)>,
}

impl ModelDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let OrderedMap(tasks) = serde_json::from_str(json)?;
        Ok(Self { tasks })
    }

    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;

        Self::from_json_str(&json)
    }

    /// Appends a task, replacing any previous task with the same identifier.
    pub fn with_task(mut self, id: impl Into<String>, spec: TaskSpec) -> Self {
        let id = id.into();
        match self.position(&id) {
            Some(index) => self.tasks[index].1 = spec,
            None => self.tasks.push((id, spec)),
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&TaskSpec> {
        self.position(id).map(|index| &self.tasks[index].1)
    }

    /// Declaration index of a task, which is also its scheduling tie-break.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|(task, _)| task == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskSpec)> {
        self.tasks.iter().map(|(id, spec)| (id.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Serialize for ModelDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

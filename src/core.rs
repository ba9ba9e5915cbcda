use std::collections::HashMap;
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::{DeserializeOwned, Error as _, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::InputError;

/// The category of a task. Each kind selects one family of implementations in
/// the [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Derived arrays, such as dense time grids.
    #[serde(alias = "arrays")]
    Array,
    /// Physical engines producing a luminosity history.
    #[serde(alias = "engines")]
    Engine,
    /// Transforms of an engine output.
    #[serde(alias = "transforms")]
    Transform,
    /// Predicted observables, retained after evaluation for plotting.
    #[serde(alias = "observables")]
    Observable,
    /// The scalar log-probability of a proposal.
    #[serde(alias = "objectives")]
    Objective,
}

impl Kind {
    /// Kinds that terminate the dependency trees unless configured otherwise.
    pub const ROOTS: [Kind; 2] = [Kind::Observable, Kind::Objective];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Array => "array",
            Kind::Engine => "engine",
            Kind::Transform => "transform",
            Kind::Observable => "observable",
            Kind::Objective => "objective",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single value flowing between tasks.
///
/// Arrays are reference counted, so cloning a value (or a whole namespace)
/// never copies numeric data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(Arc<[f64]>),
    Labels(Arc<[String]>),
}

impl Value {
    fn shape(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "a scalar",
            Value::Array(_) => "an array",
            Value::Labels(_) => "a label list",
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Value::Array(value.into())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::Labels(value.into())
    }
}

/// Key-value store threading data between tasks during one evaluation.
///
/// A fresh namespace is created for every evaluation, seeded with the
/// observations and the denormalized parameters. Each task reads a namespace
/// made of the seeds and the outputs of the tasks upstream of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    values: HashMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Merges another namespace into this one. Entries from `other` overwrite
    /// entries in `self` if keys conflict.
    pub fn extend(&mut self, other: Namespace) {
        self.values.extend(other.values);
    }

    /// Copies the entries of `other` into this one, overwriting on conflict.
    pub fn merge(&mut self, other: &Namespace) {
        self.values.extend(
            other
                .values
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
    }

    pub fn get(&self, key: &str) -> Result<&Value, InputError> {
        self.values
            .get(key)
            .ok_or_else(|| InputError::NotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn scalar(&self, key: &str) -> Result<f64, InputError> {
        match self.get(key)? {
            Value::Scalar(value) => Ok(*value),
            other => Err(wrong_shape(key, "a scalar", other)),
        }
    }

    pub fn array(&self, key: &str) -> Result<&[f64], InputError> {
        match self.get(key)? {
            Value::Array(values) => Ok(&values[..]),
            other => Err(wrong_shape(key, "an array", other)),
        }
    }

    pub fn labels(&self, key: &str) -> Result<&[String], InputError> {
        match self.get(key)? {
            Value::Labels(values) => Ok(&values[..]),
            other => Err(wrong_shape(key, "a label list", other)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn wrong_shape(key: &str, expected: &'static str, found: &Value) -> InputError {
    InputError::WrongShape {
        key: key.to_string(),
        expected,
        found: found.shape(),
    }
}

impl<K, V> FromIterator<(K, V)> for Namespace
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut namespace = Namespace::new();
        for (key, value) in iter {
            namespace.insert(key, value);
        }
        namespace
    }
}

/// A JSON object deserialized into a list that keeps document order.
///
/// Document order is the tie-break of the scheduler and the coordinate order of
/// the parameter vector, so a hash map would make both nondeterministic.
/// Duplicate keys are rejected, and errors inside an entry are prefixed with
/// the entry's key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderedMap<V>(pub Vec<(String, V)>);

impl<'de, V> Deserialize<'de> for OrderedMap<V>
where
    V: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V> Visitor<'de> for OrderedMapVisitor<V>
where
    V: DeserializeOwned,
{
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of named entries")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));

        while let Some(key) = map.next_key::<String>()? {
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(A::Error::custom(format_args!("duplicate entry '{key}'")));
            }

            let raw: serde_json::Value = map.next_value()?;
            let value = V::deserialize(raw)
                .map_err(|err| A::Error::custom(format_args!("entry '{key}': {err}")))?;

            entries.push((key, value));
        }

        Ok(OrderedMap(entries))
    }
}

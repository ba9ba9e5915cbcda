//! Free parameters and their mapping from the unit cube.
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::core::{Namespace, OrderedMap};
use crate::error::{EvalError, ParameterError};

/// The physical range of one free parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_value: f64,
    pub max_value: f64,
}

impl Bounds {
    pub fn new(min_value: f64, max_value: f64) -> Self {
        Self {
            min_value,
            max_value,
        }
    }

    /// Maps a unit-interval coordinate onto `[min_value, max_value]`.
    pub fn denormalize(&self, coordinate: f64) -> f64 {
        self.min_value + coordinate * (self.max_value - self.min_value)
    }

    fn is_valid(&self) -> bool {
        self.min_value.is_finite() && self.max_value.is_finite() && self.min_value <= self.max_value
    }
}

/// Ordered free parameters. The document order of the parameter file is the
/// coordinate order of proposal vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    parameters: Vec<(String, Bounds)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        let OrderedMap(parameters) = serde_json::from_str(json)?;
        let set = Self { parameters };
        set.validate()?;
        Ok(set)
    }

    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, ParameterError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ParameterError::Io {
            path: path.to_owned(),
            source,
        })?;

        Self::from_json_str(&json)
    }

    /// Appends a parameter, replacing any previous one with the same name.
    pub fn with(mut self, name: impl Into<String>, bounds: Bounds) -> Self {
        let name = name.into();
        match self.parameters.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = bounds,
            None => self.parameters.push((name, bounds)),
        }
        self
    }

    /// Checks that there is at least one parameter and that every range is
    /// finite and not inverted.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.parameters.is_empty() {
            return Err(ParameterError::Empty);
        }

        for (name, bounds) in &self.parameters {
            if !bounds.is_valid() {
                return Err(ParameterError::InvalidBounds {
                    name: name.clone(),
                    min: bounds.min_value,
                    max: bounds.max_value,
                });
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Bounds> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bounds)| bounds)
    }

    /// Physical values for a proposal vector.
    ///
    /// Every coordinate must be finite and lie in `[0, 1]`.
    pub fn denormalize(&self, coordinates: &[f64]) -> Result<Vec<f64>, EvalError> {
        if coordinates.len() != self.parameters.len() {
            return Err(EvalError::Dimension {
                expected: self.parameters.len(),
                found: coordinates.len(),
            });
        }

        self.parameters
            .iter()
            .zip(coordinates)
            .enumerate()
            .map(|(index, ((_, bounds), &value))| {
                if (0.0..=1.0).contains(&value) {
                    Ok(bounds.denormalize(value))
                } else {
                    Err(EvalError::OutOfBounds { index, value })
                }
            })
            .collect()
    }

    /// Writes the physical values of a proposal into `namespace`, one scalar
    /// per parameter name.
    pub fn inject(&self, coordinates: &[f64], namespace: &mut Namespace) -> Result<(), EvalError> {
        let values = self.denormalize(coordinates)?;
        for ((name, _), value) in self.parameters.iter().zip(values) {
            namespace.insert(name.as_str(), value);
        }
        Ok(())
    }
}

//! Observational data seeded into every evaluation.
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::core::Namespace;
use crate::error::DataError;
use crate::modules::keys;
use crate::utils::linspace;

/// Photometry of one transient, one entry per observation.
///
/// ```json
/// { "times": [0.0, 1.5], "magnitudes": [18.2, 18.9], "e_magnitudes": [0.1, 0.1], "bands": ["V", "V"] }
/// ```
///
/// `e_magnitudes` and `bands` may be left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    pub times: Vec<f64>,
    #[serde(default)]
    pub magnitudes: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub e_magnitudes: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<String>,
}

impl Observations {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        let observations: Self = serde_json::from_str(json)?;
        observations.validate()?;
        Ok(observations)
    }

    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_owned(),
            source,
        })?;

        Self::from_json_str(&json)
    }

    /// A time grid without measurements, for drawing model curves.
    ///
    /// `plot_points` times are spread evenly over `[0, max_time]` and repeated
    /// for every band in `bands`, or once without band labels if `bands` is
    /// empty.
    pub fn model_grid(plot_points: usize, max_time: f64, bands: &[String]) -> Self {
        let grid = linspace(0.0, max_time, plot_points);

        if bands.is_empty() {
            return Self {
                times: grid,
                ..Self::default()
            };
        }

        let mut times = Vec::with_capacity(grid.len() * bands.len());
        let mut labels = Vec::with_capacity(grid.len() * bands.len());
        for band in bands {
            times.extend_from_slice(&grid);
            labels.extend(std::iter::repeat_n(band.clone(), grid.len()));
        }

        Self {
            times,
            bands: labels,
            ..Self::default()
        }
    }

    /// Checks that every present column has one entry per time.
    ///
    /// `magnitudes` may be empty for a model grid; optional columns may be
    /// empty too.
    pub fn validate(&self) -> Result<(), DataError> {
        let expected = self.times.len();
        let columns = [
            ("magnitudes", self.magnitudes.len()),
            ("e_magnitudes", self.e_magnitudes.len()),
            ("bands", self.bands.len()),
        ];

        for (field, found) in columns {
            if found != 0 && found != expected {
                return Err(DataError::LengthMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Seed inputs for an evaluation. Empty optional columns are left out.
    pub fn to_namespace(&self) -> Namespace {
        let mut ns = Namespace::new();
        ns.insert(keys::TIMES, self.times.clone());

        if !self.magnitudes.is_empty() {
            ns.insert(keys::MAGNITUDES, self.magnitudes.clone());
        }
        if !self.e_magnitudes.is_empty() {
            ns.insert(keys::E_MAGNITUDES, self.e_magnitudes.clone());
        }
        if !self.bands.is_empty() {
            ns.insert(keys::BANDS, self.bands.clone());
        }

        ns
    }
}

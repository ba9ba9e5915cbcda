use std::f64::consts::PI;

use anyhow::ensure;

use super::{keys, optional};
use crate::core::Namespace;
use crate::descriptor::TaskSpec;
use crate::engine::OBJECTIVE_KEY;
use crate::error::{InputError, ModuleResult};
use crate::registry::Module;

/// Gaussian log-likelihood of the observed magnitudes.
///
/// The variance of each point is its squared error (`e_magnitudes`, zero when
/// absent) plus the optional `variance` parameter, which absorbs unmodelled
/// scatter.
#[derive(Debug, Clone, Default)]
pub struct Likelihood;

impl Likelihood {
    pub fn new(_: &TaskSpec) -> ModuleResult<Self> {
        Ok(Self)
    }
}

impl Module for Likelihood {
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace> {
        let observed = inputs.array(keys::MAGNITUDES)?;
        let model = inputs.array(keys::MODEL_MAGNITUDES)?;
        let errors = match inputs.array(keys::E_MAGNITUDES) {
            Ok(errors) => Some(errors),
            Err(InputError::NotFound(_)) => None,
            Err(err) => return Err(err.into()),
        };
        let variance = optional(inputs, keys::VARIANCE)?.unwrap_or(0.0);

        ensure!(
            observed.len() == model.len(),
            "{} observed magnitudes but {} model magnitudes",
            observed.len(),
            model.len()
        );
        if let Some(errors) = errors {
            ensure!(
                errors.len() == observed.len(),
                "{} observed magnitudes but {} errors",
                observed.len(),
                errors.len()
            );
        }

        let value: f64 = observed
            .iter()
            .zip(model)
            .enumerate()
            .map(|(i, (o, m))| {
                let e = errors.map_or(0.0, |errors| errors[i]);
                let var = e * e + variance;
                -0.5 * ((o - m).powi(2) / var + (2.0 * PI * var).ln())
            })
            .sum();

        ensure!(value.is_finite(), "log-likelihood is not finite ({value})");

        let mut out = Namespace::new();
        out.insert(OBJECTIVE_KEY, value);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> Namespace {
        let mut ns = Namespace::new();
        ns.insert(keys::MAGNITUDES, vec![1.0, 2.0])
            .insert(keys::MODEL_MAGNITUDES, vec![1.0, 3.0])
            .insert(keys::E_MAGNITUDES, vec![1.0, 1.0]);
        ns
    }

    #[test]
    fn test_unit_errors() {
        let out = Likelihood.process(&inputs()).unwrap();
        let expected = -0.5 * (1.0 + 2.0 * (2.0 * PI).ln());
        assert!((out.scalar(OBJECTIVE_KEY).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_variance_widens() {
        let mut ns = inputs();
        ns.insert(keys::VARIANCE, 3.0);

        let out = Likelihood.process(&ns).unwrap();
        let expected = -0.5 * (1.0 / 4.0 + 2.0 * (8.0 * PI).ln());
        assert!((out.scalar(OBJECTIVE_KEY).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_is_rejected() {
        let mut ns = Namespace::new();
        ns.insert(keys::MAGNITUDES, vec![1.0])
            .insert(keys::MODEL_MAGNITUDES, vec![1.0]);

        assert!(Likelihood.process(&ns).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let mut ns = inputs();
        ns.insert(keys::MODEL_MAGNITUDES, vec![1.0]);

        let err = Likelihood.process(&ns).unwrap_err();
        assert!(err.to_string().contains("2 observed magnitudes but 1"), "{err}");
    }
}

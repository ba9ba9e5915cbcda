//! The boundary between a loaded model and an external sampler.
use camino::Utf8Path;
use rand::Rng;
use rayon::prelude::*;

use crate::core::Namespace;
use crate::data::Observations;
use crate::descriptor::ModelDescriptor;
use crate::engine::{Evaluation, Model};
use crate::error::{EvalError, FitError};
use crate::parameters::ParameterSet;

/// What a sampler needs from a target distribution.
///
/// `ln_prob` must be pure: equal proposals give equal results, and calls may
/// happen concurrently from any number of threads.
pub trait LogProbability: Send + Sync {
    /// Dimension of the proposal space.
    fn ndim(&self) -> usize;

    /// Log-probability of a proposal in the unit cube, `-inf` to reject it.
    fn ln_prob(&self, coordinates: &[f64]) -> f64;
}

/// A model bound to its free parameters and to the data it is fitted against.
///
/// Modules that panic reject the proposal like any other failure, but each
/// panic also goes through the panic hook. Samplers that expect many such
/// rejections should replace the default hook, which prints every one.
#[derive(Debug)]
pub struct Fitter {
    model: Model,
    parameters: ParameterSet,
    seeds: Namespace,
}

impl Fitter {
    pub fn new(model: Model, parameters: ParameterSet) -> Result<Self, FitError> {
        parameters.validate()?;

        Ok(Self {
            model,
            parameters,
            seeds: Namespace::new(),
        })
    }

    /// Loads the model, the parameters and the observations from JSON files.
    pub fn from_paths(
        model: impl AsRef<Utf8Path>,
        parameters: impl AsRef<Utf8Path>,
        data: impl AsRef<Utf8Path>,
    ) -> Result<Self, FitError> {
        let model = Model::design(ModelDescriptor::from_path(model)?).finish()?;
        let parameters = ParameterSet::from_path(parameters)?;
        let data = Observations::from_path(data)?;

        Ok(Self::new(model, parameters)?.with_seeds(data.to_namespace()))
    }

    /// Sets the entries every evaluation starts from, typically
    /// [`Observations::to_namespace`].
    pub fn with_seeds(mut self, seeds: Namespace) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Full evaluation of one proposal, keeping every intermediate output.
    pub fn evaluate(&self, coordinates: &[f64]) -> Result<Evaluation, EvalError> {
        let mut namespace = self.seeds.clone();
        self.parameters.inject(coordinates, &mut namespace)?;
        self.model.evaluate(namespace)
    }

    /// Log-probabilities of a whole population, evaluated in parallel.
    pub fn ln_prob_batch(&self, walkers: &[Vec<f64>]) -> Vec<f64> {
        walkers
            .par_iter()
            .map(|coordinates| self.ln_prob(coordinates))
            .collect()
    }

    /// `n` proposals drawn uniformly from the unit cube.
    pub fn initial_walkers<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Vec<f64>> {
        (0..n)
            .map(|_| {
                (0..self.parameters.len())
                    .map(|_| rng.gen_range(0.0..1.0))
                    .collect()
            })
            .collect()
    }
}

impl LogProbability for Fitter {
    fn ndim(&self) -> usize {
        self.parameters.len()
    }

    /// Any evaluation failure, and any non-finite result, rejects the proposal.
    fn ln_prob(&self, coordinates: &[f64]) -> f64 {
        match self.evaluate(coordinates) {
            Ok(evaluation) if evaluation.log_probability.is_finite() => evaluation.log_probability,
            Ok(evaluation) => {
                tracing::debug!(value = evaluation.log_probability, "non-finite log-probability");
                f64::NEG_INFINITY
            }
            Err(err) => {
                tracing::debug!(error = %err, "proposal rejected");
                f64::NEG_INFINITY
            }
        }
    }
}

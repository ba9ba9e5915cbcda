use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use tracing::Level;

use crate::core::Namespace;
use crate::engine::{Diagnostics, Model, TaskExecution};
use crate::error::EvalError;

/// Key under which the objective task publishes the log-probability.
pub const OBJECTIVE_KEY: &str = "value";

/// The outcome of one pass over the call stack.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The seeds and every task output, merged in call-stack order.
    pub namespace: Namespace,
    /// The scalar published by the objective task.
    pub log_probability: f64,
    /// Outputs of each observable task, keyed by task identifier.
    pub observables: BTreeMap<String, Namespace>,
}

impl Model {
    /// Runs every task once, in call-stack order, starting from `seeds`.
    ///
    /// A task reads the seeds and the outputs of the tasks upstream of it, with
    /// its declared inputs merged last. Tasks elsewhere in the graph are not
    /// visible, even when they ran earlier.
    ///
    /// Each call owns its namespace, so a model can be evaluated from several
    /// threads at once. Failures and panics inside a module are returned as
    /// [`EvalError`] and leave the model untouched.
    pub fn evaluate(&self, seeds: Namespace) -> Result<Evaluation, EvalError> {
        self.run(seeds, None)
    }

    /// Same as [`Model::evaluate`], also recording how long each task took.
    pub fn evaluate_with_diagnostics(
        &self,
        seeds: Namespace,
    ) -> Result<(Evaluation, Diagnostics), EvalError> {
        let mut execution_times = HashMap::with_capacity(self.len());
        let evaluation = self.run(seeds, Some(&mut execution_times))?;

        Ok((evaluation, Diagnostics { execution_times }))
    }

    fn run(
        &self,
        seeds: Namespace,
        mut timings: Option<&mut HashMap<String, TaskExecution>>,
    ) -> Result<Evaluation, EvalError> {
        let span = tracing::span!(Level::TRACE, "evaluate");
        let _enter = span.enter();

        let mut outputs: Vec<Namespace> = Vec::with_capacity(self.modules.len());
        let mut observables = BTreeMap::new();
        let mut objective = None;

        for (position, (index, module)) in self.stack.iter().zip(&self.modules).enumerate() {
            let task = &self.graph[index];

            let mut inputs = seeds.clone();
            for &upstream in self.stack.scope(position) {
                inputs.merge(&outputs[upstream]);
            }

            let start = Instant::now();
            let output = match catch_unwind(AssertUnwindSafe(|| module.process(&inputs))) {
                Ok(Ok(output)) => output,
                Ok(Err(err)) => return Err(EvalError::Task(task.id.clone(), err)),
                Err(panic) => {
                    let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        String::from("unknown payload")
                    };

                    return Err(EvalError::Panic(task.id.clone(), msg));
                }
            };

            let duration = start.elapsed();
            tracing::trace!(task = %task.id, outputs = output.len(), ?duration, "processed");

            if let Some(timings) = timings.as_deref_mut() {
                timings.insert(task.id.clone(), TaskExecution { start, duration });
            }

            if index == self.objective {
                objective = Some(output.clone());
            } else if self.is_output(index) {
                observables.insert(task.id.clone(), output.clone());
            }

            outputs.push(output);
        }

        let mut namespace = seeds;
        for output in outputs {
            namespace.extend(output);
        }

        let objective_id = self.objective().to_string();
        let log_probability = objective
            .unwrap_or_default()
            .scalar(OBJECTIVE_KEY)
            .map_err(|source| EvalError::Objective {
                task: objective_id,
                source,
            })?;

        Ok(Evaluation {
            namespace,
            log_probability,
            observables,
        })
    }
}

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::core::Kind;

pub use anyhow::Error as RuntimeError;

/// Result returned by [`Module::process`](crate::Module::process) and by module
/// factories.
pub type ModuleResult<T> = anyhow::Result<T, anyhow::Error>;

/// Fatal errors raised while loading a model. None of these can occur once a
/// [`Model`](crate::Model) has been built.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Couldn't read model file '{path}'.\n{source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't parse model descriptor.\n{0}")]
    Parse(#[from] serde_json::Error),

    #[error("Task '{task}' lists input '{input}', which is not declared in the model")]
    DanglingInput { task: String, input: String },

    #[error("Task '{task}' of kind '{kind}' has no registered implementation '{class}'")]
    MissingImplementation {
        task: String,
        kind: Kind,
        class: String,
    },

    #[error("Task '{task}': implementation '{class}' failed to initialize.\n{source}")]
    Init {
        task: String,
        class: String,
        source: anyhow::Error,
    },

    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Model declares no task of kind 'objective'")]
    MissingObjective,

    #[error("Model declares more than one objective: '{0}' and '{1}'")]
    MultipleObjectives(String, String),
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Couldn't read parameter file '{path}'.\n{source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't parse parameter set.\n{0}")]
    Parse(#[from] serde_json::Error),

    #[error("Parameter '{name}' has invalid bounds [{min}, {max}]")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("Parameter set declares no free parameters")]
    Empty,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Couldn't read observations '{path}'.\n{source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't parse observations.\n{0}")]
    Parse(#[from] serde_json::Error),

    #[error("Column '{field}' has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Lookup failures inside a [`Namespace`](crate::Namespace).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Input '{0}' not found")]
    NotFound(String),

    #[error("Input '{key}' is {found}, expected {expected}")]
    WrongShape {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Recoverable failures of a single evaluation. The orchestrator maps every
/// one of these to a rejected proposal.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Task '{0}':\n{1}")]
    Task(String, anyhow::Error),

    #[error("Task '{0}' panicked: {1}")]
    Panic(String, String),

    #[error("Objective '{task}' produced no log-probability.\n{source}")]
    Objective { task: String, source: InputError },

    #[error("Expected {expected} coordinates, got {found}")]
    Dimension { expected: usize, found: usize },

    #[error("Coordinate {index} ({value}) lies outside the unit interval")]
    OutOfBounds { index: usize, value: f64 },
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Error while loading the model.\n{0}")]
    Load(#[from] LoadError),

    #[error("Error while loading the parameters.\n{0}")]
    Parameters(#[from] ParameterError),

    #[error("Error while loading the observations.\n{0}")]
    Data(#[from] DataError),
}

#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod blueprint;
mod core;
mod data;
mod descriptor;
mod engine;
mod error;
mod fitter;
pub mod modules;
mod parameters;
mod registry;
mod utils;

pub use crate::blueprint::Blueprint;
pub use crate::core::{Kind, Namespace, Value};
pub use crate::data::Observations;
pub use crate::descriptor::{ModelDescriptor, TaskSpec};
pub use crate::engine::{
    DependencyTree, Diagnostics, Evaluation, Model, OBJECTIVE_KEY, TaskExecution,
};
pub use crate::error::*;
pub use crate::fitter::{Fitter, LogProbability};
pub use crate::parameters::{Bounds, ParameterSet};
pub use crate::registry::{Module, Registry};

#[cfg(feature = "logging")]
pub use crate::utils::init_logging;

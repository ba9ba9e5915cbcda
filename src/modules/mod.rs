//! Modules shipped with the crate.
//!
//! They cover one complete light-curve fit: a dense time grid, an exponential
//! engine, an identity transform, a magnitude light curve and a Gaussian
//! likelihood. Each family lives in its own file and is registered under the
//! class names listed in [`register_builtin`].

mod arrays;
mod engines;
mod objectives;
mod observables;
mod transforms;

pub use arrays::DenseTimes;
pub use engines::Exponential;
pub use objectives::Likelihood;
pub use observables::LightCurve;
pub use transforms::Identity;

use crate::core::{Kind, Namespace};
use crate::error::InputError;
use crate::registry::Registry;

/// Namespace keys read and written by the built-in modules.
pub mod keys {
    pub const TIMES: &str = "times";
    pub const MAGNITUDES: &str = "magnitudes";
    pub const E_MAGNITUDES: &str = "e_magnitudes";
    pub const BANDS: &str = "bands";

    pub const DENSETIMES: &str = "densetimes";
    pub const LUMINOSITIES: &str = "luminosities";
    pub const MODEL_MAGNITUDES: &str = "model_magnitudes";

    pub const TEXPLOSION: &str = "texplosion";
    pub const AMPLITUDE: &str = "amplitude";
    pub const TAU: &str = "tau";
    pub const VARIANCE: &str = "variance";
}

/// Registers every built-in module:
///
/// | kind         | class         |
/// |--------------|---------------|
/// | `array`      | `densetimes`  |
/// | `engine`     | `exponential` |
/// | `transform`  | `identity`    |
/// | `observable` | `lightcurve`  |
/// | `objective`  | `likelihood`  |
pub fn register_builtin(registry: &mut Registry) {
    registry
        .register(Kind::Array, "densetimes", DenseTimes::new)
        .register(Kind::Engine, "exponential", Exponential::new)
        .register(Kind::Transform, "identity", Identity::new)
        .register(Kind::Observable, "lightcurve", LightCurve::new)
        .register(Kind::Objective, "likelihood", Likelihood::new);
}

/// Reads an optional scalar, treating a missing key as absent but a key of the
/// wrong shape as an error.
fn optional(inputs: &Namespace, key: &str) -> Result<Option<f64>, InputError> {
    match inputs.scalar(key) {
        Ok(value) => Ok(Some(value)),
        Err(InputError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

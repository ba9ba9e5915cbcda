use anyhow::ensure;

use super::keys;
use crate::core::Namespace;
use crate::descriptor::TaskSpec;
use crate::error::ModuleResult;
use crate::registry::Module;

/// Exponentially decaying luminosity, switched on at `texplosion`.
#[derive(Debug, Clone, Default)]
pub struct Exponential;

impl Exponential {
    pub fn new(_: &TaskSpec) -> ModuleResult<Self> {
        Ok(Self)
    }
}

impl Module for Exponential {
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace> {
        let times = inputs.array(keys::DENSETIMES)?;
        let texplosion = inputs.scalar(keys::TEXPLOSION)?;
        let amplitude = inputs.scalar(keys::AMPLITUDE)?;
        let tau = inputs.scalar(keys::TAU)?;

        ensure!(tau > 0.0, "'{}' must be positive, got {tau}", keys::TAU);

        let luminosities: Vec<f64> = times
            .iter()
            .map(|&t| {
                if t < texplosion {
                    0.0
                } else {
                    amplitude * (-(t - texplosion) / tau).exp()
                }
            })
            .collect();

        let mut out = Namespace::new();
        out.insert(keys::LUMINOSITIES, luminosities);
        Ok(out)
    }
}

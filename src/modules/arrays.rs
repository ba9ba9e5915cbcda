use anyhow::bail;

use super::keys;
use crate::core::Namespace;
use crate::descriptor::TaskSpec;
use crate::error::ModuleResult;
use crate::registry::Module;
use crate::utils::linspace;

/// A time grid dense enough to integrate over, merged with the observed times.
///
/// When the latest observation lies after `texplosion`, `n_times` evenly spaced
/// points between the two are added to the observed times and the result is
/// sorted. Otherwise the observed times are passed through.
#[derive(Debug, Clone)]
pub struct DenseTimes {
    n_times: usize,
}

impl DenseTimes {
    pub const N_TIMES: usize = 100;

    pub fn new(spec: &TaskSpec) -> ModuleResult<Self> {
        let n_times = spec.get_option("n_times")?.unwrap_or(Self::N_TIMES);
        Ok(Self { n_times })
    }
}

impl Module for DenseTimes {
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace> {
        let times = inputs.array(keys::TIMES)?;
        let texplosion = inputs.scalar(keys::TEXPLOSION)?;

        let Some(max_time) = times.iter().copied().reduce(f64::max) else {
            bail!("'{}' is empty", keys::TIMES);
        };

        let mut out = Namespace::new();
        if max_time > texplosion {
            let mut dense = linspace(texplosion, max_time, self.n_times);
            dense.extend_from_slice(times);
            dense.sort_by(f64::total_cmp);
            out.insert(keys::DENSETIMES, dense);
        } else {
            out.insert(keys::DENSETIMES, times.to_vec());
        }

        Ok(out)
    }
}

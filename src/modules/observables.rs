use anyhow::{bail, ensure};

use super::keys;
use crate::core::Namespace;
use crate::descriptor::TaskSpec;
use crate::error::ModuleResult;
use crate::registry::Module;

/// Model magnitudes at the observed times.
///
/// Luminosities are interpolated linearly over the dense grid and converted
/// with `m = zero_point - 2.5 log10(L)`. Times outside the grid take the value
/// at the nearest end.
#[derive(Debug, Clone)]
pub struct LightCurve {
    zero_point: f64,
}

impl LightCurve {
    pub fn new(spec: &TaskSpec) -> ModuleResult<Self> {
        let zero_point = spec.get_option("zero_point")?.unwrap_or(0.0);
        Ok(Self { zero_point })
    }
}

impl Module for LightCurve {
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace> {
        let times = inputs.array(keys::TIMES)?;
        let grid = inputs.array(keys::DENSETIMES)?;
        let luminosities = inputs.array(keys::LUMINOSITIES)?;

        ensure!(
            grid.len() == luminosities.len(),
            "'{}' has {} entries but '{}' has {}",
            keys::LUMINOSITIES,
            luminosities.len(),
            keys::DENSETIMES,
            grid.len()
        );

        let mut magnitudes = Vec::with_capacity(times.len());
        for &t in times {
            let l = interpolate(grid, luminosities, t)?;
            if l.is_nan() || l <= 0.0 {
                bail!("non-positive luminosity {l} at t = {t}");
            }
            magnitudes.push(self.zero_point - 2.5 * l.log10());
        }

        let mut out = Namespace::new();
        out.insert(keys::MODEL_MAGNITUDES, magnitudes);
        Ok(out)
    }
}

/// Piecewise linear interpolation over a sorted grid.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> ModuleResult<f64> {
    let (Some(&first), Some(&last)) = (xs.first(), xs.last()) else {
        bail!("cannot interpolate over an empty grid");
    };

    if x <= first {
        return Ok(ys[0]);
    }
    if x >= last {
        return Ok(ys[ys.len() - 1]);
    }

    // First index with xs[i] > x; in 1..len thanks to the checks above.
    let i = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);

    if x1 == x0 {
        return Ok(y1);
    }

    Ok(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Kind;

    #[test]
    fn test_interpolate() {
        let xs = [0.0, 1.0, 1.0, 3.0];
        let ys = [0.0, 2.0, 4.0, 8.0];

        assert_eq!(interpolate(&xs, &ys, -1.0).unwrap(), 0.0);
        assert_eq!(interpolate(&xs, &ys, 0.5).unwrap(), 1.0);
        assert_eq!(interpolate(&xs, &ys, 2.0).unwrap(), 6.0);
        assert_eq!(interpolate(&xs, &ys, 5.0).unwrap(), 8.0);
        assert!(interpolate(&[], &[], 1.0).is_err());
    }

    #[test]
    fn test_magnitudes() {
        let module = LightCurve::new(&TaskSpec::new(Kind::Observable).option("zero_point", 20.0))
            .unwrap();

        let mut ns = Namespace::new();
        ns.insert(keys::TIMES, vec![0.0, 1.0])
            .insert(keys::DENSETIMES, vec![0.0, 1.0])
            .insert(keys::LUMINOSITIES, vec![1.0, 100.0]);

        let out = module.process(&ns).unwrap();
        let m = out.array(keys::MODEL_MAGNITUDES).unwrap();
        assert!((m[0] - 20.0).abs() < 1e-12);
        assert!((m[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_dark_source_fails() {
        let module = LightCurve::new(&TaskSpec::new(Kind::Observable)).unwrap();

        let mut ns = Namespace::new();
        ns.insert(keys::TIMES, vec![0.0])
            .insert(keys::DENSETIMES, vec![0.0, 1.0])
            .insert(keys::LUMINOSITIES, vec![0.0, 1.0]);

        let err = module.process(&ns).unwrap_err();
        assert!(err.to_string().contains("non-positive luminosity"), "{err}");
    }
}

//! The triangular fundamental diagram.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Densities closer than this are treated as the same traffic state.
pub(crate) const DENSITY_EPS: f64 = 1e-9;

/// A triangular flow-density relationship.
///
/// The free-flow branch rises from `(0, 0)` with slope `vf` up to the
/// capacity `q0` at the critical density `kc`; the congested branch falls
/// with slope `w < 0` down to `(kj, 0)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FundamentalDiagram {
    kj: f64,
    q0: f64,
    vf: f64,
    kc: f64,
    w: f64,
}

/// Which branch of the diagram a density lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    FreeFlow,
    Congested,
}

/// A point on the flow-density curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QkPoint {
    pub k: f64,
    pub q: f64,
}

impl FundamentalDiagram {
    /// Creates the diagram described by a configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let kc = config.kc();
        let w = -config.q0 / (config.kj - kc);
        Ok(Self {
            kj: config.kj,
            q0: config.q0,
            vf: config.vf,
            kc,
            w,
        })
    }

    /// The jam density.
    pub fn jam_density(&self) -> f64 {
        self.kj
    }

    /// The capacity flow.
    pub fn capacity(&self) -> f64 {
        self.q0
    }

    /// The free-flow speed, which is also the free-flow wave speed.
    pub fn free_flow_speed(&self) -> f64 {
        self.vf
    }

    /// The (negative) wave speed of the congested branch.
    pub fn congested_wave_speed(&self) -> f64 {
        self.w
    }

    /// The density at which flow is maximal.
    pub fn critical_density(&self) -> f64 {
        self.kc
    }

    /// The flow carried at density `k`.
    pub fn flow(&self, k: f64) -> Result<f64> {
        self.check(k)?;
        Ok(self.q(k))
    }

    /// The speed at which a small disturbance travels at density `k`.
    pub fn wave_speed(&self, k: f64) -> Result<f64> {
        self.check(k)?;
        Ok(self.characteristic_speed(k))
    }

    /// The branch of the diagram on which `k` lies.
    pub fn regime(&self, k: f64) -> Result<Regime> {
        self.check(k)?;
        Ok(if k <= self.kc {
            Regime::FreeFlow
        } else {
            Regime::Congested
        })
    }

    /// The speed of the vehicles themselves at density `k`.
    pub fn vehicle_speed(&self, k: f64) -> Result<f64> {
        self.check(k)?;
        Ok(self.speed(k))
    }

    /// Samples the flow-density curve from `k = 0` to `k = kj` over
    /// `resolution` equal intervals. The peak `(kc, q0)` is always included.
    pub fn qk_line(&self, resolution: usize) -> Vec<QkPoint> {
        let resolution = resolution.max(1);
        let step = self.kj / resolution as f64;
        let mut points = Vec::with_capacity(resolution + 2);
        for i in 0..=resolution {
            let k = if i == resolution {
                self.kj
            } else {
                step * i as f64
            };
            if let Some(last) = points.last().map(|p: &QkPoint| p.k) {
                if last < self.kc - DENSITY_EPS && k > self.kc + DENSITY_EPS {
                    points.push(QkPoint {
                        k: self.kc,
                        q: self.q0,
                    });
                }
            }
            points.push(QkPoint { k, q: self.q(k) });
        }
        points
    }

    fn check(&self, k: f64) -> Result<()> {
        if (0.0..=self.kj).contains(&k) {
            Ok(())
        } else {
            Err(Error::InvalidDensity { k, kj: self.kj })
        }
    }

    /// Flow at a density already known to be in range.
    pub(crate) fn q(&self, k: f64) -> f64 {
        if k <= self.kc {
            self.vf * k
        } else {
            (self.w * (k - self.kj)).max(0.0)
        }
    }

    pub(crate) fn characteristic_speed(&self, k: f64) -> f64 {
        if k <= self.kc {
            self.vf
        } else {
            self.w
        }
    }

    /// Vehicle speed, taking the free-flow limit on an empty road.
    pub(crate) fn speed(&self, k: f64) -> f64 {
        if k <= DENSITY_EPS {
            self.vf
        } else {
            self.q(k) / k
        }
    }

    /// The free-flow density carrying flow `q`.
    pub(crate) fn free_density(&self, q: f64) -> f64 {
        (q / self.vf).clamp(0.0, self.kc)
    }

    /// The congested density carrying flow `q`.
    pub(crate) fn congested_density(&self, q: f64) -> f64 {
        (self.kj + q / self.w).clamp(self.kc, self.kj)
    }

    /// The most flow traffic at density `k` can send downstream.
    pub(crate) fn demand(&self, k: f64) -> f64 {
        if k <= self.kc {
            self.q(k)
        } else {
            self.q0
        }
    }

    /// The most flow traffic at density `k` can accept from upstream.
    pub(crate) fn supply(&self, k: f64) -> f64 {
        if k <= self.kc {
            self.q0
        } else {
            self.q(k)
        }
    }

    /// The speed of a discontinuity between densities `a` and `b`.
    pub(crate) fn secant_speed(&self, a: f64, b: f64) -> f64 {
        if (b - a).abs() <= DENSITY_EPS {
            self.characteristic_speed(0.5 * (a + b))
        } else {
            (self.q(b) - self.q(a)) / (b - a)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng};

    fn diagram() -> FundamentalDiagram {
        FundamentalDiagram::new(&Config::default()).unwrap()
    }

    #[test]
    fn derived_parameters() {
        let fd = diagram();
        assert_approx_eq!(fd.free_flow_speed(), 1.0);
        assert_approx_eq!(fd.critical_density(), 0.25);
        assert_approx_eq!(fd.congested_wave_speed(), -1.0 / 3.0);
    }

    #[test]
    fn flow_on_both_branches() {
        let fd = diagram();
        assert_approx_eq!(fd.flow(0.0).unwrap(), 0.0);
        assert_approx_eq!(fd.flow(0.25).unwrap(), 0.25);
        assert_approx_eq!(fd.flow(0.5).unwrap(), 0.1667, 1e-4);
        assert_approx_eq!(fd.flow(1.0).unwrap(), 0.0);
    }

    #[test]
    fn flow_is_unimodal() {
        let fd = diagram();
        let mut rng = rand::rngs::StdRng::from_seed(*b"Vegemite sandwhich is not fun...");
        for _i in 0..200 {
            let a = rng.gen_range(0.0..=1.0);
            let b = rng.gen_range(0.0..=1.0);
            let (a, b) = if a < b { (a, b) } else { (b, a) };
            let (qa, qb) = (fd.flow(a).unwrap(), fd.flow(b).unwrap());
            assert!(qa >= 0.0 && qa <= fd.capacity() + 1e-12);
            if b <= fd.critical_density() {
                assert!(qa <= qb + 1e-12);
            }
            if a >= fd.critical_density() {
                assert!(qa + 1e-12 >= qb);
            }
        }
    }

    #[test]
    fn regimes_and_wave_speeds() {
        let fd = diagram();
        assert_eq!(fd.regime(0.1).unwrap(), Regime::FreeFlow);
        assert_eq!(fd.regime(0.25).unwrap(), Regime::FreeFlow);
        assert_eq!(fd.regime(0.6).unwrap(), Regime::Congested);
        assert_approx_eq!(fd.wave_speed(0.1).unwrap(), 1.0);
        assert_approx_eq!(fd.wave_speed(0.6).unwrap(), -1.0 / 3.0);
        assert_approx_eq!(fd.vehicle_speed(0.0).unwrap(), 1.0);
        assert_approx_eq!(fd.vehicle_speed(1.0).unwrap(), 0.0);
    }

    #[test]
    fn rejects_out_of_range_density() {
        let fd = diagram();
        assert!(matches!(fd.flow(-0.1), Err(Error::InvalidDensity { .. })));
        assert!(matches!(fd.wave_speed(1.5), Err(Error::InvalidDensity { .. })));
        assert!(fd.regime(f64::NAN).is_err());
    }

    #[test]
    fn inverse_branches() {
        let fd = diagram();
        assert_approx_eq!(fd.free_density(0.1), 0.1);
        assert_approx_eq!(fd.congested_density(0.1), 0.7);
        assert_approx_eq!(fd.congested_density(0.0), 1.0);
        assert_approx_eq!(fd.secant_speed(0.1, 1.0), -0.1 / 0.9);
    }

    #[test]
    fn qk_line_shape() {
        let fd = diagram();
        let line = fd.qk_line(100);
        assert_eq!(line.first(), Some(&QkPoint { k: 0.0, q: 0.0 }));
        let last = line.last().unwrap();
        assert_approx_eq!(last.k, 1.0);
        assert_approx_eq!(last.q, 0.0);
        assert!(line.windows(2).all(|p| p[0].k < p[1].k));
        let peak = line.iter().map(|p| p.q).fold(0.0, f64::max);
        assert_approx_eq!(peak, 0.25);
    }

    #[test]
    fn qk_line_inserts_peak_off_grid() {
        let fd = diagram();
        let line = fd.qk_line(3);
        assert_eq!(line.len(), 5);
        assert_approx_eq!(line[1].k, 0.25);
        assert_approx_eq!(line[1].q, 0.25);
    }
}

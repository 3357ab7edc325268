//! Riemann problems on a triangular fundamental diagram.

use crate::diagram::{FundamentalDiagram, DENSITY_EPS};
use smallvec::{smallvec, SmallVec};

/// A front separating two constant states.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wave {
    /// Speed of the front in length-units/time-unit.
    pub speed: f64,
    /// Density behind (upstream of) the front.
    pub upstream: f64,
    /// Density ahead of (downstream of) the front.
    pub downstream: f64,
}

/// Waves ordered from upstream to downstream.
pub type Waves = SmallVec<[Wave; 2]>;

/// The result of resolving the traffic state around an obstruction.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSolution {
    /// The flow through the obstruction.
    pub flow: f64,
    /// The density immediately upstream of the obstruction.
    pub upstream: f64,
    /// The density immediately downstream of the obstruction.
    pub downstream: f64,
    /// Waves travelling upstream (or standing) from the obstruction.
    pub upstream_waves: Waves,
    /// Waves travelling downstream (or standing) from the obstruction.
    pub downstream_waves: Waves,
}

/// Solves the Riemann problem between densities `kl` (upstream) and `kr`
/// (downstream). A triangular diagram never produces a fan: the solution is a
/// single shock, a single contact, or two contacts through the critical density.
pub fn solve(fd: &FundamentalDiagram, kl: f64, kr: f64) -> Waves {
    let kc = fd.critical_density();
    if (kl - kr).abs() <= DENSITY_EPS {
        smallvec![]
    } else if kl < kr {
        smallvec![wave(fd.secant_speed(kl, kr), kl, kr)]
    } else if kr >= kc - DENSITY_EPS {
        smallvec![wave(fd.congested_wave_speed(), kl, kr)]
    } else if kl <= kc + DENSITY_EPS {
        smallvec![wave(fd.free_flow_speed(), kl, kr)]
    } else {
        smallvec![
            wave(fd.congested_wave_speed(), kl, kc),
            wave(fd.free_flow_speed(), kc, kr),
        ]
    }
}

/// Resolves the state around an obstruction passing at most `capacity`,
/// with `kl` upstream and `kr` downstream of it.
pub fn solve_node(fd: &FundamentalDiagram, kl: f64, kr: f64, capacity: f64) -> NodeSolution {
    let flow = fd.demand(kl).min(fd.supply(kr)).min(capacity).max(0.0);
    let kc = fd.critical_density();

    let upstream = if kl <= kc && flow >= fd.q(kl) - DENSITY_EPS {
        kl
    } else {
        fd.congested_density(flow)
    };
    let downstream = if kr >= kc && flow >= fd.q(kr) - DENSITY_EPS {
        kr
    } else {
        fd.free_density(flow)
    };

    let mut upstream_waves = solve(fd, kl, upstream);
    for wave in &mut upstream_waves {
        wave.speed = wave.speed.min(0.0);
    }
    let mut downstream_waves = solve(fd, downstream, kr);
    for wave in &mut downstream_waves {
        wave.speed = wave.speed.max(0.0);
    }

    NodeSolution {
        flow,
        upstream,
        downstream,
        upstream_waves,
        downstream_waves,
    }
}

fn wave(speed: f64, upstream: f64, downstream: f64) -> Wave {
    Wave {
        speed,
        upstream,
        downstream,
    }
}

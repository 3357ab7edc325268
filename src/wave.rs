//! The wave field: every front in the time-position plane for one density.
//!
//! The road starts uniformly at the chosen density and is fed at that density
//! from upstream. An optional obstruction (signal, bottleneck) partitions the
//! plane into regions of constant state; the boundaries between regions are
//! tracked exactly, so every front is a straight segment.

use crate::config::Config;
use crate::diagram::{FundamentalDiagram, DENSITY_EPS};
use crate::error::Result;
use crate::math::{LineKind, LineSegment, Point2d};
use crate::util::Interval;
use itertools::Itertools;
use schedule::CapacitySchedule;

pub use riemann::{NodeSolution, Wave};

pub mod riemann;
mod schedule;
mod tracker;

/// Discontinuities closer than this are at the same point.
const COINCIDENT_EPS: f64 = 1e-7;

/// What kind of discontinuity a boundary is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BoundaryKind {
    Wave,
    Obstruction,
}

/// A straight discontinuity between two constant states.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Boundary {
    pub kind: BoundaryKind,
    pub origin: Point2d,
    pub end: Point2d,
    pub speed: f64,
    pub upstream: f64,
    pub downstream: f64,
}

/// A discontinuity in the density profile at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Discontinuity {
    /// Position of the discontinuity.
    pub position: f64,
    /// Speed of the discontinuity.
    pub speed: f64,
    /// Density immediately upstream.
    pub upstream: f64,
    /// Density immediately downstream.
    pub downstream: f64,
}

/// A stretch of road of constant density at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    /// The positions covered; the last region is unbounded downstream.
    pub span: Interval<f64>,
    /// The density within the region.
    pub density: f64,
    /// The cumulative vehicle count at the upstream end of the region.
    pub count: f64,
}

/// The fronts produced on the road for one chosen density.
#[derive(Clone, Debug)]
pub struct WaveField {
    fd: FundamentalDiagram,
    k: f64,
    times: Interval<f64>,
    road: Interval<f64>,
    boundaries: Vec<Boundary>,
    /// A position no front ever reaches, upstream of the road.
    far_upstream: f64,
}

impl WaveField {
    /// Tracks the fronts for density `k` under a configuration.
    pub fn new(config: &Config, k: f64) -> Result<Self> {
        let fd = FundamentalDiagram::new(config)?;
        fd.flow(k)?;
        Ok(Self::build(&fd, config, k))
    }

    /// Tracks the fronts for an already validated density.
    pub(crate) fn build(fd: &FundamentalDiagram, config: &Config, k: f64) -> Self {
        let times = config.time_window();
        let road = config.road();
        let schedule = CapacitySchedule::from_config(config, times.max);
        let boundaries = tracker::Tracker::new(fd, schedule.as_ref()).run(k, times.max);

        let far_upstream = boundaries
            .iter()
            .flat_map(|b| [b.origin.y, b.end.y])
            .fold(road.min, f64::min)
            - 1.0;

        log::debug!(
            "wave field at k = {}: {} boundaries",
            k,
            boundaries.len()
        );

        Self {
            fd: *fd,
            k,
            times,
            road,
            boundaries,
            far_upstream,
        }
    }

    /// The density the field was built for.
    pub fn density(&self) -> f64 {
        self.k
    }

    pub fn diagram(&self) -> &FundamentalDiagram {
        &self.fd
    }

    /// The time window covered by the field.
    pub fn times(&self) -> Interval<f64> {
        self.times
    }

    /// The extent of the road.
    pub fn road(&self) -> Interval<f64> {
        self.road
    }

    /// Every line of the space-time diagram: fronts, obstruction
    /// discontinuities and vehicle trajectories, clipped to the diagram.
    pub fn lines(&self) -> Vec<LineSegment> {
        let mut lines = self.wave_lines();
        lines.extend(crate::vehicle::trajectories(self));
        lines
    }

    /// The fronts and obstruction discontinuities, clipped to the diagram.
    pub fn wave_lines(&self) -> Vec<LineSegment> {
        self.boundaries
            .iter()
            .filter_map(|b| {
                let kind = match b.kind {
                    BoundaryKind::Wave => LineKind::Wave,
                    BoundaryKind::Obstruction => LineKind::Obstruction,
                };
                LineSegment::new(kind, b.origin, b.end).clip(self.times, self.road)
            })
            .collect()
    }

    /// The discontinuities present at time `t`, ordered upstream to
    /// downstream. Coincident discontinuities are chained so that each one's
    /// upstream state is the downstream state of the one before it.
    pub fn discontinuities_at(&self, t: f64) -> Vec<Discontinuity> {
        let sorted = self
            .boundaries_at(t)
            .map(|b| Discontinuity {
                position: b.origin.y + b.speed * (t - b.origin.x),
                speed: b.speed,
                upstream: b.upstream,
                downstream: b.downstream,
            })
            .sorted_by(|a, b| {
                a.position
                    .total_cmp(&b.position)
                    .then(a.speed.total_cmp(&b.speed))
            });
        chain_coincident(sorted, self.k)
    }

    /// The constant-density regions of the road at time `t`, ordered
    /// upstream to downstream, starting from a point no front has reached.
    pub fn regions_at(&self, t: f64) -> Vec<Region> {
        let mut regions = vec![];
        let mut start = self.far_upstream;
        let mut density = self.k;
        let mut count = self.fd.q(self.k) * t - self.k * start;
        for d in self.discontinuities_at(t) {
            let end = d.position.max(start);
            regions.push(Region {
                span: Interval::new(start, end),
                density,
                count,
            });
            count -= density * (end - start);
            start = end;
            density = d.downstream;
        }
        regions.push(Region {
            span: Interval::new(start, f64::INFINITY),
            density,
            count,
        });
        regions
    }

    /// The density at position `x` and time `t`. On a discontinuity, the
    /// downstream density is returned.
    pub fn density_at(&self, t: f64, x: f64) -> f64 {
        self.regions_at(t)
            .into_iter()
            .take_while(|r| r.span.min <= x)
            .last()
            .map_or(self.k, |r| r.density)
    }

    /// The cumulative vehicle count `N(t, x)`: vehicles are labelled by the
    /// integers, numbered upstream from the vehicle at the origin at time zero.
    pub fn cumulative_count(&self, t: f64, x: f64) -> f64 {
        if x <= self.far_upstream {
            return self.fd.q(self.k) * t - self.k * x;
        }
        self.regions_at(t)
            .into_iter()
            .filter(|r| r.span.min < x)
            .last()
            .map_or(0.0, |r| r.count - r.density * (x - r.span.min))
    }

    /// The boundaries alive at time `t`. Boundaries still live at the end of
    /// the window include their end point.
    pub(crate) fn boundaries_at(&self, t: f64) -> impl Iterator<Item = &Boundary> + '_ {
        let horizon = self.times.max;
        self.boundaries
            .iter()
            .filter(move |b| b.origin.x <= t && (t < b.end.x || b.end.x >= horizon))
    }

    pub(crate) fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }
}

/// Reorders each run of coincident discontinuities into a chain of states,
/// starting from the density upstream of all of them. Fronts meeting at a
/// collision arrive sorted by speed, which is not the order their states link.
fn chain_coincident(
    sorted: impl Iterator<Item = Discontinuity>,
    mut density: f64,
) -> Vec<Discontinuity> {
    let mut chained = vec![];
    let mut rest = sorted.peekable();
    while let Some(first) = rest.next() {
        let mut last = first.position;
        let mut cluster = vec![first];
        while let Some(d) = rest.next_if(|d| d.position - last <= COINCIDENT_EPS) {
            last = d.position;
            cluster.push(d);
        }
        while !cluster.is_empty() {
            let next = cluster
                .iter()
                .position(|d| (d.upstream - density).abs() <= DENSITY_EPS)
                .unwrap_or(0);
            let d = cluster.remove(next);
            density = d.downstream;
            chained.push(d);
        }
    }
    chained
}

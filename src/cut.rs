//! Observations through the cut rectangle.
//!
//! The cut is the rectangle `[tCut, tCut + T] x [xCut, xCut + X]` of the
//! space-time diagram. Its left edge is a snapshot of the road at `tCut`,
//! giving a density estimate; its bottom edge is a detector at `xCut`, giving
//! a flow estimate. Over the whole rectangle, Edie's generalized definitions
//! give both from the trajectories alone.

use crate::config::Config;
use crate::math::{LineKind, LineSegment};
use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// Window edges are inclusive up to this tolerance.
const WINDOW_EPS: f64 = 1e-9;

/// The observation rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CutPlane {
    times: Interval<f64>,
    positions: Interval<f64>,
}

/// Measurements of the traffic passing through the cut rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdieMeasurement {
    /// Vehicles on `[xCut, xCut + X]` at `tCut`.
    pub vehicles_in_space: usize,
    /// Vehicles passing `xCut` during `[tCut, tCut + T]`.
    pub vehicles_passing: usize,
    /// `vehicles_in_space / X`.
    pub snapshot_density: f64,
    /// `vehicles_passing / T`.
    pub detector_flow: f64,
    /// Total time spent in the rectangle divided by its area.
    pub density: f64,
    /// Total distance travelled in the rectangle divided by its area.
    pub flow: f64,
    /// The space-mean speed `flow / density`, if anyone was in the rectangle.
    pub speed: Option<f64>,
}

impl CutPlane {
    pub fn new(times: Interval<f64>, positions: Interval<f64>) -> Self {
        Self { times, positions }
    }

    /// The cut rectangle described by a configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cut_times(), config.cut_positions())
    }

    pub fn times(&self) -> Interval<f64> {
        self.times
    }

    pub fn positions(&self) -> Interval<f64> {
        self.positions
    }

    /// The positions at which trajectories cross the snapshot at `tCut`,
    /// ascending.
    pub fn density_markers(&self, lines: &[LineSegment]) -> Vec<f64> {
        let mut markers = trajectories(lines)
            .filter_map(|l| l.position_at(self.times.min))
            .filter(|x| self.positions.contains_approx(*x, WINDOW_EPS))
            .collect::<Vec<_>>();
        markers.sort_by(f64::total_cmp);
        markers
    }

    /// The times at which trajectories cross the detector at `xCut`,
    /// ascending.
    pub fn flow_markers(&self, lines: &[LineSegment]) -> Vec<f64> {
        let mut markers = trajectories(lines)
            .filter_map(|l| l.time_at(self.positions.min))
            .filter(|t| self.times.contains_approx(*t, WINDOW_EPS))
            .collect::<Vec<_>>();
        markers.sort_by(f64::total_cmp);
        markers
    }

    /// Measures density, flow and speed through the rectangle.
    pub fn measure(&self, lines: &[LineSegment]) -> EdieMeasurement {
        let vehicles_in_space = self.density_markers(lines).len();
        let vehicles_passing = self.flow_markers(lines).len();

        let (time_spent, distance) = trajectories(lines)
            .filter_map(|l| l.clip(self.times, self.positions))
            .fold((0.0, 0.0), |(time, dist), l| {
                (time + (l.t1 - l.t0), dist + (l.x1 - l.x0).abs())
            });
        let area = self.times.length() * self.positions.length();
        let density = time_spent / area;
        let flow = distance / area;

        EdieMeasurement {
            vehicles_in_space,
            vehicles_passing,
            snapshot_density: vehicles_in_space as f64 / self.positions.length(),
            detector_flow: vehicles_passing as f64 / self.times.length(),
            density,
            flow,
            speed: (time_spent > 0.0).then(|| distance / time_spent),
        }
    }
}

fn trajectories(lines: &[LineSegment]) -> impl Iterator<Item = &LineSegment> {
    lines.iter().filter(|l| l.kind == LineKind::Trajectory)
}

//! Geometry in the time-position plane.
//!
//! Points are `(t, x)` pairs: time on the horizontal axis, position along the
//! road on the vertical axis.

use crate::util::Interval;
use cgmath::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// A point in the time-position plane.
pub type Point2d = Point2<f64>;

/// A displacement in the time-position plane.
pub type Vector2d = Vector2<f64>;

/// What a line segment in the space-time diagram represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    /// Part of a vehicle's trajectory; its slope is the vehicle's speed.
    Trajectory,
    /// A front between two constant traffic states; its slope is the wave speed.
    Wave,
    /// The stationary discontinuity held by a closed or metered obstruction.
    Obstruction,
}

/// A directed segment from `(t0, x0)` to `(t1, x1)`, with `t0 <= t1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub t0: f64,
    pub x0: f64,
    pub t1: f64,
    pub x1: f64,
    pub kind: LineKind,
}

impl LineSegment {
    /// Creates a segment between two points.
    pub fn new(kind: LineKind, start: Point2d, end: Point2d) -> Self {
        Self {
            t0: start.x,
            x0: start.y,
            t1: end.x,
            x1: end.y,
            kind,
        }
    }

    pub fn start(&self) -> Point2d {
        Point2d::new(self.t0, self.x0)
    }

    pub fn end(&self) -> Point2d {
        Point2d::new(self.t1, self.x1)
    }

    /// The slope of the segment, in length-units per time-unit.
    pub fn speed(&self) -> f64 {
        let d = self.end() - self.start();
        if d.x.abs() < f64::EPSILON {
            0.0
        } else {
            d.y / d.x
        }
    }

    /// The position on the segment at time `t`, if `t0 <= t < t1`.
    ///
    /// The half-open range makes a cut through the shared endpoint of two
    /// consecutive segments hit exactly one of them.
    pub fn position_at(&self, t: f64) -> Option<f64> {
        if t >= self.t0 && t < self.t1 {
            Some(self.x0 + (t - self.t0) * self.speed())
        } else {
            None
        }
    }

    /// The time at which the segment passes position `x`, if `x` lies in the
    /// half-open position range it sweeps. Stationary segments never pass.
    pub fn time_at(&self, x: f64) -> Option<f64> {
        let (lo, hi) = if self.x0 <= self.x1 {
            (self.x0, self.x1)
        } else {
            (self.x1, self.x0)
        };
        if hi - lo < f64::EPSILON || x < lo || x >= hi {
            return None;
        }
        let u = (x - self.x0) / (self.x1 - self.x0);
        Some(self.t0 + u * (self.t1 - self.t0))
    }

    /// Clips the segment to the rectangle `times x positions`
    /// (Liang-Barsky). Returns `None` if nothing of positive length remains.
    pub fn clip(&self, times: Interval<f64>, positions: Interval<f64>) -> Option<Self> {
        let p = self.start();
        let d: Vector2d = self.end() - p;
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        let edges = [
            (-d.x, p.x - times.min),
            (d.x, times.max - p.x),
            (-d.y, p.y - positions.min),
            (d.y, positions.max - p.y),
        ];
        for (denom, num) in edges {
            if denom.abs() < f64::EPSILON {
                if num < 0.0 {
                    return None;
                }
            } else {
                let r = num / denom;
                if denom < 0.0 {
                    lo = lo.max(r);
                } else {
                    hi = hi.min(r);
                }
            }
        }
        if hi - lo <= f64::EPSILON {
            return None;
        }
        let start = p + d * lo;
        let end = p + d * hi;
        if (end - start).x <= f64::EPSILON && (end - start).y.abs() <= f64::EPSILON {
            return None;
        }
        Some(Self::new(self.kind, start, end))
    }
}

//! Vehicles moving through a wave field.
//!
//! At time zero vehicle `n` sits at `-n / k`, so positions are spaced by the
//! headway `1 / k` and labels grow upstream. Each vehicle then moves at the
//! speed of the region it occupies, bending wherever it crosses a front, so
//! that vehicle `n` always lies on the level set `N(t, x) = n` of the
//! cumulative count.

use crate::diagram::DENSITY_EPS;
use crate::math::{LineKind, LineSegment, Point2d};
use crate::wave::WaveField;
use itertools::Itertools;
use std::ops::RangeInclusive;

/// Counts within this of an integer are treated as that integer.
const COUNT_EPS: f64 = 1e-9;

/// Vehicles within this distance of a discontinuity are on it.
const POSITION_EPS: f64 = 1e-7;

/// Crossings sooner than this after the current instant are ignored.
const TIME_EPS: f64 = 1e-9;

/// Relative speeds below this are parallel.
const SPEED_EPS: f64 = 1e-12;

/// A vehicle this much faster or slower than a front still keeps pace with it.
const FIT_EPS: f64 = 1e-9;

/// Events this soon after the current instant have already happened.
const EVENT_EPS: f64 = 1e-7;

/// The most legs traced for a single trajectory.
const MAX_LEGS: usize = 256;

/// The positions of the vehicles on the road `(0, total]` at time `t`,
/// in ascending order.
pub fn car_positions(field: &WaveField, t: f64) -> Vec<f64> {
    if field.density() <= DENSITY_EPS {
        return vec![];
    }
    let road = field.road();
    let first = field.cumulative_count(t, road.max).floor() as i64 - 1;
    let last = field.cumulative_count(t, road.min).ceil() as i64 + 1;
    let mut positions = (first..=last)
        .filter_map(|label| trace(field, label, t).last().map(|p| p.y))
        .filter(|x| *x > road.min + POSITION_EPS && *x <= road.max + POSITION_EPS)
        .collect::<Vec<_>>();
    positions.sort_by(f64::total_cmp);
    positions
}

/// The path of vehicle `label` from the start to the end of the time window,
/// as the points where it changes speed.
pub fn trajectory(field: &WaveField, label: i64) -> Vec<Point2d> {
    trace(field, label, field.times().max)
}

/// Follows vehicle `label` from the start of the window until `until`.
fn trace(field: &WaveField, label: i64, until: f64) -> Vec<Point2d> {
    let k = field.density();
    if k <= DENSITY_EPS {
        return vec![];
    }
    let mut t = field.times().min;
    let mut x = -(label as f64) / k;
    let mut path = vec![Point2d::new(t, x)];
    for _ in 0..MAX_LEGS {
        if t >= until {
            break;
        }
        let v = speed_at(field, t, x);
        let next = next_crossing(field, t, x, v)
            .filter(|tau| *tau < until)
            .unwrap_or(until);
        x += v * (next - t);
        t = next;
        path.push(Point2d::new(t, x));
    }
    path
}

/// The trajectories of every vehicle which is on the road at some point in
/// the time window, clipped to the diagram.
pub fn trajectories(field: &WaveField) -> Vec<LineSegment> {
    let (times, road) = (field.times(), field.road());
    labels(field)
        .flat_map(|label| {
            trajectory(field, label)
                .windows(2)
                .filter_map(|leg| {
                    LineSegment::new(LineKind::Trajectory, leg[0], leg[1]).clip(times, road)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// The labels of vehicles which could appear on the road during the window:
/// those not already past its end at the start, nor still short of its
/// beginning at the finish.
fn labels(field: &WaveField) -> RangeInclusive<i64> {
    let (times, road) = (field.times(), field.road());
    let (first, last) = if field.density() <= DENSITY_EPS {
        (0, -1)
    } else {
        (
            (field.cumulative_count(times.min, road.max) - COUNT_EPS).ceil() as i64,
            (field.cumulative_count(times.max, road.min) + COUNT_EPS).floor() as i64,
        )
    };
    first..=last
}

/// The speed of a vehicle at `(t, x)`.
///
/// Fronts leaving the vehicle's point split the plane ahead of it into fans,
/// each holding one state. The vehicle enters the most downstream occupied fan
/// whose speed keeps it between that fan's bounding fronts. A vehicle which
/// only fits an empty fan leads the platoon behind it.
fn speed_at(field: &WaveField, t: f64, x: f64) -> f64 {
    let fd = field.diagram();
    let after = t + EVENT_EPS;
    let horizon = field.times().max;
    let fronts = field
        .boundaries()
        .iter()
        .filter(|b| b.origin.x <= after && (after < b.end.x || b.end.x >= horizon))
        .filter(|b| (b.origin.y + b.speed * (t - b.origin.x) - x).abs() <= POSITION_EPS)
        .sorted_by(|a, b| a.speed.total_cmp(&b.speed))
        .collect::<Vec<_>>();
    let (first, last) = match (fronts.first(), fronts.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return fd.speed(field.density_at(t, x)),
    };

    // Fan `j` lies between fronts `j - 1` and `j`.
    let fitting = (0..=fronts.len())
        .map(|j| {
            let behind = j.checked_sub(1).map(|i| fronts[i]);
            let density = behind.map_or(first.upstream, |b| b.downstream);
            let lower = behind.map_or(f64::NEG_INFINITY, |b| b.speed);
            let upper = fronts.get(j).map_or(f64::INFINITY, |b| b.speed);
            (density, lower, upper)
        })
        .filter(|&(density, lower, upper)| {
            let v = fd.speed(density);
            v >= lower - FIT_EPS && v <= upper + FIT_EPS
        })
        .map(|(density, ..)| density)
        .collect::<Vec<_>>();
    let density = fitting
        .iter()
        .rev()
        .find(|k| **k > DENSITY_EPS)
        .or_else(|| fitting.last())
        .copied()
        .unwrap_or(last.downstream);
    fd.speed(density)
}

/// The next time a vehicle at `(t, x)` moving at `v` meets a discontinuity.
fn next_crossing(field: &WaveField, t: f64, x: f64, v: f64) -> Option<f64> {
    field
        .boundaries()
        .iter()
        .filter(|b| b.end.x > b.origin.x)
        .filter_map(|b| {
            let rel = v - b.speed;
            if rel.abs() < SPEED_EPS {
                return None;
            }
            let xb = b.origin.y + b.speed * (t - b.origin.x);
            let tau = t + (xb - x) / rel;
            let hit = tau > t + TIME_EPS
                && tau >= b.origin.x - TIME_EPS
                && tau <= b.end.x + TIME_EPS;
            hit.then(|| tau)
        })
        .min_by(|a, b| a.total_cmp(b))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Config, ObstructionPolicy};
    use assert_approx_eq::assert_approx_eq;

    fn uniform() -> Config {
        Config {
            policy: ObstructionPolicy::Uniform,
            ..Default::default()
        }
    }

    fn signal() -> Config {
        Config {
            policy: ObstructionPolicy::Signal {
                position: 60.0,
                red: 25.0,
                green: 25.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn free_flow_headway() {
        let field = WaveField::new(&uniform(), 0.1).unwrap();
        for t in [0.0, 13.7, 50.0, 99.0] {
            let positions = car_positions(&field, t);
            assert_eq!(positions.len(), 10);
            for pair in positions.windows(2) {
                assert_approx_eq!(pair[1] - pair[0], 10.0, 1e-9);
            }
        }
    }

    #[test]
    fn free_flow_vehicles_advance() {
        let field = WaveField::new(&uniform(), 0.1).unwrap();
        let before = car_positions(&field, 0.0);
        let after = car_positions(&field, 3.0);
        assert_approx_eq!(after[0], before[0] - 7.0, 1e-9);
    }

    #[test]
    fn empty_road_has_no_vehicles() {
        let field = WaveField::new(&signal(), 0.0).unwrap();
        for t in [0.0, 25.0, 100.0] {
            assert!(car_positions(&field, t).is_empty());
        }
        assert!(trajectories(&field).is_empty());
    }

    #[test]
    fn jam_count_is_constant() {
        let field = WaveField::new(&signal(), 1.0).unwrap();
        for t in [0.0, 10.0, 30.0, 77.7, 100.0] {
            assert_eq!(car_positions(&field, t).len(), 100);
        }
    }

    #[test]
    fn positions_ascend() {
        let field = WaveField::new(&signal(), 0.2).unwrap();
        for t in [0.0, 12.0, 40.0, 60.0, 90.0] {
            let positions = car_positions(&field, t);
            assert!(positions.windows(2).all(|p| p[0] < p[1]));
        }
    }

    #[test]
    fn queue_packs_to_jam_spacing() {
        let field = WaveField::new(&signal(), 0.1).unwrap();
        // Mid-red the queue behind the stop line is at jam spacing.
        let queued = car_positions(&field, 24.0)
            .into_iter()
            .filter(|x| *x > 57.0 && *x <= 60.0)
            .collect::<Vec<_>>();
        assert!(queued.len() >= 2);
        for pair in queued.windows(2) {
            assert_approx_eq!(pair[1] - pair[0], 1.0, 1e-9);
        }
    }

    #[test]
    fn vehicle_stops_at_queue_and_leaves_on_green() {
        // The vehicle at x = 50 joins the queue at t = 9 and stays at x = 59
        // until the discharge wave reaches it at t = 28.
        let field = WaveField::new(&signal(), 0.1).unwrap();
        let path = trajectory(&field, -5);
        assert_approx_eq!(path[0].y, 50.0, 1e-9);
        assert_approx_eq!(path[1].x, 9.0, 1e-9);
        assert_approx_eq!(path[1].y, 59.0, 1e-9);
        assert_approx_eq!(path[2].x, 28.0, 1e-9);
        assert_approx_eq!(path[2].y, 59.0, 1e-9);
    }

    #[test]
    fn vehicles_follow_cumulative_count() {
        for k in [0.1, 0.2, 0.5] {
            let field = WaveField::new(&signal(), k).unwrap();
            for label in labels(&field) {
                let path = trajectory(&field, label);
                for point in &path {
                    let n = field.cumulative_count(point.x, point.y);
                    assert_approx_eq!(n, label as f64, 1e-6);
                }
            }
        }
    }

    #[test]
    fn vehicles_never_reverse() {
        let field = WaveField::new(&signal(), 0.3).unwrap();
        for label in labels(&field) {
            let path = trajectory(&field, label);
            assert!(path.windows(2).all(|leg| leg[1].y >= leg[0].y - 1e-9));
            assert!(path.windows(2).all(|leg| leg[1].x >= leg[0].x));
        }
    }

    #[test]
    fn leader_is_not_left_behind() {
        // Vehicle -6 sits at the stop line when the light turns red and
        // clears it; the queue forms behind it.
        let field = WaveField::new(&signal(), 0.1).unwrap();
        let positions = car_positions(&field, 24.0);
        assert!(positions.iter().any(|x| (x - 84.0).abs() < 1e-9));
        assert!(!positions.iter().any(|x| (x - 60.0).abs() < 1e-9));
    }

    #[test]
    fn vehicle_joins_discharge_at_collision() {
        // Vehicle -36 meets the queue's tail where the discharge front
        // overtakes it, and leaves at the discharge speed rather than vf.
        let field = WaveField::new(&signal(), 0.6).unwrap();
        let path = trajectory(&field, -36);
        assert_eq!(path.len(), 3);
        assert_approx_eq!(path[1].x, 225.0 / 7.0, 1e-9);
        assert_approx_eq!(path[1].y, 60.0 + 50.0 / 7.0, 1e-9);
        assert_approx_eq!(path[2].x, 100.0, 1e-9);
        assert_approx_eq!(path[2].y, 60.0 + 200.0 / 9.0, 1e-6);
        for point in &path {
            assert_approx_eq!(field.cumulative_count(point.x, point.y), -36.0, 1e-6);
        }

        let positions = car_positions(&field, 60.0);
        assert!(positions.windows(2).all(|p| p[1] - p[0] >= 1.0 - 1e-6));
    }

    #[test]
    fn density_sweep_keeps_vehicles_apart() {
        let config = signal();
        let jam_spacing = 1.0 / config.kj;
        for i in 0..=100 {
            let k = i as f64 / 100.0;
            let field = WaveField::new(&config, k).unwrap();
            for label in labels(&field) {
                let path = trajectory(&field, label);
                for point in &path {
                    let n = field.cumulative_count(point.x, point.y);
                    assert!((n - label as f64).abs() < 1e-6, "k = {k}, label {label}");
                }
                assert!(path.windows(2).all(|leg| leg[1].y >= leg[0].y - 1e-9));
            }
            for step in 0..=40 {
                let t = step as f64 * 2.5;
                let positions = car_positions(&field, t);
                assert!(
                    positions.windows(2).all(|p| p[1] - p[0] >= jam_spacing - 1e-6),
                    "k = {k}, t = {t}"
                );
            }
        }
    }

    #[test]
    fn uniform_count_follows_moving_lattice() {
        // Off-lattice densities start with floor(total * k) vehicles, then
        // gain one whenever a vehicle enters before the leader leaves.
        for (k, floor) in [(0.333, 33), (0.123, 12)] {
            let field = WaveField::new(&uniform(), k).unwrap();
            assert_eq!(car_positions(&field, 0.0).len(), floor);
            let mut counts = (0..=200)
                .map(|step| car_positions(&field, step as f64 * 0.5).len())
                .collect::<Vec<_>>();
            counts.sort();
            counts.dedup();
            assert_eq!(counts, vec![floor, floor + 1]);
        }
    }

    #[test]
    fn jam_trajectories_are_static() {
        let field = WaveField::new(&uniform(), 1.0).unwrap();
        let lines = trajectories(&field);
        assert!(lines.iter().all(|l| l.x0 == l.x1));
    }
}

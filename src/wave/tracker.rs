use super::riemann::{self, Wave};
use super::schedule::CapacitySchedule;
use super::{Boundary, BoundaryKind};
use crate::diagram::{FundamentalDiagram, DENSITY_EPS};
use crate::math::Point2d;
use slotmap::{new_key_type, SlotMap};

/// Stop tracking after this many events; only reachable through
/// floating-point degeneracies.
const MAX_EVENTS: usize = 10_000;

/// Fronts closing slower than this are treated as parallel.
const SPEED_EPS: f64 = 1e-12;

new_key_type! {
    /// Unique ID of a live front.
    struct FrontId;
}

/// A front which is still propagating.
#[derive(Clone, Copy, Debug)]
struct LiveFront {
    origin: Point2d,
    wave: Wave,
}

/// An element of the road, ordered upstream to downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Front(FrontId),
    Node,
}

/// The state held across the obstruction.
#[derive(Clone, Copy, Debug)]
struct NodeState {
    position: f64,
    capacity: f64,
    upstream: f64,
    downstream: f64,
    /// When the current upstream/downstream pair came into force.
    since: f64,
}

#[derive(Clone, Copy, Debug)]
enum Event {
    /// The fronts at `order[i]` and `order[i + 1]` meet.
    Collision(usize),
    /// The front at `order[i]` reaches the obstruction.
    Absorb(usize),
    /// The obstruction's capacity changes.
    CapacityChange,
}

/// Tracks every front on an initially uniform road up to a time horizon.
pub(super) struct Tracker<'a> {
    fd: &'a FundamentalDiagram,
    schedule: Option<&'a CapacitySchedule>,
    fronts: SlotMap<FrontId, LiveFront>,
    order: Vec<Slot>,
    node: Option<NodeState>,
    next_change: usize,
    now: f64,
    finished: Vec<Boundary>,
}

impl<'a> Tracker<'a> {
    pub fn new(fd: &'a FundamentalDiagram, schedule: Option<&'a CapacitySchedule>) -> Self {
        Self {
            fd,
            schedule,
            fronts: SlotMap::with_key(),
            order: vec![],
            node: None,
            next_change: 0,
            now: 0.0,
            finished: vec![],
        }
    }

    /// Runs the tracker from a uniform density `k` at time zero until
    /// `horizon`, returning every front and obstruction discontinuity.
    pub fn run(mut self, k: f64, horizon: f64) -> Vec<Boundary> {
        if let Some(schedule) = self.schedule {
            self.order.push(Slot::Node);
            self.node = Some(NodeState {
                position: schedule.position(),
                capacity: schedule.initial(),
                upstream: k,
                downstream: k,
                since: 0.0,
            });
            self.resolve_node(k, k);
        }

        let mut events = 0;
        while let Some((time, event)) = self.next_event() {
            // Nothing born at the horizon has any extent.
            if time >= horizon {
                break;
            }
            self.now = time;
            match event {
                Event::Collision(idx) => self.collide(idx),
                Event::Absorb(idx) => self.absorb(idx),
                Event::CapacityChange => self.change_capacity(),
            }
            events += 1;
            if events >= MAX_EVENTS {
                log::warn!(
                    "front tracking at k = {} stopped after {} events at t = {}",
                    k,
                    events,
                    self.now
                );
                break;
            }
        }
        log::debug!("tracked k = {} through {} events", k, events);

        self.finish(horizon)
    }

    /// Finds the earliest pending event.
    fn next_event(&self) -> Option<(f64, Event)> {
        let mut best: Option<(f64, Event)> = None;
        let mut consider = |time: f64, event: Event| {
            if best.map_or(true, |(t, _)| time < t) {
                best = Some((time, event));
            }
        };

        for (idx, pair) in self.order.windows(2).enumerate() {
            match (pair[0], pair[1]) {
                (Slot::Front(a), Slot::Front(b)) => {
                    let (a, b) = (&self.fronts[a], &self.fronts[b]);
                    let closing = a.wave.speed - b.wave.speed;
                    if closing > SPEED_EPS {
                        let gap = self.position(b) - self.position(a);
                        consider(self.now + gap.max(0.0) / closing, Event::Collision(idx));
                    }
                }
                (Slot::Front(a), Slot::Node) => {
                    let front = &self.fronts[a];
                    if front.wave.speed > SPEED_EPS {
                        let gap = self.node_position() - self.position(front);
                        consider(
                            self.now + gap.max(0.0) / front.wave.speed,
                            Event::Absorb(idx),
                        );
                    }
                }
                (Slot::Node, Slot::Front(b)) => {
                    let front = &self.fronts[b];
                    if front.wave.speed < -SPEED_EPS {
                        let gap = self.position(front) - self.node_position();
                        consider(
                            self.now + gap.max(0.0) / -front.wave.speed,
                            Event::Absorb(idx + 1),
                        );
                    }
                }
                _ => {}
            }
        }

        if let Some(&(time, _)) = self
            .schedule
            .and_then(|schedule| schedule.changes().get(self.next_change))
        {
            consider(time.max(self.now), Event::CapacityChange);
        }

        best
    }

    /// Two adjacent fronts meet: replace them with the solution of the
    /// Riemann problem between their outer states.
    fn collide(&mut self, idx: usize) {
        let (a, b) = match (self.order[idx], self.order[idx + 1]) {
            (Slot::Front(a), Slot::Front(b)) => (a, b),
            _ => unreachable!("collision between non-fronts"),
        };
        let a = self.retire(a);
        let b = self.retire(b);
        let x = 0.5 * (a.end.y + b.end.y);
        let origin = Point2d::new(self.now, x);

        let waves = riemann::solve(self.fd, a.upstream, b.downstream);
        let slots = waves
            .into_iter()
            .map(|wave| Slot::Front(self.fronts.insert(LiveFront { origin, wave })))
            .collect::<Vec<_>>();
        self.order.splice(idx..idx + 2, slots);
    }

    /// A front runs into the obstruction, changing the state on one side.
    fn absorb(&mut self, idx: usize) {
        let id = match self.order[idx] {
            Slot::Front(id) => id,
            Slot::Node => unreachable!("obstruction cannot absorb itself"),
        };
        let from_upstream = self.order.get(idx + 1) == Some(&Slot::Node);
        let front = self.retire(id);
        self.order.remove(idx);

        let node = self.node_state();
        if from_upstream {
            self.resolve_node(front.upstream, node.downstream);
        } else {
            self.resolve_node(node.upstream, front.downstream);
        }
    }

    fn change_capacity(&mut self) {
        let now = self.now;
        let capacity = self.schedule.map(|schedule| schedule.capacity_at(now));
        self.next_change += 1;
        if let (Some(capacity), Some(node)) = (capacity, self.node.as_mut()) {
            node.capacity = capacity;
            let (kl, kr) = (node.upstream, node.downstream);
            self.resolve_node(kl, kr);
        }
    }

    /// Re-solves the state around the obstruction, given the densities
    /// immediately upstream and downstream of it, and emits the resulting waves.
    fn resolve_node(&mut self, kl: f64, kr: f64) {
        let node = self.node_state();
        let solution = riemann::solve_node(self.fd, kl, kr, node.capacity);

        let changed = (solution.upstream - node.upstream).abs() > DENSITY_EPS
            || (solution.downstream - node.downstream).abs() > DENSITY_EPS;
        if changed {
            self.close_node(self.now);
            if let Some(node) = self.node.as_mut() {
                node.upstream = solution.upstream;
                node.downstream = solution.downstream;
                node.since = self.now;
            }
        }

        let origin = Point2d::new(self.now, node.position);
        let idx = self
            .order
            .iter()
            .position(|slot| *slot == Slot::Node)
            .unwrap_or(self.order.len());
        let downstream = solution
            .downstream_waves
            .into_iter()
            .map(|wave| Slot::Front(self.fronts.insert(LiveFront { origin, wave })))
            .collect::<Vec<_>>();
        self.order.splice(idx + 1..idx + 1, downstream);
        let upstream = solution
            .upstream_waves
            .into_iter()
            .map(|wave| Slot::Front(self.fronts.insert(LiveFront { origin, wave })))
            .collect::<Vec<_>>();
        self.order.splice(idx..idx, upstream);
    }

    /// Records the obstruction's discontinuity up to time `t`, if it held one.
    fn close_node(&mut self, t: f64) {
        if let Some(node) = self.node {
            if t > node.since && (node.upstream - node.downstream).abs() > DENSITY_EPS {
                self.finished.push(Boundary {
                    kind: BoundaryKind::Obstruction,
                    origin: Point2d::new(node.since, node.position),
                    end: Point2d::new(t, node.position),
                    speed: 0.0,
                    upstream: node.upstream,
                    downstream: node.downstream,
                });
            }
        }
    }

    /// Removes a live front, recording its path up to now.
    fn retire(&mut self, id: FrontId) -> Boundary {
        let front = self.fronts.remove(id).expect("front is live");
        let boundary = Boundary {
            kind: BoundaryKind::Wave,
            origin: front.origin,
            end: Point2d::new(self.now, self.position(&front)),
            speed: front.wave.speed,
            upstream: front.wave.upstream,
            downstream: front.wave.downstream,
        };
        self.finished.push(boundary);
        boundary
    }

    /// Closes everything still live at the horizon.
    fn finish(mut self, horizon: f64) -> Vec<Boundary> {
        self.now = horizon;
        let live = self
            .order
            .iter()
            .filter_map(|slot| match slot {
                Slot::Front(id) => Some(*id),
                Slot::Node => None,
            })
            .collect::<Vec<_>>();
        for id in live {
            self.retire(id);
        }
        self.close_node(horizon);
        self.finished
    }

    fn position(&self, front: &LiveFront) -> f64 {
        front.origin.y + front.wave.speed * (self.now - front.origin.x)
    }

    fn node_state(&self) -> NodeState {
        self.node.expect("tracker has an obstruction")
    }

    fn node_position(&self) -> f64 {
        self.node_state().position
    }
}

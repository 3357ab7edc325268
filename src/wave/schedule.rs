use crate::config::{Config, ObstructionPolicy};

/// The capacity of an obstruction over time.
#[derive(Clone, Debug, PartialEq)]
pub struct CapacitySchedule {
    /// Where the obstruction stands.
    position: f64,
    /// The capacity at time zero.
    initial: f64,
    /// Times at which the capacity changes, with the new capacity, ascending.
    changes: Vec<(f64, f64)>,
}

impl CapacitySchedule {
    /// Builds the schedule for a configuration's policy over `[0, horizon]`,
    /// or `None` if nothing obstructs the road.
    pub fn from_config(config: &Config, horizon: f64) -> Option<Self> {
        let open = config.q0;
        match config.policy {
            ObstructionPolicy::Uniform => None,
            ObstructionPolicy::Signal {
                position,
                red,
                green,
            } => {
                let period = red + green;
                let mut changes = vec![];
                let mut start = 0.0;
                while start < horizon {
                    changes.push((start + red, open));
                    changes.push((start + period, 0.0));
                    start += period;
                }
                changes.retain(|(t, _)| *t <= horizon);
                Some(Self {
                    position,
                    initial: 0.0,
                    changes,
                })
            }
            ObstructionPolicy::Bottleneck {
                position,
                capacity,
                start,
                end,
            } => {
                let (initial, changes) = if start <= 0.0 {
                    (capacity, vec![(end, open)])
                } else {
                    (open, vec![(start, capacity), (end, open)])
                };
                Some(Self {
                    position,
                    initial,
                    changes: changes.into_iter().filter(|(t, _)| *t <= horizon).collect(),
                })
            }
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn changes(&self) -> &[(f64, f64)] {
        &self.changes
    }

    /// The capacity in force at time `t`.
    pub fn capacity_at(&self, t: f64) -> f64 {
        self.changes
            .iter()
            .take_while(|(time, _)| *time <= t)
            .last()
            .map_or(self.initial, |(_, capacity)| *capacity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uniform_has_no_schedule() {
        let config = Config {
            policy: ObstructionPolicy::Uniform,
            ..Default::default()
        };
        assert_eq!(CapacitySchedule::from_config(&config, 100.0), None);
    }

    #[test]
    fn signal_alternates() {
        let config = Config {
            policy: ObstructionPolicy::Signal {
                position: 60.0,
                red: 20.0,
                green: 30.0,
            },
            ..Default::default()
        };
        let schedule = CapacitySchedule::from_config(&config, 100.0).unwrap();
        assert_eq!(schedule.position(), 60.0);
        assert_eq!(schedule.capacity_at(0.0), 0.0);
        assert_eq!(schedule.capacity_at(19.9), 0.0);
        assert_eq!(schedule.capacity_at(20.0), 0.25);
        assert_eq!(schedule.capacity_at(50.0), 0.0);
        assert_eq!(schedule.capacity_at(75.0), 0.25);
        assert_eq!(
            schedule.changes(),
            &[(20.0, 0.25), (50.0, 0.0), (70.0, 0.25), (100.0, 0.0)]
        );
    }

    #[test]
    fn bottleneck_window() {
        let config = Config {
            policy: ObstructionPolicy::Bottleneck {
                position: 50.0,
                capacity: 0.1,
                start: 10.0,
                end: 40.0,
            },
            ..Default::default()
        };
        let schedule = CapacitySchedule::from_config(&config, 100.0).unwrap();
        assert_eq!(schedule.capacity_at(5.0), 0.25);
        assert_eq!(schedule.capacity_at(10.0), 0.1);
        assert_eq!(schedule.capacity_at(40.0), 0.25);
    }
}

//! Static model configuration.

use crate::error::{Error, Result};
use crate::util::Interval;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The static parameters of the traffic model.
///
/// A configuration is supplied once at startup and never changes afterwards.
/// Field names in JSON follow the diagram's conventions (`kj`, `q0`, `tCut`...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// The jam density in veh/length-unit.
    pub kj: f64,
    /// The capacity flow in veh/time-unit.
    pub q0: f64,
    /// The free-flow speed in length-units/time-unit.
    pub vf: f64,
    /// The length of one playback loop in time-units.
    pub cycle: f64,
    /// The extent of the road in length-units.
    pub total: f64,
    /// Milliseconds of wall-clock time per time-unit of simulated time.
    pub delta: f64,
    /// The drawn length of a vehicle.
    pub car_length: f64,
    /// The drawn width of a vehicle.
    pub car_width: f64,
    /// The drawn width of the road.
    pub road_width: f64,
    /// The time at which the cut rectangle begins.
    pub t_cut: f64,
    /// The position at which the cut rectangle begins.
    pub x_cut: f64,
    /// The duration of the cut rectangle.
    #[serde(rename = "T")]
    pub cut_duration: f64,
    /// The length of the cut rectangle.
    #[serde(rename = "X")]
    pub cut_length: f64,
    /// Number of intervals used to sample the flow-density curve.
    pub qk_resolution: usize,
    /// How the road is obstructed over time.
    pub policy: ObstructionPolicy,
}

/// The rule which partitions the time-position plane into regions of
/// constant traffic state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObstructionPolicy {
    /// Nothing obstructs the road; the whole plane has the chosen density.
    Uniform,
    /// A fixed-time traffic signal. Each cycle starts with `red` time-units of
    /// red, followed by `green` time-units of green, starting from time zero.
    Signal { position: f64, red: f64, green: f64 },
    /// A bottleneck (ramp meter, incident) which caps the flow past
    /// `position` to `capacity` during `[start, end)`.
    Bottleneck {
        position: f64,
        capacity: f64,
        start: f64,
        end: f64,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kj: 1.0,
            q0: 0.25,
            vf: 1.0,
            cycle: 100.0,
            total: 100.0,
            delta: 50.0,
            car_length: 0.8,
            car_width: 0.5,
            road_width: 1.0,
            t_cut: 20.0,
            x_cut: 20.0,
            cut_duration: 20.0,
            cut_length: 20.0,
            qk_resolution: 100,
            policy: ObstructionPolicy::Signal {
                position: 60.0,
                red: 25.0,
                green: 25.0,
            },
        }
    }
}

impl Config {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            Error::InvalidConfiguration(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_json(&json)
    }

    /// The critical density at which flow peaks.
    pub fn kc(&self) -> f64 {
        self.q0 / self.vf
    }

    /// The time window covered by one playback loop.
    pub fn time_window(&self) -> Interval<f64> {
        Interval::new(0.0, self.cycle)
    }

    /// The extent of the road.
    pub fn road(&self) -> Interval<f64> {
        Interval::new(0.0, self.total)
    }

    /// The time window of the cut rectangle.
    pub fn cut_times(&self) -> Interval<f64> {
        Interval::new(self.t_cut, self.t_cut + self.cut_duration)
    }

    /// The position window of the cut rectangle.
    pub fn cut_positions(&self) -> Interval<f64> {
        Interval::new(self.x_cut, self.x_cut + self.cut_length)
    }

    /// Checks the invariants every other module relies on.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("kj", self.kj),
            ("q0", self.q0),
            ("vf", self.vf),
            ("cycle", self.cycle),
            ("total", self.total),
            ("delta", self.delta),
            ("carLength", self.car_length),
            ("carWidth", self.car_width),
            ("roadWidth", self.road_width),
            ("T", self.cut_duration),
            ("X", self.cut_length),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(self.t_cut.is_finite() && self.t_cut >= 0.0) {
            return Err(invalid(format!("tCut must be non-negative, got {}", self.t_cut)));
        }
        if !(self.x_cut.is_finite() && self.x_cut >= 0.0) {
            return Err(invalid(format!("xCut must be non-negative, got {}", self.x_cut)));
        }
        if self.qk_resolution == 0 {
            return Err(invalid("qkResolution must be at least 1".into()));
        }
        if self.kc() >= self.kj {
            return Err(invalid(format!(
                "critical density {} must be below jam density {}",
                self.kc(),
                self.kj
            )));
        }
        self.validate_policy()
    }

    fn validate_policy(&self) -> Result<()> {
        match self.policy {
            ObstructionPolicy::Uniform => Ok(()),
            ObstructionPolicy::Signal {
                position,
                red,
                green,
            } => {
                if !self.road().contains(position) {
                    return Err(invalid(format!("signal position {} is off the road", position)));
                }
                if !(red > 0.0 && green > 0.0) {
                    return Err(invalid(format!(
                        "signal phases must be positive, got red {} and green {}",
                        red, green
                    )));
                }
                Ok(())
            }
            ObstructionPolicy::Bottleneck {
                position,
                capacity,
                start,
                end,
            } => {
                if !self.road().contains(position) {
                    return Err(invalid(format!(
                        "bottleneck position {} is off the road",
                        position
                    )));
                }
                if !(0.0..=self.q0).contains(&capacity) {
                    return Err(invalid(format!(
                        "bottleneck capacity {} is outside [0, {}]",
                        capacity, self.q0
                    )));
                }
                if !(start >= 0.0 && end > start) {
                    return Err(invalid(format!(
                        "bottleneck window [{}, {}) is empty",
                        start, end
                    )));
                }
                Ok(())
            }
        }
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidConfiguration(reason)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = Config::from_json(r#"{ "kj": 2.0, "tCut": 5.0, "T": 10.0 }"#).unwrap();
        assert_eq!(config.kj, 2.0);
        assert_eq!(config.t_cut, 5.0);
        assert_eq!(config.cut_duration, 10.0);
        assert_eq!(config.q0, Config::default().q0);
    }

    #[test]
    fn policy_from_json() {
        let config = Config::from_json(
            r#"{ "policy": { "type": "bottleneck", "position": 50.0, "capacity": 0.1, "start": 0.0, "end": 40.0 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.policy,
            ObstructionPolicy::Bottleneck {
                position: 50.0,
                capacity: 0.1,
                start: 0.0,
                end: 40.0
            }
        );
    }

    #[test]
    fn rejects_non_positive_fields() {
        for json in [
            r#"{ "kj": 0.0 }"#,
            r#"{ "q0": -1.0 }"#,
            r#"{ "cycle": 0.0 }"#,
            r#"{ "total": -5.0 }"#,
        ] {
            assert!(matches!(
                Config::from_json(json),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn rejects_inconsistent_branches() {
        // kc = q0 / vf = 2 lies beyond the jam density.
        let config = Config {
            q0: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_bad_policies() {
        let off_road = Config {
            policy: ObstructionPolicy::Signal {
                position: 150.0,
                red: 10.0,
                green: 10.0,
            },
            ..Default::default()
        };
        assert!(off_road.validate().is_err());

        let too_much = Config {
            policy: ObstructionPolicy::Bottleneck {
                position: 50.0,
                capacity: 1.0,
                start: 0.0,
                end: 10.0,
            },
            ..Default::default()
        };
        assert!(too_much.validate().is_err());
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(Config::from_json("{ kj: }"), Err(Error::Parse(_))));
    }
}

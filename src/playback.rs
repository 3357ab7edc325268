use crate::config::Config;
use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// The state the viewer is looking at: which density, which instant, and
/// whether time is running.
///
/// Playback is a plain value. The caller owns it, feeds it timer ticks and
/// user input, and hands it to the model to render a frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playback {
    /// The chosen uniform density.
    pub k: f64,
    /// The current instant within the playback loop.
    pub time: f64,
    /// Whether `tick` advances time.
    pub playing: bool,
}

/// An input to the playback state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// `dt` milliseconds of wall-clock time elapsed.
    Tick(f64),
    SetPlaying(bool),
    SetDensity(f64),
    SetTime(f64),
}

impl Playback {
    /// Paused at time zero, at the critical density.
    pub fn new(config: &Config) -> Self {
        Self {
            k: config.kc(),
            time: 0.0,
            playing: false,
        }
    }

    /// Applies one input, returning the next state.
    pub fn apply(self, action: Action, config: &Config) -> Self {
        match action {
            Action::Tick(dt) => self.tick(dt, config),
            Action::SetPlaying(playing) => Self { playing, ..self },
            Action::SetDensity(k) => self.with_density(k, config),
            Action::SetTime(time) => self.with_time(time, config),
        }
    }

    /// Advances time by `dt_ms / delta` if playing, looping back to the start
    /// of the cycle.
    pub fn tick(self, dt_ms: f64, config: &Config) -> Self {
        if !self.playing || !dt_ms.is_finite() {
            return self;
        }
        let time = (self.time + dt_ms / config.delta).rem_euclid(config.cycle);
        Self { time, ..self }
    }

    /// Selects density `k`, clamped to `[0, kj]`.
    pub fn with_density(self, k: f64, config: &Config) -> Self {
        if k.is_nan() {
            return self;
        }
        Self {
            k: Interval::new(0.0, config.kj).clamp(k),
            ..self
        }
    }

    /// Jumps to `time`, clamped to `[0, cycle]`.
    pub fn with_time(self, time: f64, config: &Config) -> Self {
        if time.is_nan() {
            return self;
        }
        Self {
            time: config.time_window().clamp(time),
            ..self
        }
    }

    pub fn toggled(self) -> Self {
        Self {
            playing: !self.playing,
            ..self
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn paused_ticks_do_nothing() {
        let config = Config::default();
        let state = Playback::new(&config);
        assert_eq!(state.tick(1000.0, &config), state);
    }

    #[test]
    fn tick_scales_by_delta() {
        let config = Config::default();
        let state = Playback::new(&config).toggled().tick(125.0, &config);
        assert_approx_eq!(state.time, 2.5);
    }

    #[test]
    fn tick_wraps_at_cycle() {
        let config = Config::default();
        let state = Playback {
            k: 0.1,
            time: 99.0,
            playing: true,
        };
        assert_approx_eq!(state.tick(100.0, &config).time, 1.0);
    }

    #[test]
    fn inputs_are_clamped() {
        let config = Config::default();
        let state = Playback::new(&config)
            .with_density(3.0, &config)
            .with_time(-4.0, &config);
        assert_eq!(state.k, config.kj);
        assert_eq!(state.time, 0.0);
        let state = state
            .with_density(-1.0, &config)
            .with_time(250.0, &config);
        assert_eq!(state.k, 0.0);
        assert_eq!(state.time, config.cycle);
    }

    #[test]
    fn actions() {
        let config = Config::default();
        let state = [
            Action::SetDensity(0.4),
            Action::SetTime(10.0),
            Action::Tick(50.0),
            Action::SetPlaying(true),
            Action::Tick(50.0),
        ]
        .into_iter()
        .fold(Playback::new(&config), |state, action| {
            state.apply(action, &config)
        });
        assert_eq!(
            state,
            Playback {
                k: 0.4,
                time: 11.0,
                playing: true
            }
        );
    }
}

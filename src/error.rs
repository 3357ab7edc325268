//! Error types.

use thiserror::Error;

/// An error raised at the boundary of the traffic model.
#[derive(Debug, Error)]
pub enum Error {
    /// A density outside `[0, kj]`.
    #[error("density {k} is outside [0, {kj}]")]
    InvalidDensity { k: f64, kj: f64 },

    /// A time outside `[0, cycle]`.
    #[error("time {time} is outside [0, {cycle}]")]
    InvalidTime { time: f64, cycle: f64 },

    /// A configuration which violates the model's invariants.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A configuration file which could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! A kinematic-wave (LWR) traffic model for drawing space-time diagrams.
//!
//! The [FundamentalDiagram] fixes how flow depends on density. For a chosen
//! uniform density, a [WaveField] tracks every front produced when the road is
//! obstructed (by a signal or a bottleneck), and the vehicles moving through
//! those fronts. A [CutPlane] observes both through a rectangular window.
//! [TrafficModel] ties these together behind a validated API.

pub use cgmath;
pub use config::{Config, ObstructionPolicy};
pub use cut::{CutPlane, EdieMeasurement};
pub use diagram::{FundamentalDiagram, QkPoint, Regime};
pub use error::{Error, Result};
pub use math::{LineKind, LineSegment, Point2d};
pub use model::{FieldCache, Frame, TrafficModel};
pub use playback::{Action, Playback};
pub use util::Interval;
pub use vehicle::{car_positions, trajectory};
pub use wave::{Discontinuity, Region, WaveField};

mod config;
mod cut;
mod diagram;
mod error;
pub mod math;
mod model;
mod playback;
mod util;
mod vehicle;
pub mod wave;

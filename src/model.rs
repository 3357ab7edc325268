//! The entry point: every output of the space-time diagram, validated at the
//! call boundary.

use crate::config::Config;
use crate::cut::{CutPlane, EdieMeasurement};
use crate::diagram::{FundamentalDiagram, QkPoint};
use crate::error::{Error, Result};
use crate::math::LineSegment;
use crate::playback::Playback;
use crate::vehicle;
use crate::wave::WaveField;
use serde::Serialize;

/// The traffic model for one static configuration.
#[derive(Clone, Debug)]
pub struct TrafficModel {
    config: Config,
    fd: FundamentalDiagram,
    qk_line: Vec<QkPoint>,
    cut: CutPlane,
}

/// Everything drawn for one playback state.
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub k: f64,
    pub time: f64,
    pub lines: Vec<LineSegment>,
    pub car_positions: Vec<f64>,
    pub density_markers: Vec<f64>,
    pub flow_markers: Vec<f64>,
    pub edie: EdieMeasurement,
}

impl TrafficModel {
    pub fn new(config: Config) -> Result<Self> {
        let fd = FundamentalDiagram::new(&config)?;
        let qk_line = fd.qk_line(config.qk_resolution);
        let cut = CutPlane::from_config(&config);
        Ok(Self {
            config,
            fd,
            qk_line,
            cut,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn diagram(&self) -> &FundamentalDiagram {
        &self.fd
    }

    pub fn cut(&self) -> &CutPlane {
        &self.cut
    }

    /// `q(k)`.
    pub fn flow(&self, k: f64) -> Result<f64> {
        self.fd.flow(k)
    }

    /// `dq/dk` at `k`.
    pub fn wave_speed(&self, k: f64) -> Result<f64> {
        self.fd.wave_speed(k)
    }

    pub fn critical_density(&self) -> f64 {
        self.fd.critical_density()
    }

    /// The flow-density curve, sampled once at construction.
    pub fn qk_line(&self) -> &[QkPoint] {
        &self.qk_line
    }

    /// Tracks the fronts for density `k`.
    pub fn field(&self, k: f64) -> Result<WaveField> {
        self.fd.flow(k)?;
        Ok(WaveField::build(&self.fd, &self.config, k))
    }

    /// Every line of the space-time diagram at density `k`.
    pub fn lines(&self, k: f64) -> Result<Vec<LineSegment>> {
        Ok(self.field(k)?.lines())
    }

    /// The fronts and obstruction discontinuities at density `k`, without
    /// vehicle trajectories.
    pub fn wave_lines(&self, k: f64) -> Result<Vec<LineSegment>> {
        Ok(self.field(k)?.wave_lines())
    }

    /// The positions of the vehicles on the road at `time`, ascending.
    pub fn car_positions(&self, k: f64, time: f64) -> Result<Vec<f64>> {
        self.check_time(time)?;
        Ok(vehicle::car_positions(&self.field(k)?, time))
    }

    /// Where trajectories cross the snapshot at `tCut`.
    pub fn density_markers(&self, k: f64) -> Result<Vec<f64>> {
        Ok(self.cut.density_markers(&self.lines(k)?))
    }

    /// When trajectories cross the detector at `xCut`.
    pub fn flow_markers(&self, k: f64) -> Result<Vec<f64>> {
        Ok(self.cut.flow_markers(&self.lines(k)?))
    }

    /// Edie's measurements over the cut rectangle.
    pub fn edie(&self, k: f64) -> Result<EdieMeasurement> {
        Ok(self.cut.measure(&self.lines(k)?))
    }

    /// Renders a whole frame, reusing the cached field when `k` is unchanged.
    pub fn frame(&self, state: &Playback, cache: &mut FieldCache) -> Result<Frame> {
        self.check_time(state.time)?;
        let entry = cache.get(self, state.k)?;
        Ok(Frame {
            k: state.k,
            time: state.time,
            car_positions: vehicle::car_positions(&entry.field, state.time),
            density_markers: self.cut.density_markers(&entry.lines),
            flow_markers: self.cut.flow_markers(&entry.lines),
            edie: self.cut.measure(&entry.lines),
            lines: entry.lines.clone(),
        })
    }

    fn check_time(&self, time: f64) -> Result<()> {
        if self.config.time_window().contains(time) {
            Ok(())
        } else {
            Err(Error::InvalidTime {
                time,
                cycle: self.config.cycle,
            })
        }
    }
}

#[derive(Clone, Debug)]
struct CachedField {
    key: u64,
    field: WaveField,
    lines: Vec<LineSegment>,
}

/// Remembers the field and lines for the most recently requested density.
///
/// Lines only depend on `k`, while vehicle positions change every tick, so a
/// playing diagram rebuilds its fronts only when the density changes.
#[derive(Clone, Debug, Default)]
pub struct FieldCache {
    entry: Option<CachedField>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The field for density `k`.
    pub fn field(&mut self, model: &TrafficModel, k: f64) -> Result<&WaveField> {
        Ok(&self.get(model, k)?.field)
    }

    /// The lines for density `k`.
    pub fn lines(&mut self, model: &TrafficModel, k: f64) -> Result<&[LineSegment]> {
        Ok(&self.get(model, k)?.lines)
    }

    /// Forgets the cached field.
    pub fn clear(&mut self) {
        self.entry = None;
    }

    fn get(&mut self, model: &TrafficModel, k: f64) -> Result<&CachedField> {
        let key = k.to_bits();
        let entry = match self.entry.take() {
            Some(entry) if entry.key == key => entry,
            _ => {
                let field = model.field(k)?;
                let lines = field.lines();
                CachedField { key, field, lines }
            }
        };
        Ok(self.entry.insert(entry))
    }
}

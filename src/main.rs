use std::time::Instant;

use traffic_wave::{Action, Config, FieldCache, Playback, TrafficModel};

/// Wall-clock milliseconds between frames.
const FRAME_MS: f64 = 16.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let model = TrafficModel::new(config)?;
    let config = model.config();

    let mut state = Playback::new(config).apply(Action::SetPlaying(true), config);
    let mut cache = FieldCache::new();

    let num_frames = (config.cycle * config.delta / FRAME_MS).ceil() as u32;
    let start = Instant::now();
    let mut vehicles = 0;
    for _ in 0..num_frames {
        vehicles += model.frame(&state, &mut cache)?.car_positions.len();
        state = state.apply(Action::Tick(FRAME_MS), config);
    }
    let elapsed = start.elapsed();
    eprintln!(
        "Avg. frame: {:?} over {} frames ({:.1} vehs)",
        elapsed / num_frames.max(1),
        num_frames,
        vehicles as f64 / num_frames.max(1) as f64,
    );

    let state = state.with_time(config.t_cut, config);
    let frame = model.frame(&state, &mut cache)?;
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

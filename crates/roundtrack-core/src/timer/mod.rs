mod config;
mod engine;

pub use config::{ColorBand, TimerConfig};
pub use engine::{ConfigureOutcome, TimerEngine, TimerState};

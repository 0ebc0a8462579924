//! Core types: cues, playback snapshots, tracing

pub mod cue;
pub mod snapshot;
pub mod tracing;

pub use cue::{Cue, UNTITLED};
pub use snapshot::{CurrentCueInfo, NONE_SENTINEL};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};

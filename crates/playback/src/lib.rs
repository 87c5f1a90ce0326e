//! FrameReel Playback
//!
//! Turns per-frame delays into a repeating presentation timeline:
//! - **Timeline:** Prefix-summed cue points and the cycle length
//! - **Scheduler:** Play/pause state, elapsed-time to frame mapping, stepping
//!
//! This crate is pure computation. Time comes in as elapsed milliseconds;
//! frame changes go out as indices.

pub mod scheduler;
pub mod timeline;

pub use scheduler::{Direction, PlaybackState, Scheduler};
pub use timeline::{CuePoint, Timeline};

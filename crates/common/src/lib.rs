//! FrameReel Common Utilities
//!
//! Shared infrastructure for all FrameReel crates:
//! - Error taxonomy and result alias
//! - Playback clock that survives pause/resume
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;

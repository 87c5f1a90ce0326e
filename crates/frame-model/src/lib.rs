//! FrameReel Frame Model
//!
//! Defines the core data contracts for an animation directory:
//! - **Frames:** One image file plus its delay override and lazily decoded
//!   raster/thumbnail caches
//! - **Store:** The path-sorted, deduplicated collection of frames
//! - **Delay policy:** Default delay and the computed-delay fallback rule
//! - **Sidecar:** Per-directory JSON with saved delays
//!
//! Identity and ordering of frames are defined by path alone.

pub mod delay;
pub mod frame;
pub mod raster;
pub mod sidecar;
pub mod store;

pub use delay::*;
pub use frame::*;
pub use raster::*;
pub use sidecar::*;
pub use store::*;

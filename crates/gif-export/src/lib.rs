//! FrameReel GIF Export
//!
//! Serializes a frame set into a single animated GIF:
//!
//! ```text
//! FrameSnapshot ──┐
//!                 ├── load rasters (bounded wait)
//! delay policy ───┘         │
//!                           ├── GifDocument (raster, delay, disposal) + loop flag
//!                           │
//!                           ▼
//!                      GifEncoder ── quantize per frame (local palettes)
//!                           │
//!                           ▼
//!                  output.gif.part ── rename ──> output.gif
//! ```

pub mod disposal;
pub mod document;
pub mod encoder;
pub mod export;

pub use disposal::Disposal;
pub use document::{GifDocument, GifExportSettings, GifFrame};
pub use encoder::{delay_to_centis, GifEncoder};
pub use export::*;

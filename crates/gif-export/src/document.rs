//! Export-time frame list and the settings that shape it.

use framereel_common::config::{ExportDefaults, DEFAULT_DELAY_MS};
use framereel_common::error::{ReelError, ReelResult};
use framereel_frame_model::Raster;
use serde::{Deserialize, Serialize};

use crate::disposal::Disposal;

/// User-facing export configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifExportSettings {
    /// Delay for frames without their own override.
    pub delay_ms: u32,

    /// Loop forever (NETSCAPE2.0 extension) or play once.
    pub looping: bool,

    /// Disposal shared by every frame.
    pub disposal: Disposal,

    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub quantize_speed: i32,
}

impl Default for GifExportSettings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            looping: true,
            disposal: Disposal::default(),
            quantize_speed: 10,
        }
    }
}

impl GifExportSettings {
    /// Settings from the `export` config section.
    pub fn from_config(config: &ExportDefaults) -> ReelResult<Self> {
        let settings = Self {
            delay_ms: config.delay_ms,
            looping: config.looping,
            disposal: config.disposal.parse()?,
            quantize_speed: config.quantize_speed,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.delay_ms == 0 {
            return Err(ReelError::invalid_delay(0));
        }
        if !(1..=30).contains(&self.quantize_speed) {
            return Err(ReelError::config(format!(
                "quantize_speed must be within 1..=30, got {}",
                self.quantize_speed
            )));
        }
        Ok(())
    }

    /// Delay for a frame: its override if any, otherwise `delay_ms`.
    pub fn frame_delay(&self, delay_override: Option<u32>) -> u32 {
        delay_override.filter(|ms| *ms > 0).unwrap_or(self.delay_ms)
    }
}

/// One frame ready for encoding.
#[derive(Debug, Clone)]
pub struct GifFrame {
    pub raster: Raster,
    pub delay_ms: u32,
    pub disposal: Disposal,
}

/// Everything one export call serializes.
#[derive(Debug, Clone, Default)]
pub struct GifDocument {
    pub frames: Vec<GifFrame>,
    pub looping: bool,
}

impl GifDocument {
    pub fn new(looping: bool) -> Self {
        Self {
            frames: Vec::new(),
            looping,
        }
    }

    pub fn push(&mut self, raster: Raster, delay_ms: u32, disposal: Disposal) {
        self.frames.push(GifFrame {
            raster,
            delay_ms,
            disposal,
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Logical screen size: the largest width and height over all frames.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.frames.iter().fold((0, 0), |(w, h), f| {
            (w.max(f.raster.width()), h.max(f.raster.height()))
        })
    }
}

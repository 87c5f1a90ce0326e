//! A single animation frame backed by an image file.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use framereel_common::error::ReelResult;

use crate::raster::{cell_error, make_thumbnail, ImageDecoder, Raster, RasterCell};

/// File extensions recognized as frames (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `path` has one of the recognized image extensions.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// One frame of an animation loaded from file.
///
/// Equality, hashing, and ordering consider the path only. Clones share the
/// raster and thumbnail caches, so a snapshot handed to another thread sees
/// the same lazily loaded images as the store it came from.
#[derive(Debug, Clone)]
pub struct FrameFile {
    path: PathBuf,
    delay_override: Option<NonZeroU32>,
    raster: Arc<RasterCell>,
    thumbnail: Arc<RasterCell>,
}

impl FrameFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delay_override: None,
            raster: Arc::new(RasterCell::new()),
            thumbnail: Arc::new(RasterCell::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, used to match sidecar entries.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Per-frame delay in milliseconds, if one is set.
    pub fn delay_override(&self) -> Option<u32> {
        self.delay_override.map(NonZeroU32::get)
    }

    /// Set the per-frame delay. `ms <= 0` clears it ("use default").
    pub fn set_delay_override(&mut self, ms: i64) {
        self.delay_override = if ms <= 0 {
            None
        } else {
            NonZeroU32::new(ms.min(u32::MAX as i64) as u32)
        };
    }

    /// Decoded image, loading it from disk on first access.
    ///
    /// `wait` bounds how long to block if another thread is already loading
    /// this frame.
    pub fn raster(&self, decoder: &dyn ImageDecoder, wait: Option<Duration>) -> ReelResult<Raster> {
        self.raster
            .get_or_load(wait, || self.decode_from_disk(decoder))
            .map_err(|e| cell_error(&self.path, e, wait))
    }

    /// Thumbnail no larger than `max_side` on its longest side.
    pub fn thumbnail(
        &self,
        decoder: &dyn ImageDecoder,
        max_side: u32,
        wait: Option<Duration>,
    ) -> ReelResult<Raster> {
        self.thumbnail
            .get_or_load(wait, || {
                let full = self.raster(decoder, wait).map_err(|e| e.to_string())?;
                Ok(make_thumbnail(&full, max_side))
            })
            .map_err(|e| cell_error(&self.path, e, wait))
    }

    /// Decoded image if already cached.
    pub fn cached_raster(&self) -> Option<Raster> {
        self.raster.peek()
    }

    /// Whether a decode for this frame is in flight on some thread.
    pub fn is_loading(&self) -> bool {
        self.raster.is_loading()
    }

    /// Mark both caches stale so the next access re-reads the file.
    pub fn invalidate(&self) {
        tracing::debug!(path = %self.path.display(), "Invalidating frame caches");
        self.raster.invalidate();
        self.thumbnail.invalidate();
    }

    fn decode_from_disk(&self, decoder: &dyn ImageDecoder) -> Result<image::RgbaImage, String> {
        tracing::info!(path = %self.path.display(), decoder = decoder.name(), "Loading image");
        let bytes = std::fs::read(&self.path).map_err(|e| e.to_string())?;
        decoder.decode(&bytes).map_err(|e| e.to_string())
    }
}

impl PartialEq for FrameFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FrameFile {}

impl Hash for FrameFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for FrameFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

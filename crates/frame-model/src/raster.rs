//! Decoded rasters and their lazy-load-once cache cells.
//!
//! Decoding is delegated to an [`ImageDecoder`]. Each frame owns two
//! [`RasterCell`]s (full image and thumbnail) that the preview surface and the
//! export pipeline may hit concurrently: the first caller loads, everyone
//! else blocks until that load finishes and then observes the cached result.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use framereel_common::error::{ReelError, ReelResult};
use image::RgbaImage;

/// A decoded RGBA image shared between the cache and its readers.
pub type Raster = Arc<RgbaImage>;

/// Turns encoded image bytes into an RGBA raster.
pub trait ImageDecoder: Send + Sync {
    /// Decode raw file contents.
    fn decode(&self, bytes: &[u8]) -> ReelResult<RgbaImage>;

    /// Decoder name for logging.
    fn name(&self) -> &str;
}

/// Decoder backed by the `image` crate (PNG and JPEG).
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> ReelResult<RgbaImage> {
        let image = image::load_from_memory(bytes).map_err(anyhow::Error::from)?;
        Ok(image.to_rgba8())
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Scale a raster so its longest side is at most `max_side`, keeping aspect.
pub fn make_thumbnail(source: &RgbaImage, max_side: u32) -> RgbaImage {
    let (w, h) = source.dimensions();
    let max_side = max_side.max(1);
    if w <= max_side && h <= max_side {
        return source.clone();
    }
    let scale = max_side as f64 / w.max(h) as f64;
    let tw = ((w as f64 * scale).round() as u32).max(1);
    let th = ((h as f64 * scale).round() as u32).max(1);
    image::imageops::thumbnail(source, tw, th)
}

/// Why a cell could not produce a raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Another thread is still loading and the wait deadline passed.
    Timeout,
    /// The loader failed; the message is cached until invalidation.
    Failed(String),
}

enum CellState {
    Empty,
    Loading,
    Ready(Raster),
    Failed(String),
}

struct CellInner {
    state: CellState,
    generation: u64,
}

/// Lazy-load-once raster slot with invalidation.
pub struct RasterCell {
    inner: Mutex<CellInner>,
    settled: Condvar,
}

impl Default for RasterCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RasterCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        let state = match &inner.state {
            CellState::Empty => "empty".to_string(),
            CellState::Loading => "loading".to_string(),
            CellState::Ready(r) => format!("ready({}x{})", r.width(), r.height()),
            CellState::Failed(msg) => format!("failed({msg})"),
        };
        f.debug_struct("RasterCell")
            .field("state", &state)
            .field("generation", &inner.generation)
            .finish()
    }
}

impl RasterCell {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CellInner {
                state: CellState::Empty,
                generation: 0,
            }),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached raster, loading it with `load` if nobody has yet.
    ///
    /// If another thread is loading, block until it finishes. `wait` bounds
    /// that blocking; `None` waits indefinitely.
    pub fn get_or_load<F>(&self, wait: Option<Duration>, load: F) -> Result<Raster, CellError>
    where
        F: FnOnce() -> Result<RgbaImage, String>,
    {
        let deadline = wait.map(|d| Instant::now() + d);
        let mut inner = self.lock();
        loop {
            match &inner.state {
                CellState::Ready(raster) => return Ok(raster.clone()),
                CellState::Failed(msg) => return Err(CellError::Failed(msg.clone())),
                CellState::Empty => break,
                CellState::Loading => match deadline {
                    None => {
                        inner = self
                            .settled
                            .wait(inner)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Err(CellError::Timeout);
                        }
                        let (guard, _) = self
                            .settled
                            .wait_timeout(inner, deadline - now)
                            .unwrap_or_else(PoisonError::into_inner);
                        inner = guard;
                    }
                },
            }
        }

        inner.state = CellState::Loading;
        let generation = inner.generation;
        drop(inner);

        let mut guard = LoadingGuard {
            cell: self,
            armed: true,
        };
        let outcome = load().map(Arc::new);
        guard.armed = false;

        let mut inner = self.lock();
        if inner.generation == generation {
            inner.state = match &outcome {
                Ok(raster) => CellState::Ready(raster.clone()),
                Err(msg) => CellState::Failed(msg.clone()),
            };
        } else {
            // Invalidated mid-load; the next caller reloads from disk.
            inner.state = CellState::Empty;
        }
        drop(inner);
        self.settled.notify_all();

        outcome.map_err(CellError::Failed)
    }

    /// The cached raster, if loaded. Never triggers a load.
    pub fn peek(&self) -> Option<Raster> {
        match &self.lock().state {
            CellState::Ready(raster) => Some(raster.clone()),
            _ => None,
        }
    }

    /// Whether a load is currently in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self.lock().state, CellState::Loading)
    }

    /// Drop the cached value so the next access reloads.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        if !matches!(inner.state, CellState::Loading) {
            inner.state = CellState::Empty;
        }
    }
}

/// Resets a cell stuck in `Loading` if the loader panics.
struct LoadingGuard<'a> {
    cell: &'a RasterCell,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cell.lock().state = CellState::Empty;
            self.cell.settled.notify_all();
        }
    }
}

/// Map a cell failure into the shared error type for `path`.
pub(crate) fn cell_error(
    path: &std::path::Path,
    err: CellError,
    wait: Option<Duration>,
) -> ReelError {
    match err {
        CellError::Timeout => ReelError::FrameLoadTimeout {
            path: path.to_path_buf(),
            timeout: wait.unwrap_or_default(),
        },
        CellError::Failed(msg) => ReelError::frame_decode(path, msg),
    }
}

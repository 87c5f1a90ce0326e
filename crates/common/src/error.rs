//! Error types shared across FrameReel crates.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for FrameReel operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Directory unreadable: {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid delay: {value} ms (must be a positive number of milliseconds)")]
    InvalidDelay { value: i64 },

    #[error("Invalid disposal method: {value}")]
    InvalidDisposal { value: String },

    #[error("Cannot encode an empty frame set")]
    EmptyFrameSet,

    #[error("Timed out after {:.1}s waiting for frame to load: {path}", timeout.as_secs_f64())]
    FrameLoadTimeout { path: PathBuf, timeout: Duration },

    #[error("Failed to decode frame {path}: {message}")]
    FrameDecode { path: PathBuf, message: String },

    #[error("Frame too large for GIF ({width}x{height}, max 65535x65535)")]
    FrameTooLarge { width: u32, height: u32 },

    #[error("Encoding I/O error: {source}")]
    EncodingIo { source: std::io::Error },

    #[error("Watch overflow in {directory}: events were dropped, rescan required")]
    WatchOverflow { directory: PathBuf },

    #[error("Watch failure in {directory}: {message}")]
    WatchFailure { directory: PathBuf, message: String },

    #[error("No directory is open")]
    NoDirectory,

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn invalid_delay(value: i64) -> Self {
        Self::InvalidDelay { value }
    }

    pub fn invalid_disposal(value: impl Into<String>) -> Self {
        Self::InvalidDisposal {
            value: value.into(),
        }
    }

    pub fn frame_decode(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::FrameDecode {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn watch_failure(directory: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::WatchFailure {
            directory: directory.into(),
            message: msg.into(),
        }
    }

    pub fn encoding_io(source: std::io::Error) -> Self {
        Self::EncodingIo { source }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the engine can recover from this error by re-scanning.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WatchOverflow { .. })
    }
}

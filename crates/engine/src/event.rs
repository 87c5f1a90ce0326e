//! Notifications for the presentation surface.

use std::path::PathBuf;

use framereel_playback::PlaybackState;
use serde::Serialize;

/// Something the presentation surface should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A different frame (or a reloaded version of the same one) is active.
    ActiveFrameChanged { index: usize, path: PathBuf },

    /// The frame set changed; resynchronize everything.
    FrameSetChanged { count: usize },

    PlaybackStateChanged { state: PlaybackState },

    /// A frame could not be decoded.
    LoadError { path: PathBuf, cause: String },

    /// Events were dropped and the directory was rescanned.
    WatchOverflow { directory: PathBuf },

    /// The watch stopped; reopen the directory to resume live updates.
    WatchFailure { directory: PathBuf, cause: String },

    /// Background preloading finished.
    PreloadFinished { loaded: usize, failed: usize },
}

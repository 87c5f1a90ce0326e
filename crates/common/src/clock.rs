//! Playback clock.
//!
//! The scheduler works on "elapsed playback milliseconds" rather than on
//! wall-clock instants. This clock produces that value: it only advances
//! while running, survives pause/resume, and can be moved to an arbitrary
//! position when the timeline is rebuilt.

use std::time::{Duration, Instant};

/// A monotonic playback clock that accumulates time only while running.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    /// Instant the clock was last (re)started, `None` while paused.
    running_since: Option<Instant>,

    /// Time accumulated before `running_since`.
    accumulated: Duration,
}

impl PlaybackClock {
    /// Create a paused clock at position zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or resume the clock. No-op if already running.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Pause the clock, keeping the accumulated position.
    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    /// Whether the clock is currently advancing.
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Move the clock to the given position without changing its run state.
    pub fn seek(&mut self, position_ms: u64) {
        self.accumulated = Duration::from_millis(position_ms);
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Elapsed playback time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms_at(Instant::now())
    }

    pub(crate) fn start_at(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub(crate) fn pause_at(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    pub(crate) fn elapsed_ms_at(&self, now: Instant) -> u64 {
        let running = self
            .running_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        (self.accumulated + running).as_millis() as u64
    }
}

//! Playback state machine.
//!
//! The scheduler never reads a clock. The caller feeds it elapsed playback
//! milliseconds through [`Scheduler::advance_to`] and moves its clock to
//! [`Scheduler::position_ms`] after anything that repositions playback
//! (rebuild, step, seek).

use framereel_frame_model::{DelayPolicy, FrameFile};
use serde::{Deserialize, Serialize};

use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Maps elapsed time to the active frame.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    state: PlaybackState,
    timeline: Timeline,
    current: Option<usize>,
    position_ms: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Index of the frame currently shown.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Playback position within the cycle.
    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    /// Stopped -> Playing. Returns whether the state changed.
    pub fn play(&mut self) -> bool {
        self.transition(PlaybackState::Playing)
    }

    /// Playing -> Stopped. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        self.transition(PlaybackState::Stopped)
    }

    pub fn toggle(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Stopped => self.play(),
        };
        self.state
    }

    /// Recompute cue points after frames or delays changed.
    ///
    /// If the frame count is unchanged the active frame is kept and the
    /// position snaps to its cue; otherwise playback restarts at frame 0.
    /// Returns the active frame afterwards.
    pub fn rebuild_timeline(&mut self, frames: &[FrameFile], policy: &DelayPolicy) -> Option<usize> {
        let keep = frames.len() == self.timeline.len();
        self.rebuild(frames, policy, keep)
    }

    /// Recompute cue points after the frame set changed membership and
    /// restart at frame 0, even when the count happens to be the same.
    pub fn reset_timeline(&mut self, frames: &[FrameFile], policy: &DelayPolicy) -> Option<usize> {
        self.rebuild(frames, policy, false)
    }

    fn rebuild(&mut self, frames: &[FrameFile], policy: &DelayPolicy, keep_current: bool) -> Option<usize> {
        self.timeline = Timeline::build(frames, policy);

        self.current = if self.timeline.is_empty() {
            None
        } else if keep_current {
            self.current.or(Some(0))
        } else {
            Some(0)
        };
        self.position_ms = self
            .current
            .and_then(|i| self.timeline.offset_of(i))
            .unwrap_or(0);

        tracing::debug!(
            frames = self.timeline.len(),
            cycle_ms = self.timeline.cycle_ms(),
            current = ?self.current,
            keep_current,
            "Timeline rebuilt"
        );
        self.current
    }

    /// Move playback to `elapsed_ms`. Returns the new frame index only when
    /// it differs from the one shown before.
    pub fn advance_to(&mut self, elapsed_ms: u64) -> Option<usize> {
        if !self.is_playing() {
            return None;
        }
        let index = self.timeline.index_at(elapsed_ms)?;
        self.position_ms = elapsed_ms % self.timeline.cycle_ms();
        self.select(index)
    }

    /// Show the neighbouring frame while stopped. Clamped at both ends; does
    /// nothing while playing.
    pub fn step(&mut self, direction: Direction) -> Option<usize> {
        if self.is_playing() || self.timeline.is_empty() {
            return None;
        }
        let current = self.current.unwrap_or(0);
        let target = match direction {
            Direction::Previous => current.saturating_sub(1),
            Direction::Next => (current + 1).min(self.timeline.len() - 1),
        };
        self.jump(target)
    }

    /// Show frame `index` (clamped to the last frame) in either state.
    /// Returns the frame index if it changed.
    pub fn seek(&mut self, index: usize) -> Option<usize> {
        if self.timeline.is_empty() {
            return None;
        }
        self.jump(index.min(self.timeline.len() - 1))
    }

    fn jump(&mut self, index: usize) -> Option<usize> {
        self.position_ms = self.timeline.offset_of(index).unwrap_or(0);
        self.select(index)
    }

    fn select(&mut self, index: usize) -> Option<usize> {
        if self.current == Some(index) {
            return None;
        }
        self.current = Some(index);
        Some(index)
    }

    fn transition(&mut self, to: PlaybackState) -> bool {
        if self.state == to {
            return false;
        }
        tracing::debug!(from = ?self.state, to = ?to, "Playback state change");
        self.state = to;
        true
    }
}

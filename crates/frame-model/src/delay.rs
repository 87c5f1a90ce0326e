//! Default frame delay and the per-frame fallback rule.

use std::num::NonZeroU32;

use framereel_common::config::DEFAULT_DELAY_MS;
use framereel_common::error::{ReelError, ReelResult};
use serde::{Deserialize, Serialize};

use crate::frame::FrameFile;

/// Session-scoped default delay.
///
/// A frame without an override is shown for `default_delay_ms`. The value is
/// always positive, so computed delays are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayPolicy {
    default_delay_ms: NonZeroU32,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            default_delay_ms: NonZeroU32::new(DEFAULT_DELAY_MS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl DelayPolicy {
    /// Create a policy, rejecting non-positive or out-of-range defaults.
    pub fn new(default_delay_ms: i64) -> ReelResult<Self> {
        Ok(Self {
            default_delay_ms: positive_delay(default_delay_ms)?,
        })
    }

    /// Policy whose default delay plays `fps` frames per second.
    pub fn from_fps(fps: u32) -> ReelResult<Self> {
        if !(1..=1000).contains(&fps) {
            return Err(ReelError::invalid_delay(fps as i64));
        }
        Self::new((1000 / fps) as i64)
    }

    pub fn default_delay_ms(&self) -> u32 {
        self.default_delay_ms.get()
    }

    pub fn set_default_delay(&mut self, ms: i64) -> ReelResult<()> {
        self.default_delay_ms = positive_delay(ms)?;
        Ok(())
    }

    /// Frames per second implied by the default delay.
    pub fn fps(&self) -> f64 {
        1000.0 / self.default_delay_ms.get() as f64
    }

    /// Override when set, otherwise the default.
    pub fn computed_delay(&self, frame: &FrameFile) -> u32 {
        self.resolve(frame.delay_override())
    }

    /// Same rule as [`computed_delay`](Self::computed_delay) for a bare
    /// override value.
    pub fn resolve(&self, delay_override: Option<u32>) -> u32 {
        match delay_override {
            Some(ms) if ms > 0 => ms,
            _ => self.default_delay_ms.get(),
        }
    }
}

fn positive_delay(ms: i64) -> ReelResult<NonZeroU32> {
    u32::try_from(ms)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(ReelError::invalid_delay(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_83ms() {
        assert_eq!(DelayPolicy::default().default_delay_ms(), 83);
    }

    #[test]
    fn test_rejects_non_positive_defaults() {
        assert!(matches!(
            DelayPolicy::new(0),
            Err(ReelError::InvalidDelay { value: 0 })
        ));
        assert!(DelayPolicy::new(-5).is_err());
        assert!(DelayPolicy::new(u32::MAX as i64 + 1).is_err());

        let mut policy = DelayPolicy::default();
        assert!(policy.set_default_delay(0).is_err());
        assert_eq!(policy.default_delay_ms(), 83);
    }

    #[test]
    fn test_computed_delay_prefers_override() {
        let policy = DelayPolicy::new(100).unwrap();
        let mut frame = FrameFile::new("a.png");
        assert_eq!(policy.computed_delay(&frame), 100);

        frame.set_delay_override(50);
        assert_eq!(policy.computed_delay(&frame), 50);

        frame.set_delay_override(-1);
        assert_eq!(policy.computed_delay(&frame), 100);
    }

    #[test]
    fn test_fps_conversion() {
        let policy = DelayPolicy::from_fps(25).unwrap();
        assert_eq!(policy.default_delay_ms(), 40);
        assert!((policy.fps() - 25.0).abs() < f64::EPSILON);

        assert!(DelayPolicy::from_fps(0).is_err());
        assert!(DelayPolicy::from_fps(1001).is_err());
        assert_eq!(DelayPolicy::from_fps(1000).unwrap().default_delay_ms(), 1);
    }
}

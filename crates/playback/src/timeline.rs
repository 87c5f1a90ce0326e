//! Cue-point timeline built from computed frame delays.

use framereel_frame_model::{DelayPolicy, FrameFile};
use serde::{Deserialize, Serialize};

/// Start of one frame within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuePoint {
    pub frame_index: usize,

    /// Sum of the delays of all earlier frames.
    pub offset_ms: u64,
}

/// One cycle of the animation as a sorted list of cue points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    cues: Vec<CuePoint>,
    cycle_ms: u64,
}

impl Timeline {
    /// Timeline for a frame set under `policy`.
    pub fn build(frames: &[FrameFile], policy: &DelayPolicy) -> Self {
        Self::from_delays(frames.iter().map(|f| policy.computed_delay(f)))
    }

    /// Timeline from raw computed delays, in frame order.
    pub fn from_delays(delays: impl IntoIterator<Item = u32>) -> Self {
        let mut cues = Vec::new();
        let mut offset: u64 = 0;
        for (frame_index, delay) in delays.into_iter().enumerate() {
            cues.push(CuePoint {
                frame_index,
                offset_ms: offset,
            });
            offset += u64::from(delay);
        }
        Self {
            cues,
            cycle_ms: offset,
        }
    }

    pub fn cues(&self) -> &[CuePoint] {
        &self.cues
    }

    /// Total length of one cycle.
    pub fn cycle_ms(&self) -> u64 {
        self.cycle_ms
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Offset of `index` within the cycle.
    pub fn offset_of(&self, index: usize) -> Option<u64> {
        self.cues.get(index).map(|c| c.offset_ms)
    }

    /// Frame shown at `elapsed_ms`, wrapping around the cycle.
    pub fn index_at(&self, elapsed_ms: u64) -> Option<usize> {
        if self.cycle_ms == 0 {
            return None;
        }
        let t = elapsed_ms % self.cycle_ms;
        // Last cue whose offset is <= t. The first cue is at 0, so this is >= 1.
        let after = self.cues.partition_point(|c| c.offset_ms <= t);
        Some(self.cues[after - 1].frame_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_frames_at_100ms() {
        let timeline = Timeline::from_delays([100, 100, 100]);
        let offsets: Vec<u64> = timeline.cues().iter().map(|c| c.offset_ms).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(timeline.cycle_ms(), 300);
    }

    #[test]
    fn test_override_shifts_later_cues() {
        let timeline = Timeline::from_delays([100, 50, 100]);
        let offsets: Vec<u64> = timeline.cues().iter().map(|c| c.offset_ms).collect();
        assert_eq!(offsets, vec![0, 100, 150]);
        assert_eq!(timeline.cycle_ms(), 250);
    }

    #[test]
    fn test_index_at_boundaries() {
        let timeline = Timeline::from_delays([100, 50, 100]);
        assert_eq!(timeline.index_at(0), Some(0));
        assert_eq!(timeline.index_at(99), Some(0));
        assert_eq!(timeline.index_at(100), Some(1));
        assert_eq!(timeline.index_at(149), Some(1));
        assert_eq!(timeline.index_at(150), Some(2));
        assert_eq!(timeline.index_at(249), Some(2));
        assert_eq!(timeline.index_at(250), Some(0));
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = Timeline::from_delays(Vec::<u32>::new());
        assert!(timeline.is_empty());
        assert_eq!(timeline.cycle_ms(), 0);
        assert_eq!(timeline.index_at(42), None);
    }

    #[test]
    fn test_large_delays_do_not_overflow() {
        let timeline = Timeline::from_delays([u32::MAX, u32::MAX, u32::MAX]);
        assert_eq!(timeline.cycle_ms(), 3 * u64::from(u32::MAX));
        assert_eq!(timeline.index_at(u64::from(u32::MAX) * 2 + 1), Some(2));
    }

    #[test]
    fn test_build_uses_computed_delays() {
        let policy = DelayPolicy::new(100).unwrap();
        let mut frames = vec![
            FrameFile::new("/f/a.png"),
            FrameFile::new("/f/b.png"),
            FrameFile::new("/f/c.jpg"),
        ];
        frames[1].set_delay_override(50);
        let timeline = Timeline::build(&frames, &policy);
        assert_eq!(timeline.offset_of(2), Some(150));
        assert_eq!(timeline.cycle_ms(), 250);
    }
}

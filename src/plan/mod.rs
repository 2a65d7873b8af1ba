//! Segment planning
//!
//! Splits a working range into consecutive sub-ranges of at most the
//! requested segment length. The plan covers the range exactly: no gaps,
//! no overlaps, and only the final segment may be shorter.

pub mod naming;

pub use naming::{ArtifactNamer, RequestId};

use crate::error::{Result, SegmenterError};
use crate::timing::{ResolvedTiming, WorkingRange};

/// Remainders below this are treated as exact multiples
const REMAINDER_EPSILON: f64 = 1e-9;

/// One planned segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSlot {
    /// 1-based position in the plan
    pub index: usize,
    /// Offset from the working range start, in seconds
    pub start: f64,
    /// Offset from the working range start, in seconds
    pub end: f64,
}

impl SegmentSlot {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered list of segments covering a working range
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub range: WorkingRange,
    pub segment_secs: f64,
    pub slots: Vec<SegmentSlot>,
}

impl SegmentPlan {
    /// Build the plan for resolved request timing, refusing plans with more
    /// than `max_segments` entries
    pub fn compute(timing: &ResolvedTiming, max_segments: Option<usize>) -> Result<Self> {
        let range_secs = timing.range.duration();
        let segment_secs = timing.segment_secs;

        let count = segment_count(range_secs, segment_secs);
        if let Some(limit) = max_segments {
            if count > limit {
                return Err(SegmenterError::TooManySegments {
                    segments: count,
                    limit,
                });
            }
        }

        let slots = (0..count)
            .map(|i| {
                let start = i as f64 * segment_secs;
                let end = ((i + 1) as f64 * segment_secs).min(range_secs);
                SegmentSlot {
                    index: i + 1,
                    start,
                    end,
                }
            })
            .collect();

        Ok(Self {
            range: timing.range,
            segment_secs,
            slots,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Absolute source times for a slot
    pub fn source_times(&self, slot: &SegmentSlot) -> (f64, f64) {
        let start = self.range.start() + slot.start;
        let end = (self.range.start() + slot.end).min(self.range.end());
        (start, end)
    }
}

/// `floor(range / segment)` plus one when a remainder is left over
pub fn segment_count(range_secs: f64, segment_secs: f64) -> usize {
    let whole = (range_secs / segment_secs).floor();
    let remainder = range_secs - whole * segment_secs;
    whole as usize + usize::from(remainder > REMAINDER_EPSILON)
}

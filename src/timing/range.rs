//! Working range resolution

use crate::error::{Result, SegmenterError};

use super::parse::parse_time_string;

/// Raw timing fields as received from the client
#[derive(Debug, Clone, Default)]
pub struct TimingInput {
    /// `<minutes>m<seconds>s` start offset
    pub start_time: Option<String>,
    /// `<minutes>m<seconds>s` end offset
    pub end_time: Option<String>,
    /// Segment length in seconds, as a decimal number
    pub output_duration: Option<String>,
}

impl TimingInput {
    /// Fixed-length segmentation of the whole source
    pub fn fixed(segment_secs: f64) -> Self {
        Self {
            output_duration: Some(segment_secs.to_string()),
            ..Default::default()
        }
    }
}

/// Clamped `[start, end)` interval of the source selected for processing.
///
/// Always satisfies `0 <= start < end <= source duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingRange {
    start: f64,
    end: f64,
}

impl WorkingRange {
    /// Clamp `start`/`end` against the source duration.
    ///
    /// Fails with `RangeInvalid` when the clamped range is empty.
    pub fn clamped(start: f64, end: f64, source_duration: f64) -> Result<Self> {
        let start = start.max(0.0);
        let end = end.min(source_duration);
        if start >= end {
            return Err(SegmenterError::RangeInvalid { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Working range plus the segment length to cut it into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTiming {
    pub range: WorkingRange,
    pub segment_secs: f64,
}

/// Resolve request timing against the authoritative source duration
pub fn resolve(input: &TimingInput, source_duration: f64) -> Result<ResolvedTiming> {
    let start = present(&input.start_time)
        .map(parse_time_string)
        .unwrap_or(0.0);
    let end = present(&input.end_time)
        .map(parse_time_string)
        .unwrap_or(source_duration);

    let range = WorkingRange::clamped(start, end, source_duration)?;

    let segment_secs = match present(&input.output_duration) {
        None => range.duration(),
        Some(raw) => parse_segment_length(raw)?,
    };

    Ok(ResolvedTiming {
        range,
        segment_secs,
    })
}

/// Value as sent, or `None` when missing or blank. Time strings are not
/// trimmed: the parser is anchored at the first character.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn parse_segment_length(raw: &str) -> Result<f64> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SegmenterError::InvalidDuration(format!("'{}' is not a number", raw)))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(SegmenterError::InvalidDuration(format!(
            "'{}' must be a positive number of seconds",
            raw
        )));
    }
    Ok(secs)
}

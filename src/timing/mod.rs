//! Time resolution
//!
//! Turns the optional start/end/duration strings of a request into a
//! validated working range of the source video and a segment length:
//! - Lenient `<minutes>m<seconds>s` time string parsing
//! - Clamping against the real source duration
//! - Segment length parsing

pub mod parse;
pub mod range;

pub use parse::parse_time_string;
pub use range::{resolve, ResolvedTiming, TimingInput, WorkingRange};

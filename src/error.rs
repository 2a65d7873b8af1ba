use thiserror::Error;

/// Main error type for the segmenter service
#[derive(Error, Debug)]
pub enum SegmenterError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    MissingInput(String),

    #[error("Invalid file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid time range: start {start:.3}s is not before end {end:.3}s")]
    RangeInvalid { start: f64, end: f64 },

    #[error("Invalid output duration: {0}")]
    InvalidDuration(String),

    #[error("Source video is {duration:.1}s long, limit is {limit:.1}s")]
    SourceTooLong { duration: f64, limit: f64 },

    #[error("Plan has {segments} segments, limit is {limit}")]
    TooManySegments { segments: usize, limit: usize },

    #[error("Single-file delivery needs exactly one segment, plan has {segments}")]
    SingleFileUnavailable { segments: usize },

    #[error("Encode task failed: {0}")]
    Task(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised by a video engine implementation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input file: {0}")]
    Open(String),

    #[error("No video stream found in source file")]
    NoVideoStream,

    #[error("Failed to probe input: {0}")]
    Probe(String),

    #[error("Failed to start encoder process: {0}")]
    Spawn(String),

    #[error("Encoding failed (status {status}): {stderr}")]
    EncodeFailed { status: String, stderr: String },

    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    #[error("Scratch IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmenterError {
    /// True when the error is caused by the request rather than the server.
    /// Uploads the engine cannot read count as client errors.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SegmenterError::MissingInput(_)
                | SegmenterError::UnsupportedFormat(_)
                | SegmenterError::RangeInvalid { .. }
                | SegmenterError::InvalidDuration(_)
                | SegmenterError::SourceTooLong { .. }
                | SegmenterError::TooManySegments { .. }
                | SegmenterError::SingleFileUnavailable { .. }
                | SegmenterError::Engine(
                    EngineError::Open(_) | EngineError::Probe(_) | EngineError::NoVideoStream
                )
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SegmenterError>;

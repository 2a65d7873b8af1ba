//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage locations for staged uploads and produced artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding per-request upload staging directories
    pub upload_dir: PathBuf,

    /// Directory receiving encoded artifacts
    pub output_dir: PathBuf,

    /// Keep artifacts after the response so they can be fetched again
    pub retain_outputs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./output"),
            retain_outputs: true,
        }
    }
}

/// Request and processing limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum upload body size in megabytes
    pub max_upload_size_mb: usize,

    /// Accepted upload extensions, compared case-insensitively
    pub allowed_extensions: Vec<String>,

    /// Reject sources longer than this many seconds
    pub max_source_duration_secs: Option<f64>,

    /// Jobs processed at the same time; further requests wait
    pub max_concurrent_jobs: usize,

    /// Segment encodes running at once inside a single job
    pub max_parallel_encodes: usize,

    /// Largest segment plan accepted for one job; `None` is unbounded
    pub max_segments: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: 512,
            allowed_extensions: vec!["mp4".to_string()],
            max_source_duration_secs: None,
            max_concurrent_jobs: 4,
            max_parallel_encodes: 1,
            max_segments: Some(10_000),
        }
    }
}

impl LimitsConfig {
    /// Get maximum upload size in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }

    /// Check a filename against the extension allow-list
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Caption band rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// TrueType font used for both bands
    pub font_path: PathBuf,

    /// Font size in pixels
    pub font_size: u32,

    /// Text color (FFmpeg color syntax)
    pub text_color: String,

    /// Band fill color (FFmpeg color syntax)
    pub background_color: String,

    /// Band height as a fraction of the segment height
    pub band_height_fraction: f64,

    /// Height every captioned segment is resized to
    pub target_height: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("./fonts/ProtestGuerrilla-Regular.ttf"),
            font_size: 70,
            text_color: "white".to_string(),
            background_color: "black".to_string(),
            band_height_fraction: 0.15,
            target_height: 1080,
        }
    }
}

/// Encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Path or name of the ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// Video codec passed to ffmpeg
    pub video_codec: String,

    /// Audio codec passed to ffmpeg
    pub audio_codec: String,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Limits configuration
    pub limits: LimitsConfig,

    /// Caption configuration
    pub caption: CaptionConfig,

    /// Encoder configuration
    pub encode: EncodeConfig,

    /// Segment length used by `/process-video`
    pub fixed_segment_secs: f64,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            caption: CaptionConfig::default(),
            encode: EncodeConfig::default(),
            fixed_segment_secs: 60.0,
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

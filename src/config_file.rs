//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section is optional;
//! missing values fall back to [`ServerConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{CaptionConfig, EncodeConfig, LimitsConfig, ServerConfig, StorageConfig};
use crate::error::{Result, SegmenterError};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: Option<ServerSettings>,
    /// Storage settings
    pub storage: Option<StorageSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
    /// Caption settings
    pub caption: Option<CaptionSettings>,
    /// Encoder settings
    pub encode: Option<EncodeFileSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
    /// Segment length for `/process-video`
    pub fixed_segment_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub upload_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub retain_outputs: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum request body size in MB
    pub max_upload_size_mb: Option<usize>,
    pub allowed_extensions: Option<Vec<String>>,
    pub max_source_duration_secs: Option<f64>,
    pub max_concurrent_jobs: Option<usize>,
    pub max_parallel_encodes: Option<usize>,
    /// Segments allowed in one plan, 0 for no limit
    pub max_segments: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSettings {
    pub font_path: Option<PathBuf>,
    pub font_size: Option<u32>,
    pub text_color: Option<String>,
    pub background_color: Option<String>,
    pub band_height_fraction: Option<f64>,
    pub target_height: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeFileSettings {
    pub ffmpeg_path: Option<PathBuf>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SegmenterError::Config(e.to_string()))
    }

    /// Convert to ServerConfig, filling unset values with defaults
    pub fn into_server_config(self) -> Result<ServerConfig> {
        let defaults = ServerConfig::default();

        let (host, port, cors_enabled, fixed_segment_secs) = match self.server {
            Some(s) => (
                s.host,
                s.port,
                s.cors_enabled.unwrap_or(defaults.cors_enabled),
                s.fixed_segment_secs.unwrap_or(defaults.fixed_segment_secs),
            ),
            None => (
                defaults.host,
                defaults.port,
                defaults.cors_enabled,
                defaults.fixed_segment_secs,
            ),
        };

        let storage = match self.storage {
            Some(s) => StorageConfig {
                upload_dir: s.upload_dir.unwrap_or(defaults.storage.upload_dir),
                output_dir: s.output_dir.unwrap_or(defaults.storage.output_dir),
                retain_outputs: s.retain_outputs.unwrap_or(defaults.storage.retain_outputs),
            },
            None => defaults.storage,
        };

        let limits = match self.limits {
            Some(l) => LimitsConfig {
                max_upload_size_mb: l
                    .max_upload_size_mb
                    .unwrap_or(defaults.limits.max_upload_size_mb),
                allowed_extensions: l
                    .allowed_extensions
                    .unwrap_or(defaults.limits.allowed_extensions),
                max_source_duration_secs: l.max_source_duration_secs,
                max_concurrent_jobs: l
                    .max_concurrent_jobs
                    .unwrap_or(defaults.limits.max_concurrent_jobs),
                max_parallel_encodes: l
                    .max_parallel_encodes
                    .unwrap_or(defaults.limits.max_parallel_encodes),
                max_segments: match l.max_segments {
                    Some(0) => None,
                    Some(limit) => Some(limit),
                    None => defaults.limits.max_segments,
                },
            },
            None => defaults.limits,
        };

        let caption = match self.caption {
            Some(c) => CaptionConfig {
                font_path: c.font_path.unwrap_or(defaults.caption.font_path),
                font_size: c.font_size.unwrap_or(defaults.caption.font_size),
                text_color: c.text_color.unwrap_or(defaults.caption.text_color),
                background_color: c
                    .background_color
                    .unwrap_or(defaults.caption.background_color),
                band_height_fraction: c
                    .band_height_fraction
                    .unwrap_or(defaults.caption.band_height_fraction),
                target_height: c.target_height.unwrap_or(defaults.caption.target_height),
            },
            None => defaults.caption,
        };

        let encode = match self.encode {
            Some(e) => EncodeConfig {
                ffmpeg_path: e.ffmpeg_path.unwrap_or(defaults.encode.ffmpeg_path),
                video_codec: e.video_codec.unwrap_or(defaults.encode.video_codec),
                audio_codec: e.audio_codec.unwrap_or(defaults.encode.audio_codec),
            },
            None => defaults.encode,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        let config = ServerConfig {
            host,
            port,
            storage,
            limits,
            caption,
            encode,
            fixed_segment_secs,
            cors_enabled,
            log_level,
            log_format,
        };
        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &ServerConfig) -> Result<()> {
    if !(config.fixed_segment_secs.is_finite() && config.fixed_segment_secs > 0.0) {
        return Err(SegmenterError::Config(
            "fixed_segment_secs must be a positive number".into(),
        ));
    }
    let fraction = config.caption.band_height_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(SegmenterError::Config(
            "band_height_fraction must be between 0 and 1".into(),
        ));
    }
    if config.caption.target_height == 0 {
        return Err(SegmenterError::Config("target_height must be non-zero".into()));
    }
    if config.limits.max_concurrent_jobs == 0 || config.limits.max_parallel_encodes == 0 {
        return Err(SegmenterError::Config(
            "job and encode limits must be at least 1".into(),
        ));
    }
    if config.limits.allowed_extensions.is_empty() {
        return Err(SegmenterError::Config("allowed_extensions is empty".into()));
    }
    Ok(())
}

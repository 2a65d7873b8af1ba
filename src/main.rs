//! Clip Segmenter
//!
//! HTTP service that cuts an uploaded video into fixed-length segments,
//! optionally framing each one with caption bands, and returns them as a
//! zip archive.

mod archive;
mod compose;
mod config;
mod config_file;
mod engine;
mod error;
mod http;
#[cfg(test)]
mod integration;
mod plan;
mod state;
mod timing;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;
use crate::config_file::ConfigFile;
use crate::engine::FfmpegEngine;
use crate::error::{Result, SegmenterError};
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "clip-segmenter";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the configured level applies;
    // a load failure is reported once logging is up.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let (config, load_error) = load_config(&config_path);

    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = load_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    let engine = FfmpegEngine::new(&config.encode.ffmpeg_path)?;
    tracing::info!(
        "FFmpeg initialized, encoding with {}",
        config.encode.ffmpeg_path.display()
    );

    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;
    tokio::fs::create_dir_all(&config.storage.output_dir).await?;

    // Create application state
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| SegmenterError::Config(format!("invalid listen address: {}", e)))?;
    let state = Arc::new(AppState::new(config, Arc::new(engine)));

    // Build router
    let app = create_router(state);

    // Start server
    tracing::info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Read the config file; a missing file means defaults
fn load_config(path: &str) -> (ServerConfig, Option<SegmenterError>) {
    if !Path::new(path).exists() {
        return (ServerConfig::default(), None);
    }
    match ConfigFile::from_file(path).and_then(ConfigFile::into_server_config) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    }
}

/// Initialize logging with tracing. `RUST_LOG` overrides the configured level.
fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "clip_segmenter={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

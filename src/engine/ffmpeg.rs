//! FFmpeg-backed engine
//!
//! Sources are probed in-process through `ffmpeg-next`; encoding shells out
//! to the `ffmpeg` binary with a command built by [`CommandPlan`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use ffmpeg_next as ffmpeg;

use crate::error::EngineError;

use super::filter::CommandPlan;
use super::{
    Clip, EncodeSettings, EngineResult, FrameRate, FrameSize, SourceHandle, SourceVideo,
    VideoEngine,
};

/// Bytes of ffmpeg stderr kept in error messages
const STDERR_TAIL: usize = 2048;

pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    open_sources: Mutex<HashSet<SourceHandle>>,
}

impl FfmpegEngine {
    /// Initialize the FFmpeg libraries and remember the CLI location
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> EngineResult<Self> {
        ffmpeg::init().map_err(|e| EngineError::InitFailed(format!("ffmpeg::init() failed: {}", e)))?;
        // Probing runs on many threads; keep demuxer chatter off stderr
        ffmpeg::log::set_level(ffmpeg::log::Level::Warning);
        Ok(Self {
            ffmpeg_path: ffmpeg_path.into(),
            open_sources: Mutex::new(HashSet::new()),
        })
    }

    /// Number of sources opened and not yet closed
    pub fn open_count(&self) -> usize {
        self.open_sources.lock().len()
    }
}

/// Source properties read from the container
struct Probed {
    duration: f64,
    size: FrameSize,
    frame_rate: FrameRate,
}

/// Read duration, frame size and frame rate of the best video stream
fn probe(path: &Path) -> EngineResult<Probed> {
    let context = ffmpeg::format::input(&path)
        .map_err(|e| EngineError::Open(format!("{}: {}", path.display(), e)))?;

    let stream = context
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(EngineError::NoVideoStream)?;

    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .and_then(|ctx| ctx.decoder().video())
        .map_err(|e| EngineError::Probe(format!("video decoder: {}", e)))?;
    let size = FrameSize::new(decoder.width(), decoder.height());

    let duration = if context.duration() > 0 {
        context.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    } else {
        stream.duration() as f64 * f64::from(stream.time_base())
    };

    if !(duration.is_finite() && duration > 0.0) {
        return Err(EngineError::Probe(format!(
            "{}: unknown duration",
            path.display()
        )));
    }
    if size.width == 0 || size.height == 0 {
        return Err(EngineError::Probe(format!(
            "{}: unknown frame size",
            path.display()
        )));
    }

    // avg_frame_rate is 0/0 for some variable-rate streams
    let frame_rate = to_frame_rate(stream.avg_frame_rate())
        .or_else(|| to_frame_rate(stream.rate()))
        .unwrap_or(FrameRate::DEFAULT);

    Ok(Probed {
        duration,
        size,
        frame_rate,
    })
}

fn to_frame_rate(rate: ffmpeg::Rational) -> Option<FrameRate> {
    FrameRate::new(
        u32::try_from(rate.numerator()).ok()?,
        u32::try_from(rate.denominator()).ok()?,
    )
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL - 1) {
        Some((cut, _)) => format!("...{}", &text[cut..]),
        None => text.to_string(),
    }
}

#[async_trait]
impl VideoEngine for FfmpegEngine {
    async fn open(&self, path: &Path) -> EngineResult<SourceVideo> {
        let probe_path = path.to_path_buf();
        let probed = tokio::task::spawn_blocking(move || probe(&probe_path))
            .await
            .map_err(|e| EngineError::Probe(e.to_string()))??;

        let source = SourceVideo::new(path.to_path_buf(), probed.duration, probed.size)
            .with_frame_rate(probed.frame_rate);
        self.open_sources.lock().insert(source.handle());

        tracing::debug!(
            "Opened {}: {:.3}s, {}x{} at {} fps",
            path.display(),
            probed.duration,
            probed.size.width,
            probed.size.height,
            probed.frame_rate
        );
        Ok(source)
    }

    async fn encode(
        &self,
        clip: &Clip,
        output: &Path,
        settings: &EncodeSettings,
    ) -> EngineResult<()> {
        let scratch = tempfile::Builder::new().prefix("segmenter-").tempdir()?;
        let plan = CommandPlan::build(clip, scratch.path())?;
        for (path, text) in &plan.text_files {
            tokio::fs::write(path, text).await?;
        }

        let args = plan.args(output, settings);
        tracing::debug!("Running {} {:?}", self.ffmpeg_path.display(), args);

        let result = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Spawn(format!("{}: {}", self.ffmpeg_path.display(), e)))?;

        if !result.status.success() {
            return Err(EngineError::EncodeFailed {
                status: result.status.to_string(),
                stderr: stderr_tail(&result.stderr),
            });
        }
        Ok(())
    }

    fn close(&self, source: &SourceVideo) {
        if self.open_sources.lock().remove(&source.handle()) {
            tracing::debug!("Closed {}", source.path().display());
        } else {
            tracing::warn!("Close of unknown source {}", source.path().display());
        }
    }
}

//! In-memory engine for tests
//!
//! Reports a fixed duration and frame size for any existing file and writes
//! a textual description of each clip instead of encoded video. The
//! description leaves out source paths so identical requests produce
//! identical files. Writes are synchronous so an aborted encode never
//! leaves a file behind after the job has cleaned up.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;

use super::{
    Clip, EncodeSettings, EngineResult, FrameRate, FrameSize, Layer, SourceVideo, VideoEngine,
};

#[derive(Debug, Default)]
struct Calls {
    opened: usize,
    closed: usize,
    encoded: Vec<PathBuf>,
    encode_attempts: usize,
}

pub struct FakeEngine {
    duration_secs: f64,
    size: FrameSize,
    frame_rate: FrameRate,
    fail_on_encode: Option<usize>,
    encode_delay: Option<Duration>,
    calls: Mutex<Calls>,
}

impl FakeEngine {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            size: FrameSize::new(1280, 720),
            frame_rate: FrameRate::DEFAULT,
            fail_on_encode: None,
            encode_delay: None,
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn with_size(mut self, size: FrameSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Fail the n-th encode (1-based) after writing a partial file
    pub fn failing_on_encode(mut self, attempt: usize) -> Self {
        self.fail_on_encode = Some(attempt);
        self
    }

    /// Hold each encode open for `delay` after its file is written
    pub fn with_encode_delay(mut self, delay: Duration) -> Self {
        self.encode_delay = Some(delay);
        self
    }

    pub fn opened(&self) -> usize {
        self.calls.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.calls.lock().closed
    }

    pub fn encoded(&self) -> Vec<PathBuf> {
        self.calls.lock().encoded.clone()
    }
}

/// Path-free rendering of a clip graph
pub fn describe(clip: &Clip) -> String {
    let mut out = String::new();
    describe_into(clip, 0, &mut out);
    out
}

fn describe_into(clip: &Clip, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match clip {
        Clip::Cut {
            start, end, size, ..
        } => {
            let _ = writeln!(
                out,
                "{pad}cut {:.3}..{:.3} {}x{}",
                start, end, size.width, size.height
            );
        }
        Clip::Resized { inner, size } => {
            let _ = writeln!(out, "{pad}resize {}x{}", size.width, size.height);
            describe_into(inner, depth + 1, out);
        }
        Clip::Composite {
            layers,
            canvas,
            duration,
            frame_rate,
        } => {
            let _ = writeln!(
                out,
                "{pad}composite {}x{} {:.3}s {}fps",
                canvas.width, canvas.height, duration, frame_rate
            );
            for layer in layers {
                match layer {
                    Layer::Video { clip, position } => {
                        let _ = writeln!(out, "{pad}  video {:?}", position);
                        describe_into(clip, depth + 2, out);
                    }
                    Layer::Text { overlay, position } => {
                        let _ = writeln!(
                            out,
                            "{pad}  text {:?} {}x{} {:?} size={} {} on {}",
                            position,
                            overlay.size.width,
                            overlay.size.height,
                            overlay.text,
                            overlay.style.font_size,
                            overlay.style.color,
                            overlay.style.background
                        );
                    }
                }
            }
        }
    }
}

#[async_trait]
impl VideoEngine for FakeEngine {
    async fn open(&self, path: &Path) -> EngineResult<SourceVideo> {
        if !path.exists() {
            return Err(EngineError::Open(path.display().to_string()));
        }
        self.calls.lock().opened += 1;
        Ok(
            SourceVideo::new(path.to_path_buf(), self.duration_secs, self.size)
                .with_frame_rate(self.frame_rate),
        )
    }

    async fn encode(
        &self,
        clip: &Clip,
        output: &Path,
        settings: &EncodeSettings,
    ) -> EngineResult<()> {
        let attempt = {
            let mut calls = self.calls.lock();
            calls.encode_attempts += 1;
            calls.encode_attempts
        };

        if self.fail_on_encode == Some(attempt) {
            std::fs::write(output, b"partial")?;
            return Err(EngineError::EncodeFailed {
                status: "exit status: 1".into(),
                stderr: "injected failure".into(),
            });
        }

        let body = format!(
            "{} {}\n{}",
            settings.video_codec,
            settings.audio_codec,
            describe(clip)
        );
        std::fs::write(output, body)?;
        if let Some(delay) = self.encode_delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().encoded.push(output.to_path_buf());
        Ok(())
    }

    fn close(&self, _source: &SourceVideo) {
        self.calls.lock().closed += 1;
    }
}

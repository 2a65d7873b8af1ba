//! Video engine capability
//!
//! The segmenter never touches codecs directly. It opens a source through a
//! [`VideoEngine`], describes each output as a [`Clip`] graph (cuts, resizes,
//! text bands, composites) and asks the engine to encode that graph.
//!
//! - `ffmpeg`: probing with `ffmpeg-next`, encoding with the `ffmpeg` CLI
//! - `filter`: translation of a clip graph into an ffmpeg command line
//! - `fake`: in-memory engine used by tests

#[cfg(test)]
pub mod fake;
pub mod ffmpeg;
pub mod filter;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::EngineError;

pub use self::ffmpeg::FfmpegEngine;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Frames per second as an exact fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// Rate ffmpeg assumes for generated sources
    pub const DEFAULT: FrameRate = FrameRate { num: 25, den: 1 };

    /// `None` unless both parts are positive
    pub fn new(num: u32, den: u32) -> Option<Self> {
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Identity of an opened source, used to pair `open` with `close`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceHandle(Uuid);

/// An opened, probed source video
#[derive(Debug, Clone)]
pub struct SourceVideo {
    handle: SourceHandle,
    path: PathBuf,
    duration_secs: f64,
    size: FrameSize,
    frame_rate: FrameRate,
}

impl SourceVideo {
    pub fn new(path: PathBuf, duration_secs: f64, size: FrameSize) -> Self {
        Self {
            handle: SourceHandle(Uuid::new_v4()),
            path,
            duration_secs,
            size,
            frame_rate: FrameRate::DEFAULT,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn handle(&self) -> SourceHandle {
        self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    /// Cut `[start, end)` out of the source. The source itself is untouched.
    pub fn subclip(&self, start: f64, end: f64) -> EngineResult<Clip> {
        if !(start >= 0.0 && start < end && end <= self.duration_secs) {
            return Err(EngineError::InvalidClip(format!(
                "subclip [{:.3}, {:.3}) outside source of {:.3}s",
                start, end, self.duration_secs
            )));
        }
        Ok(Clip::Cut {
            source: self.path.clone(),
            start,
            end,
            size: self.size,
            frame_rate: self.frame_rate,
        })
    }
}

/// Where a layer sits on a composite canvas. Layers are always centered
/// horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Top,
    Center,
    Bottom,
}

impl Position {
    /// Top-left corner of an item of `item` size placed on `canvas`
    pub fn offset(&self, canvas: FrameSize, item: FrameSize) -> (i64, i64) {
        let x = (canvas.width as i64 - item.width as i64) / 2;
        let y = match self {
            Position::Top => 0,
            Position::Center => (canvas.height as i64 - item.height as i64) / 2,
            Position::Bottom => canvas.height as i64 - item.height as i64,
        };
        (x, y)
    }
}

/// Font and colors for rendered text
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: PathBuf,
    pub font_size: u32,
    pub color: String,
    pub background: String,
}

/// A box of solid background with centered text
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub style: TextStyle,
    pub size: FrameSize,
}

impl TextOverlay {
    pub fn render(text: impl Into<String>, style: &TextStyle, size: FrameSize) -> Self {
        Self {
            text: text.into(),
            style: style.clone(),
            size,
        }
    }
}

/// One layer of a composite
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Video { clip: Clip, position: Position },
    Text { overlay: TextOverlay, position: Position },
}

/// Description of a video to encode
#[derive(Debug, Clone, PartialEq)]
pub enum Clip {
    /// Time range of a source file
    Cut {
        source: PathBuf,
        start: f64,
        end: f64,
        size: FrameSize,
        frame_rate: FrameRate,
    },
    /// Another clip scaled to a new frame size
    Resized { inner: Box<Clip>, size: FrameSize },
    /// Layers drawn in order over a black canvas running at `frame_rate`
    Composite {
        layers: Vec<Layer>,
        canvas: FrameSize,
        duration: f64,
        frame_rate: FrameRate,
    },
}

impl Clip {
    pub fn size(&self) -> FrameSize {
        match self {
            Clip::Cut { size, .. } | Clip::Resized { size, .. } => *size,
            Clip::Composite { canvas, .. } => *canvas,
        }
    }

    pub fn frame_rate(&self) -> FrameRate {
        match self {
            Clip::Cut { frame_rate, .. } | Clip::Composite { frame_rate, .. } => *frame_rate,
            Clip::Resized { inner, .. } => inner.frame_rate(),
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Clip::Cut { start, end, .. } => end - start,
            Clip::Resized { inner, .. } => inner.duration(),
            Clip::Composite { duration, .. } => *duration,
        }
    }

    /// Cut `[start, end)` relative to the beginning of this clip
    pub fn subclip(&self, start: f64, end: f64) -> EngineResult<Clip> {
        if !(start >= 0.0 && start < end && end <= self.duration()) {
            return Err(EngineError::InvalidClip(format!(
                "subclip [{:.3}, {:.3}) outside clip of {:.3}s",
                start,
                end,
                self.duration()
            )));
        }
        match self {
            Clip::Cut {
                source,
                start: base,
                size,
                frame_rate,
                ..
            } => Ok(Clip::Cut {
                source: source.clone(),
                start: base + start,
                end: base + end,
                size: *size,
                frame_rate: *frame_rate,
            }),
            Clip::Resized { inner, size } => Ok(Clip::Resized {
                inner: Box::new(inner.subclip(start, end)?),
                size: *size,
            }),
            Clip::Composite { .. } => Err(EngineError::InvalidClip(
                "cannot cut a composite".to_string(),
            )),
        }
    }

    /// Scale to `height`, keeping the aspect ratio. Width is rounded to an
    /// even number for chroma-subsampled codecs.
    pub fn resize_to_height(self, height: u32) -> EngineResult<Clip> {
        let size = self.size();
        if size.height == 0 || height == 0 {
            return Err(EngineError::InvalidClip("zero frame height".to_string()));
        }
        let width = (size.width as f64 * height as f64 / size.height as f64).round() as u32;
        let width = (width + 1) & !1;
        Ok(Clip::Resized {
            inner: Box::new(self),
            size: FrameSize::new(width, height),
        })
    }

    /// Stack layers on a canvas. Duration is that of the longest video layer
    /// and the frame rate the highest of the video layers.
    pub fn composite(layers: Vec<Layer>, canvas: FrameSize) -> EngineResult<Clip> {
        let videos: Vec<&Clip> = layers
            .iter()
            .filter_map(|layer| match layer {
                Layer::Video { clip, .. } => Some(clip),
                Layer::Text { .. } => None,
            })
            .collect();
        if videos.is_empty() {
            return Err(EngineError::InvalidClip("composite without video layer".into()));
        }

        let duration = videos.iter().map(|c| c.duration()).fold(0.0, f64::max);
        let frame_rate = videos
            .iter()
            .map(|c| c.frame_rate())
            .max_by(|a, b| a.as_f64().total_cmp(&b.as_f64()))
            .unwrap_or(FrameRate::DEFAULT);

        Ok(Clip::Composite {
            layers,
            canvas,
            duration,
            frame_rate,
        })
    }
}

/// Codecs used when writing a clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub audio_codec: String,
}

/// Decode/encode capability consumed by the segmenter
#[async_trait]
pub trait VideoEngine: Send + Sync {
    /// Open and probe a source file
    async fn open(&self, path: &Path) -> EngineResult<SourceVideo>;

    /// Render `clip` into a container at `output`
    async fn encode(
        &self,
        clip: &Clip,
        output: &Path,
        settings: &EncodeSettings,
    ) -> EngineResult<()>;

    /// Release everything held for an opened source
    fn close(&self, source: &SourceVideo);
}

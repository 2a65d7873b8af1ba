//! Caption bands
//!
//! A captioned segment is the cut resized to the canonical height, with a
//! solid band above reading "Part N" and a band below carrying the
//! request's caption. Band size follows the cut's original frame: full
//! original width, `band_height_fraction` of the original height.

use crate::config::CaptionConfig;
use crate::engine::{Clip, EngineResult, FrameSize, Layer, Position, TextOverlay, TextStyle};

/// Caption parameters shared by every segment of one request
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionSpec {
    pub bottom_text: String,
    pub style: TextStyle,
    pub band_height_fraction: f64,
    pub target_height: u32,
}

impl CaptionSpec {
    pub fn new(bottom_text: impl Into<String>, config: &CaptionConfig) -> Self {
        Self {
            bottom_text: bottom_text.into(),
            style: TextStyle {
                font: config.font_path.clone(),
                font_size: config.font_size,
                color: config.text_color.clone(),
                background: config.background_color.clone(),
            },
            band_height_fraction: config.band_height_fraction,
            target_height: config.target_height,
        }
    }

    /// Top band text for a 1-based segment index
    pub fn top_text(index: usize) -> String {
        format!("Part {}", index)
    }

    /// Band dimensions for a cut of `size`
    pub fn band_size(&self, size: FrameSize) -> FrameSize {
        let height = (size.height as f64 * self.band_height_fraction) as u32;
        FrameSize::new(size.width, height)
    }

    /// Wrap `segment` in caption bands
    pub fn compose(&self, segment: Clip, index: usize) -> EngineResult<Clip> {
        let band = self.band_size(segment.size());
        let resized = segment.resize_to_height(self.target_height)?;
        let video = resized.size();
        let canvas = FrameSize::new(video.width, video.height + 2 * band.height);

        Clip::composite(
            vec![
                Layer::Text {
                    overlay: TextOverlay::render(Self::top_text(index), &self.style, band),
                    position: Position::Top,
                },
                Layer::Video {
                    clip: resized,
                    position: Position::Center,
                },
                Layer::Text {
                    overlay: TextOverlay::render(self.bottom_text.as_str(), &self.style, band),
                    position: Position::Bottom,
                },
            ],
            canvas,
        )
    }
}

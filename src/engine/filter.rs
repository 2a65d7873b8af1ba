//! FFmpeg command construction
//!
//! Translates a [`Clip`] graph into ffmpeg inputs and a `-filter_complex`
//! graph. Every cut becomes a seeked input, resizes become `scale`, and
//! composites become a `color` canvas with `overlay`, `drawbox` and
//! `drawtext` applied layer by layer.
//!
//! Caption text is never placed in the filter graph. It is written to files
//! in a scratch directory and referenced with `textfile=`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

use super::{Clip, EncodeSettings, EngineResult, Layer, TextOverlay};

/// Canvas fill behind composite layers
const CANVAS_COLOR: &str = "black";

/// A seeked input file
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub path: PathBuf,
    pub start: f64,
    pub duration: f64,
}

/// Everything needed to run ffmpeg for one clip
#[derive(Debug, Clone, Default)]
pub struct CommandPlan {
    pub inputs: Vec<InputSpec>,
    pub filters: Vec<String>,
    /// Filter graph output pad, `None` when the first input is mapped as is
    pub video_label: Option<String>,
    /// Caption files to write before running ffmpeg
    pub text_files: Vec<(PathBuf, String)>,
    scratch: PathBuf,
    next_label: usize,
}

impl CommandPlan {
    /// Build the plan for `clip`, placing caption files under `scratch`
    pub fn build(clip: &Clip, scratch: &Path) -> EngineResult<Self> {
        let mut plan = CommandPlan {
            scratch: scratch.to_path_buf(),
            ..Default::default()
        };

        let label = plan.render(clip)?;
        if !plan.filters.is_empty() {
            plan.video_label = Some(label);
        }
        if plan.inputs.is_empty() {
            return Err(EngineError::InvalidClip("clip has no source input".into()));
        }
        Ok(plan)
    }

    /// Full ffmpeg argument list writing to `output`
    pub fn args(&self, output: &Path, settings: &EncodeSettings) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
            .iter()
            .map(OsString::from)
            .collect();

        for input in &self.inputs {
            args.push("-ss".into());
            args.push(format!("{:.3}", input.start).into());
            args.push("-t".into());
            args.push(format!("{:.3}", input.duration).into());
            args.push("-i".into());
            args.push(input.path.clone().into_os_string());
        }

        match &self.video_label {
            Some(label) => {
                args.push("-filter_complex".into());
                args.push(self.filters.join(";").into());
                args.push("-map".into());
                args.push(format!("[{}]", label).into());
            }
            None => {
                args.push("-map".into());
                args.push("0:v:0".into());
            }
        }
        // Audio follows the first cut; sources without audio are fine
        args.push("-map".into());
        args.push("0:a:0?".into());

        args.push("-c:v".into());
        args.push(settings.video_codec.clone().into());
        args.push("-c:a".into());
        args.push(settings.audio_codec.clone().into());
        args.push(output.as_os_str().to_os_string());
        args
    }

    fn fresh_label(&mut self) -> String {
        self.next_label += 1;
        format!("v{}", self.next_label)
    }

    fn render(&mut self, clip: &Clip) -> EngineResult<String> {
        match clip {
            Clip::Cut {
                source, start, end, ..
            } => {
                let index = self.inputs.len();
                self.inputs.push(InputSpec {
                    path: source.clone(),
                    start: *start,
                    duration: end - start,
                });
                Ok(format!("{}:v", index))
            }
            Clip::Resized { inner, size } => {
                let input = self.render(inner)?;
                let out = self.fresh_label();
                self.filters.push(format!(
                    "[{}]scale={}:{},setsar=1[{}]",
                    input, size.width, size.height, out
                ));
                Ok(out)
            }
            Clip::Composite {
                layers,
                canvas,
                duration,
                frame_rate,
            } => {
                // overlay takes its timing from the canvas, so it runs at the video's rate
                let mut base = self.fresh_label();
                self.filters.push(format!(
                    "color=c={}:s={}x{}:r={}:d={:.3}[{}]",
                    CANVAS_COLOR, canvas.width, canvas.height, frame_rate, duration, base
                ));

                for layer in layers {
                    let out = match layer {
                        Layer::Video { clip, position } => {
                            let input = self.render(clip)?;
                            let (x, y) = position.offset(*canvas, clip.size());
                            let out = self.fresh_label();
                            self.filters.push(format!(
                                "[{}][{}]overlay=x={}:y={}[{}]",
                                base, input, x, y, out
                            ));
                            out
                        }
                        Layer::Text { overlay, position } => {
                            let (x, y) = position.offset(*canvas, overlay.size);
                            let text_file = self.text_file(overlay);
                            let out = self.fresh_label();
                            self.filters.push(format!(
                                "[{}]{},{}[{}]",
                                base,
                                drawbox(overlay, x, y),
                                drawtext(overlay, &text_file, x, y),
                                out
                            ));
                            out
                        }
                    };
                    base = out;
                }
                Ok(base)
            }
        }
    }

    fn text_file(&mut self, overlay: &TextOverlay) -> PathBuf {
        let path = self
            .scratch
            .join(format!("caption_{}.txt", self.text_files.len()));
        self.text_files.push((path.clone(), overlay.text.clone()));
        path
    }
}

fn drawbox(overlay: &TextOverlay, x: i64, y: i64) -> String {
    format!(
        "drawbox=x={}:y={}:w={}:h={}:color={}:t=fill",
        x,
        y,
        overlay.size.width,
        overlay.size.height,
        escape_value(&overlay.style.background)
    )
}

fn drawtext(overlay: &TextOverlay, text_file: &Path, x: i64, y: i64) -> String {
    format!(
        "drawtext=fontfile={}:textfile={}:expansion=none:fontsize={}:fontcolor={}:x={}+({}-text_w)/2:y={}+({}-text_h)/2",
        escape_value(&overlay.style.font.to_string_lossy()),
        escape_value(&text_file.to_string_lossy()),
        overlay.style.font_size,
        escape_value(&overlay.style.color),
        x,
        overlay.size.width,
        y,
        overlay.size.height,
    )
}

/// Escape a filter option value for use inside `-filter_complex`.
///
/// Values pass two parsers: the option parser (`:` separates options) and
/// the graph parser (`,;[]` separate filters and pads). Each level strips
/// one layer of backslash escaping.
pub fn escape_value(value: &str) -> String {
    let option_level = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

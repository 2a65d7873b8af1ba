//! Segmentation and composition pipeline
//!
//! One [`SegmentJob`] runs through these states:
//! open source, resolve range, plan segments, encode each segment.
//! The opened source is closed on every exit path. Once encoding starts,
//! every artifact the job planned to write is removed unless the job
//! completes, including when the job future is dropped mid-encode.

pub mod caption;

pub use caption::CaptionSpec;

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::engine::{Clip, EncodeSettings, SourceVideo, VideoEngine};
use crate::error::{Result, SegmenterError};
use crate::plan::{ArtifactNamer, RequestId, SegmentPlan};
use crate::timing::{self, TimingInput};

/// How produced segments are handed back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Zip archive of every segment
    #[default]
    Archive,
    /// The one produced file itself; plans with more segments are rejected
    SingleFile,
}

/// Everything needed to process one upload
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub request_id: RequestId,
    pub source_path: PathBuf,
    pub timing: TimingInput,
    pub caption: Option<CaptionSpec>,
    pub delivery: Delivery,
}

/// One encoded output file
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    /// 1-based segment index
    pub index: usize,
    pub filename: String,
    pub path: PathBuf,
    /// Source time range covered, in seconds
    pub source_start: f64,
    pub source_end: f64,
}

#[derive(Debug)]
struct EncodeTask {
    artifact: OutputArtifact,
    clip: Clip,
}

/// Source video that is closed through its engine when dropped
struct OpenSource {
    engine: Arc<dyn VideoEngine>,
    source: SourceVideo,
}

impl OpenSource {
    async fn open(engine: Arc<dyn VideoEngine>, path: &Path) -> Result<Self> {
        let source = engine.open(path).await?;
        Ok(Self { engine, source })
    }
}

impl Deref for OpenSource {
    type Target = SourceVideo;

    fn deref(&self) -> &SourceVideo {
        &self.source
    }
}

impl Drop for OpenSource {
    fn drop(&mut self) {
        self.engine.close(&self.source);
    }
}

/// Output files removed on drop unless [`OutputCleanup::disarm`] was called
struct OutputCleanup {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl OutputCleanup {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OutputCleanup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed unfinished output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Runs segment jobs against a video engine
pub struct Segmenter {
    engine: Arc<dyn VideoEngine>,
    settings: EncodeSettings,
    output_dir: PathBuf,
    max_source_duration_secs: Option<f64>,
    max_parallel_encodes: usize,
    max_segments: Option<usize>,
}

impl Segmenter {
    pub fn new(engine: Arc<dyn VideoEngine>, config: &ServerConfig) -> Self {
        Self {
            engine,
            settings: EncodeSettings {
                video_codec: config.encode.video_codec.clone(),
                audio_codec: config.encode.audio_codec.clone(),
            },
            output_dir: config.storage.output_dir.clone(),
            max_source_duration_secs: config.limits.max_source_duration_secs,
            max_parallel_encodes: config.limits.max_parallel_encodes.max(1),
            max_segments: config.limits.max_segments,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process a job, returning artifacts ordered by segment index
    pub async fn run(&self, job: &SegmentJob) -> Result<Vec<OutputArtifact>> {
        let span = tracing::info_span!("job", request_id = %job.request_id);
        self.run_inner(job).instrument(span).await
    }

    async fn run_inner(&self, job: &SegmentJob) -> Result<Vec<OutputArtifact>> {
        let source = OpenSource::open(self.engine.clone(), &job.source_path).await?;

        if let Some(limit) = self.max_source_duration_secs {
            if source.duration_secs() > limit {
                return Err(SegmenterError::SourceTooLong {
                    duration: source.duration_secs(),
                    limit,
                });
            }
        }

        let timing = timing::resolve(&job.timing, source.duration_secs())?;
        let plan = SegmentPlan::compute(&timing, self.max_segments)?;
        if job.delivery == Delivery::SingleFile && plan.len() != 1 {
            return Err(SegmenterError::SingleFileUnavailable {
                segments: plan.len(),
            });
        }

        tracing::info!(
            "Planned {} segment(s) of {:.3}s over [{:.3}, {:.3}) of {:.3}s source",
            plan.len(),
            plan.segment_secs,
            plan.range.start(),
            plan.range.end(),
            source.duration_secs()
        );

        let namer = match &job.caption {
            Some(caption) => ArtifactNamer::captioned(job.request_id, &caption.bottom_text),
            None => ArtifactNamer::raw(job.request_id),
        };
        let tasks = self.build_tasks(&source, &plan, &namer, job.caption.as_ref())?;
        let cleanup =
            OutputCleanup::new(tasks.iter().map(|t| t.artifact.path.clone()).collect());

        tokio::fs::create_dir_all(&self.output_dir).await?;

        match self.encode_all(tasks).await {
            Ok(mut artifacts) => {
                cleanup.disarm();
                artifacts.sort_by_key(|a| a.index);
                Ok(artifacts)
            }
            Err(e) => {
                tracing::error!("Encoding failed, removing partial outputs: {}", e);
                drop(cleanup);
                Err(e)
            }
        }
    }

    fn build_tasks(
        &self,
        source: &SourceVideo,
        plan: &SegmentPlan,
        namer: &ArtifactNamer,
        caption: Option<&CaptionSpec>,
    ) -> Result<Vec<EncodeTask>> {
        plan.slots
            .iter()
            .map(|slot| {
                let (start, end) = plan.source_times(slot);
                let cut = source.subclip(start, end)?;
                let clip = match caption {
                    Some(caption) => caption.compose(cut, slot.index)?,
                    None => cut,
                };
                let filename = namer.filename(slot.index);
                Ok(EncodeTask {
                    artifact: OutputArtifact {
                        index: slot.index,
                        path: self.output_dir.join(&filename),
                        filename,
                        source_start: start,
                        source_end: end,
                    },
                    clip,
                })
            })
            .collect()
    }

    async fn encode_all(&self, tasks: Vec<EncodeTask>) -> Result<Vec<OutputArtifact>> {
        let mut done = Vec::with_capacity(tasks.len());

        if self.max_parallel_encodes == 1 {
            for task in tasks {
                done.push(encode_task(self.engine.as_ref(), &self.settings, task).await?);
            }
            return Ok(done);
        }

        let mut running = JoinSet::new();
        for task in tasks {
            while running.len() >= self.max_parallel_encodes {
                if let Err(e) = join_next(&mut running, &mut done).await {
                    running.shutdown().await;
                    return Err(e);
                }
            }
            let engine = self.engine.clone();
            let settings = self.settings.clone();
            running.spawn(async move { encode_task(engine.as_ref(), &settings, task).await });
        }
        while !running.is_empty() {
            if let Err(e) = join_next(&mut running, &mut done).await {
                running.shutdown().await;
                return Err(e);
            }
        }
        Ok(done)
    }
}

async fn encode_task(
    engine: &dyn VideoEngine,
    settings: &EncodeSettings,
    task: EncodeTask,
) -> Result<OutputArtifact> {
    let started = Instant::now();
    // Declared before the encode future so an abort drops the encoder first
    let cleanup = OutputCleanup::new(vec![task.artifact.path.clone()]);
    engine
        .encode(&task.clip, &task.artifact.path, settings)
        .await?;
    cleanup.disarm();
    tracing::info!(
        "Encoded {} ({:.3}s) in {:?}",
        task.artifact.filename,
        task.clip.duration(),
        started.elapsed()
    );
    Ok(task.artifact)
}

async fn join_next(
    running: &mut JoinSet<Result<OutputArtifact>>,
    done: &mut Vec<OutputArtifact>,
) -> Result<()> {
    match running.join_next().await {
        Some(Ok(Ok(artifact))) => {
            done.push(artifact);
            Ok(())
        }
        Some(Ok(Err(e))) => Err(e),
        Some(Err(e)) => Err(SegmenterError::Task(e.to_string())),
        None => Ok(()),
    }
}

/// Delete files, ignoring ones that are already gone
pub async fn remove_files<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

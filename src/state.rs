//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - Server configuration
//! - The segmenter and its video engine
//! - Job admission (bounded concurrent jobs)
//! - Job counters for the debug endpoint

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::compose::Segmenter;
use crate::config::ServerConfig;
use crate::engine::VideoEngine;
use crate::error::{Result, SegmenterError};

/// Job counters
#[derive(Debug, Default)]
pub struct JobStats {
    pub active: AtomicUsize,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub segments_produced: AtomicU64,
}

/// Snapshot of [`JobStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatsSnapshot {
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub segments_produced: u64,
}

/// Admission to run one job; releases its slot when dropped
pub struct JobPermit<'a> {
    stats: &'a JobStats,
    _permit: SemaphorePermit<'a>,
    finished: bool,
}

impl JobPermit<'_> {
    /// Record a successful job that produced `segments` files
    pub fn succeeded(mut self, segments: usize) {
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .segments_produced
            .fetch_add(segments as u64, Ordering::Relaxed);
        self.finished = true;
    }
}

impl Drop for JobPermit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Application state shared across all handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Segmentation pipeline
    pub segmenter: Segmenter,

    /// Limits simultaneous jobs
    jobs: Semaphore,

    /// Job counters
    pub stats: JobStats,
}

impl AppState {
    /// Create a new AppState with the given configuration and engine
    pub fn new(config: ServerConfig, engine: Arc<dyn VideoEngine>) -> Self {
        let segmenter = Segmenter::new(engine, &config);
        Self {
            jobs: Semaphore::new(config.limits.max_concurrent_jobs.max(1)),
            segmenter,
            stats: JobStats::default(),
            config,
        }
    }

    /// Wait for a free job slot
    pub async fn begin_job(&self) -> Result<JobPermit<'_>> {
        let permit = self
            .jobs
            .acquire()
            .await
            .map_err(|e| SegmenterError::Task(format!("job queue: {}", e)))?;
        self.stats.active.fetch_add(1, Ordering::Relaxed);
        Ok(JobPermit {
            stats: &self.stats,
            _permit: permit,
            finished: false,
        })
    }

    /// Current job counters
    pub fn job_stats(&self) -> JobStatsSnapshot {
        JobStatsSnapshot {
            active: self.stats.active.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            segments_produced: self.stats.segments_produced.load(Ordering::Relaxed),
        }
    }
}

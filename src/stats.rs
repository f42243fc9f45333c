// SPDX-License-Identifier: GPL-3.0-only

//! Frame statistics and the observability sink

use crate::errors::PipelineError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Periodic pipeline statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Processed frames per second over the last reporting window
    pub fps: f32,
    /// Latency of the most recent transformation
    pub processing_latency_ms: f32,
    pub width: u32,
    pub height: u32,
    /// Frames overwritten in the frame store before being rendered
    pub dropped_frames: u64,
}

/// Receives statistics and error reports from the pipeline
///
/// Implementations must not block: they are called from the capture thread
/// and the render thread.
pub trait StatsSink: Send + Sync {
    fn report_stats(&self, stats: &FrameStats);
    fn report_error(&self, error: &PipelineError);
}

/// Sink that only logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatsSink;

impl StatsSink for TracingStatsSink {
    fn report_stats(&self, stats: &FrameStats) {
        info!(
            fps = stats.fps,
            latency_ms = stats.processing_latency_ms,
            width = stats.width,
            height = stats.height,
            dropped = stats.dropped_frames,
            "Pipeline stats"
        );
    }

    fn report_error(&self, error: &PipelineError) {
        warn!(error = %error, "Pipeline error");
    }
}

/// Sink that logs and keeps the latest stats for a status line
#[derive(Debug, Default)]
pub struct SharedStatsSink {
    latest: Mutex<Option<FrameStats>>,
    last_error: Mutex<Option<PipelineError>>,
    error_count: AtomicU64,
}

impl SharedStatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<FrameStats> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_error(&self) -> Option<PipelineError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Status line in the form `FPS: 30 | 640x480 | native: 4.2 ms`
    pub fn status_line(&self) -> String {
        match self.latest() {
            Some(stats) => format!(
                "FPS: {:.0} | {}x{} | native: {:.1} ms",
                stats.fps, stats.width, stats.height, stats.processing_latency_ms
            ),
            None => "FPS: - | waiting for frames".to_string(),
        }
    }
}

impl StatsSink for SharedStatsSink {
    fn report_stats(&self, stats: &FrameStats) {
        TracingStatsSink.report_stats(stats);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(*stats);
    }

    fn report_error(&self, error: &PipelineError) {
        TracingStatsSink.report_error(error);
        self.error_count.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
    }
}

/// Counts frames and yields a rate once per reporting interval
#[derive(Debug, Clone)]
pub struct FpsCounter {
    interval: Duration,
    window_start: Option<Instant>,
    frames: u32,
}

impl FpsCounter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: None,
            frames: 0,
        }
    }

    /// Record one frame at `now`; returns the rate when a window closes
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = Some(now);
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_counter_reports_once_per_window() {
        let mut counter = FpsCounter::new(Duration::from_secs(1));
        let start = Instant::now();

        assert_eq!(counter.tick(start), None);
        for i in 1..30 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 33)), None);
        }
        let fps = counter.tick(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 31.0).abs() < 0.01, "fps was {}", fps);

        // Next window starts fresh
        assert_eq!(counter.tick(start + Duration::from_millis(1100)), None);
    }

    #[test]
    fn test_shared_sink_keeps_latest() {
        let sink = SharedStatsSink::new();
        assert!(sink.status_line().contains("waiting"));

        sink.report_stats(&FrameStats {
            fps: 29.6,
            processing_latency_ms: 4.2,
            width: 640,
            height: 480,
            dropped_frames: 0,
        });
        sink.report_error(&PipelineError::InvalidFrame("short plane".into()));

        assert_eq!(sink.status_line(), "FPS: 30 | 640x480 | native: 4.2 ms");
        assert_eq!(sink.error_count(), 1);
        assert!(matches!(sink.last_error(), Some(PipelineError::InvalidFrame(_))));
    }
}

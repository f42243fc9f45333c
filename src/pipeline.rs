// SPDX-License-Identifier: GPL-3.0-only

//! Capture and processing wiring
//!
//! A [`Pipeline`] owns the capture driver and the running flag its
//! [`ProcessingInvoker`] checks before every publish. Rendering is not part
//! of it: the render side only ever sees the shared [`FrameStore`].

use crate::backends::camera::{CaptureDriver, create_driver};
use crate::config::Config;
use crate::errors::{PipelineError, PipelineResult};
use crate::frame_store::FrameStore;
use crate::processing::{EdgeDetector, EdgeToggle, FrameTransform, ProcessingInvoker};
use crate::stats::StatsSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

pub struct Pipeline {
    store: Arc<FrameStore>,
    running: Arc<AtomicBool>,
    driver: Option<Box<dyn CaptureDriver>>,
    show_edges: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    /// Start capture and edge detection as configured
    ///
    /// A missing capture device is reported once as `DeviceUnavailable` and
    /// leaves the pipeline idle; it is not an error here.
    pub fn start(
        config: &Config,
        store: Arc<FrameStore>,
        sink: Arc<dyn StatsSink>,
    ) -> PipelineResult<Self> {
        let transform = EdgeToggle::new(
            EdgeDetector::new(config.edge_low_threshold, config.edge_high_threshold),
            config.show_edges,
        );
        let show_edges = transform.flag();

        let driver = match create_driver(config) {
            Ok(driver) => Some(driver),
            Err(e) => {
                let e = PipelineError::from(e);
                warn!(source = %config.source, error = %e, "No capture source");
                sink.report_error(&e);
                None
            }
        };

        let mut pipeline = Self::with_driver(
            driver,
            transform,
            config.capture_width,
            config.capture_height,
            store,
            sink,
            config.stats_interval(),
        )?;
        pipeline.show_edges = Some(show_edges);
        Ok(pipeline)
    }

    /// Start `driver` feeding `transform` through a processing invoker
    pub fn with_driver<T: FrameTransform + 'static>(
        driver: Option<Box<dyn CaptureDriver>>,
        transform: T,
        width: u32,
        height: u32,
        store: Arc<FrameStore>,
        sink: Arc<dyn StatsSink>,
        stats_interval: Duration,
    ) -> PipelineResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let invoker = ProcessingInvoker::new(
            transform,
            width,
            height,
            Arc::clone(&store),
            Arc::clone(&running),
            Arc::clone(&sink),
            stats_interval,
        )?;

        let driver = match driver {
            Some(mut driver) => match driver.start(invoker.into_callback()) {
                Ok(()) => {
                    info!(driver = driver.name(), width, height, "Capture started");
                    Some(driver)
                }
                Err(e) => {
                    let e = PipelineError::from(e);
                    warn!(driver = driver.name(), error = %e, "Capture failed to start");
                    sink.report_error(&e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            store,
            running,
            driver,
            show_edges: None,
        })
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    /// Whether a capture driver is delivering frames
    pub fn is_capturing(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| d.is_running())
    }

    /// Flip between edge map and raw view; returns the new mode
    ///
    /// `None` when the pipeline was built with a custom transform.
    pub fn toggle_edges(&self) -> Option<bool> {
        let flag = self.show_edges.as_ref()?;
        let show = !flag.load(Ordering::Relaxed);
        flag.store(show, Ordering::Relaxed);
        info!(show_edges = show, "Display mode changed");
        Some(show)
    }

    /// Stop publishing, then stop the driver
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut driver) = self.driver.take() {
            info!(driver = driver.name(), "Stopping capture");
            driver.stop();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureSource;
    use crate::stats::SharedStatsSink;
    use std::time::Instant;

    #[test]
    fn test_disabled_source_stays_idle() {
        let sink = Arc::new(SharedStatsSink::new());
        let config = Config {
            source: CaptureSource::Disabled,
            ..Config::default()
        };

        let pipeline = Pipeline::start(&config, Arc::new(FrameStore::new()), sink.clone()).unwrap();

        assert!(!pipeline.is_capturing());
        assert!(pipeline.store().consume().is_err());
        assert_eq!(sink.error_count(), 1);
        assert!(matches!(
            sink.last_error(),
            Some(PipelineError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_synthetic_source_publishes_frames() {
        let config = Config {
            capture_width: 64,
            capture_height: 48,
            synthetic_fps: 120,
            ..Config::default()
        };
        let mut pipeline = Pipeline::start(
            &config,
            Arc::new(FrameStore::new()),
            Arc::new(SharedStatsSink::new()),
        )
        .unwrap();
        assert!(pipeline.is_capturing());

        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.store().latest_sequence() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let frame = pipeline.store().consume().unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.pixels.len(), 64 * 48 * 4);

        assert_eq!(pipeline.toggle_edges(), Some(false));
        pipeline.stop();
        let last = pipeline.store().latest_sequence();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(pipeline.store().latest_sequence(), last);
        assert!(!pipeline.is_capturing());
    }
}

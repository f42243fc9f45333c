// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests: capture driver to processing to render loop

mod common;

use common::{Recorder, RecorderSurface, ScriptedDriver, gray_frame, wait_for};
use edge_viewer::processing::Passthrough;
use edge_viewer::render::SurfaceSize;
use edge_viewer::{
    FrameStore, FrameTransform, Pipeline, PipelineError, RenderLoop, RenderState,
    SharedStatsSink, TransformError,
};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

/// Paints the whole frame red at the first luma value
struct SolidColor;

impl FrameTransform for SolidColor {
    fn configure(&mut self, _width: u32, _height: u32) -> Result<(), TransformError> {
        Ok(())
    }

    fn transform(&mut self, input: &[u8], output: &mut [u8]) -> Result<f32, TransformError> {
        let value = input.first().copied().ok_or(TransformError::NotConfigured)?;
        for px in output.chunks_exact_mut(4) {
            px.copy_from_slice(&[value, 0, 0, 255]);
        }
        Ok(0.1)
    }
}

#[test]
fn test_frames_reach_the_render_loop_in_order() {
    let (frames, receiver) = mpsc::channel();
    let store = Arc::new(FrameStore::new());
    let sink = Arc::new(SharedStatsSink::new());
    let recorder = Arc::new(Recorder::default());

    let mut pipeline = Pipeline::with_driver(
        Some(Box::new(ScriptedDriver::new(receiver))),
        SolidColor,
        4,
        2,
        Arc::clone(&store),
        sink.clone(),
        Duration::from_secs(60),
    )
    .unwrap();
    assert!(pipeline.is_capturing());

    let mut render = RenderLoop::start(
        RecorderSurface {
            size: SurfaceSize::new(8, 8),
            recorder: Arc::clone(&recorder),
        },
        Arc::clone(&store),
        sink.clone(),
        [0.0, 0.0, 0.0, 1.0],
    );

    for (i, value) in [10u8, 20, 30].into_iter().enumerate() {
        frames.send(gray_frame(4, 2, value)).unwrap();
        assert!(wait_for(|| recorder.uploads().len() == i + 1));
    }

    assert_eq!(
        recorder.uploads(),
        vec![(1, [10, 0, 0, 255]), (2, [20, 0, 0, 255]), (3, [30, 0, 0, 255])]
    );
    assert_eq!(store.dropped_frames(), 0);
    assert_eq!(sink.error_count(), 0);
    assert_eq!(render.state(), RenderState::Running);

    drop(frames);
    pipeline.stop();
    render.stop();
    assert_eq!(render.state(), RenderState::Stopped);
    assert_eq!(recorder.destroyed(), 1);
}

#[test]
fn test_mismatched_frame_is_dropped_and_reported() {
    let (frames, receiver) = mpsc::channel();
    let store = Arc::new(FrameStore::new());
    let sink = Arc::new(SharedStatsSink::new());

    let mut pipeline = Pipeline::with_driver(
        Some(Box::new(ScriptedDriver::new(receiver))),
        Passthrough::new(),
        4,
        2,
        Arc::clone(&store),
        sink.clone(),
        Duration::from_secs(60),
    )
    .unwrap();

    frames.send(gray_frame(6, 2, 50)).unwrap();
    frames.send(gray_frame(4, 2, 70)).unwrap();
    assert!(wait_for(|| store.latest_sequence() == 1));

    let frame = store.consume().unwrap();
    assert_eq!(&frame.pixels[..4], &[70, 70, 70, 255]);
    assert_eq!(sink.error_count(), 1);
    assert!(matches!(sink.last_error(), Some(PipelineError::InvalidFrame(_))));

    pipeline.stop();
}

#[test]
fn test_no_driver_means_no_frames() {
    let store = Arc::new(FrameStore::new());
    let pipeline = Pipeline::with_driver(
        None,
        Passthrough::new(),
        4,
        2,
        Arc::clone(&store),
        Arc::new(SharedStatsSink::new()),
        Duration::from_secs(60),
    )
    .unwrap();

    assert!(!pipeline.is_capturing());
    assert_eq!(pipeline.toggle_edges(), None);
    assert!(store.consume().is_err());
}

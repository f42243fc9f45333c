// SPDX-License-Identifier: GPL-3.0-only

//! Surface lifecycle through the public coordinator API

mod common;

use common::{Recorder, RecorderSurface, wait_for};
use edge_viewer::render::SurfaceSize;
use edge_viewer::{
    FrameStore, RenderState, SharedStatsSink, SurfaceLifecycleCoordinator, WaitOutcome,
};
use std::sync::Arc;
use std::time::Duration;

fn surface(recorder: &Arc<Recorder>) -> RecorderSurface {
    RecorderSurface {
        size: SurfaceSize::new(16, 9),
        recorder: Arc::clone(recorder),
    }
}

#[test]
fn test_surface_can_come_back_after_destroy() {
    let store = Arc::new(FrameStore::new());
    let mut coordinator = SurfaceLifecycleCoordinator::new(
        Arc::clone(&store),
        Arc::new(SharedStatsSink::new()),
        [0.0, 0.0, 0.0, 1.0],
    )
    .unwrap();
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());

    coordinator.surface_available(surface(&first));
    assert!(wait_for(|| first.presents() > 0));

    coordinator.surface_destroyed();
    assert!(wait_for(|| first.destroyed() == 1));
    assert!(wait_for(|| {
        coordinator
            .render_status()
            .is_some_and(|s| s.state() == RenderState::Stopped)
    }));

    store.publish(Arc::from(vec![1u8, 2, 3, 255]), 1, 1, 0.0);
    coordinator.surface_available(surface(&second));
    assert!(wait_for(|| second.uploads().len() == 1));
    assert_eq!(coordinator.loops_started(), 2);

    coordinator.shutdown();
    assert_eq!(first.destroyed(), 1);
    assert_eq!(second.destroyed(), 1);
}

#[test]
fn test_dropping_the_coordinator_tears_down_the_loop() {
    let recorder = Arc::new(Recorder::default());
    {
        let coordinator = SurfaceLifecycleCoordinator::new(
            Arc::new(FrameStore::new()),
            Arc::new(SharedStatsSink::new()),
            [0.0, 0.0, 0.0, 1.0],
        )
        .unwrap();
        coordinator.surface_available(surface(&recorder));
        assert!(wait_for(|| recorder.presents() > 0));
    }
    assert_eq!(recorder.destroyed(), 1);
}

#[test]
fn test_wait_right_after_available_sees_frames_presented() {
    let store = Arc::new(FrameStore::new());
    for value in 1..=3u8 {
        store.publish(Arc::from(vec![value, 0, 0, 255]), 1, 1, 0.0);
    }
    let mut coordinator = SurfaceLifecycleCoordinator::new(
        Arc::clone(&store),
        Arc::new(SharedStatsSink::new()),
        [0.0, 0.0, 0.0, 1.0],
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());

    coordinator.surface_available(surface(&recorder));
    let outcome = coordinator.wait_for_frames(
        &store,
        3,
        Duration::from_secs(5),
        || false,
        |_, _| {},
    );

    assert_eq!(outcome, WaitOutcome::Reached);
    assert!(coordinator.render_status().unwrap().presented_frames() >= 3);
    assert!(recorder.presents() >= 3);
    assert_eq!(recorder.uploads(), vec![(3, [3, 0, 0, 255])]);

    coordinator.shutdown();
    assert_eq!(recorder.destroyed(), 1);
}

#[test]
fn test_wait_stops_when_interrupted() {
    let store = Arc::new(FrameStore::new());
    let coordinator = SurfaceLifecycleCoordinator::new(
        Arc::clone(&store),
        Arc::new(SharedStatsSink::new()),
        [0.0, 0.0, 0.0, 1.0],
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());
    coordinator.surface_available(surface(&recorder));

    let outcome =
        coordinator.wait_for_frames(&store, 10, Duration::from_secs(30), || true, |_, _| {});
    assert_eq!(outcome, WaitOutcome::Interrupted);
}

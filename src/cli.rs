// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands that run without the interactive viewer
//!
//! This module provides command-line functionality for:
//! - Running the pipeline headless into an offscreen GPU surface
//! - Printing and saving the configuration

use edge_viewer::render::gpu::GpuSurface;
use edge_viewer::{
    AppError, AppResult, Config, FrameStore, Pipeline, SharedStatsSink, SurfaceLifecycleCoordinator,
    WaitOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Time allowed per requested frame before giving up
const PER_FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Render `frames` processed frames offscreen, then report stats
pub fn run_headless(
    config: Config,
    frames: u64,
    width: u32,
    height: u32,
    output: Option<PathBuf>,
) -> AppResult<()> {
    let store = Arc::new(FrameStore::new());
    let sink = Arc::new(SharedStatsSink::new());

    let mut pipeline = Pipeline::start(&config, Arc::clone(&store), sink.clone())?;
    if !pipeline.is_capturing() {
        return Err(sink
            .last_error()
            .map(AppError::from)
            .unwrap_or_else(|| AppError::Other("Capture did not start".to_string())));
    }
    println!("Source: {}", config.source);
    println!("Processing: {}x{}", config.capture_width, config.capture_height);
    println!("Surface: {}x{}", width, height);

    let surface = GpuSurface::new(width, height);
    let presented = surface.presented();
    let mut coordinator =
        SurfaceLifecycleCoordinator::new(Arc::clone(&store), sink.clone(), config.clear_color)
            .map_err(|e| AppError::Other(format!("Failed to start render thread: {}", e)))?;
    coordinator.surface_available(surface);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

    let frame_count = u32::try_from(frames.max(1)).unwrap_or(u32::MAX);
    let outcome = coordinator.wait_for_frames(
        &store,
        frames,
        PER_FRAME_TIMEOUT.saturating_mul(frame_count),
        || stop_flag.load(Ordering::SeqCst),
        |processed, presented| {
            print!("\rFrames: {} processed, {} presented", processed, presented);
            let _ = std::io::Write::flush(&mut std::io::stdout());
        },
    );
    println!();
    match outcome {
        WaitOutcome::Reached => {}
        WaitOutcome::Interrupted => println!("Stopping early..."),
        WaitOutcome::TimedOut => println!("Timed out waiting for frames"),
        WaitOutcome::RenderEnded => println!("Render loop ended"),
    }
    let presented_frames = coordinator
        .render_status()
        .map_or(0, |status| status.presented_frames());

    // Keep the last presented image before tearing the surface down
    let image = presented.latest();
    coordinator.shutdown();
    pipeline.stop();

    println!("{}", sink.status_line());
    println!(
        "Processed: {}  Presented: {}  Dropped: {}",
        store.latest_sequence(),
        presented_frames,
        store.dropped_frames()
    );

    if presented_frames == 0 {
        return Err(sink
            .last_error()
            .map(AppError::from)
            .unwrap_or_else(|| AppError::Other("No frame was presented".to_string())));
    }

    if let Some(path) = output {
        let image = image.ok_or_else(|| AppError::Other("No frame was presented".to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image.save(&path)?;
        println!("Image saved: {}", path.display());
    }

    Ok(())
}

/// Print the effective configuration as JSON, optionally saving it
pub fn show_config(config: &Config, save: bool) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        config.save()?;
        if let Some(path) = Config::default_path() {
            println!("Saved: {}", path.display());
        }
    }
    Ok(())
}

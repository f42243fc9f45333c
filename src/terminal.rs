// SPDX-License-Identifier: GPL-3.0-only

//! Terminal edge viewer
//!
//! The host thread owns the terminal's input side: it enables raw mode,
//! polls keyboard and resize events and forwards surface signals. Drawing
//! happens on the render thread through a [`TerminalSurface`], which writes
//! Unicode half-blocks for double vertical resolution.

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::frame_store::FrameStore;
use crate::pipeline::Pipeline;
use crate::render::SurfaceLifecycleCoordinator;
use crate::render::terminal::{StatusLine, TerminalSurface, surface_size_for};
use crate::snapshot;
use crate::stats::SharedStatsSink;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::backend::CrosstermBackend;
use std::io::{Stdout, stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info};

type Coordinator = SurfaceLifecycleCoordinator<TerminalSurface<CrosstermBackend<Stdout>>>;

/// Input poll interval of the host thread
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a key press asks the viewer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    Quit,
    ToggleEdges,
    Snapshot,
}

impl ViewerAction {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Self::Quit),
            KeyCode::Char('q') | KeyCode::Esc => Some(Self::Quit),
            KeyCode::Char('e') => Some(Self::ToggleEdges),
            KeyCode::Char('s') => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// Run the terminal viewer until the user quits
pub fn run(config: Config) -> AppResult<()> {
    let quit = Arc::new(AtomicBool::new(false));
    let quit_handler = Arc::clone(&quit);
    ctrlc::set_handler(move || {
        quit_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

    // Set up terminal
    enable_raw_mode().map_err(terminal_error)?;
    execute!(stdout(), EnterAlternateScreen).map_err(terminal_error)?;

    let result = run_viewer(&config, &quit);

    // Restore terminal
    disable_raw_mode().map_err(terminal_error)?;
    execute!(stdout(), LeaveAlternateScreen, crossterm::cursor::Show).map_err(terminal_error)?;

    result
}

fn terminal_error(e: std::io::Error) -> AppError {
    AppError::Terminal(e.to_string())
}

/// Status line shared with the render thread
#[derive(Clone)]
struct Notice(Arc<Mutex<Option<String>>>);

impl Notice {
    fn set(&self, message: String) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    fn status_line(&self, sink: Arc<SharedStatsSink>) -> StatusLine {
        let notice = Arc::clone(&self.0);
        Arc::new(move || {
            let stats = sink.status_line();
            match notice.lock().unwrap_or_else(PoisonError::into_inner).as_deref() {
                Some(message) => format!("{} | {}", stats, message),
                None => format!("{} | e: edges  s: snapshot  q: quit", stats),
            }
        })
    }
}

fn run_viewer(config: &Config, quit: &AtomicBool) -> AppResult<()> {
    let store = Arc::new(FrameStore::new());
    let sink = Arc::new(SharedStatsSink::new());
    let notice = Notice(Arc::new(Mutex::new(None)));

    let mut pipeline = Pipeline::start(config, Arc::clone(&store), sink.clone())?;
    if !pipeline.is_capturing() {
        notice.set(format!("No capture source ({})", config.source));
    }

    let mut coordinator: Coordinator =
        SurfaceLifecycleCoordinator::new(Arc::clone(&store), sink.clone(), config.clear_color)
            .map_err(|e| AppError::Other(format!("Failed to start render thread: {}", e)))?;
    coordinator.surface_available(
        TerminalSurface::new(CrosstermBackend::new(stdout()), config.terminal_frame_budget())
            .with_status(notice.status_line(sink.clone())),
    );

    let result = event_loop(config, quit, &pipeline, &coordinator, &store, &notice);

    coordinator.shutdown();
    pipeline.stop();
    info!(errors = sink.error_count(), "Terminal viewer stopped");
    result
}

fn event_loop(
    config: &Config,
    quit: &AtomicBool,
    pipeline: &Pipeline,
    coordinator: &Coordinator,
    store: &FrameStore,
    notice: &Notice,
) -> AppResult<()> {
    while !quit.load(Ordering::SeqCst) {
        if !event::poll(INPUT_POLL_INTERVAL).map_err(terminal_error)? {
            continue;
        }
        match event::read().map_err(terminal_error)? {
            Event::Key(key) => match ViewerAction::from_key(&key) {
                Some(ViewerAction::Quit) => break,
                Some(ViewerAction::ToggleEdges) => match pipeline.toggle_edges() {
                    Some(true) => notice.set("Showing edges".to_string()),
                    Some(false) => notice.set("Showing camera".to_string()),
                    None => {}
                },
                Some(ViewerAction::Snapshot) => {
                    match snapshot::save_latest(store, &config.snapshot_directory()) {
                        Ok(path) => notice.set(format!("Saved: {}", path.display())),
                        Err(e) => {
                            error!(error = %e, "Failed to save snapshot");
                            notice.set(format!("Error: {}", e));
                        }
                    }
                }
                None => {}
            },
            Event::Resize(columns, rows) => {
                let size = surface_size_for(columns, rows);
                coordinator.surface_resized(size.width, size.height);
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_key_bindings() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            ViewerAction::from_key(&press(KeyCode::Char('q'), none)),
            Some(ViewerAction::Quit)
        );
        assert_eq!(
            ViewerAction::from_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ViewerAction::Quit)
        );
        assert_eq!(
            ViewerAction::from_key(&press(KeyCode::Char('e'), none)),
            Some(ViewerAction::ToggleEdges)
        );
        assert_eq!(
            ViewerAction::from_key(&press(KeyCode::Char('s'), none)),
            Some(ViewerAction::Snapshot)
        );
        assert_eq!(ViewerAction::from_key(&press(KeyCode::Char('c'), none)), None);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut key = press(KeyCode::Char('q'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(ViewerAction::from_key(&key), None);
    }

    #[test]
    fn test_status_line_shows_notice() {
        let sink = Arc::new(SharedStatsSink::new());
        let notice = Notice(Arc::new(Mutex::new(None)));
        let status = notice.status_line(sink);

        assert!(status().ends_with("q: quit"));
        notice.set("Showing edges".to_string());
        assert!(status().ends_with("| Showing edges"));
    }
}

// SPDX-License-Identifier: GPL-3.0-only
//! Named worker threads that repeat a step until told to stop
//!
//! The render loop and the synthetic capture driver both acquire some
//! thread-confined state on a fresh thread, step it until stopped, and drop
//! it on that same thread. [`LoopController`] owns the thread, the stop flag
//! and the join.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Returned by each step to keep going or end the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a worker loop thread
///
/// Dropping the controller stops the loop and joins the thread.
pub struct LoopController {
    handle: Option<JoinHandle<()>>,
    stop_requested: Arc<AtomicBool>,
    name: String,
}

impl LoopController {
    /// Spawn `name`, build its state with `init`, then call `step` until it
    /// returns [`LoopAction::Stop`] or [`stop`](Self::stop) is called
    ///
    /// `init` runs on the new thread. When it fails the loop never runs. The
    /// state is dropped on the worker thread after the last step, so its
    /// `Drop` impl is where thread-confined resources get released.
    pub fn start_with_init<S, I, F>(name: &str, init: I, mut step: F) -> Self
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_requested);
        let thread_name = name.to_string();

        info!(name = %name, "Starting worker loop");

        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let mut state = match init() {
                Ok(state) => state,
                Err(e) => {
                    warn!(name = %thread_name, error = %e, "Worker initialization failed");
                    return;
                }
            };
            debug!(name = %thread_name, "Worker initialized");

            let mut steps: u64 = 0;
            while !stop.load(Ordering::SeqCst) {
                steps += 1;
                if step(&mut state) == LoopAction::Stop {
                    debug!(name = %thread_name, "Worker loop ended itself");
                    break;
                }
            }

            drop(state);
            info!(name = %thread_name, steps, "Worker thread exiting");
        });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn worker thread");
                None
            }
        };

        Self {
            handle,
            stop_requested,
            name: name.to_string(),
        }
    }

    /// Whether the worker thread has not finished yet
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the loop to end after the current step; does not wait
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait until the state has been dropped
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the loop to end on its own
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        debug!(name = %self.name, "Joining worker thread");
        if handle.join().is_err() {
            warn!(name = %self.name, "Worker thread panicked");
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

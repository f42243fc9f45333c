// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-size pool of frame buffers shared between a driver and its consumer

use super::types::{Plane, ReleaseHook};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Pool of plane sets a driver hands out as raw frames
///
/// A driver acquires a set, fills it, and attaches [`BufferPool::release_hook`]
/// to the frame. When the consumer releases the frame the set returns here.
/// If every set is on loan the driver skips the frame rather than allocate.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<Plane>>>,
    capacity: usize,
}

impl BufferPool {
    /// Create a pool of `capacity` plane sets built by `make`
    pub fn new(capacity: usize, make: impl Fn() -> Vec<Plane>) -> Arc<Self> {
        let free = (0..capacity).map(|_| make()).collect();
        Arc::new(Self {
            free: Mutex::new(free),
            capacity,
        })
    }

    /// Take a free plane set, if any
    pub fn acquire(&self) -> Option<Vec<Plane>> {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    /// Number of plane sets currently available
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hook that returns a frame's planes to this pool
    pub fn release_hook(self: &Arc<Self>) -> ReleaseHook {
        let pool = Arc::clone(self);
        Box::new(move |planes| {
            trace!("Returning frame buffers to pool");
            pool.free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(planes);
        })
    }
}

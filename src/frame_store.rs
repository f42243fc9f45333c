// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot hand-off between the processing thread and the render thread
//!
//! The store holds exactly one processed frame. Publishing replaces it
//! wholesale; consuming hands out a shared reference to the pixels. Both
//! critical sections are a pointer swap or clone, so neither side ever waits
//! on the other for longer than that.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A completed RGBA frame with its processing metadata
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// RGBA pixels, `width * height * 4` bytes, row-packed
    pub pixels: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Wall-clock time spent in the transformation, in milliseconds
    pub latency_ms: f32,
    /// Monotonic publish counter, starting at 1
    pub sequence: u64,
}

/// Returned by [`FrameStore::consume`] before the first publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotReady;

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no frame has been published yet")
    }
}

impl std::error::Error for NotReady {}

#[derive(Debug, Default)]
struct FrameSlot {
    frame: Option<ProcessedFrame>,
    /// Whether the current frame has been handed to a reader
    consumed: bool,
    published: u64,
    /// Frames overwritten before any reader saw them
    dropped: u64,
}

/// Lock-guarded single-slot frame buffer
#[derive(Debug, Default)]
pub struct FrameStore {
    slot: Mutex<FrameSlot>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameSlot> {
        // A panicking holder cannot leave the slot half-written: the only
        // mutation is a whole-value replacement.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current frame, returning its sequence number
    ///
    /// Any frame that was never consumed is dropped.
    pub fn publish(&self, pixels: Arc<[u8]>, width: u32, height: u32, latency_ms: f32) -> u64 {
        let mut slot = self.lock();
        slot.published += 1;
        if slot.frame.is_some() && !slot.consumed {
            slot.dropped += 1;
        }
        let sequence = slot.published;
        // The previous frame is moved out and released after the lock is gone
        let _previous = slot.frame.replace(ProcessedFrame {
            pixels,
            width,
            height,
            latency_ms,
            sequence,
        });
        slot.consumed = false;
        drop(slot);
        sequence
    }

    /// Get the most recent frame without waiting
    pub fn consume(&self) -> Result<ProcessedFrame, NotReady> {
        let mut slot = self.lock();
        let frame = slot.frame.clone().ok_or(NotReady)?;
        slot.consumed = true;
        Ok(frame)
    }

    /// Look at the most recent frame without marking it as consumed
    pub fn latest(&self) -> Option<ProcessedFrame> {
        self.lock().frame.clone()
    }

    /// Sequence number of the latest frame, 0 before the first publish
    pub fn latest_sequence(&self) -> u64 {
        self.lock().published
    }

    /// Number of frames overwritten without ever being consumed
    pub fn dropped_frames(&self) -> u64 {
        self.lock().dropped
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! # Modules
//!
//! - [`camera`]: Capture drivers (synthetic test pattern, V4L2) and the
//!   worker-thread controller they share with the render loop

pub mod camera;

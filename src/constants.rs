// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application directory name under the user's config/pictures directories
pub const APP_DIR_NAME: &str = "edge-viewer";

/// Configuration file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default processing width in pixels
pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;

/// Default processing height in pixels
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

/// Default frame rate of the synthetic camera
pub const DEFAULT_SYNTHETIC_FPS: u32 = 30;

/// Lower hysteresis threshold for edge detection (gradient magnitude)
pub const DEFAULT_EDGE_LOW_THRESHOLD: u16 = 50;

/// Upper hysteresis threshold for edge detection (gradient magnitude)
pub const DEFAULT_EDGE_HIGH_THRESHOLD: u16 = 150;

/// How often frame statistics are reported
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum time between terminal presents (~60 Hz)
pub const DEFAULT_TERMINAL_FRAME_BUDGET: Duration = Duration::from_millis(16);

/// Clear color used before the first frame and around letterboxed frames
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Raw frames a driver may have on loan at once before it starts skipping
pub const CAPTURE_BUFFER_COUNT: usize = 2;

/// Row alignment of synthetic frames, so stride exceeds width like real sensors
pub const SYNTHETIC_ROW_ALIGNMENT: usize = 64;

/// Number of mmap buffers requested from V4L2 devices
pub const V4L2_BUFFER_COUNT: u32 = 4;

/// Pause before retrying a failed V4L2 dequeue
pub const V4L2_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Consecutive dequeue failures after which the device is treated as gone
pub const V4L2_MAX_CONSECUTIVE_ERRORS: u32 = 50;

/// Default V4L2 device path
pub const DEFAULT_V4L2_DEVICE: &str = "/dev/video0";

/// Folder name for snapshots under the pictures directory
pub const SNAPSHOT_FOLDER: &str = "edge-viewer";

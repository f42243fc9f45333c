// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/edge-viewer/config.json`. Missing
//! fields take their defaults so older files keep loading.

use crate::constants::*;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where raw frames come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureSource {
    /// Generated test pattern, no hardware needed
    #[default]
    Synthetic,
    /// Video4Linux device
    V4l2 { path: String },
    /// No capture device; the pipeline stays idle
    Disabled,
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureSource::Synthetic => write!(f, "synthetic"),
            CaptureSource::V4l2 { path } => write!(f, "v4l2:{}", path),
            CaptureSource::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Processing width in pixels
    pub capture_width: u32,
    /// Processing height in pixels
    pub capture_height: u32,
    /// Capture source
    pub source: CaptureSource,
    /// Frame rate of the synthetic source
    pub synthetic_fps: u32,
    /// Lower edge threshold (weak edges)
    pub edge_low_threshold: u16,
    /// Upper edge threshold (strong edges)
    pub edge_high_threshold: u16,
    /// Show the edge map (true) or the raw luma (false) at startup
    pub show_edges: bool,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// Stats reporting interval in milliseconds
    pub stats_interval_ms: u64,
    /// Minimum time between terminal presents in milliseconds
    pub terminal_frame_ms: u64,
    /// Directory for snapshots (default: ~/Pictures/edge-viewer)
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_width: DEFAULT_CAPTURE_WIDTH,
            capture_height: DEFAULT_CAPTURE_HEIGHT,
            source: CaptureSource::default(),
            synthetic_fps: DEFAULT_SYNTHETIC_FPS,
            edge_low_threshold: DEFAULT_EDGE_LOW_THRESHOLD,
            edge_high_threshold: DEFAULT_EDGE_HIGH_THRESHOLD,
            show_edges: true,
            clear_color: DEFAULT_CLEAR_COLOR,
            stats_interval_ms: DEFAULT_STATS_INTERVAL.as_millis() as u64,
            terminal_frame_ms: DEFAULT_TERMINAL_FRAME_BUDGET.as_millis() as u64,
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    ///
    /// A missing file is normal on first run. A malformed or invalid file is
    /// logged and ignored.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            debug!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no config directory available".into()))?;
        self.save_to(&path)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Check values the pipeline cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(AppError::Config(format!(
                "capture size must be non-zero, got {}x{}",
                self.capture_width, self.capture_height
            )));
        }
        if self.edge_low_threshold > self.edge_high_threshold {
            return Err(AppError::Config(format!(
                "edge_low_threshold ({}) exceeds edge_high_threshold ({})",
                self.edge_low_threshold, self.edge_high_threshold
            )));
        }
        if self.synthetic_fps == 0 {
            return Err(AppError::Config("synthetic_fps must be non-zero".into()));
        }
        Ok(())
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }

    pub fn terminal_frame_budget(&self) -> Duration {
        Duration::from_millis(self.terminal_frame_ms)
    }

    /// Directory snapshots are written to
    pub fn snapshot_directory(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(SNAPSHOT_FOLDER)
        })
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Saving processed frames as PNG files

use crate::errors::{AppError, AppResult};
use crate::frame_store::{FrameStore, ProcessedFrame};
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for a snapshot taken at `time`
pub fn snapshot_file_name(time: DateTime<Local>) -> String {
    format!("EDGE_{}.png", time.format("%Y%m%d_%H%M%S_%3f"))
}

/// Write `frame` into `dir` as a PNG, creating the directory if needed
pub fn save_frame(frame: &ProcessedFrame, dir: &Path) -> AppResult<PathBuf> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.pixels.to_vec())
        .ok_or_else(|| {
            AppError::Storage(format!(
                "{}x{} frame has {} bytes",
                frame.width,
                frame.height,
                frame.pixels.len()
            ))
        })?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(Local::now()));
    image.save(&path)?;
    info!(path = %path.display(), sequence = frame.sequence, "Snapshot saved");
    Ok(path)
}

/// Save the most recent frame in `store`
pub fn save_latest(store: &FrameStore, dir: &Path) -> AppResult<PathBuf> {
    let frame = store
        .latest()
        .ok_or_else(|| AppError::Storage("no frame has been processed yet".to_string()))?;
    save_frame(&frame, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn test_file_name_has_timestamp() {
        let time = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(snapshot_file_name(time), "EDGE_20240305_140709_000.png");
    }

    #[test]
    fn test_save_latest_writes_png() {
        let dir = std::env::temp_dir().join(format!("edge-viewer-snapshot-{}", std::process::id()));
        let store = FrameStore::new();
        assert!(save_latest(&store, &dir).is_err());

        store.publish(Arc::from(vec![10, 20, 30, 255, 40, 50, 60, 255]), 2, 1, 0.0);
        let path = save_latest(&store, &dir).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (2, 1));
        assert_eq!(loaded.get_pixel(1, 0).0, [40, 50, 60, 255]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

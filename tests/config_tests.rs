// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use edge_viewer::{CaptureSource, Config};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("edge-viewer-{}-{}.json", name, std::process::id()))
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.source, CaptureSource::Synthetic);
    assert!(config.show_edges, "Edges should be shown by default");
    assert!(config.edge_low_threshold < config.edge_high_threshold);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_roundtrip_through_file() {
    let path = temp_path("roundtrip");
    let config = Config {
        source: CaptureSource::V4l2 {
            path: "/dev/video2".to_string(),
        },
        capture_width: 320,
        capture_height: 240,
        show_edges: false,
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let path = temp_path("partial");
    std::fs::write(&path, r#"{ "capture_width": 800 }"#).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.capture_width, 800);
    assert_eq!(loaded.capture_height, Config::default().capture_height);
}

#[test]
fn test_inverted_thresholds_are_rejected() {
    let config = Config {
        edge_low_threshold: 200,
        edge_high_threshold: 100,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

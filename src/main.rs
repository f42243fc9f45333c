// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use edge_viewer::constants::DEFAULT_V4L2_DEVICE;
use edge_viewer::{AppResult, CaptureSource, Config};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "edge-viewer")]
#[command(about = "Live camera edge detection in the terminal")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Command-line overrides applied on top of the config file
#[derive(Args)]
struct Overrides {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Capture from a V4L2 device; a bare --device uses /dev/video0
    #[arg(
        long,
        global = true,
        conflicts_with = "synthetic",
        num_args = 0..=1,
        default_missing_value = DEFAULT_V4L2_DEVICE
    )]
    device: Option<String>,

    /// Capture from the built-in test pattern
    #[arg(long, global = true)]
    synthetic: bool,

    /// Processing width in pixels
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Processing height in pixels
    #[arg(long, global = true)]
    height: Option<u32>,

    /// Lower edge threshold
    #[arg(long, global = true)]
    low: Option<u16>,

    /// Upper edge threshold
    #[arg(long, global = true)]
    high: Option<u16>,

    /// Start with the raw camera view instead of edges
    #[arg(long, global = true)]
    raw: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (default)
    Terminal,

    /// Render frames into an offscreen GPU surface
    Headless {
        /// Number of frames to render
        #[arg(short, long, default_value = "30")]
        frames: u64,

        /// Surface width in pixels
        #[arg(long, default_value = "640")]
        surface_width: u32,

        /// Surface height in pixels
        #[arg(long, default_value = "360")]
        surface_height: u32,

        /// Save the last presented image as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to the default config location
        #[arg(long)]
        save: bool,
    },
}

impl Overrides {
    fn load(&self) -> AppResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load(),
        };

        if let Some(path) = &self.device {
            config.source = CaptureSource::V4l2 { path: path.clone() };
        }
        if self.synthetic {
            config.source = CaptureSource::Synthetic;
        }
        if let Some(width) = self.width {
            config.capture_width = width;
        }
        if let Some(height) = self.height {
            config.capture_height = height;
        }
        if let Some(low) = self.low {
            config.edge_low_threshold = low;
        }
        if let Some(high) = self.high {
            config.edge_high_threshold = high;
        }
        if self.raw {
            config.show_edges = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=edge_viewer=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.overrides.load()?;

    match cli.command {
        Some(Commands::Terminal) | None => edge_viewer::terminal::run(config)?,
        Some(Commands::Headless {
            frames,
            surface_width,
            surface_height,
            output,
        }) => cli::run_headless(config, frames, surface_width, surface_height, output)?,
        Some(Commands::Config { save }) => cli::show_config(&config, save)?,
    }

    Ok(())
}

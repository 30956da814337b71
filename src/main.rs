// SPDX-License-Identifier: GPL-3.0-only

use agecam::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "agecam")]
#[command(about = "Photo library whose pictures age")]
#[command(version)]
struct Cli {
    /// Configuration file (default: <config_dir>/agecam/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render sample photos from gradient noise
    Sample {
        /// Number of samples to render
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Output directory (default: ~/Pictures/agecam)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Age an image file without adding it to the library
    Age {
        /// Input image
        input: PathBuf,

        /// Age state the image is currently at
        #[arg(long, default_value = "0")]
        from: u32,

        /// Age state to reach (0-11)
        #[arg(long)]
        to: u32,

        /// Output file path (default: ~/Pictures/agecam/aged_N_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add an image to the library
    Import {
        /// Input image
        input: PathBuf,

        /// Clockwise rotation in degrees (multiple of 90)
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        rotation: i32,
    },

    /// List library photos
    List,

    /// Age a library photo
    Advance {
        /// Photo id (from 'agecam list')
        id: i64,

        /// Age state to reach (0-11)
        #[arg(long)]
        to: u32,
    },

    /// Copy a library photo to a file
    Export {
        /// Photo id (from 'agecam list')
        id: i64,

        /// Output file path (default: ~/Pictures/agecam/photo_ID_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=agecam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    tracing::debug!(version = agecam::constants::app_version(), "Starting agecam");
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sample { count, output } => cli::synthesize_samples(&config, count, output),
        Commands::Age {
            input,
            from,
            to,
            output,
        } => cli::age_file(&config, &input, output, from, to),
        Commands::Import { input, rotation } => cli::import_photo(&config, &input, rotation),
        Commands::List => cli::list_photos(&config),
        Commands::Advance { id, to } => cli::advance_photo(&config, id, to),
        Commands::Export { id, output } => cli::export_photo(&config, id, output),
    }
}

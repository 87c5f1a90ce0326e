//! FrameReel CLI: play and export directories of animation frames.
//!
//! Usage:
//!   framereel info <DIR>              Show frames, delays, and timing
//!   framereel play <DIR>              Play the directory, following live changes
//!   framereel export <DIR>            Export the frames to an animated GIF
//!   framereel delay <DIR> <FRAME> <MS>  Set one frame's delay
//!   framereel default-delay <DIR> <MS>  Set the delay of frames without an override
//!   framereel reset <DIR>             Restore default delays

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use framereel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "framereel",
    about = "Flipbook playback and GIF export for directories of frames",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the per-user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show frames, delays, and timing of a directory
    Info {
        /// Path to the frame directory
        path: PathBuf,
    },

    /// Play a directory, picking up frames as they are added or edited
    Play {
        /// Path to the frame directory
        path: PathBuf,

        /// Play at this many frames per second instead of the saved delay
        #[arg(long)]
        fps: Option<u32>,

        /// Stop after this many full cycles
        #[arg(long)]
        cycles: Option<u32>,

        /// Decode every frame in the background before playing
        #[arg(long)]
        preload: bool,

        /// Print engine events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Export a directory to an animated GIF
    Export {
        /// Path to the frame directory
        path: PathBuf,

        /// Output file path (defaults to <DIR>.gif next to the directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Delay in milliseconds for frames without an override
        #[arg(long)]
        delay: Option<u32>,

        /// Play once instead of looping forever
        #[arg(long)]
        no_loop: bool,

        /// Disposal method: unspecified|do-not-dispose|restore-to-background|restore-to-previous
        #[arg(long)]
        disposal: Option<String>,
    },

    /// Set one frame's delay
    Delay {
        /// Path to the frame directory
        path: PathBuf,

        /// File name of the frame to retime
        frame: String,

        /// Delay in milliseconds; zero or less restores the default
        #[arg(allow_negative_numbers = true)]
        ms: i64,
    },

    /// Set the delay of frames without an override
    DefaultDelay {
        /// Path to the frame directory
        path: PathBuf,

        /// Delay in milliseconds
        ms: i64,
    },

    /// Clear every per-frame delay override and restore the default delay
    Reset {
        /// Path to the frame directory
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    framereel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Info { path } => commands::info::run(config, path),
        Commands::Play {
            path,
            fps,
            cycles,
            preload,
            json,
        } => commands::play::run(config, path, fps, cycles, preload, json).await,
        Commands::Export {
            path,
            output,
            delay,
            no_loop,
            disposal,
        } => commands::export::run(config, path, output, delay, no_loop, disposal),
        Commands::Delay { path, frame, ms } => commands::delay::run(config, path, frame, ms),
        Commands::DefaultDelay { path, ms } => commands::delay::run_default(config, path, ms),
        Commands::Reset { path } => commands::reset::run(config, path),
    }
}

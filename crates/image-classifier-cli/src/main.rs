//! Image Classify CLI - classify images with the image classifier task
//!
//! Runs files through the classifier in any of its three running modes, using
//! the rule-based shot type model.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::classify::ClassifyCommand;

#[derive(Parser)]
#[command(
    name = "image-classify",
    version,
    about = "Classify camera shot types in images and frame sequences",
    after_help = "EXAMPLES:\n  \
                  # One-shot classification of independent images\n  \
                  image-classify classify photo1.jpg photo2.png\n\n  \
                  # Treat files as consecutive video frames at 25 fps\n  \
                  image-classify classify --mode video --fps 25 frames/*.png\n\n  \
                  # Live-stream mode with settings from a config file, JSON output\n  \
                  image-classify classify --config classifier.yaml --mode live-stream --json frames/*.png\n\n  \
                  # Show the model's labels\n  \
                  image-classify labels"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify image files
    Classify(ClassifyCommand),

    /// List the model's classification heads and labels
    Labels,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let default_directive = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Classify(cmd) => cmd.execute(),
        Commands::Labels => commands::labels::list_labels(),
    }
}

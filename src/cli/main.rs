use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    version = "0.1.0",
    about = "Cloud-backed note keeping client"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Override the application data directory
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Override the feature-flags source document
    #[clap(long, value_parser)]
    pub flags_source: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the cloudkeep application
    #[clap(subcommand)]
    pub command: Commands,
}

//! CLI Module
//!
//! Command-line interface for offline use of the vocal chain.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vocal Master - preset-driven vocal chain and mixdown
#[derive(Parser, Debug)]
#[command(name = "vocal-master")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the style presets and their parameter bundles
    #[command(name = "presets")]
    Presets {
        /// Print the bundles as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a vocal (and optional beat) to a mastered WAV
    #[command(name = "render")]
    Render {
        /// Lead vocal WAV file
        #[arg(long)]
        vocal: PathBuf,

        /// Backing beat WAV file
        #[arg(long)]
        beat: Option<PathBuf>,

        /// ProcessingSettings as JSON
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Style override, e.g. "pop-ballad" or "edm"
        #[arg(long)]
        style: Option<String>,

        /// EngineConfig as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory the export is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print format and level information for a WAV file
    #[command(name = "inspect")]
    Inspect {
        /// WAV file to inspect
        path: PathBuf,
    },
}

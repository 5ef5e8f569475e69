use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use super::commands::Commands;

/// How `ManualPause` steps are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ManualMode {
    /// Record the step as skipped with a notice
    Skip,
    /// Pause for a fixed time, then continue
    Wait,
    /// Wait for Enter on the terminal
    Prompt,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Output format
    #[arg(short, long, default_value = "human")]
    pub output: crate::cli::output::OutputFormat,

    /// Write Prometheus metrics to this file when the command ends
    #[arg(long, value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,

    /// Attach to an existing Chrome DevTools websocket instead of launching Chrome
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Show the browser window even when HEADLESS is set
    #[arg(long)]
    pub headful: bool,

    /// Manual step handling; defaults to `wait` when WAIT_MANUAL is set, `skip` otherwise
    #[arg(long, value_enum)]
    pub manual: Option<ManualMode>,

    #[command(subcommand)]
    pub command: Commands,
}

use std::path::Path;

use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_local_env_overrides, LOCAL_ENV_FILE};
use crate::config::{load_settings, resolve_config_path};
use crate::errors::PilotError;
use crate::metrics;

/// Exit code for errors that stop a command before it reports.
pub const EXIT_INFRASTRUCTURE: i32 = 2;

/// Parses the command line, runs the command and returns the exit code:
/// 0 for a finished run, 1 for a failed workflow, 2 when the run could not
/// take place.
pub async fn run() -> i32 {
    let cli = CliArgs::parse();
    if let Err(err) = init_logging(&cli.log_level, cli.debug, cli.log_json) {
        eprintln!("Error: {err:#}");
        return EXIT_INFRASTRUCTURE;
    }
    load_local_env_overrides(Path::new(LOCAL_ENV_FILE));
    metrics::register_metrics();

    info!("Starting console-pilot v{}", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            error!("Configuration failed: {err:#}");
            eprintln!("Error: {err:#}");
            return EXIT_INFRASTRUCTURE;
        }
    };
    let ctx = CliContext::new(settings, resolve_config_path(cli.config.as_deref()))
        .with_browser(cli.ws_url.clone(), cli.headful)
        .with_manual(cli.manual);
    ctx.install_interrupt_handler();

    let code = match dispatch(&cli, &ctx).await {
        Ok(code) => {
            info!(code, "Command completed");
            code
        }
        Err(err) => {
            error!("Command failed: {err:#}");
            eprintln!("Error: {err:#}");
            if let Some(hint) = err.downcast_ref::<PilotError>().and_then(PilotError::hint) {
                eprintln!("Hint: {hint}");
            }
            EXIT_INFRASTRUCTURE
        }
    };

    if let Some(path) = &cli.metrics_file {
        if let Err(err) = metrics::write_metrics_file(path).await {
            error!("Failed to write metrics: {err:#}");
        }
    }
    code
}

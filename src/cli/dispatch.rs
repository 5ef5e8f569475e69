use anyhow::Result;

use super::config::cmd_config;
use super::env::CliArgs;
use super::tasks::{cmd_login, cmd_probe, cmd_task};
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use crate::tasks::{SessionTarget, Task};

/// Runs the selected command and returns the process exit code.
pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<i32> {
    let output = &cli.output;
    match cli.command.clone() {
        Commands::Login(args) => cmd_login(ctx, SessionTarget::PlayConsole, args).await,
        Commands::GithubLogin(args) => cmd_login(ctx, SessionTarget::GitHub, args).await,
        Commands::ClosedRelease => cmd_task(ctx, Task::ClosedRelease, output).await,
        Commands::StoreListing => cmd_task(ctx, Task::StoreListing, output).await,
        Commands::Listing => cmd_task(ctx, Task::Listing, output).await,
        Commands::Pricing => cmd_task(ctx, Task::Pricing, output).await,
        Commands::AppContent => cmd_task(ctx, Task::AppContent, output).await,
        Commands::PagesDomain => cmd_task(ctx, Task::PagesDomain, output).await,
        Commands::VerifyAppLinks => cmd_task(ctx, Task::VerifyAppLinks, output).await,
        Commands::AppLinksStatus => cmd_task(ctx, Task::AppLinksStatus, output).await,
        Commands::ProbeAssetlinks(args) => cmd_probe(ctx, args, output).await,
        Commands::Config => cmd_config(ctx, output).await,
    }
}

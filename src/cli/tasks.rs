use std::sync::Arc;
use std::time::Duration;

use action_primitives::DefaultActionPrimitives;
use anyhow::Result;
use cdp_adapter::Cdp;
use endpoint_probe::HttpProber;
use session_auth::{LoginProfile, SessionManager, SessionStore};
use tracing::{info, warn};

use super::commands::{LoginArgs, ProbeArgs};
use super::context::CliContext;
use super::output::{render_outcome, OutputFormat};
use crate::engine::{Detached, Engine};
use crate::errors::PilotError;
use crate::tasks::{run_task, ProbeOptions, SessionTarget, Task, TaskOutcome};

fn profile(ctx: &CliContext, target: SessionTarget) -> (SessionStore, LoginProfile) {
    let settings = ctx.settings();
    match target {
        SessionTarget::GitHub => (
            SessionStore::new(&settings.github_session_file),
            LoginProfile::github(),
        ),
        _ => (
            SessionStore::new(&settings.session_file),
            LoginProfile::play_console(&settings.console_url),
        ),
    }
}

/// Interactive sign-in; always headful.
pub async fn cmd_login(ctx: &CliContext, target: SessionTarget, args: LoginArgs) -> Result<i32> {
    let (store, profile) = profile(ctx, target);
    let profile = profile.with_timeout(Duration::from_secs(args.timeout_secs));
    let browser = ctx.launch_browser(true).await?;
    let cdp: Arc<dyn Cdp> = browser.clone();
    let manager = SessionManager::new(store, cdp, profile);

    let result = manager.login().await;
    browser.shutdown().await;
    let state = result.map_err(PilotError::from)?;

    if state.landmark_seen {
        println!("Session saved to {}", manager.store().path().display());
    } else {
        warn!("sign-in was not confirmed; the saved session may not be authenticated");
        println!(
            "Session saved to {} (sign-in not confirmed, run the login again if tasks ask to sign in)",
            manager.store().path().display()
        );
    }
    Ok(0)
}

/// Restores the task's session, runs it and prints the report.
pub async fn cmd_task(ctx: &CliContext, task: Task, format: &OutputFormat) -> Result<i32> {
    let settings = ctx.settings();
    // Configuration problems surface before a browser is started.
    task.workflow(settings)?;

    let (store, profile) = profile(ctx, task.session());
    if !store.exists() {
        return Err(PilotError::Session(session_auth::SessionError::SessionMissing(
            store.path().to_path_buf(),
        ))
        .into());
    }

    let browser = ctx.launch_browser(false).await?;
    let result = restore_and_run(ctx, browser.clone(), store, profile, &task).await;
    browser.shutdown().await;

    let outcome = result?;
    println!("{}", render_outcome(format, &outcome)?);
    Ok(outcome.exit_code())
}

async fn restore_and_run(
    ctx: &CliContext,
    cdp: Arc<dyn Cdp>,
    store: SessionStore,
    profile: LoginProfile,
    task: &Task,
) -> Result<TaskOutcome, PilotError> {
    SessionManager::new(store, Arc::clone(&cdp), profile)
        .restore()
        .await?;
    let engine =
        Engine::new(cdp, ctx.settings(), ctx.checkpoint())?.with_cancellation(ctx.cancel_token());
    run_task(&engine, task, ctx.settings()).await
}

/// Asset links check without a browser.
pub async fn cmd_probe(ctx: &CliContext, args: ProbeArgs, format: &OutputFormat) -> Result<i32> {
    let settings = ctx.settings();
    let defaults = ProbeOptions::from_settings(settings);
    let options = ProbeOptions {
        url: args.url.unwrap_or(defaults.url),
        package: args.package.unwrap_or(defaults.package),
        attempts: args.attempts,
        interval: Duration::from_secs(args.interval_secs),
    };
    info!(url = %options.url, package = %options.package, attempts = options.attempts, "probing asset links");

    let cdp: Arc<dyn Cdp> = Arc::new(Detached);
    let engine = Engine::with_parts(
        Arc::clone(&cdp),
        DefaultActionPrimitives::new(cdp),
        Arc::new(HttpProber::new().map_err(PilotError::from)?),
        ctx.checkpoint(),
    )
    .with_cancellation(ctx.cancel_token());

    let outcome = run_task(&engine, &Task::ProbeAssetLinks(options), settings).await?;
    println!("{}", render_outcome(format, &outcome)?);
    Ok(outcome.exit_code())
}

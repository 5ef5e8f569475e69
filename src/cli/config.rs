use anyhow::Result;

use super::context::CliContext;
use super::output::{render, OutputFormat};
use crate::config::Settings;

pub async fn cmd_config(ctx: &CliContext, format: &OutputFormat) -> Result<i32> {
    let text = render(format, ctx.settings(), |settings: &Settings| {
        let source = ctx
            .config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment and defaults".to_string());
        match serde_yaml::to_string(settings) {
            Ok(yaml) => format!("Effective configuration ({source}):\n{yaml}"),
            Err(err) => format!("Effective configuration ({source}) could not be rendered: {err}"),
        }
    })?;
    println!("{text}");
    Ok(0)
}

use std::path::Path;
use std::time::Duration;

use action_flow::RunReport;
use anyhow::{Context, Result};
use cdp_adapter::metrics as cdp_metrics;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

static WORKFLOW_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pilot_workflow_runs_total", "Workflow runs by task and result"),
        &["task", "result"],
    )
    .expect("valid workflow run counter")
});

static STEP_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pilot_step_outcomes_total", "Step outcomes by task and outcome"),
        &["task", "outcome"],
    )
    .expect("valid step outcome counter")
});

static WORKFLOW_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("pilot_workflow_duration_seconds", "Workflow wall time")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 240.0, 600.0]),
        &["task"],
    )
    .expect("valid workflow histogram")
});

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        cdp_metrics::register_metrics(registry);
        for collector in [WORKFLOW_RUNS_TOTAL.clone(), STEP_OUTCOMES_TOTAL.clone()] {
            if let Err(err) = registry.register(Box::new(collector)) {
                error!(?err, "failed to register workflow metric");
            }
        }
        if let Err(err) = registry.register(Box::new(WORKFLOW_DURATION.clone())) {
            error!(?err, "failed to register workflow metric");
        }
    });
}

/// Counts one finished run and its steps.
pub fn record_run(task: &str, report: &RunReport) {
    WORKFLOW_RUNS_TOTAL
        .with_label_values(&[task, report.result.label()])
        .inc();
    for step in &report.steps {
        STEP_OUTCOMES_TOTAL
            .with_label_values(&[task, step.outcome.label()])
            .inc();
    }
    WORKFLOW_DURATION
        .with_label_values(&[task])
        .observe(Duration::from_millis(report.latency_ms).as_secs_f64());
}

/// Prometheus text exposition of everything registered.
pub fn render_text() -> Result<String> {
    register_metrics();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&global_registry().gather(), &mut buffer)
        .context("failed to encode prometheus metrics")?;
    String::from_utf8(buffer).context("prometheus metrics are not utf8")
}

pub async fn write_metrics_file(path: &Path) -> Result<()> {
    let body = render_text()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing metrics to {}", path.display()))?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::{StepRecord, WorkflowResult};
    use action_flow::types::DecisionKind;
    use action_primitives::StepOutcome;
    use chrono::Utc;

    #[tokio::test]
    async fn run_counters_reach_the_metrics_file() {
        let report = RunReport {
            workflow_id: "wf".into(),
            workflow: "pricing".into(),
            result: WorkflowResult::Succeeded,
            steps: vec![StepRecord {
                index: 0,
                id: "save".into(),
                label: "Save".into(),
                action: "click".into(),
                outcome: StepOutcome::Performed,
                decision: DecisionKind::Continue,
                latency_ms: 12,
                detail: None,
            }],
            notices: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            latency_ms: 1500,
        };
        record_run("pricing", &report);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/metrics.prom");
        write_metrics_file(&path).await.unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("pilot_workflow_runs_total"));
        assert!(text.contains("task=\"pricing\""));
    }
}

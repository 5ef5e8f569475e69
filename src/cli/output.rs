use std::fmt::Write as _;

use action_flow::{RunReport, WorkflowResult};
use action_primitives::StepOutcome;
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::tasks::TaskOutcome;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Serializes `value` for json/yaml, or falls back to `human`.
pub fn render<T: Serialize>(
    format: &OutputFormat,
    value: &T,
    human: impl FnOnce(&T) -> String,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Human => human(value),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

pub fn render_outcome(format: &OutputFormat, outcome: &TaskOutcome) -> Result<String> {
    render(format, outcome, human_outcome)
}

fn outcome_tag(outcome: &StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Performed => "ok",
        StepOutcome::SkippedAlreadySatisfied => "done",
        StepOutcome::SkippedNotFound => "skip",
        StepOutcome::Failed(_) => "FAIL",
    }
}

fn human_report(out: &mut String, report: &RunReport) {
    for record in &report.steps {
        let _ = write!(
            out,
            "  [{:>4}] {:<24} {} ({} ms)",
            outcome_tag(&record.outcome),
            record.id,
            record.label,
            record.latency_ms
        );
        if let Some(detail) = &record.detail {
            let _ = write!(out, " - {detail}");
        }
        out.push('\n');
    }
    if !report.notices.is_empty() {
        out.push_str("Still to do by hand:\n");
        for notice in &report.notices {
            let _ = writeln!(out, "  - {notice}");
        }
    }
}

fn human_outcome(outcome: &TaskOutcome) -> String {
    let report = &outcome.report;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} in {:.1}s",
        outcome.task,
        report.result.label(),
        report.latency_ms as f64 / 1000.0
    );
    human_report(&mut out, report);
    match &report.result {
        WorkflowResult::Succeeded => {}
        WorkflowResult::PartiallyCompleted { skipped } => {
            let _ = writeln!(out, "Skipped: {}", skipped.join(", "));
        }
        WorkflowResult::Failed { step, reason } => {
            let _ = writeln!(out, "Failed at step {}: {reason}", step + 1);
        }
        WorkflowResult::RequiresManualCompletion { step, reason } => {
            let _ = writeln!(
                out,
                "Check back later or finish step {} by hand: {reason}",
                step + 1
            );
        }
    }
    if let Some(status) = outcome.domain_status {
        let _ = writeln!(out, "Domain status: {status}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::types::DecisionKind;
    use action_flow::StepRecord;
    use chrono::Utc;

    fn outcome(result: WorkflowResult) -> TaskOutcome {
        TaskOutcome {
            task: "closed-release".into(),
            report: RunReport {
                workflow_id: "closed-release".into(),
                workflow: "closed-release".into(),
                result,
                steps: vec![StepRecord {
                    index: 0,
                    id: "create-release".into(),
                    label: "Create release".into(),
                    action: "click".into(),
                    outcome: StepOutcome::SkippedNotFound,
                    decision: DecisionKind::Skipped,
                    latency_ms: 15_000,
                    detail: Some("not found".into()),
                }],
                notices: vec!["upload the bundle".into()],
                started_at: Utc::now(),
                finished_at: Utc::now(),
                latency_ms: 16_000,
            },
            domain_status: None,
        }
    }

    #[test]
    fn human_output_lists_skips_and_notices() {
        let text = render_outcome(
            &OutputFormat::Human,
            &outcome(WorkflowResult::PartiallyCompleted {
                skipped: vec!["create-release".into()],
            }),
        )
        .unwrap();
        assert!(text.starts_with("closed-release: partially_completed"));
        assert!(text.contains("[skip] create-release"));
        assert!(text.contains("Skipped: create-release"));
        assert!(text.contains("  - upload the bundle"));
    }

    #[test]
    fn json_output_tags_the_result() {
        let text = render_outcome(&OutputFormat::Json, &outcome(WorkflowResult::Succeeded)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["report"]["result"]["status"], "succeeded");
        assert!(value.get("domain_status").is_none());
    }
}

//! CLI output: tables, JSON views and error mapping.

use crate::config::ValidationError;
use crate::scheduler::{CycleOutcome, CycleStats};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;

/// Map an error chain to a single CLI line
pub fn map_error(e: &anyhow::Error) -> String {
    format!("Error: {:#}", e)
}

/// One row of `once` output for JSON.
#[derive(Debug, Serialize)]
struct OutcomeView<'a> {
    reconciler: &'a str,
    ok: bool,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a crate::reconciler::CycleReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn format_outcomes_text(outcomes: &[CycleOutcome]) -> String {
    if outcomes.is_empty() {
        return "No reconcilers enabled".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Reconciler", "Status", "Elapsed", "Summary"]);
    for outcome in outcomes {
        let (status, summary) = match &outcome.result {
            Ok(report) => ("ok", report.to_string()),
            Err(e) => ("failed", e.to_string()),
        };
        table.add_row(vec![
            outcome.name.clone(),
            status.to_string(),
            format!("{}ms", outcome.elapsed.as_millis()),
            summary,
        ]);
    }
    table.to_string()
}

pub fn format_outcomes_json(outcomes: &[CycleOutcome]) -> Result<String, serde_json::Error> {
    let views: Vec<_> = outcomes
        .iter()
        .map(|o| OutcomeView {
            reconciler: &o.name,
            ok: o.result.is_ok(),
            elapsed_ms: o.elapsed.as_millis() as u64,
            report: o.result.as_ref().ok(),
            error: o.result.as_ref().err().map(|e| e.to_string()),
        })
        .collect();
    serde_json::to_string_pretty(&views)
}

pub fn format_stats(stats: &[CycleStats]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Reconciler", "Cycles", "Failed", "Last error"]);
    for s in stats {
        table.add_row(vec![
            s.name.clone(),
            s.cycles.to_string(),
            s.failed.to_string(),
            s.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    let mut out = format!("Configuration has {} problem(s):\n", errors.len());
    for e in errors {
        out.push_str(&format!("  - {}\n", e));
    }
    out
}

//! Rendering outcomes for people and scripts.

use crate::model::ScenarioDefinition;
use crate::runner::{ComparisonOutcome, ScenarioFailure, rule_summary};
use crate::suite::SuiteReport;
use crossterm::style::Stylize;
use serde_json::{Value, json};
use std::fmt::Write as _;

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn verdict(success: bool, use_color: bool) -> String {
    match (success, use_color) {
        (true, true) => "PASS".green().bold().to_string(),
        (true, false) => "PASS".to_string(),
        (false, true) => "FAIL".red().bold().to_string(),
        (false, false) => "FAIL".to_string(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

/// Human report for one scenario. Failures list every diagnostic.
#[must_use]
pub fn render_outcome(outcome: &ComparisonOutcome, use_color: bool) -> String {
    let mut out = format!(
        "{} {} ({})",
        verdict(outcome.success, use_color),
        outcome.scenario,
        seconds(outcome.duration_ms)
    );
    if outcome.success {
        return out;
    }

    for failure in &outcome.failures {
        let _ = write!(out, "\n  {failure}");
        match failure {
            ScenarioFailure::BuildCommand { stderr, .. }
            | ScenarioFailure::Timeout { stderr, .. }
                if !stderr.trim().is_empty() =>
            {
                let _ = write!(out, "\n    stderr:\n{}", indent(stderr.trim_end(), "      "));
            }
            _ => {}
        }
    }
    for check in outcome.checks.iter().filter(|c| !c.passed) {
        let _ = write!(out, "\n  check {}:\n{}", check.name, indent(&check.detail, "    "));
    }
    if let Some(dir) = outcome.staging_dir.as_ref().filter(|_| outcome.staging_kept) {
        let _ = write!(out, "\n  staging dir kept at {}", dir.display());
    }
    out
}

/// Human report for a whole suite run, ending with a summary line.
#[must_use]
pub fn render_suite(report: &SuiteReport, use_color: bool) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        out.push_str(&render_outcome(outcome, use_color));
        out.push('\n');
    }
    for id in &report.skipped {
        let _ = writeln!(out, "SKIP {id}");
    }
    let summary = format!(
        "{} scenarios: {} passed, {} failed, {} skipped",
        report.total(),
        report.passed,
        report.failed,
        report.skipped.len()
    );
    if use_color {
        let styled = if report.all_passed() {
            summary.green().to_string()
        } else {
            summary.red().to_string()
        };
        out.push_str(&styled);
    } else {
        out.push_str(&summary);
    }
    out
}

/// Machine-readable suite report.
#[must_use]
pub fn suite_json(report: &SuiteReport) -> Value {
    json!({
        "summary": {
            "total": report.total(),
            "passed": report.passed,
            "failed": report.failed,
            "skipped": report.skipped.len(),
            "all_passed": report.all_passed(),
            "started_at": report.started_at.to_rfc3339(),
            "finished_at": report.finished_at.to_rfc3339(),
        },
        "outcomes": report.outcomes,
        "skipped": report.skipped,
    })
}

/// One line per scenario: id, mode, source, rules.
#[must_use]
pub fn render_listing(scenarios: &[ScenarioDefinition]) -> String {
    let width = scenarios.iter().map(|s| s.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for scenario in scenarios {
        let source = scenario.source.to_string();
        let _ = writeln!(
            out,
            "{:<width$}  {:<12}  {:<32}  {}",
            scenario.id,
            scenario.mode.as_str(),
            source,
            rule_summary(scenario),
        );
    }
    let _ = write!(out, "{} scenarios", scenarios.len());
    out
}

#[must_use]
pub fn listing_json(scenarios: &[ScenarioDefinition]) -> Value {
    Value::Array(
        scenarios
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "description": s.description,
                    "mode": s.mode.as_str(),
                    "source": s.source.to_string(),
                    "rules": rule_summary(s),
                    "extra_flags": s.extra_flags,
                })
            })
            .collect(),
    )
}

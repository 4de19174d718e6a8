//! Filesystem diff adapter.
//!
//! Shells out to a file-level image comparison tool and reduces its report
//! to one signal: did every difference section come back empty.

use crate::config::FsDiffConfig;
use crate::error::Result;
use crate::process::{ExecutionResult, Invocation, ProcessRunner};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

/// An empty section of the report: the heading is followed by `None`
/// before the next heading starts.
static EMPTY_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)These entries.*?None").expect("valid section regex"));

/// Reduced file-level comparison result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsDiffSignal {
    /// True when the tool succeeded and exactly `expected` sections are empty.
    pub clean: bool,
    pub empty_sections: usize,
    pub expected: usize,
    /// Exit code of the tool, when it ran but failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_exit_code: Option<i32>,
    /// Raw report, kept for diagnostics.
    pub report: String,
}

impl FsDiffSignal {
    /// Interpret a report produced by a successful tool run.
    #[must_use]
    pub fn from_report(report: &str, expected: usize) -> Self {
        let empty_sections = count_empty_sections(report);
        Self {
            clean: empty_sections == expected,
            empty_sections,
            expected,
            tool_exit_code: None,
            report: report.to_string(),
        }
    }

    fn from_failed_run(result: &ExecutionResult, expected: usize) -> Self {
        let mut report = result.stdout.clone();
        if !result.stderr.is_empty() {
            if !report.is_empty() {
                report.push('\n');
            }
            report.push_str(&result.stderr);
        }
        Self {
            clean: false,
            empty_sections: 0,
            expected,
            tool_exit_code: Some(result.exit_code),
            report,
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        if self.clean {
            return format!("{} empty difference sections", self.empty_sections);
        }
        match self.tool_exit_code {
            Some(code) => format!("filesystem diff tool failed with exit code {code}:\n{}", self.report),
            None => format!(
                "expected {} empty difference sections, found {}:\n{}",
                self.expected, self.empty_sections, self.report
            ),
        }
    }
}

#[must_use]
pub fn count_empty_sections(report: &str) -> usize {
    EMPTY_SECTION.find_iter(report).count()
}

/// Runs the configured comparison tool for a pair of image tags.
#[derive(Debug, Clone)]
pub struct FsDiffAdapter {
    command: Vec<String>,
    expected: usize,
    timeout: Duration,
}

impl FsDiffAdapter {
    #[must_use]
    pub fn new(config: &FsDiffConfig, timeout: Duration) -> Self {
        Self {
            command: config.command.clone(),
            expected: config.expected_empty_sections,
            timeout,
        }
    }

    /// Command line with `{candidate}` and `{reference}` filled in.
    #[must_use]
    pub fn invocation(&self, candidate_tag: &str, reference_tag: &str) -> Invocation {
        let mut parts = self.command.iter().map(|part| {
            part.replace("{candidate}", candidate_tag)
                .replace("{reference}", reference_tag)
        });
        let program = parts.next().unwrap_or_default();
        Invocation::new(program, parts)
            .with_label("fsdiff")
            .with_timeout(self.timeout)
    }

    /// Compare the two images.
    ///
    /// # Errors
    ///
    /// Returns an error only when the tool can not be started.
    pub fn compare<R: ProcessRunner + ?Sized>(
        &self,
        runner: &R,
        candidate_tag: &str,
        reference_tag: &str,
    ) -> Result<FsDiffSignal> {
        let invocation = self.invocation(candidate_tag, reference_tag);
        let result = runner.run(&invocation)?;
        let signal = if result.success() {
            FsDiffSignal::from_report(&result.stdout, self.expected)
        } else {
            FsDiffSignal::from_failed_run(&result, self.expected)
        };
        debug!(
            clean = signal.clean,
            empty_sections = signal.empty_sections,
            expected = signal.expected,
            "filesystem diff"
        );
        Ok(signal)
    }
}

//! Progress display for suite runs.
//!
//! Drawn on stderr only when it is an interactive terminal, so piped and
//! JSON output stay clean.

use crate::runner::ComparisonOutcome;
use crate::suite::SuiteObserver;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};

/// Progress is shown only if stderr is an interactive terminal.
#[must_use]
pub fn should_show_progress() -> bool {
    stderr().is_terminal()
}

/// Create a determinate progress bar; hidden unless `show`.
///
/// # Panics
/// Panics if the progress bar template string is invalid.
#[must_use]
pub fn create_progress_bar(total: u64, message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if show {
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .expect("valid template")
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// One bar for a suite run; one tick per finished scenario.
pub struct SuiteProgress {
    bar: ProgressBar,
    showing: bool,
}

impl SuiteProgress {
    #[must_use]
    pub fn new(total: usize, show: bool) -> Self {
        Self {
            bar: create_progress_bar(u64::try_from(total).unwrap_or(u64::MAX), "starting", show),
            showing: show,
        }
    }

    #[must_use]
    pub const fn is_showing(&self) -> bool {
        self.showing
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl SuiteObserver for SuiteProgress {
    fn scenario_started(&self, id: &str) {
        self.bar.set_message(id.to_string());
    }

    fn scenario_finished(&self, outcome: &ComparisonOutcome) {
        if self.showing {
            let verdict = if outcome.success { "pass" } else { "FAIL" };
            self.bar.println(format!("{verdict} {}", outcome.scenario));
        }
        self.bar.inc(1);
    }
}

//! Running many scenarios.
//!
//! Scenarios are independent: each gets its own staging directory and tags,
//! so they can run on parallel workers. Results are returned in registry
//! order whatever order they finish in.

use crate::model::ScenarioDefinition;
use crate::process::ProcessRunner;
use crate::runner::{ComparisonOutcome, ScenarioRunner};
use chrono::{DateTime, Utc};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelismMode {
    Serial,
    Parallel { jobs: usize },
}

impl ParallelismMode {
    /// `Serial` for one job, `Parallel` otherwise.
    #[must_use]
    pub const fn from_jobs(jobs: usize) -> Self {
        if jobs <= 1 {
            Self::Serial
        } else {
            Self::Parallel { jobs }
        }
    }
}

/// Aggregate result of a suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ComparisonOutcome>,
    pub passed: usize,
    pub failed: usize,
    /// Scenarios never started because of fail-fast.
    pub skipped: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len() + self.skipped.len()
    }
}

/// Called after each scenario completes.
pub trait SuiteObserver: Sync {
    fn scenario_started(&self, _id: &str) {}
    fn scenario_finished(&self, _outcome: &ComparisonOutcome) {}
}

/// Observer that does nothing.
pub struct NoopObserver;

impl SuiteObserver for NoopObserver {}

pub struct SuiteRunner<R: ProcessRunner> {
    runner: ScenarioRunner<R>,
    mode: ParallelismMode,
    fail_fast: bool,
}

impl<R: ProcessRunner> SuiteRunner<R> {
    #[must_use]
    pub const fn new(runner: ScenarioRunner<R>, mode: ParallelismMode) -> Self {
        Self {
            runner,
            mode,
            fail_fast: false,
        }
    }

    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    #[must_use]
    pub fn run(&self, scenarios: &[ScenarioDefinition]) -> SuiteReport {
        self.run_observed(scenarios, &NoopObserver)
    }

    #[must_use]
    pub fn run_observed(
        &self,
        scenarios: &[ScenarioDefinition],
        observer: &dyn SuiteObserver,
    ) -> SuiteReport {
        let started_at = Utc::now();
        info!(count = scenarios.len(), mode = ?self.mode, fail_fast = self.fail_fast, "suite started");

        let slots: Vec<Option<ComparisonOutcome>> = match self.mode {
            ParallelismMode::Serial => self.run_serial(scenarios, observer),
            ParallelismMode::Parallel { jobs } => self.run_parallel(scenarios, jobs, observer),
        };

        let mut outcomes = Vec::new();
        let mut skipped = Vec::new();
        for (definition, slot) in scenarios.iter().zip(slots) {
            match slot {
                Some(outcome) => outcomes.push(outcome),
                None => skipped.push(definition.id.clone()),
            }
        }
        let passed = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - passed;

        info!(passed, failed, skipped = skipped.len(), "suite finished");
        SuiteReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
            passed,
            failed,
            skipped,
        }
    }

    fn run_serial(
        &self,
        scenarios: &[ScenarioDefinition],
        observer: &dyn SuiteObserver,
    ) -> Vec<Option<ComparisonOutcome>> {
        let mut slots = Vec::with_capacity(scenarios.len());
        let mut stop = false;
        for definition in scenarios {
            if stop {
                slots.push(None);
                continue;
            }
            let outcome = self.run_one(definition, observer);
            stop = self.fail_fast && !outcome.success;
            slots.push(Some(outcome));
        }
        slots
    }

    fn run_parallel(
        &self,
        scenarios: &[ScenarioDefinition],
        jobs: usize,
        observer: &dyn SuiteObserver,
    ) -> Vec<Option<ComparisonOutcome>> {
        let pool = match ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool,
            Err(err) => {
                warn!(error = %err, jobs, "worker pool unavailable, running serially");
                return self.run_serial(scenarios, observer);
            }
        };
        let stop = AtomicBool::new(false);

        pool.install(|| {
            scenarios
                .par_iter()
                .map(|definition| {
                    if stop.load(Ordering::SeqCst) {
                        debug!(scenario = %definition.id, "skipped after failure");
                        return None;
                    }
                    let outcome = self.run_one(definition, observer);
                    if self.fail_fast && !outcome.success {
                        stop.store(true, Ordering::SeqCst);
                    }
                    Some(outcome)
                })
                .collect()
        })
    }

    /// One scenario, with panics turned into a failed outcome.
    fn run_one(
        &self,
        definition: &ScenarioDefinition,
        observer: &dyn SuiteObserver,
    ) -> ComparisonOutcome {
        observer.scenario_started(&definition.id);
        let outcome = catch_unwind(AssertUnwindSafe(|| self.runner.run(definition)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(scenario = %definition.id, %message, "scenario panicked");
                ComparisonOutcome::panicked(definition, message)
            });
        observer.scenario_finished(&outcome);
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic payload".to_string()
    }
}

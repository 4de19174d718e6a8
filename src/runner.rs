//! Scenario runner.
//!
//! Drives one scenario through
//! `Prepared -> BuiltCandidate -> BuiltReference -> Verified -> Reported`,
//! dropping to `Failed` as soon as a stage can not continue. Stage failures
//! stop the pipeline; verification checks all run and each one that fails
//! is recorded. Staging directories and images are released on every path.

use crate::config::VerifierConfig;
use crate::diff::{self, DiffVerdict, IgnoredKeys};
use crate::fsdiff::{FsDiffAdapter, FsDiffSignal};
use crate::matcher::{self, PatternCheck, Side};
use crate::model::{ComparisonMode, MatchRule, ScenarioDefinition};
use crate::process::{ExecutionResult, Invocation, ProcessRunner};
use crate::staging::{ScenarioTags, StagingArea};
use crate::tools::{self, ToolSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Prepared,
    BuiltCandidate,
    BuiltReference,
    Verified,
    Reported,
    Failed,
}

impl ScenarioState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prepared => "prepared",
            Self::BuiltCandidate => "built_candidate",
            Self::BuiltReference => "built_reference",
            Self::Verified => "verified",
            Self::Reported => "reported",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioFailure {
    /// The build source could not be staged; nothing was built.
    Staging { reason: String },
    /// A tool could not be started at all.
    ToolUnavailable { program: String, reason: String },
    /// A build exited non-zero.
    BuildCommand {
        side: Side,
        exit_code: i32,
        stderr: String,
    },
    /// A step exceeded its deadline and was killed. `stderr` is whatever
    /// the step wrote before that.
    Timeout {
        side: Side,
        step: String,
        timeout_secs: u64,
        stderr: String,
    },
    /// The candidate build reported success but its image is not addressable.
    ArtifactResolution { tag: String, reason: String },
    /// Image metadata could not be fetched or parsed.
    Inspection { side: Side, reason: String },
    /// A configured pattern found nothing.
    PatternNoMatch { check: String, detail: String },
    /// Captured values differ between the tools.
    ValueMismatch { check: String, detail: String },
    /// Image metadata differs outside the ignored keys.
    StructuralMismatch { differences: usize },
    /// File-level contents differ.
    FilesystemDiff { empty_sections: usize, expected: usize },
    /// The scenario panicked.
    Panicked { message: String },
}

impl ScenarioFailure {
    /// Stable identifier for scripts.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Staging { .. } => "STAGING_FAILED",
            Self::ToolUnavailable { .. } => "TOOL_UNAVAILABLE",
            Self::BuildCommand { .. } => "BUILD_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ArtifactResolution { .. } => "ARTIFACT_NOT_FOUND",
            Self::Inspection { .. } => "INSPECTION_FAILED",
            Self::PatternNoMatch { .. } => "PATTERN_NO_MATCH",
            Self::ValueMismatch { .. } => "VALUE_MISMATCH",
            Self::StructuralMismatch { .. } => "STRUCTURAL_MISMATCH",
            Self::FilesystemDiff { .. } => "FILESYSTEM_DIFF",
            Self::Panicked { .. } => "PANICKED",
        }
    }

    /// One-line summary; full diagnostics live in the outcome's checks.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Staging { reason } => format!("staging failed: {reason}"),
            Self::ToolUnavailable { program, reason } => {
                format!("could not run {program}: {reason}")
            }
            Self::BuildCommand {
                side, exit_code, ..
            } => format!("{side} build exited with code {exit_code}"),
            Self::Timeout {
                side,
                step,
                timeout_secs,
                ..
            } => format!("{side} {step} timed out after {timeout_secs}s"),
            Self::ArtifactResolution { tag, reason } => {
                format!("image '{tag}' not resolvable after a successful build: {reason}")
            }
            Self::Inspection { side, reason } => format!("{side} inspection failed: {reason}"),
            Self::PatternNoMatch { check, .. } => format!("{check}: pattern did not match"),
            Self::ValueMismatch { check, .. } => format!("{check}: captured values differ"),
            Self::StructuralMismatch { differences } => {
                format!("image metadata differs at {differences} paths")
            }
            Self::FilesystemDiff {
                empty_sections,
                expected,
            } => format!(
                "filesystem differs ({empty_sections} of {expected} difference sections empty)"
            ),
            Self::Panicked { message } => format!("panicked: {message}"),
        }
    }
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.summary())
    }
}

/// Result of one verification sub-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternCheck>,
}

/// A build command and what it printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildCapture {
    pub command: String,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

/// Everything known about one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutcome {
    pub scenario: String,
    pub mode: ComparisonMode,
    pub success: bool,
    pub final_state: ScenarioState,
    /// States entered, in order.
    pub states: Vec<ScenarioState>,
    pub failures: Vec<ScenarioFailure>,
    pub checks: Vec<CheckReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<BuildCapture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<BuildCapture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_diff: Option<FsDiffSignal>,
    pub resolved_flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    pub staging_kept: bool,
    pub candidate_tag: String,
    pub reference_tag: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ComparisonOutcome {
    fn new(definition: &ScenarioDefinition, tags: &ScenarioTags) -> Self {
        Self {
            scenario: definition.id.clone(),
            mode: definition.mode,
            success: false,
            final_state: ScenarioState::Prepared,
            states: Vec::new(),
            failures: Vec::new(),
            checks: Vec::new(),
            candidate: None,
            reference: None,
            diff: None,
            fs_diff: None,
            resolved_flags: Vec::new(),
            staging_dir: None,
            staging_kept: false,
            candidate_tag: tags.candidate.clone(),
            reference_tag: tags.reference.clone(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Outcome for a scenario that panicked before producing one.
    #[must_use]
    pub fn panicked(definition: &ScenarioDefinition, message: String) -> Self {
        let tags = ScenarioTags {
            candidate: String::new(),
            reference: String::new(),
        };
        let mut outcome = Self::new(definition, &tags);
        outcome.fail(ScenarioFailure::Panicked { message });
        outcome
    }

    /// First recorded failure.
    #[must_use]
    pub fn failure(&self) -> Option<&ScenarioFailure> {
        self.failures.first()
    }

    /// Whether the state machine passed through `state`.
    #[must_use]
    pub fn visited(&self, state: ScenarioState) -> bool {
        self.states.contains(&state)
    }

    fn enter(&mut self, state: ScenarioState) {
        debug!(scenario = %self.scenario, state = %state, "state transition");
        self.states.push(state);
        self.final_state = state;
    }

    fn fail(&mut self, failure: ScenarioFailure) {
        warn!(scenario = %self.scenario, code = failure.code(), "{}", failure.summary());
        self.failures.push(failure);
        if self.final_state != ScenarioState::Failed {
            self.enter(ScenarioState::Failed);
        }
    }

    fn store_capture(&mut self, side: Side, capture: BuildCapture) {
        match side {
            Side::Candidate => self.candidate = Some(capture),
            Side::Reference => self.reference = Some(capture),
        }
    }

    fn record_check(&mut self, report: CheckReport, failure: Option<ScenarioFailure>) {
        self.checks.push(report);
        if let Some(failure) = failure {
            warn!(scenario = %self.scenario, code = failure.code(), "{}", failure.summary());
            self.failures.push(failure);
        }
    }
}

/// Stage failure that ends the pipeline.
struct Halt;

const BUILD_STEP: &str = "build";

/// Runs scenarios against one tool configuration.
pub struct ScenarioRunner<R: ProcessRunner> {
    runner: R,
    tools: ToolSet,
    fsdiff: Option<FsDiffAdapter>,
    ignored_keys: IgnoredKeys,
    data_dir: PathBuf,
    staging_root: Option<PathBuf>,
    keep_workdirs: bool,
    tag_prefix: String,
    require_id_in_log: bool,
}

impl<R: ProcessRunner> ScenarioRunner<R> {
    #[must_use]
    pub fn new(runner: R, config: &VerifierConfig) -> Self {
        Self {
            runner,
            tools: ToolSet::from_config(config),
            fsdiff: config
                .fsdiff
                .enabled
                .then(|| FsDiffAdapter::new(&config.fsdiff, config.runner.timeout())),
            ignored_keys: config.ignored_keys.clone(),
            data_dir: config.data_dir.clone(),
            staging_root: config.runner.staging_root.clone(),
            keep_workdirs: config.runner.keep_workdirs,
            tag_prefix: config.runner.tag_prefix.clone(),
            require_id_in_log: config.runner.require_id_in_log,
        }
    }

    /// Run one scenario to completion. Never returns an error: every
    /// failure is recorded in the outcome.
    #[must_use]
    pub fn run(&self, definition: &ScenarioDefinition) -> ComparisonOutcome {
        let start = Instant::now();
        let tags = ScenarioTags::generate(&self.tag_prefix, &definition.id);
        let mut outcome = ComparisonOutcome::new(definition, &tags);
        info!(scenario = %definition.id, mode = definition.mode.as_str(), "scenario started");

        let staging = match StagingArea::create(
            self.staging_root.as_deref(),
            &definition.id,
            self.keep_workdirs,
        ) {
            Ok(area) => area,
            Err(err) => {
                outcome.fail(ScenarioFailure::Staging {
                    reason: err.to_string(),
                });
                return finish(outcome, start);
            }
        };
        outcome.staging_dir = Some(staging.path().to_path_buf());

        let mut images = ImageCleanup {
            runner: self,
            scope: &definition.id,
            tags: &tags,
            built: Vec::new(),
        };
        if self
            .execute(definition, &staging, &tags, &mut outcome, &mut images.built)
            .is_ok()
        {
            self.verify(definition, &tags, &mut outcome);
        }
        drop(images);
        match staging.release() {
            Ok(kept) => outcome.staging_kept = kept.is_some(),
            Err(err) => warn!(scenario = %definition.id, error = %err, "failed to remove staging directory"),
        }

        finish(outcome, start)
    }

    /// Stage and build. `Err` means the pipeline stops here.
    fn execute(
        &self,
        definition: &ScenarioDefinition,
        staging: &StagingArea,
        tags: &ScenarioTags,
        outcome: &mut ComparisonOutcome,
        built: &mut Vec<Side>,
    ) -> Result<(), Halt> {
        let context = match staging.stage(&definition.source, &self.data_dir) {
            Ok(context) => context,
            Err(err) => {
                outcome.fail(ScenarioFailure::Staging {
                    reason: err.to_string(),
                });
                return Err(Halt);
            }
        };
        outcome.resolved_flags = staging.resolve_flags(&definition.extra_flags);
        outcome.enter(ScenarioState::Prepared);

        built.push(Side::Candidate);
        let capture = self.build(Side::Candidate, definition, tags, &context, outcome)?;
        outcome.candidate = Some(capture);
        outcome.enter(ScenarioState::BuiltCandidate);

        self.resolve_candidate_image(definition, tags, &context, outcome)?;

        if definition.uses_reference() {
            built.push(Side::Reference);
            let capture = self.build(Side::Reference, definition, tags, &context, outcome)?;
            outcome.reference = Some(capture);
            outcome.enter(ScenarioState::BuiltReference);
        }
        Ok(())
    }

    fn build(
        &self,
        side: Side,
        definition: &ScenarioDefinition,
        tags: &ScenarioTags,
        context: &Path,
        outcome: &mut ComparisonOutcome,
    ) -> Result<BuildCapture, Halt> {
        let tag = match side {
            Side::Candidate => &tags.candidate,
            Side::Reference => &tags.reference,
        };
        let invocation =
            self.tools
                .build(side, &definition.id, tag, &outcome.resolved_flags, context);
        let result = self.invoke(&invocation, side, BUILD_STEP, outcome)?;
        let capture = BuildCapture {
            command: invocation.command_line(),
            result,
        };
        if !capture.result.success() {
            let failure = ScenarioFailure::BuildCommand {
                side,
                exit_code: capture.result.exit_code,
                stderr: capture.result.stderr.clone(),
            };
            outcome.store_capture(side, capture);
            outcome.fail(failure);
            return Err(Halt);
        }
        Ok(capture)
    }

    /// Run one invocation, turning spawn errors and timeouts into failures.
    fn invoke(
        &self,
        invocation: &Invocation,
        side: Side,
        step: &str,
        outcome: &mut ComparisonOutcome,
    ) -> Result<ExecutionResult, Halt> {
        match self.runner.run(invocation) {
            Ok(result) if result.timed_out => {
                let failure = ScenarioFailure::Timeout {
                    side,
                    step: step.to_string(),
                    timeout_secs: invocation.timeout.as_secs(),
                    stderr: result.stderr.clone(),
                };
                if step == BUILD_STEP {
                    outcome.store_capture(
                        side,
                        BuildCapture {
                            command: invocation.command_line(),
                            result,
                        },
                    );
                }
                outcome.fail(failure);
                Err(Halt)
            }
            Ok(result) => Ok(result),
            Err(err) => {
                outcome.fail(ScenarioFailure::ToolUnavailable {
                    program: invocation.program.clone(),
                    reason: err.to_string(),
                });
                Err(Halt)
            }
        }
    }

    /// The candidate image must be addressable by its tag, and the build
    /// log must name it.
    fn resolve_candidate_image(
        &self,
        definition: &ScenarioDefinition,
        tags: &ScenarioTags,
        context: &Path,
        outcome: &mut ComparisonOutcome,
    ) -> Result<(), Halt> {
        let unresolved = |outcome: &mut ComparisonOutcome, reason: String| {
            outcome.fail(ScenarioFailure::ArtifactResolution {
                tag: tags.candidate.clone(),
                reason,
            });
            Err(Halt)
        };

        if let Some(transfer) = self.tools.transfer(&definition.id, &tags.candidate, context) {
            let result = self.invoke(&transfer, Side::Candidate, "transfer", outcome)?;
            if !result.success() {
                return unresolved(
                    outcome,
                    format!(
                        "transfer exited with code {}: {}",
                        result.exit_code,
                        result.stderr.trim()
                    ),
                );
            }
        }

        let query = self.tools.image_ids(&definition.id, &tags.candidate);
        let result = self.invoke(&query, Side::Candidate, "image query", outcome)?;
        if !result.success() {
            return unresolved(
                outcome,
                format!(
                    "image query exited with code {}: {}",
                    result.exit_code,
                    result.stderr.trim()
                ),
            );
        }
        let ids = tools::parse_image_ids(&result.stdout);
        if ids.is_empty() {
            return unresolved(outcome, "no local image matches the tag".to_string());
        }
        let log = outcome
            .candidate
            .as_ref()
            .map_or("", |capture| capture.result.stdout.as_str());
        if self.require_id_in_log && !tools::log_mentions_id(log, &ids) {
            return unresolved(
                outcome,
                format!("build log does not mention image id {}", ids.join(", ")),
            );
        }
        debug!(scenario = %definition.id, ids = ?ids, "candidate image resolved");
        Ok(())
    }

    /// Run every applicable check; each failing one is recorded.
    fn verify(
        &self,
        definition: &ScenarioDefinition,
        tags: &ScenarioTags,
        outcome: &mut ComparisonOutcome,
    ) {
        let candidate_out = capture_text(outcome.candidate.as_ref(), |r| &r.stdout);
        let candidate_err = capture_text(outcome.candidate.as_ref(), |r| &r.stderr);

        match definition.mode {
            ComparisonMode::PatternOnly => {
                if let Some(rule) = &definition.candidate_output {
                    let check = matcher::evaluate_candidate(rule, &candidate_out);
                    record_pattern(outcome, "output patterns", check);
                }
                if let Some(rule) = &definition.candidate_error {
                    let check = matcher::evaluate_candidate(rule, &candidate_err);
                    record_pattern(outcome, "error patterns", check);
                }
            }
            ComparisonMode::Full => {
                let reference_out = capture_text(outcome.reference.as_ref(), |r| &r.stdout);
                let reference_err = capture_text(outcome.reference.as_ref(), |r| &r.stderr);
                if let (Some(c), Some(r)) = (&definition.candidate_output, &definition.reference_output) {
                    let check = matcher::evaluate_pair(c, &candidate_out, r, &reference_out);
                    record_pattern(outcome, "output patterns", check);
                }
                if let (Some(c), Some(r)) = (&definition.candidate_error, &definition.reference_error) {
                    let check = matcher::evaluate_pair(c, &candidate_err, r, &reference_err);
                    record_pattern(outcome, "error patterns", check);
                }
                self.verify_metadata(&definition.id, tags, outcome);
                self.verify_filesystem(tags, outcome);
            }
        }

        if outcome.failures.is_empty() {
            outcome.enter(ScenarioState::Verified);
        } else {
            outcome.enter(ScenarioState::Failed);
        }
    }

    fn verify_metadata(&self, scope: &str, tags: &ScenarioTags, outcome: &mut ComparisonOutcome) {
        let candidate = self.inspect(scope, Side::Candidate, &tags.candidate);
        let reference = self.inspect(scope, Side::Reference, &tags.reference);
        match (candidate, reference) {
            (Ok(candidate), Ok(reference)) => {
                let verdict = diff::diff(&reference, &candidate, &self.ignored_keys);
                let passed = verdict.all_match();
                let failure = (!passed).then(|| ScenarioFailure::StructuralMismatch {
                    differences: verdict.difference_count(),
                });
                outcome.record_check(
                    CheckReport {
                        name: "image metadata".to_string(),
                        passed,
                        detail: verdict.render(),
                        pattern: None,
                    },
                    failure,
                );
                outcome.diff = Some(verdict);
            }
            (candidate, reference) => {
                for (side, result) in [(Side::Candidate, candidate), (Side::Reference, reference)] {
                    if let Err(reason) = result {
                        outcome.record_check(
                            CheckReport {
                                name: format!("{side} inspection"),
                                passed: false,
                                detail: reason.clone(),
                                pattern: None,
                            },
                            Some(ScenarioFailure::Inspection { side, reason }),
                        );
                    }
                }
            }
        }
    }

    fn inspect(&self, scope: &str, side: Side, tag: &str) -> Result<Value, String> {
        let invocation = self.tools.inspect(scope, side, tag);
        let result = self.runner.run(&invocation).map_err(|err| err.to_string())?;
        if result.timed_out {
            return Err(format!("inspect timed out after {}s", invocation.timeout.as_secs()));
        }
        if !result.success() {
            return Err(format!(
                "inspect exited with code {}: {}",
                result.exit_code,
                result.stderr.trim()
            ));
        }
        tools::parse_inspect(&result.stdout).map_err(|err| err.to_string())
    }

    fn verify_filesystem(&self, tags: &ScenarioTags, outcome: &mut ComparisonOutcome) {
        let Some(adapter) = &self.fsdiff else {
            return;
        };
        match adapter.compare(&self.runner, &tags.candidate, &tags.reference) {
            Ok(signal) => {
                let failure = (!signal.clean).then(|| ScenarioFailure::FilesystemDiff {
                    empty_sections: signal.empty_sections,
                    expected: signal.expected,
                });
                outcome.record_check(
                    CheckReport {
                        name: "filesystem".to_string(),
                        passed: signal.clean,
                        detail: signal.describe(),
                        pattern: None,
                    },
                    failure,
                );
                outcome.fs_diff = Some(signal);
            }
            Err(err) => {
                let invocation = adapter.invocation(&tags.candidate, &tags.reference);
                outcome.record_check(
                    CheckReport {
                        name: "filesystem".to_string(),
                        passed: false,
                        detail: err.to_string(),
                        pattern: None,
                    },
                    Some(ScenarioFailure::ToolUnavailable {
                        program: invocation.program,
                        reason: err.to_string(),
                    }),
                );
            }
        }
    }

    /// Remove every image a build was attempted for. Failures only warn.
    fn cleanup(&self, scope: &str, tags: &ScenarioTags, built: &[Side]) {
        let mut removals = Vec::new();
        for side in built {
            let tag = match side {
                Side::Candidate => &tags.candidate,
                Side::Reference => &tags.reference,
            };
            removals.push(self.tools.remove_image(scope, *side, tag));
            if *side == Side::Candidate {
                removals.extend(self.tools.remove_candidate_copy(scope, tag));
            }
        }
        for invocation in removals {
            match self.runner.run(&invocation) {
                Ok(result) if result.success() => {
                    debug!(cmd = %invocation.command_line(), "image removed");
                }
                Ok(result) => warn!(
                    cmd = %invocation.command_line(),
                    exit_code = result.exit_code,
                    "image cleanup failed"
                ),
                Err(err) => warn!(cmd = %invocation.command_line(), error = %err, "image cleanup failed"),
            }
        }
    }
}

/// Removes attempted images when dropped, so a panicking scenario still
/// releases them.
struct ImageCleanup<'a, R: ProcessRunner> {
    runner: &'a ScenarioRunner<R>,
    scope: &'a str,
    tags: &'a ScenarioTags,
    built: Vec<Side>,
}

impl<R: ProcessRunner> Drop for ImageCleanup<'_, R> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!(scenario = %self.scope, "removing images after panic");
        }
        self.runner.cleanup(self.scope, self.tags, &self.built);
    }
}

fn finish(mut outcome: ComparisonOutcome, start: Instant) -> ComparisonOutcome {
    outcome.success = outcome.failures.is_empty();
    if outcome.success {
        outcome.enter(ScenarioState::Reported);
    } else if outcome.final_state != ScenarioState::Failed {
        outcome.enter(ScenarioState::Failed);
    }
    outcome.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        scenario = %outcome.scenario,
        success = outcome.success,
        duration_ms = outcome.duration_ms,
        failures = outcome.failures.len(),
        "scenario finished"
    );
    outcome
}


fn capture_text(capture: Option<&BuildCapture>, pick: impl Fn(&ExecutionResult) -> &String) -> String {
    capture.map(|c| pick(&c.result).clone()).unwrap_or_default()
}

fn record_pattern(outcome: &mut ComparisonOutcome, name: &str, check: PatternCheck) {
    let failure = match &check {
        PatternCheck::Matched { .. } => None,
        PatternCheck::NoMatch { .. } => Some(ScenarioFailure::PatternNoMatch {
            check: name.to_string(),
            detail: check.describe(),
        }),
        PatternCheck::LengthMismatch { .. } | PatternCheck::ValueMismatch { .. } => {
            Some(ScenarioFailure::ValueMismatch {
                check: name.to_string(),
                detail: check.describe(),
            })
        }
    };
    outcome.record_check(
        CheckReport {
            name: name.to_string(),
            passed: check.passed(),
            detail: check.describe(),
            pattern: Some(check),
        },
        failure,
    );
}

/// Rule kinds present in a definition, for listings.
#[must_use]
pub fn rule_summary(definition: &ScenarioDefinition) -> String {
    let kinds: Vec<String> = definition
        .rules()
        .into_iter()
        .filter(|(label, _)| label.starts_with("candidate"))
        .map(|(label, rule): (&str, &MatchRule)| {
            format!("{}:{}", label.trim_start_matches("candidate_"), rule.kind())
        })
        .collect();
    if kinds.is_empty() {
        "-".to_string()
    } else {
        kinds.join(",")
    }
}

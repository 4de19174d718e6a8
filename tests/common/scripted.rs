//! A `ProcessRunner` that answers from a script instead of spawning.

use buildcheck::BuildcheckError;
use buildcheck::process::{ExecutionResult, Invocation, ProcessRunner};
use std::sync::Mutex;
use std::time::Duration;

/// What the scripted runner does for a matching invocation.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(ExecutionResult),
    NotFound,
    /// Killed at the deadline after writing this to stderr.
    TimedOut(String),
    Panic(String),
    /// Sleep, then succeed with this stdout.
    Slow(Duration, String),
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::Result(ExecutionResult::ok(stdout))
    }

    pub fn fail(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::Result(ExecutionResult::failed(exit_code, stderr))
    }
}

/// Replies are matched on the invocation label: an exact match, or a
/// label ending in `-<key>`. The first matching rule wins; unmatched
/// invocations succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, key: &str, reply: Reply) -> Self {
        self.rules.push((key.to_string(), reply));
        self
    }

    /// Both builds succeed, metadata is identical apart from ignored keys,
    /// and the filesystem report is clean.
    pub fn conforming() -> Self {
        Self::new()
            .on("candidate-build", Reply::ok("STEP 1/2: FROM alpine\nCOMMIT\n--> 0123456789ab\n"))
            .on("reference-build", Reply::ok("Step 1/2 : FROM alpine\nSuccessfully built 89abcdef0123\n"))
            .on("images", Reply::ok("0123456789ab\n"))
            .on("candidate-inspect", Reply::ok(super::candidate_inspect_json("0123456789ab", &["PATH=/bin"])))
            .on("reference-inspect", Reply::ok(super::inspect_json("89abcdef0123", &["PATH=/bin"])))
            .on("fsdiff", Reply::ok(super::fsdiff_report(3)))
    }

    /// Replace the reply for `key`, keeping the other rules.
    pub fn replace(mut self, key: &str, reply: Reply) -> Self {
        self.rules.retain(|(k, _)| k != key);
        self.rules.insert(0, (key.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }

    pub fn called(&self, key: &str) -> bool {
        self.calls().iter().any(|c| label_matches(&c.label, key))
    }

    pub fn call(&self, key: &str) -> Option<Invocation> {
        self.calls().into_iter().find(|c| label_matches(&c.label, key))
    }

    fn reply_for(&self, label: &str) -> Option<&Reply> {
        self.rules
            .iter()
            .find(|(key, _)| label_matches(label, key))
            .map(|(_, reply)| reply)
    }
}

fn label_matches(label: &str, key: &str) -> bool {
    label == key || label.ends_with(&format!("-{key}"))
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> buildcheck::Result<ExecutionResult> {
        self.calls.lock().unwrap().push(invocation.clone());
        match self.reply_for(&invocation.label) {
            None => Ok(ExecutionResult::ok("")),
            Some(Reply::Result(result)) => Ok(result.clone()),
            Some(Reply::NotFound) => Err(BuildcheckError::ToolNotFound {
                program: invocation.program.clone(),
            }),
            Some(Reply::TimedOut(stderr)) => Ok(ExecutionResult {
                exit_code: -1,
                stderr: stderr.clone(),
                timed_out: true,
                ..ExecutionResult::default()
            }),
            Some(Reply::Panic(message)) => panic!("{message}"),
            Some(Reply::Slow(delay, stdout)) => {
                std::thread::sleep(*delay);
                Ok(ExecutionResult::ok(stdout.clone()))
            }
        }
    }
}

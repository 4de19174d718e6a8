//! External process execution with a hard deadline.
//!
//! `ProcessRunner` is the seam between the comparison engine and the
//! outside world: the scenario runner only ever talks to build tools
//! through it, which lets tests substitute a scripted runner.

use crate::error::{BuildcheckError, Result};
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Default upper bound for a single tool invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// How long to wait for output readers after the child is gone. A killed
/// child can leave grandchildren holding the pipes open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A fully assembled command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
    #[serde(serialize_with = "serialize_secs")]
    pub timeout: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

impl Invocation {
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        Self {
            label: program.clone(),
            program,
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-like rendering for logs and diagnostics.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("{part:?}")
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ExecutionResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Successful result with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Failed result with the given exit code and stderr.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// Executes commands on behalf of the scenario runner.
pub trait ProcessRunner: Send + Sync {
    /// Run to completion or until the invocation's timeout.
    ///
    /// A non-zero exit or a timeout is a normal `Ok` result; `Err` means
    /// the process could not be started at all.
    ///
    /// # Errors
    ///
    /// Returns `ToolNotFound` or `Spawn` when the program can not be run.
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for &T {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        (**self).run(invocation)
    }
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        (**self).run(invocation)
    }
}

/// Runs real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    log_dir: Option<PathBuf>,
}

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one log file per invocation into `dir`.
    #[must_use]
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        debug!(label = %invocation.label, cmd = %invocation.command_line(), "spawning");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                BuildcheckError::ToolNotFound {
                    program: invocation.program.clone(),
                }
            } else {
                BuildcheckError::Spawn {
                    program: invocation.program.clone(),
                    source,
                }
            }
        })?;

        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let spawn_err = |source| BuildcheckError::Spawn {
            program: invocation.program.clone(),
            source,
        };
        let (status, timed_out) = match child.wait_timeout(invocation.timeout).map_err(spawn_err)? {
            Some(status) => (status, false),
            None => {
                warn!(
                    label = %invocation.label,
                    timeout_secs = invocation.timeout.as_secs(),
                    "process timed out, killing"
                );
                let _ = child.kill();
                (child.wait().map_err(spawn_err)?, true)
            }
        };

        let result = ExecutionResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: collect(&stdout_rx),
            stderr: collect(&stderr_rx),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            timed_out,
        };

        debug!(
            label = %invocation.label,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "process finished"
        );

        if let Some(dir) = &self.log_dir {
            if let Err(err) = write_log(dir, invocation, &result) {
                warn!(label = %invocation.label, error = %err, "failed to write command log");
            }
        }

        Ok(result)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
    } else {
        let _ = tx.send(String::new());
    }
    rx
}

fn collect(rx: &mpsc::Receiver<String>) -> String {
    rx.recv_timeout(DRAIN_GRACE).unwrap_or_default()
}

fn log_file_name(label: &str) -> String {
    let safe: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{safe}.log")
}

fn write_log(dir: &Path, invocation: &Invocation, result: &ExecutionResult) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let body = format!(
        "label: {}\nstarted: {:?}\nduration_ms: {}\nexit_code: {}\ntimed_out: {}\ncmd: {}\ncwd: {}\n\nstdout:\n{}\n\nstderr:\n{}\n",
        invocation.label,
        SystemTime::now(),
        result.duration_ms,
        result.exit_code,
        result.timed_out,
        invocation.command_line(),
        invocation
            .cwd
            .as_ref()
            .map_or_else(|| ".".to_string(), |p| p.display().to_string()),
        result.stdout,
        result.stderr
    );
    fs::write(dir.join(log_file_name(&invocation.label)), body)
}

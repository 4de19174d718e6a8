#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Once;
use std::time::Instant;
use tracing::info;

pub mod cli;
pub mod scripted;

pub use scripted::{Reply, ScriptedRunner};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        buildcheck::logging::init_test_logging();
    });
}

pub struct TestLogGuard {
    name: String,
    start: Instant,
}

impl TestLogGuard {
    fn new(name: &str) -> Self {
        init_test_logging();
        info!("{name}: starting");
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for TestLogGuard {
    fn drop(&mut self) {
        info!(
            "{}: assertions passed (elapsed {:?})",
            self.name,
            self.start.elapsed()
        );
    }
}

pub fn test_log(name: &str) -> TestLogGuard {
    TestLogGuard::new(name)
}

/// Write a file under `root`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, contents).expect("write fixture file");
}

/// Minimal inspect output for one image, without labels.
pub fn inspect_json(id: &str, env: &[&str]) -> String {
    inspect_json_with_labels(id, env, &serde_json::Value::Null)
}

/// Inspect output the way the candidate builder writes it: it stamps its
/// own version label.
pub fn candidate_inspect_json(id: &str, env: &[&str]) -> String {
    inspect_json_with_labels(id, env, &serde_json::json!({"io.buildah.version": "1.40.1"}))
}

pub fn inspect_json_with_labels(id: &str, env: &[&str], labels: &serde_json::Value) -> String {
    serde_json::json!([{
        "Id": format!("sha256:{id}"),
        "Created": "2024-01-01T00:00:00Z",
        "Architecture": "amd64",
        "Os": "linux",
        "Size": 1024,
        "RootFS": {"Type": "layers", "Layers": [format!("sha256:{id}-layer")]},
        "Config": {
            "Hostname": id,
            "Env": env,
            "Cmd": ["/bin/sh"],
            "WorkingDir": "",
            "Labels": labels,
        },
    }])
    .to_string()
}

/// A filesystem diff report with `empty` of the three sections clean.
pub fn fsdiff_report(empty: usize) -> String {
    let mut report = String::new();
    for (index, heading) in ["only in the first image", "only in the second image", "that differ"]
        .iter()
        .enumerate()
    {
        report.push_str(&format!("\nThese entries have been {heading}:\n"));
        if index < empty {
            report.push_str("None\n");
        } else {
            report.push_str("FILE        SIZE\n/etc/changed    12B\n");
        }
    }
    report
}

//! Structural diff of image metadata documents.
//!
//! Walks two JSON documents side by side and files every path into one of
//! four buckets. The first argument is the authoritative side: a key it has
//! and the candidate lacks is *missing*; a key only the candidate has is
//! *extra*.
//!
//! Paths look like `Config.Env[2]`. Keys that contain `.` or `[` are quoted
//! as `Labels["io.buildah.version"]`. The root path is the empty string.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Metadata fields that differ between two independent builds of the same
/// Dockerfile: timestamps, content-addressed ids, parent/layer references,
/// sizes, tool versions and the throwaway container config.
pub const DEFAULT_IGNORED_KEYS: &[&str] = &[
    "Created",
    "Id",
    "RepoTags",
    "RepoDigests",
    "Parent",
    "Data",
    "Layers",
    "History",
    "Container",
    "ContainerConfig",
    "DockerVersion",
    "VirtualSize",
    "Size",
    "Metadata",
    "Config.Hostname",
    "Config.Image",
    "Config.Labels[\"io.buildah.version\"]",
];

/// Keys excluded from comparison.
///
/// A bare name (`Created`) is skipped at every map level. An entry with a
/// dot (`Config.Hostname`) is skipped only at that path; array indices are
/// ignored when matching, so `History.created` covers `History[3].created`.
///
/// An object whose every key is ignored counts as absent, so a candidate
/// `Labels: {"io.buildah.version": ".."}` equals a reference `Labels: null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IgnoredKeys {
    names: BTreeSet<String>,
    paths: BTreeSet<String>,
}

impl IgnoredKeys {
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ignored = Self::default();
        ignored.extend(keys);
        ignored
    }

    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn image_defaults() -> Self {
        Self::new(DEFAULT_IGNORED_KEYS)
    }

    pub fn extend<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            if key.contains('.') {
                self.paths.insert(key.to_string());
            } else {
                self.names.insert(key.to_string());
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }

    /// All entries, names first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.names.iter().chain(self.paths.iter()).cloned().collect()
    }

    fn is_ignored(&self, key: &str, path: &str) -> bool {
        if self.names.contains(key) {
            return true;
        }
        !self.paths.is_empty() && self.paths.contains(&strip_indices(path))
    }
}

/// A field present in only one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEntry {
    pub path: String,
    pub value: Value,
}

/// A field whose values differ. `None` marks a side with no element at a
/// trailing array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub path: String,
    pub reference: Option<Value>,
    pub candidate: Option<Value>,
}

/// Outcome of one structural comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffVerdict {
    missing: Vec<FieldEntry>,
    extra: Vec<FieldEntry>,
    mismatched: Vec<Mismatch>,
    identical: Vec<String>,
    notes: Vec<String>,
    all_match: bool,
}

impl DiffVerdict {
    /// Paths the reference has and the candidate lacks.
    #[must_use]
    pub fn missing(&self) -> &[FieldEntry] {
        &self.missing
    }

    /// Paths only the candidate has.
    #[must_use]
    pub fn extra(&self) -> &[FieldEntry] {
        &self.extra
    }

    #[must_use]
    pub fn mismatched(&self) -> &[Mismatch] {
        &self.mismatched
    }

    /// Equal leaf paths (scalars and empty containers).
    #[must_use]
    pub fn identical(&self) -> &[String] {
        &self.identical
    }

    /// Free-form remarks such as array length differences.
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    #[must_use]
    pub const fn all_match(&self) -> bool {
        self.all_match
    }

    /// Number of differing paths.
    #[must_use]
    pub fn difference_count(&self) -> usize {
        self.missing.len() + self.extra.len() + self.mismatched.len()
    }

    /// Human report listing every difference.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.all_match {
            let _ = write!(
                out,
                "documents match ({} identical fields)",
                self.identical.len()
            );
            return out;
        }

        let _ = write!(
            out,
            "documents differ: {} missing, {} extra, {} mismatched",
            self.missing.len(),
            self.extra.len(),
            self.mismatched.len()
        );
        if !self.missing.is_empty() {
            out.push_str("\nmissing from candidate:");
            for entry in &self.missing {
                let _ = write!(out, "\n  {} = {}", display_path(&entry.path), entry.value);
            }
        }
        if !self.extra.is_empty() {
            out.push_str("\nonly in candidate:");
            for entry in &self.extra {
                let _ = write!(out, "\n  {} = {}", display_path(&entry.path), entry.value);
            }
        }
        if !self.mismatched.is_empty() {
            out.push_str("\nmismatched:");
            for m in &self.mismatched {
                let _ = write!(
                    out,
                    "\n  {}: reference={} candidate={}",
                    display_path(&m.path),
                    render_side(m.reference.as_ref()),
                    render_side(m.candidate.as_ref())
                );
            }
        }
        for note in &self.notes {
            let _ = write!(out, "\nnote: {note}");
        }
        out
    }
}

fn render_side(value: Option<&Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), ToString::to_string)
}

/// Render a path for people; the root becomes `<root>`.
#[must_use]
pub fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

/// Compare `candidate` against the authoritative `reference`.
#[must_use]
pub fn diff(reference: &Value, candidate: &Value, ignored: &IgnoredKeys) -> DiffVerdict {
    let mut verdict = DiffVerdict::default();
    walk("", reference, candidate, ignored, &mut verdict);
    verdict.all_match =
        verdict.missing.is_empty() && verdict.extra.is_empty() && verdict.mismatched.is_empty();
    verdict
}

/// `inspect` prints a JSON array with one object per image; reduce it to
/// that object. Anything else is returned unchanged.
#[must_use]
pub fn unwrap_inspect(value: Value) -> Value {
    match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    }
}

fn walk(path: &str, reference: &Value, candidate: &Value, ignored: &IgnoredKeys, out: &mut DiffVerdict) {
    match (reference, candidate) {
        (Value::Object(r), Value::Object(c)) => {
            if r.is_empty() && c.is_empty() {
                out.identical.push(path.to_string());
                return;
            }
            for (key, r_val) in r {
                let child = child_key_path(path, key);
                if ignored.is_ignored(key, &child) {
                    continue;
                }
                match c.get(key) {
                    Some(c_val) => walk(&child, r_val, c_val, ignored, out),
                    None if vanishes(&child, r_val, ignored) => {}
                    None => out.missing.push(FieldEntry {
                        path: child,
                        value: r_val.clone(),
                    }),
                }
            }
            for (key, c_val) in c {
                if r.contains_key(key) {
                    continue;
                }
                let child = child_key_path(path, key);
                if ignored.is_ignored(key, &child) || vanishes(&child, c_val, ignored) {
                    continue;
                }
                out.extra.push(FieldEntry {
                    path: child,
                    value: c_val.clone(),
                });
            }
        }
        (Value::Array(r), Value::Array(c)) => {
            if r.is_empty() && c.is_empty() {
                out.identical.push(path.to_string());
                return;
            }
            let shared = r.len().min(c.len());
            for i in 0..shared {
                walk(&child_index_path(path, i), &r[i], &c[i], ignored, out);
            }
            if r.len() != c.len() {
                for i in shared..r.len().max(c.len()) {
                    out.mismatched.push(Mismatch {
                        path: child_index_path(path, i),
                        reference: r.get(i).cloned(),
                        candidate: c.get(i).cloned(),
                    });
                }
                out.notes.push(format!(
                    "{}: length differs (reference {}, candidate {})",
                    display_path(path),
                    r.len(),
                    c.len()
                ));
            }
        }
        (Value::Null, other) | (other, Value::Null) if vanishes(path, other, ignored) => {}
        (r, c) if r == c => out.identical.push(path.to_string()),
        (r, c) => out.mismatched.push(Mismatch {
            path: path.to_string(),
            reference: Some(r.clone()),
            candidate: Some(c.clone()),
        }),
    }
}

/// A non-empty object made only of ignored keys.
fn vanishes(path: &str, value: &Value, ignored: &IgnoredKeys) -> bool {
    match value {
        Value::Object(map) => {
            !map.is_empty()
                && map
                    .keys()
                    .all(|key| ignored.is_ignored(key, &child_key_path(path, key)))
        }
        _ => false,
    }
}

fn child_key_path(parent: &str, key: &str) -> String {
    if key.contains('.') || key.contains('[') {
        format!("{parent}[{key:?}]")
    } else if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn child_index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// `History[3].created` -> `History.created`.
fn strip_indices(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek().is_some_and(char::is_ascii_digit) {
            for next in chars.by_ref() {
                if next == ']' {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

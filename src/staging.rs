//! Scenario-scoped working directories and image tags.
//!
//! Every scenario gets its own staging directory and its own pair of image
//! tags, so scenarios can run side by side without touching each other's
//! build context or images.

use crate::error::{BuildcheckError, Result, ResultExt};
use crate::model::{BuildSource, STAGED_DOCKERFILE};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Token in extra flags that is replaced by the staging directory path.
pub const STAGING_PLACEHOLDER: &str = "TEMPDIR";

/// Length cap for generated image names. They are used as the repository
/// part of an image reference, with an implicit `latest` tag.
const MAX_TAG_LEN: usize = 128;

static TAG_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh directory that holds one scenario's build context.
///
/// The directory is removed when the area is released or dropped, unless
/// it was created with `keep` set.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    path: PathBuf,
    keep: bool,
}

impl StagingArea {
    /// Create a new staging directory under `root` (or the system temp dir).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory can not be created.
    pub fn create(root: Option<&Path>, scenario_id: &str, keep: bool) -> Result<Self> {
        let prefix = format!("buildcheck-{}-", sanitize(scenario_id));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("creating staging directory")?;
        let path = std::path::absolute(dir.path())?;
        debug!(scenario = scenario_id, path = %path.display(), "staging area created");
        Ok(Self { dir, path, keep })
    }

    /// Absolute path of the staging directory; also the build context.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy a build source into the staging directory.
    ///
    /// A file lands at `Dockerfile`; a directory's contents are copied
    /// verbatim. Returns the build context path.
    ///
    /// # Errors
    ///
    /// Returns `Staging` if the source is missing, of the wrong kind, or
    /// can not be copied.
    pub fn stage(&self, source: &BuildSource, data_dir: &Path) -> Result<PathBuf> {
        let from = source.resolve(data_dir);
        match source {
            BuildSource::File(_) => {
                if !from.is_file() {
                    return Err(BuildcheckError::staging(&from, "not a file"));
                }
                fs::copy(&from, self.path.join(STAGED_DOCKERFILE))
                    .map_err(|err| BuildcheckError::staging(&from, err.to_string()))?;
            }
            BuildSource::Directory(_) => {
                if !from.is_dir() {
                    return Err(BuildcheckError::staging(&from, "not a directory"));
                }
                copy_tree(&from, &self.path)
                    .map_err(|err| BuildcheckError::staging(&from, err.to_string()))?;
            }
        }
        info!(source = %from.display(), context = %self.path.display(), "staged build source");
        Ok(self.path.clone())
    }

    /// Rewrite `TEMPDIR` in every flag to this area's path.
    #[must_use]
    pub fn resolve_flags(&self, flags: &[String]) -> Vec<String> {
        resolve_placeholders(flags, &self.path)
    }

    /// Release the directory. Returns the path if it was kept.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    pub fn release(self) -> Result<Option<PathBuf>> {
        if self.keep {
            #[allow(deprecated)]
            let kept = self.dir.into_path();
            info!(path = %kept.display(), "keeping staging directory");
            return Ok(Some(kept));
        }
        self.dir.close().context("removing staging directory")?;
        Ok(None)
    }
}

/// Replace every occurrence of the placeholder with `dir`.
#[must_use]
pub fn resolve_placeholders(flags: &[String], dir: &Path) -> Vec<String> {
    let replacement = dir.display().to_string();
    flags
        .iter()
        .map(|flag| flag.replace(STAGING_PLACEHOLDER, &replacement))
        .collect()
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

/// Image tags owned by one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioTags {
    pub candidate: String,
    pub reference: String,
}

impl ScenarioTags {
    /// Unique tags: `<prefix>-<id>-<nonce>-c` and `...-r`.
    #[must_use]
    pub fn generate(prefix: &str, scenario_id: &str) -> Self {
        let base = format!("{}-{}-{}", sanitize(prefix), sanitize(scenario_id), nonce(scenario_id));
        let base = truncate_tag(&base, MAX_TAG_LEN - 2);
        Self {
            candidate: format!("{base}-c"),
            reference: format!("{base}-r"),
        }
    }
}

fn nonce(scenario_id: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let mut hasher = Sha256::new();
    hasher.update(scenario_id.as_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(TAG_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// Lowercase and map anything outside `[a-z0-9._-]` to `-`.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        "scenario".to_string()
    } else {
        trimmed.to_string()
    }
}

fn truncate_tag(tag: &str, max: usize) -> String {
    if tag.len() <= max {
        return tag.to_string();
    }
    // The nonce sits at the end; keep it and cut the middle.
    let tail = &tag[tag.len() - 9..];
    format!("{}{}", &tag[..max - tail.len()], tail)
}

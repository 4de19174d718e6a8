//! Configuration management for `buildcheck`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`BUILDCHECK_*`)
//! 3. Project config (`--config <path>` or `./buildcheck.yaml`)
//! 4. User config (`~/.config/buildcheck/config.yaml`)
//! 5. Defaults
//!
//! Every source is flattened into dotted keys (`runner.timeout-secs`)
//! before merging, then resolved once into a typed `VerifierConfig`.

use crate::diff::{DEFAULT_IGNORED_KEYS, IgnoredKeys};
use crate::error::{BuildcheckError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "buildcheck.yaml";

const ENV_PREFIX: &str = "BUILDCHECK_";

const DEFAULT_CANDIDATE_PROGRAM: &str = "buildah";
const DEFAULT_CANDIDATE_BUILD_ARGS: &str = "bud";
const DEFAULT_REFERENCE_PROGRAM: &str = "docker";
const DEFAULT_REFERENCE_BUILD_ARGS: &str = "build";
const DEFAULT_INSPECTOR: &str = "docker";
/// Copies the candidate image from containers-storage into the daemon the
/// inspector talks to.
const DEFAULT_TRANSFER_COMMAND: &str = "buildah push {tag} docker-daemon:{tag}:latest";
const DEFAULT_FSDIFF_COMMAND: &str =
    "container-diff diff daemon://{candidate} daemon://{reference} --type=file";
const DEFAULT_FSDIFF_SECTIONS: usize = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 600;
const DEFAULT_TAG_PREFIX: &str = "buildcheck";
const DEFAULT_DATA_DIR: &str = "testdata";

/// One configuration source, flattened to normalized dotted keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: BTreeMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents).map_err(|err| BuildcheckError::ConfigParse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML.
    pub fn from_yaml_str(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut flat = BTreeMap::new();
        flatten_yaml(&value, "", &mut flat);
        let mut layer = Self::default();
        for (key, value) in flat {
            layer.insert(&key, value);
        }
        Ok(layer)
    }

    /// Build a layer from `BUILDCHECK_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Same as `from_env` over an explicit variable list.
    #[must_use]
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                for variant in env_key_variants(stripped) {
                    layer.insert(&variant, value.clone());
                }
            }
        }
        layer
    }
}

/// CLI overrides for config loading.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub registry: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub fail_fast: Option<bool>,
    pub keep_workdirs: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        if let Some(path) = &self.data_dir {
            layer.insert("data-dir", path.to_string_lossy());
        }
        if let Some(path) = &self.registry {
            layer.insert("registry", path.to_string_lossy());
        }
        if let Some(jobs) = self.jobs {
            layer.insert("runner.jobs", jobs.to_string());
        }
        if let Some(fail_fast) = self.fail_fast {
            layer.insert("runner.fail-fast", fail_fast.to_string());
        }
        if let Some(keep) = self.keep_workdirs {
            layer.insert("runner.keep-workdirs", keep.to_string());
        }
        if let Some(secs) = self.timeout_secs {
            layer.insert("runner.timeout-secs", secs.to_string());
        }
        layer
    }
}

/// How to invoke a build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolConfig {
    pub program: String,
    /// Arguments placed before `-t <tag>`, e.g. `["bud"]`.
    pub build_args: Vec<String>,
}

/// Filesystem diff adapter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsDiffConfig {
    pub enabled: bool,
    /// Program followed by arguments; `{candidate}` and `{reference}` are
    /// replaced with image tags.
    pub command: Vec<String>,
    pub expected_empty_sections: usize,
}

/// Scenario runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunnerSettings {
    pub timeout_secs: u64,
    pub tag_prefix: String,
    pub require_id_in_log: bool,
    pub keep_workdirs: bool,
    pub staging_root: Option<PathBuf>,
    pub jobs: usize,
    pub fail_fast: bool,
}

impl RunnerSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifierConfig {
    pub candidate: ToolConfig,
    pub reference: ToolConfig,
    /// Tool used for `inspect`, `images` and `rmi`.
    pub inspector: String,
    /// Optional command moving the candidate image into the inspector's
    /// store; `{tag}` and `{context}` are substituted.
    pub transfer: Option<Vec<String>>,
    pub fsdiff: FsDiffConfig,
    pub runner: RunnerSettings,
    pub data_dir: PathBuf,
    pub registry: Option<PathBuf>,
    pub ignored_keys: IgnoredKeys,
    pub command_log_dir: Option<PathBuf>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::from_layer(&ConfigLayer::default()).expect("built-in defaults resolve")
    }
}

impl VerifierConfig {
    /// Resolve a merged layer into typed settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` when a value does not parse.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let candidate = ToolConfig {
            program: string_or(layer, "candidate.program", DEFAULT_CANDIDATE_PROGRAM),
            build_args: list_or(layer, "candidate.build-args", DEFAULT_CANDIDATE_BUILD_ARGS),
        };
        let reference = ToolConfig {
            program: string_or(layer, "reference.program", DEFAULT_REFERENCE_PROGRAM),
            build_args: list_or(layer, "reference.build-args", DEFAULT_REFERENCE_BUILD_ARGS),
        };

        // An empty command turns the step off.
        let transfer = Some(split_command(
            layer.get("transfer.command").unwrap_or(DEFAULT_TRANSFER_COMMAND),
        ))
        .filter(|parts| !parts.is_empty());

        let fsdiff_command = split_command(
            layer.get("fsdiff.command").unwrap_or(DEFAULT_FSDIFF_COMMAND),
        );
        if fsdiff_command.is_empty() {
            return Err(BuildcheckError::Config(
                "fsdiff.command must name a program".to_string(),
            ));
        }
        let fsdiff = FsDiffConfig {
            enabled: parse_bool_key(layer, "fsdiff.enabled")?.unwrap_or(true),
            command: fsdiff_command,
            expected_empty_sections: parse_key(layer, "fsdiff.expected-empty-sections")?
                .unwrap_or(DEFAULT_FSDIFF_SECTIONS),
        };

        let jobs: usize = parse_key(layer, "runner.jobs")?.unwrap_or(1);
        let runner = RunnerSettings {
            timeout_secs: parse_key(layer, "runner.timeout-secs")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
            tag_prefix: string_or(layer, "runner.tag-prefix", DEFAULT_TAG_PREFIX),
            require_id_in_log: parse_bool_key(layer, "runner.require-id-in-log")?.unwrap_or(true),
            keep_workdirs: parse_bool_key(layer, "runner.keep-workdirs")?.unwrap_or(false),
            staging_root: path_key(layer, "runner.staging-root"),
            jobs: jobs.max(1),
            fail_fast: parse_bool_key(layer, "runner.fail-fast")?.unwrap_or(false),
        };
        if runner.timeout_secs == 0 {
            return Err(BuildcheckError::Config(
                "runner.timeout-secs must be greater than zero".to_string(),
            ));
        }

        let mut ignored_keys = layer.get("diff.ignored-keys").map_or_else(
            IgnoredKeys::image_defaults,
            |raw| IgnoredKeys::new(split_list(raw)),
        );
        if let Some(extra) = layer.get("diff.extra-ignored-keys") {
            ignored_keys.extend(split_list(extra));
        }

        Ok(Self {
            candidate,
            reference,
            inspector: string_or(layer, "inspector.program", DEFAULT_INSPECTOR),
            transfer,
            fsdiff,
            runner,
            data_dir: path_key(layer, "data-dir").unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            registry: path_key(layer, "registry"),
            ignored_keys,
            command_log_dir: path_key(layer, "logging.command-log-dir"),
        })
    }
}

/// Load the user config layer (`~/.config/buildcheck/config.yaml`).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    user_config_path().map_or_else(|| Ok(ConfigLayer::default()), |path| ConfigLayer::from_yaml(&path))
}

/// `~/.config/buildcheck/config.yaml`, when `HOME` is set.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    let home = env::var_os("HOME")?;
    Some(
        Path::new(&home)
            .join(".config")
            .join("buildcheck")
            .join("config.yaml"),
    )
}

/// Load the project config layer.
///
/// An explicit path must exist; the implicit `./buildcheck.yaml` may not.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, or a file exists but
/// cannot be read or parsed.
pub fn load_project_config(explicit: Option<&Path>) -> Result<ConfigLayer> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(BuildcheckError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            ConfigLayer::from_yaml(path)
        }
        None => ConfigLayer::from_yaml(Path::new(PROJECT_CONFIG_FILE)),
    }
}

/// Load configuration with the documented precedence order.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed, or a
/// value is invalid.
pub fn load_config(explicit: Option<&Path>, cli: &CliOverrides) -> Result<VerifierConfig> {
    let merged = ConfigLayer::merge_layers(&[
        load_user_config()?,
        load_project_config(explicit)?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]);
    VerifierConfig::from_layer(&merged)
}

/// Names of the built-in ignored keys, for display.
#[must_use]
pub fn default_ignored_keys() -> &'static [&'static str] {
    DEFAULT_IGNORED_KEYS
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

/// `RUNNER_TIMEOUT_SECS` could mean `runner.timeout-secs` or
/// `runner-timeout-secs`; emit all spellings and let lookups pick.
fn env_key_variants(raw: &str) -> Vec<String> {
    let lower = raw.to_lowercase();
    let mut variants = vec![lower.replace('_', "."), lower.replace('_', "-")];
    if let Some((head, tail)) = lower.split_once('_') {
        variants.push(format!("{head}.{}", tail.replace('_', "-")));
    }
    variants
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_key(layer: &ConfigLayer, key: &str) -> Result<Option<bool>> {
    layer
        .get(key)
        .map(|raw| {
            parse_bool(raw)
                .ok_or_else(|| BuildcheckError::Config(format!("{key}: expected a boolean, got '{raw}'")))
        })
        .transpose()
}

fn parse_key<T: std::str::FromStr>(layer: &ConfigLayer, key: &str) -> Result<Option<T>> {
    layer
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| BuildcheckError::Config(format!("{key}: invalid value '{raw}'")))
        })
        .transpose()
}

fn string_or(layer: &ConfigLayer, key: &str, default: &str) -> String {
    layer
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn list_or(layer: &ConfigLayer, key: &str, default: &str) -> Vec<String> {
    split_list(layer.get(key).unwrap_or(default))
}

fn path_key(layer: &ConfigLayer, key: &str) -> Option<PathBuf> {
    layer
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(ToString::to_string).collect()
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

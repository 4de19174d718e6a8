//! Scenario data model.
//!
//! A scenario is immutable once loaded: the runner only reads it. Match
//! rules carry their comparison discipline in the variant, so a rule that
//! needs a capture group can not be confused with one that only checks for
//! presence.

use crate::error::{BuildcheckError, Result};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name a single-file build source is staged under.
pub const STAGED_DOCKERFILE: &str = "Dockerfile";

/// A compiled regular expression that round-trips through its source text.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the regex does not compile.
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(source).map_err(|err| BuildcheckError::InvalidPattern {
            pattern: source.to_string(),
            source: Box::new(err),
        })?;
        Ok(Self { regex })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Number of explicit capture groups (group 0 excluded).
    #[must_use]
    pub fn capture_groups(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::new(&source).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Pattern {
    fn schema_name() -> String {
        "Pattern".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(generator)
    }
}

/// How a pattern's matches are turned into comparable signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// The text must match at least once; nothing is captured.
    Presence(Pattern),
    /// Exactly one capture per side; group 1 of the first match is compared.
    Single(Pattern),
    /// Group 1 of every match, compared index by index.
    Positional(Pattern),
}

impl MatchRule {
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        match self {
            Self::Presence(p) | Self::Single(p) | Self::Positional(p) => p,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Presence(_) => "presence",
            Self::Single(_) => "single",
            Self::Positional(_) => "positional",
        }
    }

    #[must_use]
    pub const fn requires_capture(&self) -> bool {
        !matches!(self, Self::Presence(_))
    }

    /// Same variant, regardless of pattern.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Convenience constructor for tests and the registry builder.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the regex does not compile.
    pub fn positional(source: &str) -> Result<Self> {
        Pattern::new(source).map(Self::Positional)
    }

    /// # Errors
    ///
    /// Returns `InvalidPattern` if the regex does not compile.
    pub fn single(source: &str) -> Result<Self> {
        Pattern::new(source).map(Self::Single)
    }

    /// # Errors
    ///
    /// Returns `InvalidPattern` if the regex does not compile.
    pub fn presence(source: &str) -> Result<Self> {
        Pattern::new(source).map(Self::Presence)
    }
}

/// Where a scenario's build context comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BuildSource {
    /// A single Dockerfile, staged as `Dockerfile`.
    File(PathBuf),
    /// A directory tree copied verbatim.
    Directory(PathBuf),
}

impl BuildSource {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) => p,
        }
    }

    /// Resolve against the test-data directory. Absolute paths pass through.
    #[must_use]
    pub fn resolve(&self, data_dir: &Path) -> PathBuf {
        let path = self.path();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }
}

impl fmt::Display for BuildSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "file:{}", p.display()),
            Self::Directory(p) => write!(f, "dir:{}", p.display()),
        }
    }
}

/// Whether the reference tool takes part in a scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Build with both tools and compare output, metadata and filesystem.
    #[default]
    Full,
    /// Build with the candidate only and check its output patterns.
    PatternOnly,
}

impl ComparisonMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::PatternOnly => "pattern_only",
        }
    }
}

/// One build case under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: BuildSource,
    /// Rule applied to the candidate's stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_output: Option<MatchRule>,
    /// Rule applied to the reference's stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_output: Option<MatchRule>,
    /// Rule applied to the candidate's stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_error: Option<MatchRule>,
    /// Rule applied to the reference's stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_error: Option<MatchRule>,
    /// Passed verbatim to both tools; `TEMPDIR` is replaced by the staging dir.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_flags: Vec<String>,
    #[serde(default)]
    pub mode: ComparisonMode,
}

impl ScenarioDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, source: BuildSource) -> Self {
        Self {
            id: id.into(),
            description: None,
            source,
            candidate_output: None,
            reference_output: None,
            candidate_error: None,
            reference_error: None,
            extra_flags: Vec::new(),
            mode: ComparisonMode::Full,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_output_rules(mut self, candidate: MatchRule, reference: Option<MatchRule>) -> Self {
        self.candidate_output = Some(candidate);
        self.reference_output = reference;
        self
    }

    #[must_use]
    pub fn with_error_rules(mut self, candidate: MatchRule, reference: Option<MatchRule>) -> Self {
        self.candidate_error = Some(candidate);
        self.reference_error = reference;
        self
    }

    #[must_use]
    pub fn with_extra_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn pattern_only(mut self) -> Self {
        self.mode = ComparisonMode::PatternOnly;
        self
    }

    #[must_use]
    pub const fn uses_reference(&self) -> bool {
        matches!(self.mode, ComparisonMode::Full)
    }

    /// Check the invariants the runner relies on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScenario` describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(BuildcheckError::invalid_scenario(
                &self.id,
                "identifier must not be empty",
            ));
        }
        if self.source.path().as_os_str().is_empty() {
            return Err(BuildcheckError::invalid_scenario(
                &self.id,
                "build source path must not be empty",
            ));
        }

        for (label, rule) in self.rules() {
            if rule.requires_capture() && rule.pattern().capture_groups() == 0 {
                return Err(BuildcheckError::invalid_scenario(
                    &self.id,
                    format!(
                        "{label} is a {} rule but '{}' has no capture group",
                        rule.kind(),
                        rule.pattern()
                    ),
                ));
            }
        }

        match self.mode {
            ComparisonMode::Full => {
                check_pair(
                    &self.id,
                    "output",
                    self.candidate_output.as_ref(),
                    self.reference_output.as_ref(),
                )?;
                check_pair(
                    &self.id,
                    "error",
                    self.candidate_error.as_ref(),
                    self.reference_error.as_ref(),
                )?;
            }
            ComparisonMode::PatternOnly => {
                if self.reference_output.is_some() || self.reference_error.is_some() {
                    return Err(BuildcheckError::invalid_scenario(
                        &self.id,
                        "pattern-only scenarios never run the reference tool; drop its rules",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Every configured rule with a label naming its side and stream.
    #[must_use]
    pub fn rules(&self) -> Vec<(&'static str, &MatchRule)> {
        [
            ("candidate_output", self.candidate_output.as_ref()),
            ("reference_output", self.reference_output.as_ref()),
            ("candidate_error", self.candidate_error.as_ref()),
            ("reference_error", self.reference_error.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, rule)| rule.map(|r| (label, r)))
        .collect()
    }
}

fn check_pair(
    id: &str,
    stream: &str,
    candidate: Option<&MatchRule>,
    reference: Option<&MatchRule>,
) -> Result<()> {
    match (candidate, reference) {
        (None, None) => Ok(()),
        (Some(c), Some(r)) if c.same_kind(r) => Ok(()),
        (Some(c), Some(r)) => Err(BuildcheckError::invalid_scenario(
            id,
            format!(
                "{stream} rules differ in kind: candidate is {}, reference is {}",
                c.kind(),
                r.kind()
            ),
        )),
        (Some(_), None) | (None, Some(_)) => Err(BuildcheckError::invalid_scenario(
            id,
            format!("{stream} rules must be given for both tools or neither"),
        )),
    }
}

//! Scenario registry.
//!
//! Scenarios are data: a YAML file holding a list of immutable records,
//! loaded and validated once at start. The built-in corpus is compiled in.

use crate::error::{BuildcheckError, Result};
use crate::model::{ComparisonMode, ScenarioDefinition};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const BUILTIN_REGISTRY: &str = include_str!("../scenarios/builtin.yaml");

/// On-disk registry format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RegistryFile {
    pub scenarios: Vec<ScenarioDefinition>,
}

/// Validated, ordered set of scenarios with unique ids.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: Vec<ScenarioDefinition>,
}

impl ScenarioRegistry {
    /// Build a registry, validating every definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScenario` or `DuplicateScenario` for the first bad
    /// entry.
    pub fn from_definitions(scenarios: Vec<ScenarioDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            scenario.validate()?;
            if !seen.insert(scenario.id.as_str()) {
                return Err(BuildcheckError::DuplicateScenario {
                    id: scenario.id.clone(),
                });
            }
            if scenario.mode == ComparisonMode::PatternOnly && scenario.rules().is_empty() {
                warn!(scenario = %scenario.id, "pattern-only scenario has no rules; only the build is checked");
            }
        }
        Ok(Self { scenarios })
    }

    /// Parse registry YAML. `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the YAML does not parse, or a validation error.
    pub fn from_yaml_str(contents: &str, origin: &str) -> Result<Self> {
        let file: RegistryFile =
            serde_yaml::from_str(contents).map_err(|err| BuildcheckError::Registry {
                reason: format!("{origin}: {err}"),
            })?;
        debug!(origin, count = file.scenarios.len(), "registry parsed");
        Self::from_definitions(file.scenarios)
    }

    /// Load a registry file.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| BuildcheckError::Registry {
            reason: format!("{}: {err}", path.display()),
        })?;
        Self::from_yaml_str(&contents, &path.display().to_string())
    }

    /// The compiled-in corpus.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded file is broken.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_REGISTRY, "built-in registry")
    }

    /// `path` when given, else the built-in corpus.
    ///
    /// # Errors
    ///
    /// See `load` and `builtin`.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(Self::builtin, Self::load)
    }

    #[must_use]
    pub fn scenarios(&self) -> &[ScenarioDefinition] {
        &self.scenarios
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ScenarioDefinition> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.id.clone()).collect()
    }

    /// Pick scenarios to run, in registry order.
    ///
    /// With no ids every scenario is a candidate; `filter` then keeps those
    /// whose id contains it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownScenario` for the first id not in the registry.
    pub fn select(&self, ids: &[String], filter: Option<&str>) -> Result<Vec<ScenarioDefinition>> {
        for id in ids {
            if self.get(id).is_none() {
                return Err(BuildcheckError::UnknownScenario {
                    id: id.clone(),
                    known: self.ids(),
                });
            }
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| ids.is_empty() || ids.contains(&s.id))
            .filter(|s| filter.is_none_or(|needle| s.id.contains(needle)))
            .cloned()
            .collect())
    }
}

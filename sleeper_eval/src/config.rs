// src/config.rs
//
// Evaluation configuration.
//
// Precedence (highest to lowest):
// 1. CLI flags (applied by the binary)
// 2. SLEEPER_* environment variables
// 3. YAML config file (--config)
// 4. Built-in defaults
//
// The name tables (game aliases, experiment and norm labels) are plain data
// so new games and experiments can be added without code changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{SleeperError, SleeperResult};

pub const ENV_RESULT_SUFFIX: &str = "SLEEPER_RESULT_SUFFIX";
pub const ENV_EXCLUDE_MARKER: &str = "SLEEPER_EXCLUDE_MARKER";
pub const ENV_EPS_PLACEHOLDER: &str = "SLEEPER_EPS_PLACEHOLDER";

/// Settings for discovering, naming and labelling sleeper results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Result files must end with this suffix.
    pub result_suffix: String,
    /// Files whose name contains this token are skipped.
    pub exclude_marker: String,
    /// Character standing in for the decimal separator in the epsilon field.
    pub epsilon_placeholder: char,
    /// Decimal separator substituted for the first placeholder.
    pub epsilon_decimal: char,
    /// Raw game name -> canonical display name.
    pub game_aliases: BTreeMap<String, String>,
    /// Experiment id -> human readable description.
    pub experiment_labels: BTreeMap<String, String>,
    /// Norm id -> display name.
    pub norm_labels: BTreeMap<String, String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            result_suffix: "json".to_string(),
            exclude_marker: "allvariants".to_string(),
            epsilon_placeholder: '-',
            epsilon_decimal: '.',
            game_aliases: default_game_aliases(),
            experiment_labels: default_experiment_labels(),
            norm_labels: default_norm_labels(),
        }
    }
}

fn default_game_aliases() -> BTreeMap<String, String> {
    [("command", "chopper-command"), ("invaders", "space-invaders")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_experiment_labels() -> BTreeMap<String, String> {
    [
        ("exp037", "A3C LSTM (4 frames)"),
        ("exp038", "A3C LSTM (1 frame)"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_norm_labels() -> BTreeMap<String, String> {
    [("l1", "L1"), ("l2", "L2"), ("l-inf", "L-inf")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl EvalConfig {
    /// Load a config from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> SleeperResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| SleeperError::io(path, e))?;
        Self::from_yaml_str(&contents)
            .map_err(|e| SleeperError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a config from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> SleeperResult<Self> {
        let cfg: EvalConfig = serde_yaml::from_str(yaml)
            .map_err(|e| SleeperError::config(format!("failed to parse YAML: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SleeperResult<()> {
        if self.result_suffix.is_empty() {
            return Err(SleeperError::config("result_suffix cannot be empty"));
        }
        if self.exclude_marker.is_empty() {
            return Err(SleeperError::config("exclude_marker cannot be empty"));
        }
        for (raw, canonical) in &self.game_aliases {
            if raw.is_empty() || canonical.is_empty() {
                return Err(SleeperError::config(format!(
                    "game alias '{}' -> '{}' has an empty side",
                    raw, canonical
                )));
            }
        }
        Ok(())
    }

    /// Apply SLEEPER_* overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty or unusable values
    /// are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RESULT_SUFFIX) {
            if raw.is_empty() {
                warn!(var = ENV_RESULT_SUFFIX, "empty override ignored");
            } else {
                info!(var = ENV_RESULT_SUFFIX, value = %raw, "overrode default");
                self.result_suffix = raw;
            }
        }

        if let Some(raw) = lookup(ENV_EXCLUDE_MARKER) {
            if raw.is_empty() {
                warn!(var = ENV_EXCLUDE_MARKER, "empty override ignored");
            } else {
                info!(var = ENV_EXCLUDE_MARKER, value = %raw, "overrode default");
                self.exclude_marker = raw;
            }
        }

        if let Some(raw) = lookup(ENV_EPS_PLACEHOLDER) {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    info!(var = ENV_EPS_PLACEHOLDER, value = %c, "overrode default");
                    self.epsilon_placeholder = c;
                }
                _ => warn!(
                    var = ENV_EPS_PLACEHOLDER,
                    value = %raw,
                    default = %self.epsilon_placeholder,
                    "expected a single character; using default"
                ),
            }
        }
    }

    /// Register or replace a game alias.
    pub fn add_game_alias(&mut self, raw: impl Into<String>, canonical: impl Into<String>) {
        self.game_aliases.insert(raw.into(), canonical.into());
    }

    /// Map a raw game name to its canonical name; unknown names pass through.
    pub fn canonical_game<'a>(&'a self, raw: &'a str) -> &'a str {
        self.game_aliases
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw)
    }

    pub fn experiment_label<'a>(&'a self, experiment: &'a str) -> &'a str {
        self.experiment_labels
            .get(experiment)
            .map(String::as_str)
            .unwrap_or(experiment)
    }

    pub fn norm_label<'a>(&'a self, norm: &'a str) -> &'a str {
        self.norm_labels
            .get(norm)
            .map(String::as_str)
            .unwrap_or(norm)
    }
}

/// Parse a `RAW=CANONICAL` alias argument.
pub fn parse_alias(s: &str) -> Result<(String, String), String> {
    let (raw, canonical) = s
        .split_once('=')
        .ok_or_else(|| format!("alias must be 'RAW=CANONICAL', got: '{}'", s))?;
    if raw.is_empty() || canonical.is_empty() {
        return Err(format!("alias has an empty side: '{}'", s));
    }
    Ok((raw.to_string(), canonical.to_string()))
}

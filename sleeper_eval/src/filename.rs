// src/filename.rs
//
// Result filename grammar:
//
//   <ignored>_<ignored>_<epsilon>_<experiment>_..._<game>.<ext>
//
// The epsilon field encodes its decimal separator with a placeholder
// character (e.g. `0-004` for 0.004); only the first placeholder is
// replaced. The game is the final field up to its first '.'.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use crate::config::EvalConfig;
use crate::error::{SleeperError, SleeperResult};

/// Perturbation magnitude as written in the filename.
///
/// Equality is by label so `0.01` and `0.010` stay distinct buckets.
/// Ordering is numeric where the label parses, then by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Epsilon {
    label: String,
}

impl Epsilon {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }

    /// Numeric value, if the label is a float.
    pub fn value(&self) -> Option<f64> {
        self.label.parse::<f64>().ok()
    }
}

impl Ord for Epsilon {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a.total_cmp(&b).then_with(|| self.label.cmp(&other.label)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.label.cmp(&other.label),
        }
    }
}

impl PartialOrd for Epsilon {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Epsilon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Serialize for Epsilon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}

/// Metadata carried in a result filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFileName {
    pub epsilon: Epsilon,
    pub experiment: String,
    /// Canonical game name (aliases already applied).
    pub game: String,
}

impl ResultFileName {
    /// Parse the file name component of `path`.
    pub fn parse(path: &Path, cfg: &EvalConfig) -> SleeperResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SleeperError::malformed(path, "file name is not valid UTF-8"))?;

        let fields: Vec<&str> = name.split('_').collect();
        if fields.len() < 4 {
            return Err(SleeperError::malformed(
                path,
                format!(
                    "expected at least 4 '_'-delimited fields, found {}",
                    fields.len()
                ),
            ));
        }

        let mut decimal = [0u8; 4];
        let epsilon = fields[2].replacen(
            cfg.epsilon_placeholder,
            cfg.epsilon_decimal.encode_utf8(&mut decimal),
            1,
        );
        let experiment = fields[3];
        let raw_game = fields[fields.len() - 1]
            .split('.')
            .next()
            .unwrap_or_default();

        for (field, value) in [
            ("epsilon", epsilon.as_str()),
            ("experiment", experiment),
            ("game", raw_game),
        ] {
            if value.is_empty() {
                return Err(SleeperError::malformed(
                    path,
                    format!("empty {} field", field),
                ));
            }
        }

        Ok(Self {
            epsilon: Epsilon::new(epsilon),
            experiment: experiment.to_string(),
            game: cfg.canonical_game(raw_game).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> SleeperResult<ResultFileName> {
        ResultFileName::parse(Path::new(name), &EvalConfig::default())
    }

    #[test]
    fn test_parse_basic() {
        let parsed = parse("sleeper_fgsm_0-004_exp037_pong.json").unwrap();
        assert_eq!(parsed.epsilon.as_str(), "0.004");
        assert_eq!(parsed.epsilon.value(), Some(0.004));
        assert_eq!(parsed.experiment, "exp037");
        assert_eq!(parsed.game, "pong");
    }

    #[test]
    fn test_parse_applies_game_alias() {
        let parsed = parse("sleeper_fgsm_0-01_exp038_chopper_command.json").unwrap();
        assert_eq!(parsed.game, "chopper-command");

        let parsed = parse("sleeper_fgsm_0-01_exp038_space_invaders.json").unwrap();
        assert_eq!(parsed.game, "space-invaders");
    }

    #[test]
    fn test_only_first_placeholder_replaced() {
        let parsed = parse("a_b_1-0-5_exp037_pong.json").unwrap();
        assert_eq!(parsed.epsilon.as_str(), "1.0-5");
        assert_eq!(parsed.epsilon.value(), None);
    }

    #[test]
    fn test_game_strips_everything_after_first_dot() {
        let parsed = parse("a_b_0-1_exp037_pong.v2.json").unwrap();
        assert_eq!(parsed.game, "pong");
    }

    #[test]
    fn test_too_few_fields_is_malformed() {
        let err = parse("a_b_0-1.json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
        assert!(err.to_string().contains("at least 4"));
    }

    #[test]
    fn test_custom_placeholder() {
        let cfg = EvalConfig {
            epsilon_placeholder: 'p',
            ..EvalConfig::default()
        };
        let parsed =
            ResultFileName::parse(Path::new("a_b_0p25_exp1_breakout.json"), &cfg).unwrap();
        assert_eq!(parsed.epsilon.as_str(), "0.25");
    }

    #[test]
    fn test_epsilon_ordering_is_numeric() {
        let mut eps = vec![
            Epsilon::new("0.01"),
            Epsilon::new("0.002"),
            Epsilon::new("0.1"),
            Epsilon::new("abc"),
            Epsilon::new("0.0005"),
        ];
        eps.sort();
        let labels: Vec<&str> = eps.iter().map(Epsilon::as_str).collect();
        assert_eq!(labels, vec!["0.0005", "0.002", "0.01", "0.1", "abc"]);
    }

    #[test]
    fn test_epsilon_labels_with_equal_value_stay_distinct() {
        let a = Epsilon::new("0.01");
        let b = Epsilon::new("0.010");
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }
}

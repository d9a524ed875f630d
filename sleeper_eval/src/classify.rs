// src/classify.rs
//
// Sleeper-attack outcome classification.
//
// A sleeper attack should leave every action unchanged except the one at
// the final (target) timestep. Comparing the actions taken with and
// without perturbation gives one of four outcomes:
//
//   success      only the final action changed
//   none         no action changed
//   only_others  earlier actions changed, the final one did not
//   also_others  the final action changed together with earlier ones

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::container::RawRollout;
use crate::error::{SleeperError, SleeperResult};

/// Classification of one rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The perturbation changed no action.
    #[serde(rename = "none")]
    NoChange,
    OnlyOthers,
    AlsoOthers,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::Success,
        Outcome::NoChange,
        Outcome::OnlyOthers,
        Outcome::AlsoOthers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NoChange => "none",
            Outcome::OnlyOthers => "only_others",
            Outcome::AlsoOthers => "also_others",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete actions of one rollout under both observation streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutRecord {
    pub original: Vec<usize>,
    pub adversarial: Vec<usize>,
}

impl RolloutRecord {
    pub fn new(original: Vec<usize>, adversarial: Vec<usize>) -> Self {
        Self {
            original,
            adversarial,
        }
    }

    /// Arg-max both probability datasets of a raw rollout.
    pub fn from_raw(raw: &RawRollout) -> SleeperResult<Self> {
        Ok(Self {
            original: argmax_actions(&raw.action_prob_orig)
                .map_err(|e| e.with_context("action_prob_orig"))?,
            adversarial: argmax_actions(&raw.action_prob_adv)
                .map_err(|e| e.with_context("action_prob_adv"))?,
        })
    }

    pub fn classify(&self) -> SleeperResult<Outcome> {
        classify(&self.original, &self.adversarial)
    }
}

/// Classify a pair of action sequences.
///
/// Fails with `InvalidInput` when the sequences differ in length or are
/// empty.
pub fn classify(original: &[usize], adversarial: &[usize]) -> SleeperResult<Outcome> {
    if original.len() != adversarial.len() {
        return Err(SleeperError::invalid(
            "",
            format!(
                "action sequences differ in length: original={} adversarial={}",
                original.len(),
                adversarial.len()
            ),
        ));
    }
    let last = match original.len().checked_sub(1) {
        Some(last) => last,
        None => return Err(SleeperError::invalid("", "action sequences are empty")),
    };

    let changed_before_last = original[..last]
        .iter()
        .zip(&adversarial[..last])
        .filter(|(o, a)| o != a)
        .count();
    let last_changed = original[last] != adversarial[last];

    let outcome = match (changed_before_last, last_changed) {
        (0, true) => Outcome::Success,
        (0, false) => Outcome::NoChange,
        (_, false) => Outcome::OnlyOthers,
        (_, true) => Outcome::AlsoOthers,
    };
    Ok(outcome)
}

/// Index of the maximum entry per row.
///
/// Ties go to the lowest index. A NaN counts as the maximum, and the first
/// NaN in a row wins, matching numpy's `argmax`. An empty row is
/// `MalformedInput` with no path; the loader fills it in.
pub fn argmax_actions(rows: &[Vec<f64>]) -> SleeperResult<Vec<usize>> {
    rows.iter()
        .enumerate()
        .map(|(t, row)| {
            argmax(row).ok_or_else(|| {
                SleeperError::malformed("", format!("timestep {} has no action probabilities", t))
            })
        })
        .collect()
}

fn argmax(row: &[f64]) -> Option<usize> {
    if let Some(i) = row.iter().position(|p| p.is_nan()) {
        return Some(i);
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in row.iter().enumerate() {
        match best {
            Some((_, b)) if p <= b => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_scenarios() {
        let orig = [0, 1, 2];
        assert_eq!(classify(&orig, &[0, 1, 2]).unwrap(), Outcome::NoChange);
        assert_eq!(classify(&orig, &[0, 1, 3]).unwrap(), Outcome::Success);
        assert_eq!(classify(&orig, &[5, 1, 3]).unwrap(), Outcome::AlsoOthers);
        assert_eq!(classify(&orig, &[5, 1, 2]).unwrap(), Outcome::OnlyOthers);
    }

    #[test]
    fn test_single_timestep() {
        assert_eq!(classify(&[4], &[4]).unwrap(), Outcome::NoChange);
        assert_eq!(classify(&[4], &[1]).unwrap(), Outcome::Success);
    }

    #[test]
    fn test_length_mismatch_is_invalid() {
        let err = classify(&[0, 1], &[0, 1, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_empty_is_invalid() {
        let err = classify(&[], &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    /// Every diff pattern of length 1..=6 maps to exactly the category
    /// defined by (count of differences, last differs).
    #[test]
    fn test_exhaustive_diff_patterns() {
        for len in 1..=6usize {
            for mask in 0u32..(1 << len) {
                let original = vec![0usize; len];
                let adversarial: Vec<usize> = (0..len)
                    .map(|t| if mask & (1 << t) != 0 { 1 } else { 0 })
                    .collect();

                let n = mask.count_ones();
                let last = mask & (1 << (len - 1)) != 0;
                let expected = if n == 1 && last {
                    Outcome::Success
                } else if n == 0 {
                    Outcome::NoChange
                } else if !last {
                    Outcome::OnlyOthers
                } else {
                    Outcome::AlsoOthers
                };

                assert_eq!(
                    classify(&original, &adversarial).unwrap(),
                    expected,
                    "len={} mask={:b}",
                    len,
                    mask
                );
            }
        }
    }

    #[test]
    fn test_argmax_ties_go_to_lowest_index() {
        let rows = vec![vec![0.25, 0.5, 0.5, 0.1], vec![0.3, 0.3, 0.3]];
        assert_eq!(argmax_actions(&rows).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_argmax_first_nan_wins() {
        let rows = vec![vec![0.9, f64::NAN, 0.1, f64::NAN]];
        assert_eq!(argmax_actions(&rows).unwrap(), vec![1]);
    }

    #[test]
    fn test_argmax_empty_row_is_malformed() {
        let rows = vec![vec![0.5, 0.5], vec![]];
        let err = argmax_actions(&rows).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("timestep 1"));
    }

    #[test]
    fn test_record_from_raw_names_empty_dataset_row() {
        let raw = RawRollout {
            head_count: 1,
            action_prob_orig: vec![vec![0.1, 0.9]],
            action_prob_adv: vec![vec![]],
        };
        let err = RolloutRecord::from_raw(&raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("action_prob_adv: timestep 0"));
    }

    #[test]
    fn test_record_from_raw() {
        let raw = RawRollout {
            head_count: 3,
            action_prob_orig: vec![vec![0.1, 0.9], vec![0.8, 0.2]],
            action_prob_adv: vec![vec![0.1, 0.9], vec![0.2, 0.8]],
        };
        let record = RolloutRecord::from_raw(&raw).unwrap();
        assert_eq!(record.original, vec![1, 0]);
        assert_eq!(record.adversarial, vec![1, 1]);
        assert_eq!(record.classify().unwrap(), Outcome::Success);
    }

    #[test]
    fn test_outcome_labels() {
        let labels: Vec<&str> = Outcome::ALL.iter().map(Outcome::as_str).collect();
        assert_eq!(labels, vec!["success", "none", "only_others", "also_others"]);
        assert_eq!(
            serde_json::to_string(&Outcome::NoChange).unwrap(),
            "\"none\""
        );
    }
}

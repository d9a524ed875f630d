// src/aggregate.rs
//
// Outcome aggregation keyed by (game, norm, experiment, head count, epsilon).
//
// Buckets are created on first observation and only grow. `finalize()`
// converts every bucket to ratios exactly once; any later use of the
// aggregator fails with `AlreadyFinalized`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::classify::Outcome;
use crate::error::{SleeperError, SleeperResult};
use crate::filename::Epsilon;
use crate::results::SleeperResults;

/// Composite aggregation key.
///
/// Field order gives the sort order: group fields first, then head count,
/// then epsilon (numeric).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AggregationKey {
    pub game: String,
    pub norm: String,
    pub experiment: String,
    pub head_count: u32,
    pub epsilon: Epsilon,
}

impl AggregationKey {
    pub fn new(
        game: impl Into<String>,
        norm: impl Into<String>,
        experiment: impl Into<String>,
        head_count: u32,
        epsilon: Epsilon,
    ) -> Self {
        Self {
            game: game.into(),
            norm: norm.into(),
            experiment: experiment.into(),
            head_count,
            epsilon,
        }
    }

    /// The (game, norm, experiment) part.
    pub fn group(&self) -> GroupKey {
        GroupKey {
            game: self.game.clone(),
            norm: self.norm.clone(),
            experiment: self.experiment.clone(),
        }
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{} k={} eps={}",
            self.game, self.norm, self.experiment, self.head_count, self.epsilon
        )
    }
}

/// (game, norm, experiment): one chart's worth of buckets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub game: String,
    pub norm: String,
    pub experiment: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.game, self.norm, self.experiment)
    }
}

/// Raw per-category counts for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub success: u64,
    pub none: u64,
    pub only_others: u64,
    pub also_others: u64,
    pub total: u64,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::NoChange => self.none += 1,
            Outcome::OnlyOthers => self.only_others += 1,
            Outcome::AlsoOthers => self.also_others += 1,
        }
        self.total += 1;
    }

    pub fn category_sum(&self) -> u64 {
        self.success + self.none + self.only_others + self.also_others
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.category_sum()
    }

    pub fn merge(&mut self, other: &OutcomeCounts) {
        self.success += other.success;
        self.none += other.none;
        self.only_others += other.only_others;
        self.also_others += other.also_others;
        self.total += other.total;
    }

    /// Ratios of `total`. Callers guarantee `total > 0`.
    fn to_ratios(self) -> RatioCounts {
        let total = self.total as f64;
        RatioCounts {
            success: self.success as f64 / total,
            none: self.none as f64 / total,
            only_others: self.only_others as f64 / total,
            also_others: self.also_others as f64 / total,
            total: self.total,
        }
    }
}

/// Normalized counts. The four ratios sum to 1; `total` is the raw count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioCounts {
    pub success: f64,
    pub none: f64,
    pub only_others: f64,
    pub also_others: f64,
    pub total: u64,
}

impl RatioCounts {
    pub fn ratio_sum(&self) -> f64 {
        self.success + self.none + self.only_others + self.also_others
    }

    /// Share of rollouts where the attack did not achieve a clean success.
    pub fn failure_rate(&self) -> f64 {
        self.none + self.only_others + self.also_others
    }
}

#[derive(Debug, Default)]
pub struct Aggregator {
    buckets: BTreeMap<AggregationKey, OutcomeCounts>,
    finalized: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome against `key`, creating the bucket if needed.
    pub fn record(&mut self, key: AggregationKey, outcome: Outcome) -> SleeperResult<()> {
        if self.finalized {
            return Err(SleeperError::AlreadyFinalized);
        }
        self.buckets.entry(key).or_default().record(outcome);
        Ok(())
    }

    /// Fold another aggregator's buckets into this one.
    pub fn merge(&mut self, other: Aggregator) -> SleeperResult<()> {
        if self.finalized || other.finalized {
            return Err(SleeperError::AlreadyFinalized);
        }
        for (key, counts) in other.buckets {
            self.buckets.entry(key).or_default().merge(&counts);
        }
        Ok(())
    }

    pub fn get(&self, key: &AggregationKey) -> Option<&OutcomeCounts> {
        self.buckets.get(key)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&AggregationKey, &OutcomeCounts)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Check every bucket's totals and convert it to ratios.
    ///
    /// May be called once. Nothing is converted if any bucket fails the
    /// totals check.
    pub fn finalize(&mut self) -> SleeperResult<SleeperResults> {
        if self.finalized {
            return Err(SleeperError::AlreadyFinalized);
        }
        for (key, counts) in &self.buckets {
            if !counts.is_consistent() || counts.total == 0 {
                return Err(SleeperError::InconsistentCounts {
                    key: key.to_string(),
                    total: counts.total,
                    sum: counts.category_sum(),
                });
            }
        }
        self.finalized = true;

        let ratios = self
            .buckets
            .iter()
            .map(|(key, counts)| (key.clone(), counts.to_ratios()))
            .collect();
        Ok(SleeperResults::new(ratios))
    }
}

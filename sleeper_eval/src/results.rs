// src/results.rs
//
// Finalized sleeper results and their external shapes.
//
// The JSON output nests ratios as
//   "<game>;<norm>;<experiment>" -> "<k>;<epsilon>" -> RatioCounts
// which is what the plotting side consumes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::aggregate::{AggregationKey, GroupKey, RatioCounts};
use crate::config::EvalConfig;
use crate::error::{SleeperError, SleeperResult};
use crate::filename::Epsilon;

/// Nested output mapping.
pub type NestedResults = BTreeMap<String, BTreeMap<String, RatioCounts>>;

/// Immutable ratios per aggregation key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SleeperResults {
    ratios: BTreeMap<AggregationKey, RatioCounts>,
}

impl SleeperResults {
    pub(crate) fn new(ratios: BTreeMap<AggregationKey, RatioCounts>) -> Self {
        Self { ratios }
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn get(&self, key: &AggregationKey) -> Option<&RatioCounts> {
        self.ratios.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&AggregationKey, &RatioCounts)> {
        self.ratios.iter()
    }

    pub fn to_nested(&self) -> NestedResults {
        let mut nested = NestedResults::new();
        for (key, ratios) in &self.ratios {
            nested
                .entry(key.group().to_string())
                .or_default()
                .insert(format!("{};{}", key.head_count, key.epsilon), *ratios);
        }
        nested
    }

    /// Write the nested mapping as pretty JSON, creating parent dirs.
    pub fn write_json(&self, path: &Path) -> SleeperResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SleeperError::io(parent, e))?;
            }
        }
        let file = File::create(path).map_err(|e| SleeperError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.to_nested())
            .map_err(|e| SleeperError::io(path, e.into()))?;
        writer.flush().map_err(|e| SleeperError::io(path, e))?;
        Ok(())
    }

    /// Entries grouped per (game, norm, experiment), in key order.
    pub fn groups(&self) -> Vec<ResultGroup> {
        let mut groups: Vec<ResultGroup> = Vec::new();
        for (key, ratios) in &self.ratios {
            let group = key.group();
            let entry = GroupEntry {
                head_count: key.head_count,
                epsilon: key.epsilon.clone(),
                ratios: *ratios,
            };
            match groups.last_mut() {
                Some(last) if last.key == group => last.entries.push(entry),
                _ => groups.push(ResultGroup {
                    key: group,
                    entries: vec![entry],
                }),
            }
        }
        groups
    }
}

/// One (head count, epsilon) cell of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry {
    pub head_count: u32,
    pub epsilon: Epsilon,
    pub ratios: RatioCounts,
}

/// All cells sharing (game, norm, experiment).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultGroup {
    pub key: GroupKey,
    pub entries: Vec<GroupEntry>,
}

impl ResultGroup {
    /// Distinct epsilons, numerically ascending.
    pub fn epsilons(&self) -> Vec<Epsilon> {
        let mut eps: Vec<Epsilon> = self.entries.iter().map(|e| e.epsilon.clone()).collect();
        eps.sort();
        eps.dedup();
        eps
    }

    /// Distinct head counts, ascending.
    pub fn head_counts(&self) -> Vec<u32> {
        let mut ks: Vec<u32> = self.entries.iter().map(|e| e.head_count).collect();
        ks.sort_unstable();
        ks.dedup();
        ks
    }

    /// e.g. "Chopper Command, A3C LSTM (4 frames), L-inf norm"
    pub fn chart_title(&self, cfg: &EvalConfig) -> String {
        format!(
            "{}, {}, {} norm",
            title_case_game(&self.key.game),
            cfg.experiment_label(&self.key.experiment),
            cfg.norm_label(&self.key.norm)
        )
    }

    pub fn failure_chart_title(&self, cfg: &EvalConfig) -> String {
        format!("{}: Failure Modes", self.chart_title(cfg))
    }

    /// `<game>_<experiment>_<norm>`
    pub fn chart_file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.key.game, self.key.experiment, self.key.norm
        )
    }

    pub fn failure_chart_file_stem(&self) -> String {
        format!("{}_failure", self.chart_file_stem())
    }
}

/// "chopper-command" -> "Chopper Command"
pub fn title_case_game(game: &str) -> String {
    game.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// src/lib.rs
//
// Sleeper-attack evaluation for adversarially perturbed RL rollouts.
//
// Pipeline:
// - loader:    discover result files, parse filename metadata, stream rollouts
// - classify:  compare unperturbed vs perturbed actions per rollout
// - aggregate: count outcomes per (game, norm, experiment, k, epsilon)
// - results:   finalized ratios, nested JSON output, chart metadata
// - summarize: text / Markdown tables

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod container;
pub mod error;
pub mod filename;
pub mod loader;
pub mod pipeline;
pub mod results;
pub mod summarize;
pub mod telemetry;

pub use aggregate::{AggregationKey, Aggregator, GroupKey, OutcomeCounts, RatioCounts};
pub use classify::{argmax_actions, classify, Outcome, RolloutRecord};
pub use config::EvalConfig;
pub use container::{
    JsonResultContainer, JsonResultFile, JsonResultFormat, RawRollout, ResultContainer,
    ResultFormat,
};
pub use error::{ErrorKind, SleeperError, SleeperResult};
pub use filename::{Epsilon, ResultFileName};
pub use loader::{LoadedRollout, ResultLoader};
pub use pipeline::{aggregate_file, collect_sleeper_results, collect_sleeper_results_parallel};
pub use results::{GroupEntry, NestedResults, ResultGroup, SleeperResults};
pub use summarize::{get_summary_rows, summarize, OutputFormat, SummaryRow};

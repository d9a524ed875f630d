// src/pipeline.rs
//
// load -> classify -> aggregate -> finalize.
//
// Files are independent, so the parallel path maps each file to its own
// Aggregator and merges them afterwards. Bucket increments commute, so
// both paths produce identical results.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::config::EvalConfig;
use crate::container::ResultFormat;
use crate::error::SleeperResult;
use crate::loader::{LoadedRollout, ResultLoader};
use crate::results::SleeperResults;

/// Classify one loaded rollout into `agg`.
fn record_rollout(agg: &mut Aggregator, rollout: LoadedRollout) -> SleeperResult<()> {
    let location = rollout.location();
    let outcome = rollout
        .record
        .classify()
        .map_err(|e| e.with_context(location))?;
    agg.record(rollout.key, outcome)
}

/// Aggregate a single file into a fresh aggregator.
pub fn aggregate_file(loader: &ResultLoader<'_>, path: &Path) -> SleeperResult<Aggregator> {
    let mut agg = Aggregator::new();
    for rollout in loader.open_file(path)? {
        record_rollout(&mut agg, rollout?)?;
    }
    Ok(agg)
}

/// Run the whole pipeline sequentially.
pub fn collect_sleeper_results<P: AsRef<Path>>(
    base_dirs: &[P],
    cfg: &EvalConfig,
    format: &dyn ResultFormat,
) -> SleeperResult<SleeperResults> {
    let started = Instant::now();
    let loader = ResultLoader::new(cfg, format);

    let mut agg = Aggregator::new();
    let mut rollouts = 0usize;
    for rollout in loader.rollouts(base_dirs)? {
        record_rollout(&mut agg, rollout?)?;
        rollouts += 1;
    }

    finish(agg, rollouts, started)
}

/// Run the pipeline with one worker task per result file.
///
/// Per-file results keep discovery order, so when several files fail the
/// error reported is the first in sorted path order, as in the sequential
/// path.
#[cfg(feature = "parallel")]
pub fn collect_sleeper_results_parallel<P: AsRef<Path>>(
    base_dirs: &[P],
    cfg: &EvalConfig,
    format: &dyn ResultFormat,
) -> SleeperResult<SleeperResults> {
    use rayon::prelude::*;
    use std::path::PathBuf;

    let started = Instant::now();
    let loader = ResultLoader::new(cfg, format);
    let files: Vec<PathBuf> = loader.discover(base_dirs)?;

    let partials: Vec<SleeperResult<Aggregator>> = files
        .par_iter()
        .map(|path| aggregate_file(&loader, path))
        .collect();

    let mut agg = Aggregator::new();
    let mut rollouts = 0usize;
    for partial in partials {
        let partial = partial?;
        rollouts += partial.buckets().map(|(_, c)| c.total as usize).sum::<usize>();
        agg.merge(partial)?;
    }

    finish(agg, rollouts, started)
}

/// Without the `parallel` feature this falls back to the sequential path.
#[cfg(not(feature = "parallel"))]
pub fn collect_sleeper_results_parallel<P: AsRef<Path>>(
    base_dirs: &[P],
    cfg: &EvalConfig,
    format: &dyn ResultFormat,
) -> SleeperResult<SleeperResults> {
    collect_sleeper_results(base_dirs, cfg, format)
}

fn finish(mut agg: Aggregator, rollouts: usize, started: Instant) -> SleeperResult<SleeperResults> {
    if agg.is_empty() {
        warn!("no rollouts found under the given directories");
    }
    let results = agg.finalize()?;
    info!(
        rollouts,
        buckets = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "aggregated sleeper results"
    );
    Ok(results)
}

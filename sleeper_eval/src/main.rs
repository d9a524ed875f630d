// src/main.rs
//
// sleeper_eval CLI.
//
// Usage:
//   sleeper_eval aggregate <BASE_DIR>... [--out-json PATH] [--format text|markdown]
//   sleeper_eval charts <BASE_DIR>...
//
// Config precedence: CLI flags > SLEEPER_* env vars > --config YAML > defaults.

use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use sleeper_eval::config::parse_alias;
use sleeper_eval::{
    collect_sleeper_results, collect_sleeper_results_parallel, summarize, EvalConfig,
    JsonResultFormat, OutputFormat, SleeperResults,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Text,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(
    name = "sleeper_eval",
    about = "Sleeper-attack success rates from adversarial rollout results",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity: -v, -vv, -vvv
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify every rollout and print per-bucket outcome ratios.
    Aggregate(AggregateArgs),
    /// List chart titles and output file stems per (game, norm, experiment).
    Charts(CommonArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Base result directories (each holds one level of experiment dirs).
    #[arg(required = true)]
    base_dirs: Vec<PathBuf>,

    /// YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Result file suffix.
    #[arg(long)]
    suffix: Option<String>,

    /// Skip files whose name contains this token.
    #[arg(long)]
    exclude_marker: Option<String>,

    /// Extra game alias RAW=CANONICAL (repeatable).
    #[arg(long = "alias", value_parser = parse_alias)]
    aliases: Vec<(String, String)>,

    /// Process files one at a time instead of in parallel.
    #[arg(long)]
    sequential: bool,
}

#[derive(Debug, Args)]
struct AggregateArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Write the nested ratio mapping as JSON.
    #[arg(long)]
    out_json: Option<PathBuf>,

    /// Table format for stdout.
    #[arg(long, value_enum, default_value = "text")]
    format: FormatArg,
}

fn resolve_config(args: &CommonArgs) -> Result<EvalConfig> {
    let mut cfg = match &args.config {
        Some(path) => EvalConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EvalConfig::default(),
    };
    cfg.apply_env_overrides();

    if let Some(suffix) = &args.suffix {
        cfg.result_suffix = suffix.clone();
    }
    if let Some(marker) = &args.exclude_marker {
        cfg.exclude_marker = marker.clone();
    }
    for (raw, canonical) in &args.aliases {
        cfg.add_game_alias(raw.clone(), canonical.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

fn collect(args: &CommonArgs, cfg: &EvalConfig) -> Result<SleeperResults> {
    let format = JsonResultFormat;
    let results = if args.sequential {
        collect_sleeper_results(args.base_dirs.as_slice(), cfg, &format)?
    } else {
        collect_sleeper_results_parallel(args.base_dirs.as_slice(), cfg, &format)?
    };
    Ok(results)
}

fn run_aggregate(args: &AggregateArgs) -> Result<()> {
    let cfg = resolve_config(&args.common)?;
    let results = collect(&args.common, &cfg)?;

    if let Some(path) = &args.out_json {
        results
            .write_json(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote nested results");
    }

    let format = match args.format {
        FormatArg::Text => OutputFormat::Text,
        FormatArg::Markdown => OutputFormat::Markdown,
    };
    summarize(&results, io::stdout().lock(), format)?;
    Ok(())
}

fn run_charts(args: &CommonArgs) -> Result<()> {
    let cfg = resolve_config(args)?;
    let results = collect(args, &cfg)?;

    for group in results.groups() {
        let eps: Vec<String> = group.epsilons().iter().map(|e| e.to_string()).collect();
        println!("{}", group.chart_title(&cfg));
        println!("  file:    {}", group.chart_file_stem());
        println!("  failure: {}", group.failure_chart_file_stem());
        println!("  k:       {:?}", group.head_counts());
        println!("  eps:     {}", eps.join(", "));
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    sleeper_eval::telemetry::init_logging(cli.verbose);

    let outcome = match &cli.command {
        Command::Aggregate(args) => run_aggregate(args),
        Command::Charts(args) => run_charts(args),
    };

    if let Err(e) = outcome {
        eprintln!("sleeper_eval: error: {:#}", e);
        process::exit(1);
    }
}

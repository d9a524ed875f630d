// src/summarize.rs
//
// Tabular view of finalized sleeper results (fixed-width text or Markdown).
//
// Rows are ordered by game, norm, experiment, head count, then epsilon
// ascending. Failure-mode columns are cumulative, matching how the
// stacked failure chart is drawn: none <= none+only <= none+only+also.

use serde::Serialize;
use std::io::{self, Write};

use crate::results::SleeperResults;

/// Output format for the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Fixed-width text table (default).
    #[default]
    Text,
    /// Markdown table.
    Markdown,
}

/// One (game, norm, experiment, k, epsilon) row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub game: String,
    pub norm: String,
    pub experiment: String,
    pub head_count: u32,
    pub epsilon: String,
    pub success: f64,
    /// Share of rollouts with no changed action.
    pub none: f64,
    /// none + only_others
    pub none_only_others: f64,
    /// none + only_others + also_others
    pub none_only_also_others: f64,
    pub total: u64,
}

pub fn get_summary_rows(results: &SleeperResults) -> Vec<SummaryRow> {
    results
        .iter()
        .map(|(key, r)| SummaryRow {
            game: key.game.clone(),
            norm: key.norm.clone(),
            experiment: key.experiment.clone(),
            head_count: key.head_count,
            epsilon: key.epsilon.to_string(),
            success: r.success,
            none: r.none,
            none_only_others: r.none + r.only_others,
            none_only_also_others: r.none + r.only_others + r.also_others,
            total: r.total,
        })
        .collect()
}

/// Print rows as a fixed-width text table.
pub fn print_table<W: Write>(rows: &[SummaryRow], mut writer: W) -> io::Result<()> {
    writeln!(
        writer,
        "{:<18} {:<8} {:<10} {:>4} {:>10} {:>8} {:>8} {:>10} {:>14} {:>7}",
        "GAME", "NORM", "EXP", "K", "EPSILON", "SUCCESS", "NONE", "+ONLY", "+ALSO", "TOTAL",
    )?;
    writeln!(
        writer,
        "{:-<18} {:-<8} {:-<10} {:->4} {:->10} {:->8} {:->8} {:->10} {:->14} {:->7}",
        "", "", "", "", "", "", "", "", "", ""
    )?;

    for row in rows {
        writeln!(
            writer,
            "{:<18} {:<8} {:<10} {:>4} {:>10} {:>8.3} {:>8.3} {:>10.3} {:>14.3} {:>7}",
            row.game,
            row.norm,
            row.experiment,
            row.head_count,
            row.epsilon,
            row.success,
            row.none,
            row.none_only_others,
            row.none_only_also_others,
            row.total
        )?;
    }

    Ok(())
}

/// Print rows as a Markdown table.
pub fn print_markdown_table<W: Write>(rows: &[SummaryRow], mut writer: W) -> io::Result<()> {
    writeln!(
        writer,
        "| game | norm | experiment | k | epsilon | success | none | none+only_others | none+only_others+also_others | total |"
    )?;
    writeln!(
        writer,
        "|------|------|------------|---|---------|---------|------|------------------|------------------------------|-------|"
    )?;

    for row in rows {
        writeln!(
            writer,
            "| {} | {} | {} | {} | {} | {:.3} | {:.3} | {:.3} | {:.3} | {} |",
            row.game,
            row.norm,
            row.experiment,
            row.head_count,
            row.epsilon,
            row.success,
            row.none,
            row.none_only_others,
            row.none_only_also_others,
            row.total
        )?;
    }

    Ok(())
}

/// Render results in the requested format. Returns the number of rows.
pub fn summarize<W: Write>(
    results: &SleeperResults,
    writer: W,
    format: OutputFormat,
) -> io::Result<usize> {
    let rows = get_summary_rows(results);
    match format {
        OutputFormat::Text => print_table(&rows, writer)?,
        OutputFormat::Markdown => print_markdown_table(&rows, writer)?,
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregationKey, Aggregator};
    use crate::classify::Outcome;
    use crate::filename::Epsilon;

    fn results() -> SleeperResults {
        let mut agg = Aggregator::new();
        let key = |k: u32, eps: &str| {
            AggregationKey::new("pong", "l2", "exp038", k, Epsilon::new(eps))
        };
        for outcome in [
            Outcome::Success,
            Outcome::NoChange,
            Outcome::OnlyOthers,
            Outcome::AlsoOthers,
        ] {
            agg.record(key(1, "0.1"), outcome).unwrap();
        }
        agg.record(key(1, "0.02"), Outcome::Success).unwrap();
        agg.finalize().unwrap()
    }

    #[test]
    fn test_rows_are_cumulative_and_sorted() {
        let rows = get_summary_rows(&results());
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].epsilon, "0.02");
        assert_eq!(rows[0].success, 1.0);
        assert_eq!(rows[0].none_only_also_others, 0.0);

        let r = &rows[1];
        assert_eq!(r.epsilon, "0.1");
        assert_eq!(r.none, 0.25);
        assert_eq!(r.none_only_others, 0.5);
        assert_eq!(r.none_only_also_others, 0.75);
        assert_eq!(r.total, 4);
    }

    #[test]
    fn test_print_table() {
        let mut output = Vec::new();
        let n = summarize(&results(), &mut output, OutputFormat::Text).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert_eq!(n, 2);
        assert!(text.contains("GAME"));
        assert!(text.contains("pong"));
        assert!(text.contains("exp038"));
        assert!(text.contains("0.250"));
        assert!(text.contains("0.750"));
    }

    #[test]
    fn test_markdown_output_format() {
        let mut output = Vec::new();
        summarize(&results(), &mut output, OutputFormat::Markdown).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert!(text.contains("| game |"));
        assert!(text.contains("| none+only_others |"));
        assert!(text.contains("| pong | l2 | exp038 | 1 | 0.1 | 0.250 | 0.250 | 0.500 | 0.750 | 4 |"));
    }

    #[test]
    fn test_empty_results_print_header_only() {
        let mut output = Vec::new();
        let n = summarize(&SleeperResults::default(), &mut output, OutputFormat::Text).unwrap();
        assert_eq!(n, 0);
        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
    }
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::pipeline::stage5_bootstrap::{DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_BUDGET};
use crate::pipeline::stage6_report::ReportMode;

#[derive(Debug, Parser)]
#[command(name = "mqm-scorecard", version, about = "MQM rating aggregation and scoring")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a ratings TSV, score it, and emit the scorecard.
    Score(ScoreArgs),
}

#[derive(Debug, clap::Args)]
pub struct ScoreArgs {
    /// Ratings file (TSV, optionally .gz-compressed).
    pub input: PathBuf,

    /// Output directory for scorecard.txt / scorecard.json; stdout if omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    pub mode: ReportMode,

    /// Column filter as column=pattern (unanchored regex); repeatable.
    #[arg(long = "filter", value_name = "COLUMN=PATTERN")]
    pub filters: Vec<String>,

    /// Row filter expression, e.g. "severity == 'Major' and system != 'ref'".
    #[arg(long = "filter-expr")]
    pub filter_expr: Option<String>,

    /// RNG seed for reproducible confidence intervals.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Bootstrap samples per system.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_BUDGET)]
    pub samples: usize,

    /// Samples drawn per scheduling step.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch: usize,
}

/// Splits repeatable `--filter column=pattern` flags at the first '='.
pub fn parse_column_specs(specs: &[String]) -> Result<Vec<(String, String)>, String> {
    specs
        .iter()
        .map(|spec| match spec.split_once('=') {
            Some((column, pattern)) if !column.trim().is_empty() => {
                Ok((column.trim().to_string(), pattern.to_string()))
            }
            _ => Err(format!("invalid filter {spec:?}, expected column=pattern")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_args() {
        let cli = Cli::parse_from([
            "mqm-scorecard",
            "score",
            "ratings.tsv",
            "--filter",
            "system=sysA",
            "--filter",
            "severity=Major",
            "--filter-expr",
            "docSegId < 10",
            "--seed",
            "42",
            "--mode",
            "json",
        ]);
        let Command::Score(args) = cli.command;
        assert_eq!(args.input, PathBuf::from("ratings.tsv"));
        assert_eq!(args.filters.len(), 2);
        assert_eq!(args.filter_expr.as_deref(), Some("docSegId < 10"));
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.mode, ReportMode::Json);
        assert_eq!(args.samples, DEFAULT_SAMPLE_BUDGET);
        assert_eq!(args.batch, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_parse_column_specs() {
        let specs = vec!["system=sysA".to_string(), "category=Accuracy/.*".to_string()];
        let parsed = parse_column_specs(&specs).unwrap();
        assert_eq!(parsed[0], ("system".to_string(), "sysA".to_string()));
        assert_eq!(parsed[1], ("category".to_string(), "Accuracy/.*".to_string()));
    }

    #[test]
    fn test_parse_column_specs_rejects_missing_eq() {
        assert!(parse_column_specs(&["system".to_string()]).is_err());
        assert!(parse_column_specs(&["=pattern".to_string()]).is_err());
    }

    #[test]
    fn test_pattern_may_contain_eq() {
        let parsed = parse_column_specs(&["target=a=b".to_string()]).unwrap();
        assert_eq!(parsed[0].1, "a=b");
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::input::IngestReport;
use crate::pipeline::stage4_scores::Stage4Output;
use crate::pipeline::stage5_bootstrap::SystemInterval;
use crate::report::json::render_summary_json;
use crate::report::text::render_summary_text;
use crate::report::{ScoreLine, SevCatLine, SummaryData, format_interval};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportMode {
    Text,
    Json,
    Both,
}

/// Assembles the final summary: score tables, confidence intervals stitched
/// onto the by-system lines, and the ingest/filter diagnostics.
pub fn build_summary(
    input_path: &Path,
    ingest: &IngestReport,
    n_segments: usize,
    n_filtered: usize,
    filter_error: Option<String>,
    scores: &Stage4Output,
    intervals: &[SystemInterval],
) -> SummaryData {
    let ci_by_system: BTreeMap<&str, String> = intervals
        .iter()
        .map(|si| (si.system.as_str(), format_interval(si.interval)))
        .collect();

    let by_system = scores
        .by_system
        .iter()
        .map(|agg| {
            let mut line = ScoreLine::from_aggregate(agg);
            line.ci = ci_by_system.get(agg.key.as_str()).cloned();
            line
        })
        .collect();

    SummaryData {
        tool_name: env!("CARGO_PKG_NAME").to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        input_path: input_path.display().to_string(),
        n_rows: ingest.n_rows,
        n_skipped: ingest.n_skipped,
        n_segments,
        n_filtered,
        ingest_errors: ingest
            .errors
            .iter()
            .map(|e| format!("line {}: {}", e.line, e.message))
            .collect(),
        filter_error,
        total: ScoreLine::from_aggregate(&scores.total),
        by_system,
        by_rater: scores.by_rater.iter().map(ScoreLine::from_aggregate).collect(),
        sevcats: scores.sevcats.iter().map(SevCatLine::from_count).collect(),
    }
}

/// Writes scorecard.txt / scorecard.json under `out`, or prints to stdout
/// when no output directory is given.
pub fn write_reports(
    data: &SummaryData,
    out: Option<&Path>,
    mode: ReportMode,
) -> Result<(), ReportError> {
    let want_text = matches!(mode, ReportMode::Text | ReportMode::Both);
    let want_json = matches!(mode, ReportMode::Json | ReportMode::Both);

    match out {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            if want_text {
                let path = dir.join("scorecard.txt");
                fs::write(&path, render_summary_text(data))?;
                info!(path = %path.display(), "wrote text report");
            }
            if want_json {
                let path = dir.join("scorecard.json");
                fs::write(&path, render_summary_json(data)?)?;
                info!(path = %path.display(), "wrote JSON report");
            }
        }
        None => {
            if want_text {
                print!("{}", render_summary_text(data));
            }
            if want_json {
                println!("{}", render_summary_json(data)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::model::row::tests::row;
    use crate::pipeline::stage4_scores::run_stage4;

    static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn make_temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        dir.push(format!("mqm_scorecard_report_{}_{}", std::process::id(), id));
        dir
    }

    fn summary() -> SummaryData {
        let rows = vec![
            row("sysA", "docX", 1, 1, "r1", "Accuracy/X", "Major"),
            row("sysB", "docX", 1, 1, "r1", "", "Minor"),
        ];
        let selected: Vec<usize> = (0..rows.len()).collect();
        let scores = run_stage4(&rows, &selected);
        let intervals = vec![
            SystemInterval {
                system: "sysA".to_string(),
                interval: Some((4.0, 6.0)),
            },
            SystemInterval {
                system: "sysB".to_string(),
                interval: None,
            },
        ];
        build_summary(
            Path::new("ratings.tsv"),
            &IngestReport {
                n_rows: 2,
                n_skipped: 0,
                errors: Vec::new(),
            },
            2,
            2,
            None,
            &scores,
            &intervals,
        )
    }

    #[test]
    fn test_intervals_stitched_onto_by_system() {
        let data = summary();
        let sys_a = data.by_system.iter().find(|l| l.key == "sysA").unwrap();
        assert_eq!(sys_a.ci.as_deref(), Some("[4.000, 6.000]"));
        let sys_b = data.by_system.iter().find(|l| l.key == "sysB").unwrap();
        assert_eq!(sys_b.ci.as_deref(), Some("N/A"));
        // CI only applies to systems.
        assert!(data.by_rater.iter().all(|l| l.ci.is_none()));
        assert!(data.total.ci.is_none());
    }

    #[test]
    fn test_ingest_errors_formatted_with_line_numbers() {
        let scores = run_stage4(&[], &[]);
        let data = build_summary(
            Path::new("ratings.tsv"),
            &IngestReport {
                n_rows: 0,
                n_skipped: 1,
                errors: vec![crate::input::RowError {
                    line: 7,
                    message: "too few fields".to_string(),
                }],
            },
            0,
            0,
            None,
            &scores,
            &[],
        );
        assert_eq!(data.ingest_errors, vec!["line 7: too few fields"]);
    }

    #[test]
    fn test_write_reports_both_modes() {
        let dir = make_temp_dir();
        write_reports(&summary(), Some(&dir), ReportMode::Both).unwrap();
        let text = fs::read_to_string(dir.join("scorecard.txt")).unwrap();
        assert!(text.contains("2. By system"));
        let json = fs::read_to_string(dir.join("scorecard.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["n_rows"], 2);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_reports_text_only() {
        let dir = make_temp_dir();
        write_reports(&summary(), Some(&dir), ReportMode::Text).unwrap();
        assert!(dir.join("scorecard.txt").exists());
        assert!(!dir.join("scorecard.json").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}

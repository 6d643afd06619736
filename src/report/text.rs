use std::fmt::Write;

use crate::report::{ScoreLine, SummaryData, format_score};

pub fn render_summary_text(data: &SummaryData) -> String {
    let mut out = String::new();

    out.push_str("MQM Scorecard\n");
    out.push_str("=============\n\n");
    let _ = writeln!(out, "Input: {}", data.input_path);
    let _ = writeln!(
        out,
        "Rows: {} ({} skipped), segments: {}, rows after filter: {}",
        data.n_rows, data.n_skipped, data.n_segments, data.n_filtered
    );
    if let Some(err) = &data.filter_error {
        let _ = writeln!(out, "FILTER ERROR (no rows pass until corrected): {err}");
    }
    out.push('\n');

    out.push_str("1. Total\n");
    render_table(&mut out, std::slice::from_ref(&data.total), "key");
    out.push('\n');

    out.push_str("2. By system\n");
    render_table(&mut out, &data.by_system, "system");
    out.push('\n');

    out.push_str("3. By rater\n");
    render_table(&mut out, &data.by_rater, "rater");
    out.push('\n');

    out.push_str("4. Severity x category x system\n");
    if data.sevcats.is_empty() {
        out.push_str("(none)\n");
    } else {
        let _ = writeln!(
            out,
            "{:<18} {:<32} {:<16} {:>7}",
            "severity", "category", "system", "count"
        );
        for line in &data.sevcats {
            let _ = writeln!(
                out,
                "{:<18} {:<32} {:<16} {:>7}",
                line.severity, line.category, line.system, line.count
            );
        }
    }
    out.push('\n');

    if !data.ingest_errors.is_empty() {
        out.push_str("5. Ingestion errors\n");
        for err in &data.ingest_errors {
            let _ = writeln!(out, "{err}");
        }
        out.push('\n');
    }

    out
}

fn render_table(out: &mut String, lines: &[ScoreLine], key_header: &str) {
    if lines.is_empty() {
        out.push_str("(no rows)\n");
        return;
    }
    let _ = writeln!(
        out,
        "{:<20} {:>6} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>12} {:>18}",
        key_header,
        "segs",
        "ratings",
        "score",
        "major",
        "minor",
        "trivial",
        "nontrans",
        "accuracy",
        "fluency",
        "uncat",
        "spanavg",
        "hotw(f/m)",
        "95% CI"
    );
    for line in lines {
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>12} {:>18}",
            line.key,
            line.num_segments,
            line.num_ratings,
            format_score(line.score),
            format_score(line.score_major),
            format_score(line.score_minor),
            format_score(line.score_trivial),
            format_score(line.score_non_translation),
            format_score(line.score_accuracy),
            format_score(line.score_fluency),
            format_score(line.score_uncategorized),
            line.error_span_avg
                .map(format_score)
                .unwrap_or_else(|| "-".to_string()),
            hotw_cell(line),
            line.ci.as_deref().unwrap_or("-"),
        );
    }
}

fn hotw_cell(line: &ScoreLine) -> String {
    match line.hotw_found_pct {
        Some(pct) => format!(
            "{}/{} ({:.1}%)",
            format_score(line.hotw_found),
            format_score(line.hotw_missed),
            pct
        ),
        None => "-".to_string(),
    }
}

pub mod json;
pub mod text;

use serde::Serialize;

use crate::model::row::severity_class;
use crate::pipeline::stage4_scores::{KeyAggregate, SevCatCount};

/// One line of an aggregate table (total / by-system / by-rater).
#[derive(Debug, Clone, Serialize)]
pub struct ScoreLine {
    pub key: String,
    pub num_segments: usize,
    pub num_ratings: usize,
    pub score: f64,
    pub score_major: f64,
    pub score_minor: f64,
    pub score_trivial: f64,
    pub score_non_translation: f64,
    pub score_accuracy: f64,
    pub score_fluency: f64,
    pub score_uncategorized: f64,
    /// Mean marked-span length over segments with errors; None when none.
    pub error_span_avg: Option<f64>,
    pub hotw_found: f64,
    pub hotw_missed: f64,
    /// found / (found + missed) * 100; None when no HOTW rows.
    pub hotw_found_pct: Option<f64>,
    /// "[lo, hi]" or "N/A"; appended per system once sampling completes.
    pub ci: Option<String>,
}

impl ScoreLine {
    pub fn from_aggregate(agg: &KeyAggregate) -> Self {
        let s = &agg.stats;
        let error_span_avg = if s.segments_with_errors > 0.0 {
            Some(s.error_span_total / s.segments_with_errors)
        } else {
            None
        };
        let hotw_total = s.hotw_found + s.hotw_missed;
        let hotw_found_pct = if hotw_total > 0.0 {
            Some(s.hotw_found / hotw_total * 100.0)
        } else {
            None
        };
        Self {
            key: agg.key.clone(),
            num_segments: agg.num_segments,
            num_ratings: agg.num_ratings,
            score: s.score,
            score_major: s.score_major,
            score_minor: s.score_minor,
            score_trivial: s.score_trivial,
            score_non_translation: s.score_non_translation,
            score_accuracy: s.score_accuracy,
            score_fluency: s.score_fluency,
            score_uncategorized: s.score_uncategorized,
            error_span_avg,
            hotw_found: s.hotw_found,
            hotw_missed: s.hotw_missed,
            hotw_found_pct,
            ci: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SevCatLine {
    pub severity: String,
    /// Span-markup class for this severity ("major"/"minor"), when known.
    pub class: Option<&'static str>,
    pub category: String,
    pub system: String,
    pub count: usize,
}

impl SevCatLine {
    pub fn from_count(c: &SevCatCount) -> Self {
        Self {
            class: severity_class(&c.severity),
            severity: c.severity.clone(),
            category: c.category.clone(),
            system: c.system.clone(),
            count: c.count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub tool_name: String,
    pub tool_version: String,
    pub input_path: String,

    pub n_rows: usize,
    pub n_skipped: usize,
    pub n_segments: usize,
    pub n_filtered: usize,

    pub ingest_errors: Vec<String>,
    pub filter_error: Option<String>,

    pub total: ScoreLine,
    pub by_system: Vec<ScoreLine>,
    pub by_rater: Vec<ScoreLine>,
    pub sevcats: Vec<SevCatLine>,
}

/// Score fields render at 3 decimals; the +infinity "unscored" sentinel
/// renders as "-".
pub fn format_score(v: f64) -> String {
    if v.is_infinite() {
        "-".to_string()
    } else {
        format!("{v:.3}")
    }
}

pub fn format_interval(interval: Option<(f64, f64)>) -> String {
    match interval {
        Some((lo, hi)) => format!("[{}, {}]", format_score(lo), format_score(hi)),
        None => "N/A".to_string(),
    }
}

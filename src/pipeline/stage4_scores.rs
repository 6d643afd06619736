use std::collections::BTreeMap;

use crate::model::row::RatingRow;
use crate::model::stats::{RaterStats, mean_of};

/// Finest aggregation unit: one translated segment instance of one system.
type SegUnit = (String, String, u32, u32);

/// A RaterStats shape at a coarser grain: the mean over contributing rater
/// records, one per key (total / system / rater). Recomputed per refresh.
#[derive(Debug, Clone)]
pub struct KeyAggregate {
    pub key: String,
    pub stats: RaterStats,
    pub num_segments: usize,
    /// Rater records summed across segments, pre-averaging.
    pub num_ratings: usize,
}

impl KeyAggregate {
    /// Sentinel for a key with no scored segments; sorts after every
    /// finite-scored key.
    fn unscored(key: String) -> Self {
        let mut stats = RaterStats::default();
        stats.score = f64::INFINITY;
        Self {
            key,
            stats,
            num_segments: 0,
            num_ratings: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SevCatCount {
    pub severity: String,
    pub category: String,
    pub system: String,
    pub count: usize,
}

#[derive(Debug)]
pub struct Stage4Output {
    pub total: KeyAggregate,
    /// Ascending by mean score, ties stable, unscored keys last.
    pub by_system: Vec<KeyAggregate>,
    pub by_rater: Vec<KeyAggregate>,
    pub sevcats: Vec<SevCatCount>,
}

/// Per-rater accumulation and key-wise averaging over the filtered rows.
pub fn run_stage4(rows: &[RatingRow], selected: &[usize]) -> Stage4Output {
    let units = accumulate_units(rows, selected);

    let total = aggregate_key("total".to_string(), units.values());

    let mut by_system_units: BTreeMap<&str, Vec<&BTreeMap<String, RaterStats>>> = BTreeMap::new();
    let mut by_rater_units: BTreeMap<&str, Vec<RaterStats>> = BTreeMap::new();
    for (unit, raters) in &units {
        by_system_units.entry(&unit.0).or_default().push(raters);
        for (rater, record) in raters {
            by_rater_units.entry(rater).or_default().push(*record);
        }
    }

    let mut by_system: Vec<KeyAggregate> = by_system_units
        .into_iter()
        .map(|(system, segs)| aggregate_key(system.to_string(), segs.into_iter()))
        .collect();
    // For a rater key, each rated segment contributes that rater's record
    // alone, so the per-segment mean is the record itself.
    let mut by_rater: Vec<KeyAggregate> = by_rater_units
        .into_iter()
        .map(|(rater, records)| {
            let derived: Vec<RaterStats> = records
                .iter()
                .map(|r| {
                    let mut r = *r;
                    r.derive_scores();
                    r
                })
                .collect();
            KeyAggregate {
                key: rater.to_string(),
                num_segments: derived.len(),
                num_ratings: derived.len(),
                stats: mean_of(&derived),
            }
        })
        .collect();

    sort_ascending(&mut by_system);
    sort_ascending(&mut by_rater);

    Stage4Output {
        total,
        by_system,
        by_rater,
        sevcats: count_sevcats(rows, selected),
    }
}

/// One RaterStats per (system, segment, rater), accumulated over every
/// selected annotation row.
fn accumulate_units(
    rows: &[RatingRow],
    selected: &[usize],
) -> BTreeMap<SegUnit, BTreeMap<String, RaterStats>> {
    let mut units: BTreeMap<SegUnit, BTreeMap<String, RaterStats>> = BTreeMap::new();
    for &idx in selected {
        let row = &rows[idx];
        let unit = (
            row.system.clone(),
            row.document.clone(),
            row.doc_seg_id,
            row.global_seg_id,
        );
        units
            .entry(unit)
            .or_default()
            .entry(row.rater.clone())
            .or_default()
            .add_error_stats(&row.category, &row.severity, row.span_chars);
    }
    units
}

/// Two-level mean: per segment across its raters (scores derived first),
/// then across segments. Zero segments yields the +infinity sentinel.
fn aggregate_key<'a>(
    key: String,
    segments: impl Iterator<Item = &'a BTreeMap<String, RaterStats>>,
) -> KeyAggregate {
    let mut seg_means = Vec::new();
    let mut num_ratings = 0usize;
    for raters in segments {
        let derived: Vec<RaterStats> = raters
            .values()
            .map(|r| {
                let mut r = *r;
                r.derive_scores();
                r
            })
            .collect();
        num_ratings += derived.len();
        seg_means.push(mean_of(&derived));
    }
    if seg_means.is_empty() {
        return KeyAggregate::unscored(key);
    }
    KeyAggregate {
        key,
        num_segments: seg_means.len(),
        num_ratings,
        stats: mean_of(&seg_means),
    }
}

fn sort_ascending(keys: &mut [KeyAggregate]) {
    keys.sort_by(|a, b| a.stats.score.total_cmp(&b.stats.score));
}

fn count_sevcats(rows: &[RatingRow], selected: &[usize]) -> Vec<SevCatCount> {
    let mut counts: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for &idx in selected {
        let row = &rows[idx];
        let key = (
            row.severity.trim().to_lowercase(),
            row.category.trim().to_lowercase(),
            row.system.clone(),
        );
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((severity, category, system), count)| SevCatCount {
            severity,
            category,
            system,
            count,
        })
        .collect()
}

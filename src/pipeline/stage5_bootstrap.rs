use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::row::RatingRow;
use crate::model::stats::{RaterStats, mean_of};

pub const DEFAULT_SAMPLE_BUDGET: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 200;
/// Systems with fewer post-filter documents get "N/A" instead of an interval.
pub const MIN_CI_DOCS: usize = 5;

/// Shared cancellation flag. A filter change cancels the in-flight run; the
/// run discards its buffers on the next batch boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct DocScore {
    pub document: String,
    pub score: f64,
    pub seg_count: usize,
}

#[derive(Debug, Clone)]
pub struct SystemDocScores {
    pub system: String,
    pub docs: Vec<DocScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    InProgress,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SystemInterval {
    pub system: String,
    /// (2.5th, 97.5th) percentile bounds, or None when under MIN_CI_DOCS.
    pub interval: Option<(f64, f64)>,
}

/// Per-system, per-document mean scores over the filtered rows: the key-wise
/// aggregate restricted to one document's segments, with its segment count.
pub fn prepare_doc_scores(rows: &[RatingRow], selected: &[usize]) -> Vec<SystemDocScores> {
    // system -> document -> segment -> rater -> stats
    type SegKey = (u32, u32);
    let mut tree: BTreeMap<String, BTreeMap<String, BTreeMap<SegKey, BTreeMap<String, RaterStats>>>> =
        BTreeMap::new();
    for &idx in selected {
        let row = &rows[idx];
        tree.entry(row.system.clone())
            .or_default()
            .entry(row.document.clone())
            .or_default()
            .entry((row.doc_seg_id, row.global_seg_id))
            .or_default()
            .entry(row.rater.clone())
            .or_default()
            .add_error_stats(&row.category, &row.severity, row.span_chars);
    }

    tree.into_iter()
        .map(|(system, docs)| SystemDocScores {
            system,
            docs: docs
                .into_iter()
                .map(|(document, segs)| {
                    let seg_means: Vec<RaterStats> = segs
                        .values()
                        .map(|raters| {
                            let derived: Vec<RaterStats> = raters
                                .values()
                                .map(|r| {
                                    let mut r = *r;
                                    r.derive_scores();
                                    r
                                })
                                .collect();
                            mean_of(&derived)
                        })
                        .collect();
                    DocScore {
                        document,
                        score: mean_of(&seg_means).score,
                        seg_count: seg_means.len(),
                    }
                })
                .collect(),
        })
        .collect()
}

/// Incremental document-level bootstrap. Sampling advances in fixed batches
/// per `step()` call; the cancel token is honored between batches.
pub struct BootstrapRun {
    systems: Vec<SystemDocScores>,
    buffers: Vec<Vec<f64>>,
    sample_budget: usize,
    batch_size: usize,
    rng: StdRng,
    cancel: CancelToken,
}

impl BootstrapRun {
    pub fn new(
        systems: Vec<SystemDocScores>,
        sample_budget: usize,
        batch_size: usize,
        seed: Option<u64>,
        cancel: CancelToken,
    ) -> Self {
        let buffers = vec![Vec::with_capacity(sample_budget); systems.len()];
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            systems,
            buffers,
            sample_budget,
            batch_size: batch_size.max(1),
            rng,
            cancel,
        }
    }

    /// Draws up to one batch of samples for every unfinished system.
    /// Cancellation discards every accumulated buffer.
    pub fn step(&mut self) -> StepOutcome {
        if self.cancel.is_cancelled() {
            for buffer in &mut self.buffers {
                buffer.clear();
            }
            return StepOutcome::Cancelled;
        }
        let mut all_done = true;
        for (sys_idx, system) in self.systems.iter().enumerate() {
            let buffer = &mut self.buffers[sys_idx];
            if system.docs.is_empty() || buffer.len() >= self.sample_budget {
                continue;
            }
            let remaining = self.sample_budget - buffer.len();
            for _ in 0..remaining.min(self.batch_size) {
                buffer.push(resample_once(&mut self.rng, &system.docs));
            }
            if buffer.len() < self.sample_budget {
                all_done = false;
            }
        }
        if all_done {
            StepOutcome::Complete
        } else {
            StepOutcome::InProgress
        }
    }

    pub fn run_to_completion(&mut self) -> StepOutcome {
        loop {
            match self.step() {
                StepOutcome::InProgress => continue,
                outcome => return outcome,
            }
        }
    }

    /// Percentile intervals once the budget is reached. Systems with fewer
    /// than MIN_CI_DOCS documents report None.
    pub fn intervals(&self) -> Vec<SystemInterval> {
        self.systems
            .iter()
            .zip(&self.buffers)
            .map(|(system, buffer)| {
                let interval = if system.docs.len() < MIN_CI_DOCS
                    || buffer.len() < self.sample_budget
                    || buffer.is_empty()
                {
                    None
                } else {
                    let mut sorted = buffer.clone();
                    sorted.sort_by(f64::total_cmp);
                    let n = sorted.len();
                    Some((sorted[n / 40], sorted[n - n / 40 - 1]))
                };
                SystemInterval {
                    system: system.system.clone(),
                    interval,
                }
            })
            .collect()
    }
}

/// One bootstrap sample: D documents drawn with replacement, combined as a
/// segment-count-weighted mean.
fn resample_once(rng: &mut StdRng, docs: &[DocScore]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight = 0.0;
    for _ in 0..docs.len() {
        let doc = &docs[rng.gen_range(0..docs.len())];
        weighted_sum += doc.score * doc.seg_count as f64;
        weight += doc.seg_count as f64;
    }
    weighted_sum / weight
}

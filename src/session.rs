use tracing::warn;

use crate::filter::FilterSet;
use crate::model::row::RatingRow;
use crate::pipeline::stage2_aggregate::{Stage2Output, run_stage2};
use crate::pipeline::stage3_filter::run_stage3;
use crate::pipeline::stage5_bootstrap::{BootstrapRun, CancelToken, prepare_doc_scores};

/// Explicit context object for one loaded dataset: rows, segment aggregates,
/// the current filters, and the in-flight bootstrap token. Every filter or
/// data change invalidates and restarts; stale bootstrap samples are never
/// mixed with a new query's samples.
pub struct Session {
    data: Stage2Output,
    filters: FilterSet,
    filter_error: Option<String>,
    cancel: CancelToken,
}

impl Session {
    pub fn new(rows: Vec<RatingRow>) -> Self {
        Self {
            data: run_stage2(rows),
            filters: FilterSet::default(),
            filter_error: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn data(&self) -> &Stage2Output {
        &self.data
    }

    pub fn filter_error(&self) -> Option<&str> {
        self.filter_error.as_deref()
    }

    /// Replaces the dataset; aggregates are rebuilt from scratch and any
    /// in-flight bootstrap run is cancelled.
    pub fn reload(&mut self, rows: Vec<RatingRow>) {
        self.invalidate();
        self.data = run_stage2(rows);
    }

    /// Installs new filters. A compile failure keeps the error visible and
    /// fails closed: no rows pass until the filter is corrected.
    pub fn set_filters(&mut self, column_specs: &[(String, String)], expr: Option<&str>) {
        self.invalidate();
        match FilterSet::compile(column_specs, expr) {
            Ok(filters) => {
                self.filters = filters;
                self.filter_error = None;
            }
            Err(err) => {
                warn!(error = %err, "filter rejected");
                self.filters = FilterSet::default();
                self.filter_error = Some(err.to_string());
            }
        }
    }

    /// Indices of rows passing the current filters. Expression evaluation
    /// failures are recorded and yield an empty selection (fail closed).
    pub fn select(&mut self) -> Vec<usize> {
        if self.filter_error.is_some() {
            return Vec::new();
        }
        match run_stage3(&self.data, &self.filters) {
            Ok(selected) => selected,
            Err(err) => {
                warn!(error = %err, "filter failed during evaluation");
                self.filter_error = Some(err.to_string());
                Vec::new()
            }
        }
    }

    /// Prepares per-document scores for the given selection and starts a new
    /// bootstrap run bound to this session's cancel token. Any previous run
    /// observes the old (now cancelled) token and discards its buffers.
    pub fn start_bootstrap(
        &mut self,
        selected: &[usize],
        sample_budget: usize,
        batch_size: usize,
        seed: Option<u64>,
    ) -> BootstrapRun {
        self.cancel = CancelToken::new();
        let doc_scores = prepare_doc_scores(&self.data.rows, selected);
        BootstrapRun::new(
            doc_scores,
            sample_budget,
            batch_size,
            seed,
            self.cancel.clone(),
        )
    }

    fn invalidate(&mut self) {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
    }
}

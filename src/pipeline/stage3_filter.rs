use crate::filter::expr::EvalContext;
use crate::filter::{FilterError, FilterSet};
use crate::pipeline::stage2_aggregate::Stage2Output;

/// Applies both filter stages over every row and returns the indices of
/// passing rows. Any expression failure aborts the pass so the caller can
/// fail closed (no rows pass until the filter is corrected).
pub fn run_stage3(data: &Stage2Output, filters: &FilterSet) -> Result<Vec<usize>, FilterError> {
    let mut selected = Vec::new();
    for (idx, row) in data.rows.iter().enumerate() {
        let ctx = EvalContext {
            row,
            segment: &data.segments[data.seg_of_row[idx]],
        };
        if filters.row_passes(&ctx)? {
            selected.push(idx);
        }
    }
    Ok(selected)
}

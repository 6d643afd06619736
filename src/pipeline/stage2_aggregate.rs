use crate::model::row::{RatingRow, canonical_sort};
use crate::model::segment::{SegmentAggregate, build_segments};

#[derive(Debug)]
pub struct Stage2Output {
    /// Canonically sorted rows; all downstream indices refer to this order.
    pub rows: Vec<RatingRow>,
    pub segments: Vec<SegmentAggregate>,
    /// Index into `segments` for each row.
    pub seg_of_row: Vec<usize>,
}

/// Sort, then attach each row to its segment aggregate in one linear pass.
pub fn run_stage2(mut rows: Vec<RatingRow>) -> Stage2Output {
    canonical_sort(&mut rows);
    let (segments, seg_of_row) = build_segments(&rows);
    Stage2Output {
        rows,
        segments,
        seg_of_row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row::tests::row;

    #[test]
    fn test_stage2_sorts_and_attaches() {
        let rows = vec![
            row("sysB", "docX", 2, 2, "r1", "", "Minor"),
            row("sysA", "docX", 1, 1, "r1", "", "Major"),
            row("sysA", "docX", 2, 2, "r2", "", "Minor"),
        ];
        let out = run_stage2(rows);
        assert_eq!(out.rows[0].global_seg_id, 1);
        assert_eq!(out.segments.len(), 2);
        assert_eq!(out.seg_of_row, vec![0, 1, 1]);
    }

    #[test]
    fn test_stage2_empty_input() {
        let out = run_stage2(Vec::new());
        assert!(out.rows.is_empty());
        assert!(out.segments.is_empty());
        assert!(out.seg_of_row.is_empty());
    }
}

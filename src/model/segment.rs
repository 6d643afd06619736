use std::collections::BTreeMap;

use crate::model::row::RatingRow;

/// Per-segment multiset views of the ratings it received. Each mapping is
/// keyed by system or rater id and keeps values in append (= row) order;
/// duplicates matter for counts. Built once per full pass over sorted rows,
/// immutable afterwards, rebuilt from scratch on reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentAggregate {
    pub document: String,
    pub doc_seg_id: u32,
    pub global_seg_id: u32,
    pub categories_by_system: BTreeMap<String, Vec<String>>,
    pub categories_by_rater: BTreeMap<String, Vec<String>>,
    pub severities_by_system: BTreeMap<String, Vec<String>>,
    pub severities_by_rater: BTreeMap<String, Vec<String>>,
    pub sevcats_by_system: BTreeMap<String, Vec<String>>,
    pub sevcats_by_rater: BTreeMap<String, Vec<String>>,
}

impl SegmentAggregate {
    fn new(row: &RatingRow) -> Self {
        Self {
            document: row.document.clone(),
            doc_seg_id: row.doc_seg_id,
            global_seg_id: row.global_seg_id,
            ..Self::default()
        }
    }

    /// Mappings are created lazily; unknown systems/raters are never errors.
    fn note_row(&mut self, row: &RatingRow) {
        let sevcat = if row.category.is_empty() {
            row.severity.clone()
        } else {
            format!("{}/{}", row.severity, row.category)
        };
        append(&mut self.categories_by_system, &row.system, &row.category);
        append(&mut self.categories_by_rater, &row.rater, &row.category);
        append(&mut self.severities_by_system, &row.system, &row.severity);
        append(&mut self.severities_by_rater, &row.rater, &row.severity);
        append(&mut self.sevcats_by_system, &row.system, &sevcat);
        append(&mut self.sevcats_by_rater, &row.rater, &sevcat);
    }

    /// Named lookup used by the expression filter's `segment.<map>` access.
    pub fn map(&self, name: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        match name {
            "categories_by_system" => Some(&self.categories_by_system),
            "categories_by_rater" => Some(&self.categories_by_rater),
            "severities_by_system" => Some(&self.severities_by_system),
            "severities_by_rater" => Some(&self.severities_by_rater),
            "sevcats_by_system" => Some(&self.sevcats_by_system),
            "sevcats_by_rater" => Some(&self.sevcats_by_rater),
            _ => None,
        }
    }
}

fn append(map: &mut BTreeMap<String, Vec<String>>, key: &str, value: &str) {
    map.entry(key.to_string())
        .or_default()
        .push(value.to_string());
}

/// One linear pass over canonically sorted rows: one aggregate per maximal
/// run of equal (document, doc_seg_id, global_seg_id), plus each row's index
/// into the returned aggregates.
pub fn build_segments(rows: &[RatingRow]) -> (Vec<SegmentAggregate>, Vec<usize>) {
    let mut segments: Vec<SegmentAggregate> = Vec::new();
    let mut seg_of_row = Vec::with_capacity(rows.len());

    for row in rows {
        let start_new = match segments.last() {
            Some(last) => {
                (last.document.as_str(), last.doc_seg_id, last.global_seg_id) != row.segment_key()
            }
            None => true,
        };
        if start_new {
            segments.push(SegmentAggregate::new(row));
        }
        let idx = segments.len() - 1;
        segments[idx].note_row(row);
        seg_of_row.push(idx);
    }

    (segments, seg_of_row)
}

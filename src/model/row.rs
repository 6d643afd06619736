use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One human judgment of one translated segment. Immutable after ingestion;
/// the owning segment aggregate is attached externally by index.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRow {
    pub system: String,
    pub document: String,
    pub doc_seg_id: u32,
    pub global_seg_id: u32,
    pub source: String,
    pub target: String,
    pub rater: String,
    pub category: String,
    pub severity: String,
    pub metadata: BTreeMap<String, String>,
    /// Total characters inside `<v>...</v>` marked spans of source + target.
    pub span_chars: usize,
}

impl RatingRow {
    /// Segment identity: rows sharing this triple belong to one segment.
    pub fn segment_key(&self) -> (&str, u32, u32) {
        (&self.document, self.doc_seg_id, self.global_seg_id)
    }
}

/// Total order required before segment aggregation: ids numerically, strings
/// lexicographically, ties falling through in this exact sequence.
pub fn canonical_cmp(a: &RatingRow, b: &RatingRow) -> Ordering {
    a.global_seg_id
        .cmp(&b.global_seg_id)
        .then_with(|| a.doc_seg_id.cmp(&b.doc_seg_id))
        .then_with(|| a.document.cmp(&b.document))
        .then_with(|| a.system.cmp(&b.system))
        .then_with(|| a.rater.cmp(&b.rater))
        .then_with(|| a.severity.cmp(&b.severity))
        .then_with(|| a.category.cmp(&b.category))
}

pub fn canonical_sort(rows: &mut [RatingRow]) {
    rows.sort_by(canonical_cmp);
}

/// Markup class for highlighted error spans, keyed by severity. The rendering
/// collaborator styles "major" and "minor" spans differently.
pub fn severity_class(severity: &str) -> Option<&'static str> {
    let sev = severity.trim().to_lowercase();
    if sev.starts_with("major")
        || sev.starts_with("critical")
        || sev.starts_with("non-translation")
        || sev.starts_with("non_translation")
    {
        Some("major")
    } else if sev.starts_with("minor") || sev.starts_with("trivial") {
        Some("minor")
    } else {
        None
    }
}

/// Fixed MQM rubric weights. Statistical policy, not configuration.
pub const MAJOR_WEIGHT: f64 = 5.0;
pub const MINOR_WEIGHT: f64 = 1.0;
pub const NON_TRANSLATION_WEIGHT: f64 = 25.0;
pub const TRIVIAL_WEIGHT: f64 = 0.1;

/// Count/score record for one rater's annotations on one segment. The same
/// shape is reused at coarser grains (per system, per rater, total), where
/// every field holds a mean instead of a sum, so fields are f64 throughout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RaterStats {
    pub major: f64,
    pub major_accuracy: f64,
    pub major_fluency: f64,
    pub major_uncategorized: f64,
    pub minor: f64,
    pub minor_accuracy: f64,
    pub minor_fluency: f64,
    pub minor_uncategorized: f64,
    pub trivial: f64,
    pub non_translation: f64,
    pub unrateable: f64,

    pub score: f64,
    pub score_major: f64,
    pub score_minor: f64,
    pub score_accuracy: f64,
    pub score_fluency: f64,
    pub score_uncategorized: f64,
    pub score_non_translation: f64,
    pub score_trivial: f64,

    pub error_span_total: f64,
    pub segments_with_errors: f64,
    pub hotw_found: f64,
    pub hotw_missed: f64,
}

impl RaterStats {
    /// Folds one annotation into the record. Rules apply in priority order;
    /// severities outside the known vocabulary update span telemetry only.
    pub fn add_error_stats(&mut self, category: &str, severity: &str, span_chars: usize) {
        let category = category.trim().to_lowercase();
        let severity = severity.trim().to_lowercase();

        if category == "no-error" || category == "no_error" {
            return;
        }
        if severity == "hotw-test" || severity == "hotw_test" {
            if category == "found" {
                self.hotw_found += 1.0;
            } else if category == "missed" {
                self.hotw_missed += 1.0;
            }
            return;
        }
        if severity == "unrateable" {
            self.unrateable += 1.0;
            return;
        }
        if severity == "neutral" {
            return;
        }
        if span_chars > 0 {
            self.segments_with_errors += 1.0;
            self.error_span_total += span_chars as f64;
        }
        if is_non_translation(&severity) || is_non_translation(&category) {
            self.non_translation += 1.0;
            return;
        }
        if severity == "trivial"
            || (severity == "minor" && category.starts_with("fluency/punctuation"))
        {
            self.trivial += 1.0;
            return;
        }
        if severity == "major" {
            self.major += 1.0;
            if category.is_empty() || category == "other" {
                self.major_uncategorized += 1.0;
            } else if category.starts_with("accuracy") || category.starts_with("terminology") {
                self.major_accuracy += 1.0;
            } else {
                self.major_fluency += 1.0;
            }
            return;
        }
        if severity == "minor" {
            self.minor += 1.0;
            if category.is_empty() || category == "other" {
                self.minor_uncategorized += 1.0;
            } else if category.starts_with("accuracy") || category.starts_with("terminology") {
                self.minor_accuracy += 1.0;
            } else {
                self.minor_fluency += 1.0;
            }
        }
    }

    /// Applies the rubric once per record, before any aggregation.
    pub fn derive_scores(&mut self) {
        self.score_major = self.major * MAJOR_WEIGHT;
        self.score_minor = self.minor * MINOR_WEIGHT;
        self.score_non_translation = self.non_translation * NON_TRANSLATION_WEIGHT;
        self.score_trivial = self.trivial * TRIVIAL_WEIGHT;
        self.score =
            self.score_major + self.score_minor + self.score_non_translation + self.score_trivial;
        self.score_accuracy = self.major_accuracy * MAJOR_WEIGHT + self.minor_accuracy;
        self.score_fluency = self.major_fluency * MAJOR_WEIGHT + self.minor_fluency;
        self.score_uncategorized =
            self.major_uncategorized * MAJOR_WEIGHT + self.minor_uncategorized;
    }

    pub fn add_assign(&mut self, other: &RaterStats) {
        self.major += other.major;
        self.major_accuracy += other.major_accuracy;
        self.major_fluency += other.major_fluency;
        self.major_uncategorized += other.major_uncategorized;
        self.minor += other.minor;
        self.minor_accuracy += other.minor_accuracy;
        self.minor_fluency += other.minor_fluency;
        self.minor_uncategorized += other.minor_uncategorized;
        self.trivial += other.trivial;
        self.non_translation += other.non_translation;
        self.unrateable += other.unrateable;
        self.score += other.score;
        self.score_major += other.score_major;
        self.score_minor += other.score_minor;
        self.score_accuracy += other.score_accuracy;
        self.score_fluency += other.score_fluency;
        self.score_uncategorized += other.score_uncategorized;
        self.score_non_translation += other.score_non_translation;
        self.score_trivial += other.score_trivial;
        self.error_span_total += other.error_span_total;
        self.segments_with_errors += other.segments_with_errors;
        self.hotw_found += other.hotw_found;
        self.hotw_missed += other.hotw_missed;
    }

    pub fn scale(&mut self, factor: f64) {
        self.major *= factor;
        self.major_accuracy *= factor;
        self.major_fluency *= factor;
        self.major_uncategorized *= factor;
        self.minor *= factor;
        self.minor_accuracy *= factor;
        self.minor_fluency *= factor;
        self.minor_uncategorized *= factor;
        self.trivial *= factor;
        self.non_translation *= factor;
        self.unrateable *= factor;
        self.score *= factor;
        self.score_major *= factor;
        self.score_minor *= factor;
        self.score_accuracy *= factor;
        self.score_fluency *= factor;
        self.score_uncategorized *= factor;
        self.score_non_translation *= factor;
        self.score_trivial *= factor;
        self.error_span_total *= factor;
        self.segments_with_errors *= factor;
        self.hotw_found *= factor;
        self.hotw_missed *= factor;
    }
}

/// Arithmetic mean of every field. Callers guarantee a non-empty slice.
pub fn mean_of(records: &[RaterStats]) -> RaterStats {
    let mut out = RaterStats::default();
    for r in records {
        out.add_assign(r);
    }
    out.scale(1.0 / records.len() as f64);
    out
}

fn is_non_translation(field: &str) -> bool {
    field.starts_with("non-translation") || field.starts_with("non_translation")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn derived(category: &str, severity: &str, span: usize) -> RaterStats {
        let mut s = RaterStats::default();
        s.add_error_stats(category, severity, span);
        s.derive_scores();
        s
    }

    fn assert_score_identities(s: &RaterStats) {
        let total = s.score_major + s.score_minor + s.score_non_translation + s.score_trivial;
        assert!((total - s.score).abs() < TOL);
        let cats = s.score_accuracy + s.score_fluency + s.score_uncategorized;
        assert!((cats - (s.score_major + s.score_minor)).abs() < TOL);
    }

    #[test]
    fn test_major_accuracy_weighting() {
        let s = derived("accuracy/mistranslation", "major", 0);
        assert_eq!(s.major, 1.0);
        assert_eq!(s.major_accuracy, 1.0);
        assert!((s.score - 5.0).abs() < TOL);
        assert!((s.score_accuracy - 5.0).abs() < TOL);
        assert_eq!(s.minor, 0.0);
        assert_eq!(s.trivial, 0.0);
        assert_eq!(s.non_translation, 0.0);
        assert_eq!(s.score_fluency, 0.0);
        assert_score_identities(&s);
    }

    #[test]
    fn test_no_error_contributes_nothing() {
        for sev in ["major", "minor", "trivial", "unrateable", "hotw-test"] {
            let s = derived("no-error", sev, 17);
            assert_eq!(s, derived("no_error", sev, 17));
            assert_eq!(s.score, 0.0);
            assert_eq!(s.error_span_total, 0.0);
            assert_eq!(s.segments_with_errors, 0.0);
        }
    }

    #[test]
    fn test_hotw_rows_never_affect_score() {
        let mut s = RaterStats::default();
        s.add_error_stats("found", "hotw-test", 9);
        s.add_error_stats("missed", "hotw_test", 9);
        s.derive_scores();
        assert_eq!(s.hotw_found, 1.0);
        assert_eq!(s.hotw_missed, 1.0);
        assert_eq!(s.score, 0.0);
        assert_eq!(s.error_span_total, 0.0);
    }

    #[test]
    fn test_unrateable_and_neutral() {
        let s = derived("accuracy", "unrateable", 4);
        assert_eq!(s.unrateable, 1.0);
        assert_eq!(s.error_span_total, 0.0);
        let s = derived("accuracy", "neutral", 4);
        assert_eq!(s, derived("", "neutral", 0));
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn test_non_translation_prefix_in_either_field() {
        let a = derived("", "Non-Translation!", 3);
        assert_eq!(a.non_translation, 1.0);
        assert!((a.score - 25.0).abs() < TOL);
        assert_eq!(a.error_span_total, 3.0);
        let b = derived("non_translation", "major", 0);
        assert_eq!(b.non_translation, 1.0);
        assert_eq!(b.major, 0.0);
        assert_score_identities(&a);
    }

    #[test]
    fn test_minor_punctuation_downgrades_to_trivial() {
        let s = derived("Fluency/Punctuation", "Minor", 1);
        assert_eq!(s.trivial, 1.0);
        assert_eq!(s.minor, 0.0);
        assert!((s.score - TRIVIAL_WEIGHT).abs() < TOL);
        let s = derived("Fluency/Grammar", "Minor", 1);
        assert_eq!(s.minor, 1.0);
        assert_eq!(s.minor_fluency, 1.0);
    }

    #[test]
    fn test_major_minor_category_buckets() {
        assert_eq!(derived("", "major", 0).major_uncategorized, 1.0);
        assert_eq!(derived("other", "major", 0).major_uncategorized, 1.0);
        assert_eq!(derived("terminology/term", "major", 0).major_accuracy, 1.0);
        assert_eq!(derived("style/awkward", "major", 0).major_fluency, 1.0);
        assert_eq!(derived("accuracy/omission", "minor", 0).minor_accuracy, 1.0);
        assert_eq!(derived("other", "minor", 0).minor_uncategorized, 1.0);
        assert_eq!(derived("style/awkward", "minor", 0).minor_fluency, 1.0);
    }

    #[test]
    fn test_unknown_severity_updates_span_telemetry_only() {
        let s = derived("accuracy", "somewhat-bad", 12);
        assert_eq!(s.error_span_total, 12.0);
        assert_eq!(s.segments_with_errors, 1.0);
        assert_eq!(
            s.major + s.minor + s.trivial + s.non_translation + s.unrateable,
            0.0
        );
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn test_score_identities_over_mixed_record() {
        let mut s = RaterStats::default();
        s.add_error_stats("accuracy/omission", "major", 4);
        s.add_error_stats("style/awkward", "minor", 2);
        s.add_error_stats("", "major", 1);
        s.add_error_stats("fluency/punctuation", "minor", 1);
        s.add_error_stats("non-translation", "major", 8);
        s.derive_scores();
        assert_score_identities(&s);
        assert!((s.score - (2.0 * 5.0 + 1.0 + 25.0 + 0.1)).abs() < TOL);
    }

    #[test]
    fn test_mean_of_records() {
        let mut a = RaterStats::default();
        a.add_error_stats("accuracy", "major", 0);
        a.derive_scores();
        let mut b = RaterStats::default();
        b.add_error_stats("", "minor", 0);
        b.derive_scores();
        let m = mean_of(&[a, b]);
        assert!((m.score - 3.0).abs() < TOL);
        assert!((m.major - 0.5).abs() < TOL);
        assert!((m.minor - 0.5).abs() < TOL);
    }
}

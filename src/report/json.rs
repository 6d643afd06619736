use crate::report::SummaryData;

/// JSON rendering of the full summary. The +infinity "unscored" sentinel
/// serializes as null, matching the "-" of the text renderer.
pub fn render_summary_json(data: &SummaryData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

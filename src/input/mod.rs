use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::row::RatingRow;

/// Columns: system, doc, docSegId, globalSegId, source, target, rater,
/// category, severity, metadata (optional JSON object or legacy plain note).
const MIN_FIELDS: usize = 9;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ratings file is empty: {0}")]
    Empty(String),
}

/// One malformed row, reported in aggregate; the rest of the load continues.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub n_rows: usize,
    pub n_skipped: usize,
    pub errors: Vec<RowError>,
}

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, IngestError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn load_ratings(path: &Path) -> Result<(Vec<RatingRow>, IngestReport), IngestError> {
    let mut reader = open_maybe_gz(path)?;
    let mut rows = Vec::new();
    let mut report = IngestReport::default();
    let mut buf = String::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }
        if line_no == 1 && is_header(line) {
            continue;
        }
        match parse_row(line) {
            Ok(row) => {
                rows.push(row);
                report.n_rows += 1;
            }
            Err(message) => {
                warn!(line = line_no, %message, "skipping malformed rating row");
                report.n_skipped += 1;
                report.errors.push(RowError {
                    line: line_no,
                    message,
                });
            }
        }
    }

    if line_no == 0 {
        return Err(IngestError::Empty(path.display().to_string()));
    }
    info!(
        rows = report.n_rows,
        skipped = report.n_skipped,
        path = %path.display(),
        "loaded ratings"
    );
    Ok((rows, report))
}

fn is_header(line: &str) -> bool {
    line.split('\t')
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case("system"))
}

fn parse_row(line: &str) -> Result<RatingRow, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return Err(format!(
            "expected at least {MIN_FIELDS} tab-separated fields, got {}",
            fields.len()
        ));
    }
    let doc_seg_id: u32 = fields[2]
        .trim()
        .parse()
        .map_err(|_| format!("invalid docSegId: {:?}", fields[2]))?;
    let global_seg_id: u32 = fields[3]
        .trim()
        .parse()
        .map_err(|_| format!("invalid globalSegId: {:?}", fields[3]))?;

    let source = fields[4].to_string();
    let target = fields[5].to_string();
    let span_chars = marked_span_chars(&source) + marked_span_chars(&target);
    // Column 10 may be absent (older exports) or a bare note.
    let metadata = parse_metadata(fields.get(9).copied().unwrap_or(""));

    Ok(RatingRow {
        system: fields[0].trim().to_string(),
        document: fields[1].trim().to_string(),
        doc_seg_id,
        global_seg_id,
        source,
        target,
        rater: fields[6].trim().to_string(),
        category: fields[7].trim().to_string(),
        severity: fields[8].trim().to_string(),
        metadata,
        span_chars,
    })
}

/// Structured metadata is a JSON object; a legacy plain-text note is wrapped
/// as `{note: text}`; missing or blank means an empty map.
fn parse_metadata(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return BTreeMap::new();
    }
    if raw.starts_with('{') {
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
            Ok(map) => {
                return map
                    .into_iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect();
            }
            Err(err) => {
                warn!(%err, "metadata is not valid JSON; treating as plain note");
            }
        }
    }
    let mut map = BTreeMap::new();
    map.insert("note".to_string(), raw.to_string());
    map
}

/// Characters inside `<v>...</v>` highlighted error spans.
pub fn marked_span_chars(text: &str) -> usize {
    let mut total = 0usize;
    let mut rest = text;
    while let Some(start) = rest.find("<v>") {
        rest = &rest[start + 3..];
        match rest.find("</v>") {
            Some(end) => {
                total += rest[..end].chars().count();
                rest = &rest[end + 4..];
            }
            None => {
                // Unterminated span: count to end of text.
                total += rest.chars().count();
                break;
            }
        }
    }
    total
}

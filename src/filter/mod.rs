pub mod expr;

use regex::Regex;
use thiserror::Error;

use crate::filter::expr::{EvalContext, Expr, ExprError};
use crate::model::row::RatingRow;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter column {0:?}")]
    UnknownColumn(String),
    #[error("invalid pattern for column {column}: {source}")]
    Pattern {
        column: &'static str,
        source: regex::Error,
    },
    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// The nine per-column filter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    System,
    Document,
    DocSegId,
    GlobalSegId,
    Source,
    Target,
    Rater,
    Category,
    Severity,
}

impl Column {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "system" => Self::System,
            "document" => Self::Document,
            "doc_seg_id" | "docSegId" => Self::DocSegId,
            "global_seg_id" | "globalSegId" => Self::GlobalSegId,
            "source" => Self::Source,
            "target" => Self::Target,
            "rater" => Self::Rater,
            "category" => Self::Category,
            "severity" => Self::Severity,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Document => "document",
            Self::DocSegId => "doc_seg_id",
            Self::GlobalSegId => "global_seg_id",
            Self::Source => "source",
            Self::Target => "target",
            Self::Rater => "rater",
            Self::Category => "category",
            Self::Severity => "severity",
        }
    }

    fn value_of(self, row: &RatingRow) -> String {
        match self {
            Self::System => row.system.clone(),
            Self::Document => row.document.clone(),
            Self::DocSegId => row.doc_seg_id.to_string(),
            Self::GlobalSegId => row.global_seg_id.to_string(),
            Self::Source => row.source.clone(),
            Self::Target => row.target.clone(),
            Self::Rater => row.rater.clone(),
            Self::Category => row.category.clone(),
            Self::Severity => row.severity.clone(),
        }
    }
}

#[derive(Debug)]
struct ColumnFilter {
    column: Column,
    pattern: Regex,
}

/// Both stages of the filter: independent per-column patterns (all non-empty
/// patterns must match, unanchored) and one optional boolean expression.
#[derive(Debug, Default)]
pub struct FilterSet {
    columns: Vec<ColumnFilter>,
    expr: Option<Expr>,
}

impl FilterSet {
    /// Compiles column `(name, pattern)` pairs and an optional expression.
    /// Any compile failure is surfaced to the caller, which fails closed.
    pub fn compile(
        column_specs: &[(String, String)],
        expr_src: Option<&str>,
    ) -> Result<Self, FilterError> {
        let mut columns = Vec::new();
        for (name, pattern) in column_specs {
            if pattern.is_empty() {
                continue;
            }
            let column = Column::from_name(name)
                .ok_or_else(|| FilterError::UnknownColumn(name.clone()))?;
            let pattern = Regex::new(pattern).map_err(|source| FilterError::Pattern {
                column: column.name(),
                source,
            })?;
            columns.push(ColumnFilter { column, pattern });
        }
        let expr = match expr_src {
            Some(src) if !src.trim().is_empty() => Some(expr::parse(src)?),
            _ => None,
        };
        Ok(Self { columns, expr })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.expr.is_none()
    }

    /// Evaluates both stages for one row. Expression evaluation failures
    /// propagate so the caller can fail closed for every row.
    pub fn row_passes(&self, ctx: &EvalContext<'_>) -> Result<bool, FilterError> {
        for filter in &self.columns {
            if !filter.pattern.is_match(&filter.column.value_of(ctx.row)) {
                return Ok(false);
            }
        }
        if let Some(expr) = &self.expr {
            return Ok(expr::evaluate(expr, ctx)?);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row::tests::row;
    use crate::model::segment::build_segments;

    fn ctx_pair() -> (Vec<RatingRow>, Vec<crate::model::segment::SegmentAggregate>) {
        let rows = vec![
            row("sysA", "docX", 1, 1, "rater1", "Accuracy/Omission", "Major"),
            row("sysB", "docY", 2, 7, "rater2", "Fluency/Grammar", "Minor"),
        ];
        let (segments, _) = build_segments(&rows);
        (rows, segments)
    }

    fn specs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_column_filter_substring_match() {
        let (rows, segments) = ctx_pair();
        let fs = FilterSet::compile(&specs(&[("category", "Omiss")]), None).unwrap();
        let pass = fs
            .row_passes(&EvalContext {
                row: &rows[0],
                segment: &segments[0],
            })
            .unwrap();
        assert!(pass);
        let pass = fs
            .row_passes(&EvalContext {
                row: &rows[1],
                segment: &segments[1],
            })
            .unwrap();
        assert!(!pass);
    }

    #[test]
    fn test_all_column_filters_must_match() {
        let (rows, segments) = ctx_pair();
        let fs =
            FilterSet::compile(&specs(&[("system", "sysA"), ("severity", "Minor")]), None).unwrap();
        let pass = fs
            .row_passes(&EvalContext {
                row: &rows[0],
                segment: &segments[0],
            })
            .unwrap();
        assert!(!pass);
    }

    #[test]
    fn test_numeric_columns_match_as_strings() {
        let (rows, segments) = ctx_pair();
        let fs = FilterSet::compile(&specs(&[("global_seg_id", "^7$")]), None).unwrap();
        assert!(
            fs.row_passes(&EvalContext {
                row: &rows[1],
                segment: &segments[1],
            })
            .unwrap()
        );
    }

    #[test]
    fn test_empty_pattern_is_skipped() {
        let fs = FilterSet::compile(&specs(&[("system", "")]), None).unwrap();
        assert!(fs.is_empty());
    }

    #[test]
    fn test_column_and_expression_combined() {
        let (rows, segments) = ctx_pair();
        let fs = FilterSet::compile(
            &specs(&[("system", "sys")]),
            Some("severity == 'Major' && docSegId <= 1"),
        )
        .unwrap();
        assert!(
            fs.row_passes(&EvalContext {
                row: &rows[0],
                segment: &segments[0],
            })
            .unwrap()
        );
        assert!(
            !fs.row_passes(&EvalContext {
                row: &rows[1],
                segment: &segments[1],
            })
            .unwrap()
        );
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            FilterSet::compile(&specs(&[("nope", "x")]), None),
            Err(FilterError::UnknownColumn(_))
        ));
        assert!(matches!(
            FilterSet::compile(&specs(&[("system", "(unclosed")]), None),
            Err(FilterError::Pattern { .. })
        ));
        assert!(matches!(
            FilterSet::compile(&[], Some("severity ==")),
            Err(FilterError::Expr(_))
        ));
    }

    #[test]
    fn test_eval_error_propagates() {
        let (rows, segments) = ctx_pair();
        let fs = FilterSet::compile(&[], Some("mystery == 'x'")).unwrap();
        assert!(
            fs.row_passes(&EvalContext {
                row: &rows[0],
                segment: &segments[0],
            })
            .is_err()
        );
    }
}

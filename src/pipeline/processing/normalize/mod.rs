//! Field Normalizer: canonical column names and cleaned, canonically formatted
//! cell values, applied column by column over the merged extract.

pub mod fields;
pub mod region;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, info_span, Span};

use crate::constants::{CASE_PRESERVED_COLUMNS, DATE_COLUMNS, NAME, NUMBER, REGION, TURNAROUND_TIME, UNKNOWN};
use crate::domain::{Frame, Value};
use crate::error::{Result, TransformFailure};
use crate::metrics::core::time_operation;
use crate::metrics::{phase_metric, NormalizeMetrics};

/// Counts describing one normalization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Source columns folded into an earlier column with the same canonical name
    pub columns_merged: usize,
    pub duplicates_removed: usize,
    /// Values replaced by a sentinel, per column
    pub transform_failures: BTreeMap<String, usize>,
    /// Non-empty region values that matched no gazetteer entry
    pub regions_unmatched: usize,
}

impl NormalizationReport {
    pub fn total_failures(&self) -> usize {
        self.transform_failures.values().sum()
    }
}

/// Trait for normalizing a raw extract into canonical columns and values
pub trait Normalizer {
    fn normalize(&self, frame: Frame) -> Result<(Frame, NormalizationReport)>;
}

/// Whether a column is an identifier whose text must never be case-transformed
pub fn is_case_preserved(column: &str) -> bool {
    CASE_PRESERVED_COLUMNS.contains(&column) || column.ends_with("Id")
}

pub struct FieldNormalizer {
    span: Span,
}

impl FieldNormalizer {
    pub fn new(parent: &Span) -> Self {
        Self {
            span: info_span!(parent: parent, "normalize"),
        }
    }

    /// Apply a fallible cell transform to a whole column, substituting null for
    /// every failure and tallying it against the column.
    fn apply_fallible<F>(frame: &mut Frame, column: &str, report: &mut NormalizationReport, transform: F)
    where
        F: Fn(&Value) -> std::result::Result<Value, TransformFailure>,
    {
        let mut failures = 0usize;
        frame.map_column(column, |value| match transform(value) {
            Ok(v) => v,
            Err(failure) => {
                debug!(column, %failure, "field transform fell back to null");
                failures += 1;
                Value::Null
            }
        });
        if failures > 0 {
            *report.transform_failures.entry(column.to_string()).or_default() += failures;
        }
    }
}

impl Normalizer for FieldNormalizer {
    fn normalize(&self, mut frame: Frame) -> Result<(Frame, NormalizationReport)> {
        let _enter = self.span.enter();
        let timing = time_operation(phase_metric!(histogram, "normalize", "duration_seconds"));

        let mut report = NormalizationReport {
            rows_in: frame.len(),
            ..Default::default()
        };

        report.columns_merged = frame.rename_columns(fields::canonical_column);
        debug!(columns = ?frame.columns(), "canonical column names");

        frame.map_column(NAME, fields::clean_name);

        Self::apply_fallible(&mut frame, TURNAROUND_TIME, &mut report, fields::try_parse_int);

        let columns: Vec<String> = frame.columns().to_vec();
        for column in &columns {
            let preserve_case = is_case_preserved(column);
            frame.map_column(column, |value| {
                let trimmed = fields::trim_text(value);
                if preserve_case {
                    trimmed
                } else {
                    fields::title_case_value(&trimmed)
                }
            });
        }

        if frame.has_column(REGION) {
            let mut unmatched = 0usize;
            frame.map_column(REGION, |value| {
                let corrected = region::correct_region(value);
                let was_unknown = value.as_text().is_some_and(|s| s == UNKNOWN);
                if !value.is_null() && !was_unknown && corrected.as_text() == Some(UNKNOWN) {
                    unmatched += 1;
                }
                corrected
            });
            report.regions_unmatched = unmatched;
        }

        Self::apply_fallible(&mut frame, NUMBER, &mut report, fields::try_phone_value);

        for column in DATE_COLUMNS {
            Self::apply_fallible(&mut frame, column, &mut report, fields::try_parse_date);
        }

        report.duplicates_removed = frame.dedup_rows();
        report.rows_out = frame.len();

        NormalizeMetrics::record_rows_processed(report.rows_in);
        NormalizeMetrics::record_transform_failures(report.total_failures());
        NormalizeMetrics::record_regions_unmatched(report.regions_unmatched);
        NormalizeMetrics::record_duplicates_removed(report.duplicates_removed);
        timing.finish();

        info!(
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            duplicates_removed = report.duplicates_removed,
            transform_failures = report.total_failures(),
            regions_unmatched = report.regions_unmatched,
            "Field normalization complete"
        );

        Ok((frame, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> Value {
        Value::text(s)
    }

    fn raw_frame() -> Frame {
        Frame::from_rows(
            ["Name", "Number", "Region", "Log Date", "Resolution Date", "TAT", "Customer Id", "Branch", "Subject"],
            vec![
                vec![
                    text("  kofi mensah "),
                    text("0241234567"),
                    text("ashanti"),
                    text("2024-01-01"),
                    text("2024-01-05"),
                    text("4"),
                    text("abC-01"),
                    text("ACCRA main"),
                    text("card blocked"),
                ],
                vec![
                    text("nan"),
                    text("123"),
                    text("Mars Region"),
                    text("not a date"),
                    Value::Null,
                    text("soon"),
                    Value::Null,
                    Value::Null,
                    text("   "),
                ],
                vec![
                    text("Kofi Mensah"),
                    text("+233 24 123 4567"),
                    text("Ashanti Region"),
                    Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
                    text("01/05/2024"),
                    Value::Int(4),
                    text("abC-01"),
                    text("ACCRA main"),
                    text("Card Blocked"),
                ],
            ],
        )
    }

    #[test]
    fn test_normalize_canonicalizes_columns_and_values() {
        let normalizer = FieldNormalizer::new(&Span::none());
        let (frame, report) = normalizer.normalize(raw_frame()).unwrap();

        assert_eq!(
            frame.columns(),
            ["name", "number", "region", "logDate", "resolutionDate", "turnaroundTime", "customerId", "branch", "subject"]
        );
        // Row three normalizes to the same values as row one.
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(frame.len(), 2);

        assert_eq!(frame.get(0, NAME), Some(&text("Kofi Mensah")));
        assert_eq!(frame.get(0, NUMBER), Some(&text("+233241234567")));
        assert_eq!(frame.get(0, REGION), Some(&text("Ashanti Region")));
        assert_eq!(frame.get(0, "customerId"), Some(&text("abC-01")));
        assert_eq!(frame.get(0, "branch"), Some(&text("ACCRA main")));
        assert_eq!(frame.get(0, TURNAROUND_TIME), Some(&Value::Int(4)));

        assert_eq!(frame.get(1, NAME), Some(&text(UNKNOWN)));
        assert_eq!(frame.get(1, NUMBER), Some(&Value::Null));
        assert_eq!(frame.get(1, REGION), Some(&text(UNKNOWN)));
        assert_eq!(frame.get(1, "logDate"), Some(&Value::Null));
        assert_eq!(frame.get(1, "subject"), Some(&Value::Null));
        assert_eq!(frame.get(1, TURNAROUND_TIME), Some(&Value::Null));

        assert_eq!(report.transform_failures.get(NUMBER), Some(&1));
        assert_eq!(report.transform_failures.get("logDate"), Some(&1));
        assert_eq!(report.transform_failures.get(TURNAROUND_TIME), Some(&1));
        assert_eq!(report.regions_unmatched, 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = FieldNormalizer::new(&Span::none());
        let (once, _) = normalizer.normalize(raw_frame()).unwrap();
        let (twice, report) = normalizer.normalize(once.clone()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(report.total_failures(), 0);
        assert_eq!(report.duplicates_removed, 0);
    }

    #[test]
    fn test_normalize_is_idempotent_on_non_ascii_text() {
        let frame = Frame::from_rows(
            ["Name", "Number", "Subject", "Log Date", "Resolution Date", "TAT"],
            vec![vec![
                text("ÉLODIE ß"),
                text("0551234567"),
                text("straße ßeta ǆungla"),
                text("2024-02-01"),
                text("2024-02-03"),
                text("2"),
            ]],
        );
        let normalizer = FieldNormalizer::new(&Span::none());
        let (once, _) = normalizer.normalize(frame).unwrap();
        let (twice, _) = normalizer.normalize(once.clone()).unwrap();

        assert_eq!(once.get(0, NAME), Some(&text("Élodie Ss")));
        assert_eq!(once.get(0, "subject"), Some(&text("Straße Sseta ǅungla")));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_is_case_preserved() {
        assert!(is_case_preserved("number"));
        assert!(is_case_preserved("branch"));
        assert!(is_case_preserved("profileId"));
        assert!(!is_case_preserved("subject"));
    }
}

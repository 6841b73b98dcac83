//! TAT Reconciler: classification and repair of the
//! (logDate, resolutionDate, turnaroundTime) triple on every row.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, info_span, Span};

use crate::constants::{LOG_DATE, RESOLUTION_DATE, TAT_COLUMNS, TURNAROUND_TIME};
use crate::domain::{Frame, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::TatMetrics;
use crate::pipeline::processing::normalize::fields;

/// One row's turnaround inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TatTriple {
    pub log_date: Option<NaiveDate>,
    pub resolution_date: Option<NaiveDate>,
    pub turnaround_time: Option<i64>,
}

/// Classification of a triple. When several conditions hold, negative wins
/// over missing, which wins over swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TatState {
    Valid,
    /// Negative turnaround; `swapped` when the dates are also out of order.
    Negative { swapped: bool },
    /// Dates out of order with a non-negative turnaround.
    Swapped,
    Missing,
}

/// What a repair did to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TatRepair {
    SwappedAndRecomputed,
    Recomputed,
    Computed,
}

impl TatTriple {
    pub fn new(log_date: Option<NaiveDate>, resolution_date: Option<NaiveDate>, turnaround_time: Option<i64>) -> Self {
        Self {
            log_date,
            resolution_date,
            turnaround_time,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.turnaround_time.is_some_and(|t| t < 0)
    }

    pub fn is_swapped(&self) -> bool {
        matches!((self.log_date, self.resolution_date), (Some(log), Some(res)) if log > res)
    }

    pub fn is_missing(&self) -> bool {
        self.turnaround_time.is_none()
    }

    /// Whole days from log to resolution when both are present and ordered.
    pub fn ordered_span(&self) -> Option<i64> {
        match (self.log_date, self.resolution_date) {
            (Some(log), Some(res)) if res >= log => Some((res - log).num_days()),
            _ => None,
        }
    }

    pub fn classify(&self) -> TatState {
        if self.is_negative() {
            TatState::Negative {
                swapped: self.is_swapped(),
            }
        } else if self.is_missing() {
            TatState::Missing
        } else if self.is_swapped() {
            TatState::Swapped
        } else {
            TatState::Valid
        }
    }

    /// Repair the triple according to its state. Dates are never invented:
    /// a row without two usable dates keeps its negative or missing value.
    pub fn repair(self) -> (TatTriple, Option<TatRepair>) {
        match self.classify() {
            TatState::Negative { swapped: true } => {
                let fixed = TatTriple {
                    log_date: self.resolution_date,
                    resolution_date: self.log_date,
                    turnaround_time: self.turnaround_time,
                };
                match fixed.ordered_span() {
                    Some(days) => (
                        TatTriple {
                            turnaround_time: Some(days),
                            ..fixed
                        },
                        Some(TatRepair::SwappedAndRecomputed),
                    ),
                    None => (self, None),
                }
            }
            TatState::Negative { swapped: false } => match self.ordered_span() {
                Some(days) => (
                    TatTriple {
                        turnaround_time: Some(days),
                        ..self
                    },
                    Some(TatRepair::Recomputed),
                ),
                None => (self, None),
            },
            TatState::Missing => match self.ordered_span() {
                Some(days) => (
                    TatTriple {
                        turnaround_time: Some(days),
                        ..self
                    },
                    Some(TatRepair::Computed),
                ),
                None => (self, None),
            },
            TatState::Swapped | TatState::Valid => (self, None),
        }
    }
}

/// Row counts per condition. The conditions overlap, so the counts do not
/// need to sum to the row total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TatCounts {
    pub negative: usize,
    pub swapped: usize,
    pub missing: usize,
    pub valid: usize,
}

impl TatCounts {
    fn observe(&mut self, triple: &TatTriple) {
        if triple.is_negative() {
            self.negative += 1;
        }
        if triple.is_swapped() {
            self.swapped += 1;
        }
        if triple.is_missing() {
            self.missing += 1;
        } else {
            self.valid += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TatReport {
    pub before: TatCounts,
    pub after: TatCounts,
    pub swapped_and_recomputed: usize,
    pub recomputed: usize,
    pub computed: usize,
}

pub struct TatReconciler {
    span: Span,
}

impl TatReconciler {
    pub fn new(parent: &Span) -> Self {
        Self {
            span: info_span!(parent: parent, "tat"),
        }
    }

    /// Validate and repair every row in place.
    pub fn reconcile(&self, frame: &mut Frame) -> Result<TatReport> {
        let _enter = self.span.enter();

        let (Some(log_idx), Some(res_idx), Some(tat_idx)) = (
            frame.column_index(LOG_DATE),
            frame.column_index(RESOLUTION_DATE),
            frame.column_index(TURNAROUND_TIME),
        ) else {
            return Err(PipelineError::Schema {
                missing: frame.missing_columns(&TAT_COLUMNS),
            });
        };

        let mut report = TatReport::default();
        for row in frame.rows_mut() {
            let triple = TatTriple::new(
                fields::parse_date(&row[log_idx]),
                fields::parse_date(&row[res_idx]),
                row_int(&row[tat_idx]),
            );
            report.before.observe(&triple);

            let (repaired, repair) = triple.repair();
            match repair {
                Some(TatRepair::SwappedAndRecomputed) => report.swapped_and_recomputed += 1,
                Some(TatRepair::Recomputed) => report.recomputed += 1,
                Some(TatRepair::Computed) => report.computed += 1,
                None => {}
            }
            report.after.observe(&repaired);

            row[log_idx] = repaired.log_date.into();
            row[res_idx] = repaired.resolution_date.into();
            row[tat_idx] = repaired.turnaround_time.into();
        }

        info!(
            negative = report.before.negative,
            swapped = report.before.swapped,
            missing = report.before.missing,
            "Invalid TATs before repair"
        );
        info!(
            valid = report.after.valid,
            negative = report.after.negative,
            swapped = report.after.swapped,
            missing = report.after.missing,
            "TATs after repair"
        );

        TatMetrics::record_dates_swapped(report.swapped_and_recomputed);
        TatMetrics::record_recomputed(report.swapped_and_recomputed + report.recomputed + report.computed);
        TatMetrics::record_unrepaired(report.after.negative, report.after.missing);

        Ok(report)
    }
}

fn row_int(value: &Value) -> Option<i64> {
    fields::try_parse_int(value).ok().and_then(|v| v.as_int())
}

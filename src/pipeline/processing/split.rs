//! Projection of the cleaned extract into the customer and complaint sets.

use tracing::info;

use crate::constants::{COMPLAINT_SOURCE_COLUMNS, CUSTOMER_SOURCE_COLUMNS};
use crate::domain::Frame;

/// Customer and complaint projections of one cleaned extract, in source column
/// layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFrames {
    pub customers: Frame,
    pub complaints: Frame,
}

/// Customers are the distinct projection of the customer columns; complaints
/// keep every row. Columns the extract lacks are left out of the projection.
pub fn split_frames(frame: &Frame) -> SplitFrames {
    let present = |columns: &[&'static str]| -> Vec<&'static str> {
        columns.iter().copied().filter(|c| frame.has_column(c)).collect()
    };

    let mut customers = frame.project(&present(&CUSTOMER_SOURCE_COLUMNS));
    let duplicates = customers.dedup_rows();
    let complaints = frame.project(&present(&COMPLAINT_SOURCE_COLUMNS));

    info!(
        customers = customers.len(),
        complaints = complaints.len(),
        duplicate_customers = duplicates,
        "Split complete"
    );

    SplitFrames { customers, complaints }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::domain::Value;

    #[test]
    fn test_split_dedups_customers_and_keeps_complaints() {
        let frame = Frame::from_rows(
            [NUMBER, NAME, SUBJECT, LOG_DATE],
            vec![
                vec![Value::text("+233241234567"), Value::text("Ama"), Value::text("Card"), Value::Null],
                vec![Value::text("+233241234567"), Value::text("Ama"), Value::text("Loan"), Value::Null],
                vec![Value::text("+233201112223"), Value::text("Kojo"), Value::text("Card"), Value::Null],
            ],
        );

        let split = split_frames(&frame);

        assert_eq!(split.customers.columns(), [NUMBER, NAME]);
        assert_eq!(split.customers.len(), 2);
        assert_eq!(split.complaints.columns(), [NUMBER, LOG_DATE, SUBJECT]);
        assert_eq!(split.complaints.len(), 3);
    }
}

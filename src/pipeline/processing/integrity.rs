//! Integrity Enforcer: the last repairs before the dataset becomes final,
//! verification of every post-condition, and the constrained commit.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, info_span, warn, Span};
use uuid::Uuid;

use crate::constants::*;
use crate::domain::{records_to_frame, EntitySets};
use crate::error::{PipelineError, Result};
use crate::metrics::IntegrityMetrics;
use crate::storage::{ConstrainedTable, ForeignKey, TableConstraints, TableStore};

/// Prefix of identifiers generated for customers still lacking one at this stage
pub const FALLBACK_ID_PREFIX: &str = "fallback-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub names_filled: usize,
    pub customers_removed: usize,
    pub complaints_removed: usize,
    pub log_dates_filled: usize,
    pub customer_ids_filled: usize,
}

pub fn customer_constraints() -> TableConstraints {
    TableConstraints {
        primary_key: Some(CUSTOMER_ID.to_string()),
        not_null: REQUIRED_CUSTOMER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        foreign_keys: Vec::new(),
    }
}

pub fn complaint_constraints() -> TableConstraints {
    TableConstraints {
        primary_key: None,
        not_null: REQUIRED_COMPLAINT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        foreign_keys: vec![ForeignKey {
            name: COMPLAINTS_CUSTOMER_FK.to_string(),
            column: CUSTOMER_ID.to_string(),
            references_table: CUSTOMERS_TABLE.to_string(),
            references_column: CUSTOMER_ID.to_string(),
        }],
    }
}

pub struct IntegrityEnforcer {
    processing_date: NaiveDate,
    span: Span,
}

impl IntegrityEnforcer {
    pub fn new(processing_date: NaiveDate, parent: &Span) -> Self {
        Self {
            processing_date,
            span: info_span!(parent: parent, "integrity"),
        }
    }

    /// Fill or remove whatever still breaks a post-condition.
    pub fn repair(&self, entities: EntitySets) -> (EntitySets, IntegrityReport) {
        let _enter = self.span.enter();
        let EntitySets {
            mut customers,
            mut complaints,
        } = entities;
        let mut report = IntegrityReport::default();

        for customer in customers.iter_mut().filter(|c| c.name.is_none()) {
            customer.name = Some(UNKNOWN.to_string());
            report.names_filled += 1;
        }

        let removed_ids: HashSet<String> = customers
            .iter()
            .filter(|c| c.number.is_none())
            .filter_map(|c| c.customer_id.clone())
            .collect();
        let before = customers.len();
        customers.retain(|c| c.number.is_some());
        report.customers_removed = before - customers.len();
        if !removed_ids.is_empty() {
            let before = complaints.len();
            complaints.retain(|c| c.customer_id.as_ref().map_or(true, |id| !removed_ids.contains(id)));
            report.complaints_removed = before - complaints.len();
        }

        for complaint in complaints.iter_mut().filter(|c| c.log_date.is_none()) {
            complaint.log_date = Some(self.processing_date);
            report.log_dates_filled += 1;
        }

        for customer in customers.iter_mut().filter(|c| c.customer_id.is_none()) {
            customer.customer_id = Some(format!("{FALLBACK_ID_PREFIX}{}", Uuid::new_v4()));
            report.customer_ids_filled += 1;
        }

        IntegrityMetrics::record_values_filled(report.names_filled, report.log_dates_filled, report.customer_ids_filled);
        IntegrityMetrics::record_rows_removed(report.customers_removed, report.complaints_removed);
        info!(
            names_filled = report.names_filled,
            customers_removed = report.customers_removed,
            complaints_removed = report.complaints_removed,
            log_dates_filled = report.log_dates_filled,
            customer_ids_filled = report.customer_ids_filled,
            "Integrity repairs applied"
        );

        (EntitySets::new(customers, complaints), report)
    }

    /// Every post-condition the entity sets still break.
    pub fn violations(entities: &EntitySets) -> Vec<String> {
        let mut violations = Vec::new();
        let count_nulls = |table: &str, column: &str, nulls: usize, out: &mut Vec<String>| {
            if nulls > 0 {
                out.push(format!("{nulls} null value(s) in {table}.{column}"));
            }
        };

        let customers = &entities.customers;
        count_nulls(CUSTOMERS_TABLE, NUMBER, customers.iter().filter(|c| c.number.is_none()).count(), &mut violations);
        count_nulls(CUSTOMERS_TABLE, NAME, customers.iter().filter(|c| c.name.is_none()).count(), &mut violations);
        count_nulls(
            CUSTOMERS_TABLE,
            CUSTOMER_ID,
            customers.iter().filter(|c| c.customer_id.is_none()).count(),
            &mut violations,
        );

        let complaints = &entities.complaints;
        count_nulls(
            COMPLAINTS_TABLE,
            LOG_DATE,
            complaints.iter().filter(|c| c.log_date.is_none()).count(),
            &mut violations,
        );
        count_nulls(
            COMPLAINTS_TABLE,
            CUSTOMER_ID,
            complaints.iter().filter(|c| c.customer_id.is_none()).count(),
            &mut violations,
        );

        let mut seen = HashSet::new();
        let duplicates = customers
            .iter()
            .filter_map(|c| c.customer_id.as_deref())
            .filter(|id| !seen.insert(*id))
            .count();
        if duplicates > 0 {
            violations.push(format!("{duplicates} duplicate {CUSTOMERS_TABLE}.{CUSTOMER_ID} value(s)"));
        }

        let ids = entities.customer_ids();
        let orphans = complaints
            .iter()
            .filter_map(|c| c.customer_id.as_deref())
            .filter(|id| !ids.contains(id))
            .count();
        if orphans > 0 {
            violations.push(format!(
                "{COMPLAINTS_CUSTOMER_FK}: {orphans} complaint(s) reference a missing customer"
            ));
        }

        violations
    }

    pub fn verify(entities: &EntitySets) -> Result<()> {
        let violations = Self::violations(entities);
        if violations.is_empty() {
            Ok(())
        } else {
            IntegrityMetrics::record_violations(violations.len());
            Err(PipelineError::Integrity { violations })
        }
    }

    /// Repair, then verify. Fails without touching storage when a violation
    /// survives the repairs.
    pub fn enforce(&self, entities: EntitySets) -> Result<(EntitySets, IntegrityReport)> {
        let (entities, report) = self.repair(entities);
        let _enter = self.span.enter();
        if let Err(err) = Self::verify(&entities) {
            warn!(error = %err, "Integrity verification failed");
            return Err(err);
        }
        Ok((entities, report))
    }

    /// Replace both tables in one transaction with keys and NOT NULL applied.
    pub fn commit<S: TableStore + ?Sized>(&self, store: &S, namespace: Option<&str>, entities: &EntitySets) -> Result<()> {
        let _enter = self.span.enter();
        let customers = records_to_frame(&entities.customers);
        let complaints = records_to_frame(&entities.complaints);
        let customer_constraints = customer_constraints();
        let complaint_constraints = complaint_constraints();

        store.commit_constrained(
            namespace,
            &[
                ConstrainedTable {
                    name: CUSTOMERS_TABLE,
                    frame: &customers,
                    constraints: &customer_constraints,
                },
                ConstrainedTable {
                    name: COMPLAINTS_TABLE,
                    frame: &complaints,
                    constraints: &complaint_constraints,
                },
            ],
        )?;
        IntegrityMetrics::record_commit();
        info!(
            customers = customers.len(),
            complaints = complaints.len(),
            "Database constraints applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComplaintRecord, CustomerRecord};
    use crate::storage::InMemoryStore;

    fn customer(id: Option<&str>, number: Option<&str>, name: Option<&str>) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.map(str::to_string),
            number: number.map(str::to_string),
            name: name.map(str::to_string),
            ..Default::default()
        }
    }

    fn complaint(id: &str, log_date: Option<NaiveDate>) -> ComplaintRecord {
        ComplaintRecord {
            customer_id: Some(id.to_string()),
            log_date,
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn test_repair_fills_and_cascades() {
        let entities = EntitySets::new(
            vec![
                customer(Some("c1"), Some("+233241234567"), None),
                customer(Some("c2"), None, Some("Kojo")),
                customer(None, Some("+233201112223"), Some("Esi")),
            ],
            vec![complaint("c1", None), complaint("c2", today().pred_opt())],
        );

        let enforcer = IntegrityEnforcer::new(today(), &Span::none());
        let (entities, report) = enforcer.enforce(entities).unwrap();

        assert_eq!(entities.customers.len(), 2);
        assert_eq!(entities.customers[0].name.as_deref(), Some(UNKNOWN));
        assert!(entities.customers[1]
            .customer_id
            .as_deref()
            .is_some_and(|id| id.starts_with(FALLBACK_ID_PREFIX)));
        assert_eq!(entities.complaints.len(), 1);
        assert_eq!(entities.complaints[0].log_date, Some(today()));
        assert_eq!(
            report,
            IntegrityReport {
                names_filled: 1,
                customers_removed: 1,
                complaints_removed: 1,
                log_dates_filled: 1,
                customer_ids_filled: 1,
            }
        );
    }

    #[test]
    fn test_verify_reports_duplicates_and_orphans() {
        let entities = EntitySets::new(
            vec![
                customer(Some("c1"), Some("+233241234567"), Some("Ama")),
                customer(Some("c1"), Some("+233201112223"), Some("Esi")),
            ],
            vec![complaint("c9", today().into())],
        );

        let violations = IntegrityEnforcer::violations(&entities);

        assert_eq!(violations.len(), 2);
        assert!(matches!(IntegrityEnforcer::verify(&entities), Err(PipelineError::Integrity { .. })));
    }

    #[test]
    fn test_enforce_aborts_on_surviving_violation() {
        let entities = EntitySets::new(
            vec![
                customer(Some("c1"), Some("+233241234567"), Some("Ama")),
                customer(Some("c1"), Some("+233241234567"), Some("Ama")),
            ],
            vec![],
        );

        let result = IntegrityEnforcer::new(today(), &Span::none()).enforce(entities);
        assert!(matches!(result, Err(PipelineError::Integrity { .. })));
    }

    #[test]
    fn test_commit_declares_constraints() {
        let store = InMemoryStore::new();
        store.create_namespace("cs").unwrap();
        let entities = EntitySets::new(
            vec![customer(Some("c1"), Some("+233241234567"), Some("Ama"))],
            vec![complaint("c1", Some(today()))],
        );

        IntegrityEnforcer::new(today(), &Span::none())
            .commit(&store, Some("cs"), &entities)
            .unwrap();

        assert_eq!(store.table_constraints(CUSTOMERS_TABLE, Some("cs")).unwrap(), customer_constraints());
        assert_eq!(store.table_constraints(COMPLAINTS_TABLE, Some("cs")).unwrap(), complaint_constraints());
        assert_eq!(store.read_table(COMPLAINTS_TABLE, Some("cs")).unwrap().columns()[0], CUSTOMER_ID);
    }
}

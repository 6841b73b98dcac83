use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, Span};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::{COMPLAINTS_TABLE, CUSTOMERS_TABLE, NUMBER2, PROFILE_ID, RAW_TABLE};
use crate::domain::{records_from_frame, records_to_frame, EntitySets, Frame};
use crate::error::Result;
use crate::logging::run_span;
use crate::pipeline::ingestion::{load_source, merge_sheets};
use crate::pipeline::processing::identity::{IdentityResolver, ResolutionReport};
use crate::pipeline::processing::integrity::{IntegrityEnforcer, IntegrityReport};
use crate::pipeline::processing::linkage::{sync_linkage, ClientRegistry, LinkageIndex, LinkageReport};
use crate::pipeline::processing::normalize::{FieldNormalizer, NormalizationReport, Normalizer};
use crate::pipeline::processing::split::split_frames;
use crate::pipeline::processing::tat::{TatReconciler, TatReport};
use crate::storage::{TableStore, WriteMode};

/// Counts from the cleaning phases
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub rows_ingested: usize,
    pub normalization: NormalizationReport,
    pub tat: TatReport,
}

/// Counts from schema setup through the constrained commit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrationReport {
    pub linkage: LinkageReport,
    pub resolution: ResolutionReport,
    pub integrity: IntegrityReport,
    pub customers: usize,
    pub complaints: usize,
}

/// Per-phase summary of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub schema: String,
    pub clean: Option<CleanReport>,
    pub integration: Option<IntegrationReport>,
}

/// Runs the reconciliation phases against one store.
///
/// Owns the run span; every component gets a child of it.
pub struct Pipeline<S> {
    config: Config,
    store: S,
    run_id: String,
    span: Span,
    processing_date: NaiveDate,
}

impl<S: TableStore + ClientRegistry> Pipeline<S> {
    pub fn new(config: Config, store: S) -> Self {
        let run_id = Uuid::now_v7().to_string();
        let span = run_span(&run_id, &config.schema_name);
        Self {
            config,
            store,
            run_id,
            span,
            processing_date: Local::now().date_naive(),
        }
    }

    /// Date used to fill missing complaint log dates
    pub fn with_processing_date(mut self, date: NaiveDate) -> Self {
        self.processing_date = date;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn schema(&self) -> Option<&str> {
        Some(self.config.schema_name.as_str())
    }

    fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            schema: self.config.schema_name.clone(),
            ..Default::default()
        }
    }

    /// Load the source and merge its sheets.
    pub fn ingest(&self) -> Result<Frame> {
        let _enter = self.span.enter();
        let slices = load_source(&self.config.source_path())?;
        merge_sheets(slices, &self.config.excluded_sheets)
    }

    /// Normalize fields, reconcile turnaround times and persist the raw snapshot.
    pub fn clean_frame(&self, frame: Frame) -> Result<(Frame, CleanReport)> {
        let rows_ingested = frame.len();
        let (mut frame, normalization) = FieldNormalizer::new(&self.span).normalize(frame)?;
        let tat = TatReconciler::new(&self.span).reconcile(&mut frame)?;

        let _enter = self.span.enter();
        self.store.write_table(RAW_TABLE, None, &frame, WriteMode::Replace)?;
        info!(table = RAW_TABLE, rows = frame.len(), "Raw snapshot written");

        Ok((
            frame,
            CleanReport {
                rows_ingested,
                normalization,
                tat,
            },
        ))
    }

    pub fn prepare(&self) -> Result<(Frame, CleanReport)> {
        let frame = self.ingest()?;
        self.clean_frame(frame)
    }

    /// Split the cleaned extract into the namespace's customers and complaints
    /// tables and link them to the client registry.
    pub fn setup_schema(&self, frame: &Frame) -> Result<LinkageReport> {
        let _enter = self.span.enter();
        let schema = self.config.schema_name.as_str();
        let split = split_frames(frame);

        self.store.drop_namespace(schema)?;
        self.store.create_namespace(schema)?;
        info!(schema, "Namespace created");

        self.store
            .write_table(CUSTOMERS_TABLE, self.schema(), &split.customers, WriteMode::Replace)?;
        self.store
            .write_table(COMPLAINTS_TABLE, self.schema(), &split.complaints, WriteMode::Replace)?;
        for table in [CUSTOMERS_TABLE, COMPLAINTS_TABLE] {
            for column in [PROFILE_ID, NUMBER2] {
                self.store.add_column(table, self.schema(), column)?;
            }
        }

        let registry = self.store.entries()?;
        let index = LinkageIndex::build(&registry);
        let mut entities = self.load_entities()?;
        let report = sync_linkage(&mut entities, &index);
        self.write_entities(&entities)?;

        info!(schema, "Schema setup complete");
        Ok(report)
    }

    pub fn load_entities(&self) -> Result<EntitySets> {
        let customers = self.store.read_table(CUSTOMERS_TABLE, self.schema())?;
        let complaints = self.store.read_table(COMPLAINTS_TABLE, self.schema())?;
        Ok(EntitySets::new(records_from_frame(&customers), records_from_frame(&complaints)))
    }

    /// Write both tables in canonical column order.
    fn write_entities(&self, entities: &EntitySets) -> Result<()> {
        self.store.write_table(
            CUSTOMERS_TABLE,
            self.schema(),
            &records_to_frame(&entities.customers),
            WriteMode::Replace,
        )?;
        self.store.write_table(
            COMPLAINTS_TABLE,
            self.schema(),
            &records_to_frame(&entities.complaints),
            WriteMode::Replace,
        )
    }

    /// Assign customer identifiers, enforce integrity and commit under constraints.
    pub fn resolve_and_commit(&self) -> Result<(ResolutionReport, IntegrityReport, EntitySets)> {
        let entities = self.load_entities()?;
        let (entities, resolution) = IdentityResolver::new(&self.span).resolve(entities);
        self.write_entities(&entities)?;

        let enforcer = IntegrityEnforcer::new(self.processing_date, &self.span);
        let (entities, integrity) = enforcer.enforce(entities)?;
        enforcer.commit(&self.store, self.schema(), &entities)?;
        Ok((resolution, integrity, entities))
    }

    fn integrate_frame(&self, frame: &Frame) -> Result<IntegrationReport> {
        let linkage = self.setup_schema(frame)?;
        let (resolution, integrity, entities) = self.resolve_and_commit()?;
        Ok(IntegrationReport {
            linkage,
            resolution,
            integrity,
            customers: entities.customers.len(),
            complaints: entities.complaints.len(),
        })
    }

    /// Ingest and clean only, leaving the raw snapshot behind.
    pub fn clean(&self) -> Result<RunReport> {
        let (_, clean) = self.prepare()?;
        Ok(RunReport {
            clean: Some(clean),
            ..self.report()
        })
    }

    /// Build the namespace from a previously persisted raw snapshot.
    pub fn integrate(&self) -> Result<RunReport> {
        let frame = self.store.read_table(RAW_TABLE, None)?;
        let integration = self.integrate_frame(&frame)?;
        self.log_summary(&integration);
        Ok(RunReport {
            integration: Some(integration),
            ..self.report()
        })
    }

    /// Every phase, source file to constrained commit.
    pub fn run(&self) -> Result<RunReport> {
        {
            let _enter = self.span.enter();
            info!(source = %self.config.source_path().display(), "Starting pipeline run");
        }
        let (frame, clean) = self.prepare()?;
        let integration = self.integrate_frame(&frame)?;
        self.log_summary(&integration);
        Ok(RunReport {
            clean: Some(clean),
            integration: Some(integration),
            ..self.report()
        })
    }

    fn log_summary(&self, integration: &IntegrationReport) {
        let _enter = self.span.enter();
        info!(
            customers = integration.customers,
            complaints = integration.complaints,
            "Data integration pipeline completed"
        );
    }
}

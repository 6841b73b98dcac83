use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{ConstrainedTable, TableConstraints, TableStore, WriteMode};
use crate::domain::{Frame, Value};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::linkage::{ClientRegistry, RegistryEntry};

type TableKey = (Option<String>, String);

#[derive(Debug, Default)]
struct State {
    namespaces: HashSet<String>,
    tables: HashMap<TableKey, Frame>,
    constraints: HashMap<TableKey, TableConstraints>,
}

/// In-memory store for development and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    registry: Vec<RegistryEntry>,
}

fn key(table: &str, namespace: Option<&str>) -> TableKey {
    (namespace.map(str::to_string), table.to_string())
}

fn qualified(table: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("{ns}.{table}"),
        None => table.to_string(),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by the given client registry entries
    pub fn with_registry(registry: Vec<RegistryEntry>) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state().namespaces.contains(namespace)
    }

    pub fn table_names(&self, namespace: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .tables
            .keys()
            .filter(|(ns, _)| ns.as_deref() == namespace)
            .map(|(_, t)| t.clone())
            .collect();
        names.sort();
        names
    }
}

fn check_namespace(state: &State, namespace: Option<&str>) -> Result<()> {
    match namespace {
        Some(ns) if !state.namespaces.contains(ns) => {
            Err(PipelineError::Storage(format!("namespace '{ns}' does not exist")))
        }
        _ => Ok(()),
    }
}

fn append_rows(existing: &mut Frame, frame: &Frame) {
    for column in frame.columns() {
        existing.add_column(column);
    }
    let indices: Vec<Option<usize>> = existing.columns().iter().map(|c| frame.column_index(c)).collect();
    for row in frame.rows() {
        existing.push_row(
            indices
                .iter()
                .map(|idx| idx.map_or(Value::Null, |i| row[i].clone()))
                .collect(),
        );
    }
}

/// Every constraint the listed tables would break once committed together.
/// Foreign keys may reference a table in the same batch or one already stored.
fn constraint_violations(
    state: &State,
    namespace: Option<&str>,
    tables: &[ConstrainedTable<'_>],
) -> Vec<String> {
    let mut violations = Vec::new();
    let batch: HashMap<&str, &Frame> = tables.iter().map(|t| (t.name, t.frame)).collect();

    for table in tables {
        let name = qualified(table.name, namespace);
        for column in &table.constraints.not_null {
            if !table.frame.has_column(column) {
                violations.push(format!("{name}.{column} is missing"));
                continue;
            }
            let nulls = table.frame.null_count(column);
            if nulls > 0 {
                violations.push(format!("{nulls} null value(s) in {name}.{column}"));
            }
        }

        if let Some(pk) = &table.constraints.primary_key {
            let mut seen = HashSet::new();
            let duplicates = table
                .frame
                .column_values(pk)
                .filter(|v| !v.is_null() && !seen.insert(*v))
                .count();
            if duplicates > 0 {
                violations.push(format!("{duplicates} duplicate key(s) in {name}.{pk}"));
            }
        }

        for fk in &table.constraints.foreign_keys {
            let parent = batch
                .get(fk.references_table.as_str())
                .copied()
                .or_else(|| state.tables.get(&key(&fk.references_table, namespace)));
            let Some(parent) = parent else {
                violations.push(format!("{}: referenced table {} does not exist", fk.name, fk.references_table));
                continue;
            };
            let keys: HashSet<&Value> = parent.column_values(&fk.references_column).collect();
            let orphans = table
                .frame
                .column_values(&fk.column)
                .filter(|v| !v.is_null() && !keys.contains(v))
                .count();
            if orphans > 0 {
                violations.push(format!("{}: {orphans} orphan row(s) in {name}.{}", fk.name, fk.column));
            }
        }
    }
    violations
}

impl TableStore for InMemoryStore {
    fn write_table(&self, table: &str, namespace: Option<&str>, frame: &Frame, mode: WriteMode) -> Result<()> {
        let mut state = self.state();
        check_namespace(&state, namespace)?;
        let key = key(table, namespace);
        match mode {
            WriteMode::Replace => {
                state.constraints.remove(&key);
                state.tables.insert(key, frame.clone());
            }
            WriteMode::Append => match state.tables.get_mut(&key) {
                Some(existing) => append_rows(existing, frame),
                None => {
                    state.tables.insert(key, frame.clone());
                }
            },
        }
        debug!(table = %qualified(table, namespace), rows = frame.len(), ?mode, "table written");
        Ok(())
    }

    fn read_table(&self, table: &str, namespace: Option<&str>) -> Result<Frame> {
        self.state()
            .tables
            .get(&key(table, namespace))
            .cloned()
            .ok_or_else(|| PipelineError::Storage(format!("table '{}' does not exist", qualified(table, namespace))))
    }

    fn table_exists(&self, table: &str, namespace: Option<&str>) -> Result<bool> {
        Ok(self.state().tables.contains_key(&key(table, namespace)))
    }

    fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.state().namespaces.insert(namespace.to_string());
        Ok(())
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        let mut state = self.state();
        state.namespaces.remove(namespace);
        state.tables.retain(|(ns, _), _| ns.as_deref() != Some(namespace));
        state.constraints.retain(|(ns, _), _| ns.as_deref() != Some(namespace));
        Ok(())
    }

    fn add_column(&self, table: &str, namespace: Option<&str>, column: &str) -> Result<bool> {
        let mut state = self.state();
        let frame = state
            .tables
            .get_mut(&key(table, namespace))
            .ok_or_else(|| PipelineError::Storage(format!("table '{}' does not exist", qualified(table, namespace))))?;
        Ok(frame.add_column(column))
    }

    fn commit_constrained(&self, namespace: Option<&str>, tables: &[ConstrainedTable<'_>]) -> Result<()> {
        let mut state = self.state();
        check_namespace(&state, namespace)?;

        let violations = constraint_violations(&state, namespace, tables);
        if !violations.is_empty() {
            return Err(PipelineError::Integrity { violations });
        }

        for table in tables {
            let key = key(table.name, namespace);
            state.tables.insert(key.clone(), table.frame.clone());
            state.constraints.insert(key, table.constraints.clone());
        }
        Ok(())
    }

    fn table_constraints(&self, table: &str, namespace: Option<&str>) -> Result<TableConstraints> {
        let state = self.state();
        let key = key(table, namespace);
        if !state.tables.contains_key(&key) {
            return Err(PipelineError::Storage(format!(
                "table '{}' does not exist",
                qualified(table, namespace)
            )));
        }
        Ok(state.constraints.get(&key).cloned().unwrap_or_default())
    }
}

impl ClientRegistry for InMemoryStore {
    fn entries(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.registry.clone())
    }
}

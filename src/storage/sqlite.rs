//! SQLite-backed table store.
//!
//! The default schema lives in the main database file. Each namespace is a
//! separate database attached under the namespace's name: a sibling file
//! `<stem>.<namespace>.db` next to the main file, or a private in-memory
//! database when the store itself is in memory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use tracing::{debug, info, warn};

use super::{ConstrainedTable, ForeignKey, TableConstraints, TableStore, WriteMode};
use crate::constants::{CLIENT_REGISTRY_TABLE, PHONE_NUMBER, PHONE_NUMBER2, PROFILE_ID};
use crate::domain::{Frame, RowView, Value};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::linkage::{ClientRegistry, RegistryEntry};

const MAIN_SCHEMA: &str = "main";

pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Int(n) => ToSqlOutput::from(*n),
            Value::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
        })
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn schema_of(namespace: Option<&str>) -> &str {
    namespace.unwrap_or(MAIN_SCHEMA)
}

fn qualified(table: &str, namespace: Option<&str>) -> String {
    format!("{}.{}", quote(schema_of(namespace)), quote(table))
}

/// Declared SQLite type for a column: INTEGER or DATE when every non-null
/// value agrees, TEXT otherwise.
fn declared_type(frame: &Frame, column: usize) -> &'static str {
    let mut kind = None;
    for row in frame.rows() {
        let this = match &row[column] {
            Value::Null => continue,
            Value::Int(_) => "INTEGER",
            Value::Date(_) => "DATE",
            Value::Text(_) => return "TEXT",
        };
        match kind {
            None => kind = Some(this),
            Some(k) if k != this => return "TEXT",
            _ => {}
        }
    }
    kind.unwrap_or("TEXT")
}

fn decode(value: ValueRef<'_>, decl_type: &str) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::Int(f as i64),
        ValueRef::Real(f) => Value::Text(f.to_string()),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if decl_type.eq_ignore_ascii_case("DATE") {
                NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map(Value::Date)
                    .unwrap_or(Value::Text(text))
            } else {
                Value::Text(text)
            }
        }
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        info!(path = %path.display(), "Opened SQLite store");
        Ok(Self { conn, path: Some(path) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, path: None })
    }

    /// File backing a namespace, or `None` for an in-memory store
    pub fn namespace_path(&self, namespace: &str) -> Option<PathBuf> {
        self.path.as_ref().map(|path| {
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            path.with_file_name(format!("{stem}.{namespace}.db"))
        })
    }

    fn is_attached(&self, namespace: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare("SELECT name FROM pragma_database_list WHERE name = ?1")?;
        Ok(stmt.exists(params![namespace])?)
    }

    fn attach(&self, namespace: &str) -> Result<()> {
        if self.is_attached(namespace)? {
            return Ok(());
        }
        let target = self
            .namespace_path(namespace)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_string());
        self.conn
            .execute(&format!("ATTACH DATABASE ?1 AS {}", quote(namespace)), params![target])?;
        debug!(namespace, target = %target, "attached namespace");
        Ok(())
    }

    /// Attach the namespace if its database already exists.
    fn resolve_namespace(&self, namespace: Option<&str>) -> Result<()> {
        let Some(ns) = namespace else { return Ok(()) };
        if self.is_attached(ns)? {
            return Ok(());
        }
        match self.namespace_path(ns) {
            Some(path) if path.exists() => self.attach(ns),
            _ => Err(PipelineError::Storage(format!("namespace '{ns}' does not exist"))),
        }
    }

    fn column_info(&self, table: &str, namespace: Option<&str>) -> Result<Vec<(String, String, bool, bool)>> {
        let sql = format!("PRAGMA {}.table_info({})", quote(schema_of(namespace)), quote(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)? != 0,
                row.get::<_, i64>(5)? != 0,
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_table(
        &self,
        table: &str,
        namespace: Option<&str>,
        frame: &Frame,
        constraints: Option<&TableConstraints>,
    ) -> Result<()> {
        if frame.width() == 0 {
            return Err(PipelineError::Storage(format!(
                "cannot create {} without columns",
                qualified(table, namespace)
            )));
        }
        let mut defs: Vec<String> = frame
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mut def = format!("{} {}", quote(column), declared_type(frame, idx));
                if let Some(c) = constraints {
                    if c.primary_key.as_deref() == Some(column.as_str()) {
                        def.push_str(" PRIMARY KEY");
                    }
                    if c.not_null.iter().any(|n| n == column) {
                        def.push_str(" NOT NULL");
                    }
                }
                def
            })
            .collect();
        if let Some(c) = constraints {
            for fk in &c.foreign_keys {
                defs.push(format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
                    quote(&fk.name),
                    quote(&fk.column),
                    quote(&fk.references_table),
                    quote(&fk.references_column)
                ));
            }
        }
        let sql = format!("CREATE TABLE {} ({})", qualified(table, namespace), defs.join(", "));
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    fn insert_rows(&self, table: &str, namespace: Option<&str>, frame: &Frame) -> Result<()> {
        if frame.width() == 0 {
            return Ok(());
        }
        let columns: Vec<String> = frame.columns().iter().map(|c| quote(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualified(table, namespace),
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        for row in frame.rows() {
            stmt.execute(params_from_iter(row.iter()))?;
        }
        Ok(())
    }

    fn drop_table(&self, table: &str, namespace: Option<&str>) -> Result<()> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {}", qualified(table, namespace)))?;
        Ok(())
    }

    fn foreign_key_violations(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        let sql = format!("PRAGMA {}.foreign_key_check", quote(schema_of(namespace)));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let table: String = row.get(0)?;
            let parent: String = row.get(2)?;
            Ok(format!("row in {table} references a missing {parent} key"))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl TableStore for SqliteStore {
    fn write_table(&self, table: &str, namespace: Option<&str>, frame: &Frame, mode: WriteMode) -> Result<()> {
        self.resolve_namespace(namespace)?;
        let tx = self.conn.unchecked_transaction()?;
        match mode {
            WriteMode::Replace => {
                self.drop_table(table, namespace)?;
                self.create_table(table, namespace, frame, None)?;
            }
            WriteMode::Append => {
                if self.table_exists(table, namespace)? {
                    for column in frame.columns() {
                        self.add_column(table, namespace, column)?;
                    }
                } else {
                    self.create_table(table, namespace, frame, None)?;
                }
            }
        }
        self.insert_rows(table, namespace, frame)?;
        tx.commit()?;
        debug!(table = %qualified(table, namespace), rows = frame.len(), ?mode, "table written");
        Ok(())
    }

    fn read_table(&self, table: &str, namespace: Option<&str>) -> Result<Frame> {
        self.resolve_namespace(namespace)?;
        if !self.table_exists(table, namespace)? {
            return Err(PipelineError::Storage(format!(
                "table '{}' does not exist",
                qualified(table, namespace)
            )));
        }
        let info = self.column_info(table, namespace)?;
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", qualified(table, namespace)))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let decl_types: Vec<String> = columns
            .iter()
            .map(|c| {
                info.iter()
                    .find(|(name, ..)| name == c)
                    .map(|(_, ty, ..)| ty.clone())
                    .unwrap_or_default()
            })
            .collect();

        let mut frame = Frame::new(columns);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(decl_types.len());
            for (idx, decl) in decl_types.iter().enumerate() {
                values.push(decode(row.get_ref(idx)?, decl));
            }
            frame.push_row(values);
        }
        Ok(frame)
    }

    fn table_exists(&self, table: &str, namespace: Option<&str>) -> Result<bool> {
        if let Some(ns) = namespace {
            if !self.is_attached(ns)? && self.resolve_namespace(namespace).is_err() {
                return Ok(false);
            }
        }
        let sql = format!(
            "SELECT 1 FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
            quote(schema_of(namespace))
        );
        let mut stmt = self.conn.prepare(&sql)?;
        Ok(stmt.exists(params![table])?)
    }

    fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.attach(namespace)
    }

    fn drop_namespace(&self, namespace: &str) -> Result<()> {
        if self.is_attached(namespace)? {
            self.conn
                .execute_batch(&format!("DETACH DATABASE {}", quote(namespace)))?;
        }
        if let Some(path) = self.namespace_path(namespace) {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        info!(namespace, "Dropped namespace");
        Ok(())
    }

    fn add_column(&self, table: &str, namespace: Option<&str>, column: &str) -> Result<bool> {
        if self.column_info(table, namespace)?.iter().any(|(name, ..)| name == column) {
            return Ok(false);
        }
        self.conn.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            qualified(table, namespace),
            quote(column)
        ))?;
        Ok(true)
    }

    fn commit_constrained(&self, namespace: Option<&str>, tables: &[ConstrainedTable<'_>]) -> Result<()> {
        self.resolve_namespace(namespace)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;

        for table in tables.iter().rev() {
            self.drop_table(table.name, namespace)?;
        }
        for table in tables {
            self.create_table(table.name, namespace, table.frame, Some(table.constraints))?;
            self.insert_rows(table.name, namespace, table.frame)
                .map_err(|e| match e {
                    PipelineError::Database(err) => PipelineError::Integrity {
                        violations: vec![format!("{}: {err}", table.name)],
                    },
                    other => other,
                })?;
        }

        let violations = self.foreign_key_violations(namespace)?;
        if !violations.is_empty() {
            return Err(PipelineError::Integrity { violations });
        }
        tx.commit()?;
        Ok(())
    }

    fn table_constraints(&self, table: &str, namespace: Option<&str>) -> Result<TableConstraints> {
        self.resolve_namespace(namespace)?;
        let info = self.column_info(table, namespace)?;
        if info.is_empty() {
            return Err(PipelineError::Storage(format!(
                "table '{}' does not exist",
                qualified(table, namespace)
            )));
        }
        let primary_key = info.iter().find(|(.., pk)| *pk).map(|(name, ..)| name.clone());
        let not_null = info
            .iter()
            .filter(|(_, _, not_null, _)| *not_null)
            .map(|(name, ..)| name.clone())
            .collect();

        let sql = format!("PRAGMA {}.foreign_key_list({})", quote(schema_of(namespace)), quote(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let references_table: String = row.get(2)?;
            let column: String = row.get(3)?;
            let references_column: String = row.get(4)?;
            Ok((column, references_table, references_column))
        })?;
        let mut foreign_keys = Vec::new();
        for row in rows {
            let (column, references_table, references_column) = row?;
            foreign_keys.push(ForeignKey {
                name: format!("fk_{table}_{references_table}"),
                column,
                references_table,
                references_column,
            });
        }

        Ok(TableConstraints {
            primary_key,
            not_null,
            foreign_keys,
        })
    }
}

impl ClientRegistry for SqliteStore {
    fn entries(&self) -> Result<Vec<RegistryEntry>> {
        if !self.table_exists(CLIENT_REGISTRY_TABLE, None)? {
            warn!(table = CLIENT_REGISTRY_TABLE, "Client registry table not found, linkage skipped");
            return Ok(Vec::new());
        }
        let frame = self.read_table(CLIENT_REGISTRY_TABLE, None)?;
        let entries = (0..frame.len())
            .filter_map(|idx| {
                let row = RowView::new(&frame, idx);
                Some(RegistryEntry {
                    profile_id: row.text(PROFILE_ID)?,
                    phone_number: row.text(PHONE_NUMBER),
                    phone_number2: row.text(PHONE_NUMBER2),
                })
            })
            .collect();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Frame {
        Frame::from_rows(
            ["id", "day", "count", "note"],
            vec![
                vec![
                    Value::text("a"),
                    Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
                    Value::Int(3),
                    Value::Null,
                ],
                vec![Value::text("b"), Value::Null, Value::Int(-1), Value::text("x")],
            ],
        )
    }

    #[test]
    fn test_replace_round_trips_types() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write_table("t", None, &sample(), WriteMode::Replace).unwrap();

        assert_eq!(store.read_table("t", None).unwrap(), sample());
    }

    #[test]
    fn test_namespace_lives_in_sibling_file() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("support.db");
        {
            let store = SqliteStore::open(&db).unwrap();
            store.create_namespace("cs2025").unwrap();
            store.write_table("t", Some("cs2025"), &sample(), WriteMode::Replace).unwrap();
        }
        assert!(dir.path().join("support.cs2025.db").exists());

        let reopened = SqliteStore::open(&db).unwrap();
        assert_eq!(reopened.read_table("t", Some("cs2025")).unwrap().len(), 2);

        reopened.drop_namespace("cs2025").unwrap();
        assert!(!dir.path().join("support.cs2025.db").exists());
        assert!(reopened.read_table("t", Some("cs2025")).is_err());
    }

    #[test]
    fn test_append_and_add_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .write_table("t", None, &Frame::from_rows(["a"], vec![vec![Value::Int(1)]]), WriteMode::Append)
            .unwrap();
        assert!(store.add_column("t", None, "b").unwrap());
        assert!(!store.add_column("t", None, "b").unwrap());
        store
            .write_table("t", None, &Frame::from_rows(["b", "a"], vec![vec![Value::text("y"), Value::Int(2)]]), WriteMode::Append)
            .unwrap();

        let frame = store.read_table("t", None).unwrap();
        assert_eq!(frame.columns(), ["a", "b"]);
        assert_eq!(frame.rows()[1], vec![Value::Int(2), Value::text("y")]);
    }

    #[test]
    fn test_commit_constrained_declares_keys() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_namespace("ns").unwrap();
        let parent = Frame::from_rows(["id"], vec![vec![Value::text("a")]]);
        let child = Frame::from_rows(["id"], vec![vec![Value::text("a")], vec![Value::text("a")]]);
        let parent_constraints = TableConstraints {
            primary_key: Some("id".into()),
            not_null: vec!["id".into()],
            foreign_keys: vec![],
        };
        let child_constraints = TableConstraints {
            primary_key: None,
            not_null: vec!["id".into()],
            foreign_keys: vec![ForeignKey {
                name: "fk_child_parent".into(),
                column: "id".into(),
                references_table: "parent".into(),
                references_column: "id".into(),
            }],
        };

        store
            .commit_constrained(
                Some("ns"),
                &[
                    ConstrainedTable { name: "parent", frame: &parent, constraints: &parent_constraints },
                    ConstrainedTable { name: "child", frame: &child, constraints: &child_constraints },
                ],
            )
            .unwrap();

        let declared = store.table_constraints("parent", Some("ns")).unwrap();
        assert_eq!(declared.primary_key.as_deref(), Some("id"));
        let declared = store.table_constraints("child", Some("ns")).unwrap();
        assert_eq!(declared.foreign_keys[0].references_table, "parent");
        assert_eq!(declared.not_null, vec!["id".to_string()]);
    }

    #[test]
    fn test_commit_constrained_rolls_back_on_orphans() {
        let store = SqliteStore::open_in_memory().unwrap();
        let parent = Frame::from_rows(["id"], vec![vec![Value::text("a")]]);
        store.write_table("parent", None, &parent, WriteMode::Replace).unwrap();
        let orphan = Frame::from_rows(["id"], vec![vec![Value::text("zzz")]]);
        let child_constraints = TableConstraints {
            primary_key: None,
            not_null: vec![],
            foreign_keys: vec![ForeignKey {
                name: "fk_child_parent".into(),
                column: "id".into(),
                references_table: "parent".into(),
                references_column: "id".into(),
            }],
        };
        let parent_constraints = TableConstraints {
            primary_key: Some("id".into()),
            ..Default::default()
        };

        let err = store
            .commit_constrained(
                None,
                &[
                    ConstrainedTable { name: "parent", frame: &parent, constraints: &parent_constraints },
                    ConstrainedTable { name: "child", frame: &orphan, constraints: &child_constraints },
                ],
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::Integrity { .. }));
        assert!(!store.table_exists("child", None).unwrap());
        assert_eq!(store.table_constraints("parent", None).unwrap().primary_key, None);
    }

    #[test]
    fn test_registry_entries_from_client_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.entries().unwrap().is_empty());

        let client = Frame::from_rows(
            [PROFILE_ID, PHONE_NUMBER, PHONE_NUMBER2],
            vec![
                vec![Value::text("P1"), Value::text("+233241234567"), Value::Null],
                vec![Value::Null, Value::text("+233200000000"), Value::Null],
            ],
        );
        store.write_table(CLIENT_REGISTRY_TABLE, None, &client, WriteMode::Replace).unwrap();

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].phone_number.as_deref(), Some("+233241234567"));
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::constants::*;

/// A single cell of a tabular extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Int(i64),
    Date(NaiveDate),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Textual rendering of any non-null cell. Spreadsheets hand phone numbers
    /// back as numbers, so identifier columns are read through this.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Value::Null, Value::Text)
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Null, Value::Int)
    }
}

impl From<Option<NaiveDate>> for Value {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(Value::Null, Value::Date)
    }
}

/// An ordered, column-named row collection. Every row has exactly one cell
/// per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Vec<Value>>) -> Self {
        let mut frame = Self::new(columns);
        for row in rows {
            frame.push_row(row);
        }
        frame
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Vec<Value>] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Append a row, padding with nulls or truncating to the frame width.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(column);
        self.rows.iter().filter_map(move |r| idx.map(|i| &r[i]))
    }

    pub fn null_count(&self, column: &str) -> usize {
        self.column_values(column).filter(|v| v.is_null()).count()
    }

    /// Rewrite every cell of `column` in place. Returns false when the column
    /// does not exist.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    /// Add a null-filled column unless it already exists.
    pub fn add_column(&mut self, name: &str) -> bool {
        if self.has_column(name) {
            return false;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        true
    }

    /// Rename every column through `rename`. Columns that collapse onto the
    /// same name are merged: the earlier column keeps its value and nulls are
    /// filled from the later one. Returns the number of merged columns.
    pub fn rename_columns<F>(&mut self, mut rename: F) -> usize
    where
        F: FnMut(&str) -> String,
    {
        let mut columns: Vec<String> = Vec::with_capacity(self.columns.len());
        let mut targets = Vec::with_capacity(self.columns.len());
        for original in &self.columns {
            let name = rename(original);
            match columns.iter().position(|c| *c == name) {
                Some(idx) => targets.push(idx),
                None => {
                    targets.push(columns.len());
                    columns.push(name);
                }
            }
        }

        let merged = targets.len() - columns.len();
        if merged > 0 {
            for row in &mut self.rows {
                let mut folded = vec![Value::Null; columns.len()];
                for (value, &idx) in std::mem::take(row).into_iter().zip(&targets) {
                    if folded[idx].is_null() {
                        folded[idx] = value;
                    }
                }
                *row = folded;
            }
        }
        self.columns = columns;
        merged
    }

    /// Copy the named columns, in the given order, into a new frame. Columns
    /// absent from `self` come back null-filled.
    pub fn project(&self, columns: &[&str]) -> Frame {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.map_or(Value::Null, |i| row[i].clone()))
                    .collect()
            })
            .collect();
        Frame {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Remove exact duplicate rows, keeping the first occurrence. Returns the
    /// number of rows removed.
    pub fn dedup_rows(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }
}

/// Read access to one row of a frame by column name.
pub struct RowView<'a> {
    frame: &'a Frame,
    row: usize,
}

impl<'a> RowView<'a> {
    pub fn new(frame: &'a Frame, row: usize) -> Self {
        Self { frame, row }
    }

    fn cell(&self, column: &str) -> &Value {
        self.frame.get(self.row, column).unwrap_or(&Value::Null)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.cell(column).to_text()
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.cell(column) {
            Value::Int(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        match self.cell(column) {
            Value::Date(d) => Some(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }
}

/// A typed record persisted as one table.
pub trait TableRecord: Sized {
    /// Persisted column order.
    const COLUMNS: &'static [&'static str];

    fn to_row(&self) -> Vec<Value>;

    fn from_row(row: &RowView<'_>) -> Self;
}

pub fn records_to_frame<R: TableRecord>(records: &[R]) -> Frame {
    Frame::from_rows(R::COLUMNS.iter().copied(), records.iter().map(TableRecord::to_row).collect())
}

pub fn records_from_frame<R: TableRecord>(frame: &Frame) -> Vec<R> {
    (0..frame.len()).map(|row| R::from_row(&RowView::new(frame, row))).collect()
}

/// The identifying signals shared by customer and complaint rows.
pub trait IdentitySignals {
    fn number(&self) -> Option<&str>;
    fn profile_id(&self) -> Option<&str>;
    fn customer_id(&self) -> Option<&str>;
    fn set_profile_id(&mut self, profile_id: Option<String>);
    fn set_number2(&mut self, number2: Option<String>);
    fn set_customer_id(&mut self, customer_id: Option<String>);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: Option<String>,
    pub profile_id: Option<String>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub number2: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub account_type: Option<String>,
    pub branch: Option<String>,
}

impl TableRecord for CustomerRecord {
    const COLUMNS: &'static [&'static str] = &CUSTOMER_COLUMNS;

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.customer_id.clone().into(),
            self.profile_id.clone().into(),
            self.name.clone().into(),
            self.number.clone().into(),
            self.number2.clone().into(),
            self.gender.clone().into(),
            self.date_of_birth.into(),
            self.account_type.clone().into(),
            self.branch.clone().into(),
        ]
    }

    fn from_row(row: &RowView<'_>) -> Self {
        Self {
            customer_id: row.text(CUSTOMER_ID),
            profile_id: row.text(PROFILE_ID),
            name: row.text(NAME),
            number: row.text(NUMBER),
            number2: row.text(NUMBER2),
            gender: row.text(GENDER),
            date_of_birth: row.date(DATE_OF_BIRTH),
            account_type: row.text(ACCOUNT_TYPE),
            branch: row.text(BRANCH),
        }
    }
}

impl IdentitySignals for CustomerRecord {
    fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    fn set_profile_id(&mut self, profile_id: Option<String>) {
        self.profile_id = profile_id;
    }

    fn set_number2(&mut self, number2: Option<String>) {
        self.number2 = number2;
    }

    fn set_customer_id(&mut self, customer_id: Option<String>) {
        self.customer_id = customer_id;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub customer_id: Option<String>,
    pub profile_id: Option<String>,
    pub number: Option<String>,
    pub number2: Option<String>,
    pub location: Option<String>,
    pub region: Option<String>,
    pub complaint_source: Option<String>,
    pub nature_of_complaint: Option<String>,
    pub subject: Option<String>,
    pub details_of_complaint: Option<String>,
    pub comment: Option<String>,
    pub updates: Option<String>,
    pub status: Option<String>,
    pub log_date: Option<NaiveDate>,
    pub turnaround_time: Option<i64>,
    pub resolution_date: Option<NaiveDate>,
    pub reason_for_reversal_request: Option<String>,
    pub assign: Option<String>,
    pub name_of_cc_rep: Option<String>,
}

impl TableRecord for ComplaintRecord {
    const COLUMNS: &'static [&'static str] = &COMPLAINT_COLUMNS;

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.customer_id.clone().into(),
            self.profile_id.clone().into(),
            self.number.clone().into(),
            self.number2.clone().into(),
            self.location.clone().into(),
            self.region.clone().into(),
            self.complaint_source.clone().into(),
            self.nature_of_complaint.clone().into(),
            self.subject.clone().into(),
            self.details_of_complaint.clone().into(),
            self.comment.clone().into(),
            self.updates.clone().into(),
            self.status.clone().into(),
            self.log_date.into(),
            self.turnaround_time.into(),
            self.resolution_date.into(),
            self.reason_for_reversal_request.clone().into(),
            self.assign.clone().into(),
            self.name_of_cc_rep.clone().into(),
        ]
    }

    fn from_row(row: &RowView<'_>) -> Self {
        Self {
            customer_id: row.text(CUSTOMER_ID),
            profile_id: row.text(PROFILE_ID),
            number: row.text(NUMBER),
            number2: row.text(NUMBER2),
            location: row.text(LOCATION),
            region: row.text(REGION),
            complaint_source: row.text(COMPLAINT_SOURCE),
            nature_of_complaint: row.text(NATURE_OF_COMPLAINT),
            subject: row.text(SUBJECT),
            details_of_complaint: row.text(DETAILS_OF_COMPLAINT),
            comment: row.text(COMMENT),
            updates: row.text(UPDATES),
            status: row.text(STATUS),
            log_date: row.date(LOG_DATE),
            turnaround_time: row.int(TURNAROUND_TIME),
            resolution_date: row.date(RESOLUTION_DATE),
            reason_for_reversal_request: row.text(REASON_FOR_REVERSAL_REQUEST),
            assign: row.text(ASSIGN),
            name_of_cc_rep: row.text(NAME_OF_CC_REP),
        }
    }
}

impl IdentitySignals for ComplaintRecord {
    fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    fn set_profile_id(&mut self, profile_id: Option<String>) {
        self.profile_id = profile_id;
    }

    fn set_number2(&mut self, number2: Option<String>) {
        self.number2 = number2;
    }

    fn set_customer_id(&mut self, customer_id: Option<String>) {
        self.customer_id = customer_id;
    }
}

/// The two-entity model: customers and the complaints that reference them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySets {
    pub customers: Vec<CustomerRecord>,
    pub complaints: Vec<ComplaintRecord>,
}

impl EntitySets {
    pub fn new(customers: Vec<CustomerRecord>, complaints: Vec<ComplaintRecord>) -> Self {
        Self { customers, complaints }
    }

    pub fn customer_ids(&self) -> HashSet<&str> {
        self.customers.iter().filter_map(|c| c.customer_id.as_deref()).collect()
    }
}

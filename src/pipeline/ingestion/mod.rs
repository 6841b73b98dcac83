//! Source ingestion: workbook sheets or a CSV export, merged into one extract.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::{debug, info, warn};

use crate::domain::{Frame, Value};
use crate::error::{PipelineError, Result};
use crate::metrics::IngestMetrics;
use crate::pipeline::processing::normalize::fields::excel_serial_to_date;

/// One sheet of the source, header row already split off
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSlice {
    pub name: String,
    pub frame: Frame,
}

/// Load every slice of the source file. The file type decides the reader.
pub fn load_source(path: &Path) -> Result<Vec<SheetSlice>> {
    if !path.exists() {
        return Err(PipelineError::Ingest(format!("source file not found at {}", path.display())));
    }
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let slices = match extension.as_str() {
        "csv" => vec![read_csv(path)?],
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path)?,
        other => {
            return Err(PipelineError::Ingest(format!(
                "unsupported source type '{other}' for {}",
                path.display()
            )))
        }
    };
    info!(path = %path.display(), sheets = slices.len(), "Loaded source");
    Ok(slices)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::text(s.as_str()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Value::Int(*f as i64),
        Data::Float(f) => Value::Text(f.to_string()),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).map_or(Value::Null, Value::Date),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::text(s.as_str()),
    }
}

/// Blank headers get a positional name so they never collapse into one column.
fn header_label(header: &str, idx: usize) -> String {
    if header.trim().is_empty() {
        format!("Unnamed {idx}")
    } else {
        header.to_string()
    }
}

fn header_name(cell: &Data, idx: usize) -> String {
    match cell_value(cell) {
        Value::Null => header_label("", idx),
        other => other.to_string(),
    }
}

/// Read every sheet of a workbook (xlsx, xls, xlsb, ods).
pub fn read_workbook(path: &Path) -> Result<Vec<SheetSlice>> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let mut slices = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            debug!(sheet = %name, "empty sheet");
            slices.push(SheetSlice {
                name,
                frame: Frame::default(),
            });
            continue;
        };

        let mut frame = Frame::new(header.iter().enumerate().map(|(idx, cell)| header_name(cell, idx)));
        for row in rows {
            let values: Vec<Value> = row.iter().map(cell_value).collect();
            if values.iter().all(Value::is_null) {
                continue;
            }
            frame.push_row(values);
        }
        debug!(sheet = %name, rows = frame.len(), columns = frame.width(), "read sheet");
        slices.push(SheetSlice { name, frame });
    }
    Ok(slices)
}

/// Read a CSV export as a single slice. Every cell stays text so phone numbers
/// keep their leading zero.
pub fn read_csv(path: &Path) -> Result<SheetSlice> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, header)| header_label(header, idx))
        .collect();

    let mut frame = Frame::new(headers);
    for record in reader.records() {
        let record = record?;
        let values: Vec<Value> = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Value::Null
                } else {
                    Value::text(field)
                }
            })
            .collect();
        if values.iter().all(Value::is_null) {
            continue;
        }
        frame.push_row(values);
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(SheetSlice { name, frame })
}

/// Merge slices into one extract, skipping excluded sheets.
///
/// The merged columns are the union of every slice's columns in first-seen
/// order; a slice lacking a column contributes nulls for it.
pub fn merge_sheets(slices: Vec<SheetSlice>, excluded: &[String]) -> Result<Frame> {
    let kept: Vec<SheetSlice> = slices
        .into_iter()
        .filter(|slice| {
            let skip = excluded.iter().any(|e| e == &slice.name);
            if skip {
                IngestMetrics::record_sheet_excluded();
                info!(sheet = %slice.name, "Excluded sheet");
            }
            !skip
        })
        .collect();
    if kept.is_empty() {
        return Err(PipelineError::Ingest("no sheets left to merge after exclusions".to_string()));
    }

    let mut columns: Vec<String> = Vec::new();
    for slice in &kept {
        for column in slice.frame.columns() {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }
    let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();

    let mut merged = Frame::new(columns.iter().cloned());
    for slice in &kept {
        if slice.frame.width() < columns.len() {
            warn!(
                sheet = %slice.name,
                missing = columns.len() - slice.frame.width(),
                "Sheet lacks columns present elsewhere, filling with nulls"
            );
        }
        IngestMetrics::record_sheet_loaded(slice.frame.len());
        for row in slice.frame.project(&column_refs).rows() {
            merged.push_row(row.clone());
        }
    }

    info!(rows = merged.len(), columns = merged.width(), "Merged sheets");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn slice(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> SheetSlice {
        SheetSlice {
            name: name.to_string(),
            frame: Frame::from_rows(columns.iter().copied(), rows),
        }
    }

    #[test]
    fn test_merge_aligns_column_superset() {
        let slices = vec![
            slice("January", &["Name", "Number"], vec![vec![Value::text("Ama"), Value::text("024")]]),
            slice("February", &["Number", "Region"], vec![vec![Value::text("020"), Value::text("Volta")]]),
            slice("Unresolved", &["Name"], vec![vec![Value::text("skip")]]),
        ];

        let merged = merge_sheets(slices, &["Unresolved".to_string()]).unwrap();

        assert_eq!(merged.columns(), ["Name", "Number", "Region"]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.rows()[1], vec![Value::Null, Value::text("020"), Value::text("Volta")]);
    }

    #[test]
    fn test_merge_fails_when_everything_excluded() {
        let slices = vec![slice("Unresolved", &["Name"], vec![])];
        assert!(matches!(
            merge_sheets(slices, &["Unresolved".to_string()]),
            Err(PipelineError::Ingest(_))
        ));
    }

    #[test]
    fn test_read_csv_keeps_text() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Name,Number,TAT").unwrap();
        writeln!(file, "Ama,0241234567,4").unwrap();
        writeln!(file, ",,").unwrap();
        writeln!(file, "Kojo,,").unwrap();
        file.flush().unwrap();

        let slices = load_source(file.path()).unwrap();

        assert_eq!(slices.len(), 1);
        let frame = &slices[0].frame;
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.rows()[0][1], Value::text("0241234567"));
        assert_eq!(frame.rows()[1][2], Value::Null);
    }

    #[test]
    fn test_read_csv_names_blank_headers() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Name,Number,,").unwrap();
        writeln!(file, "Ama,0241234567,left,right").unwrap();
        file.flush().unwrap();

        let slice = read_csv(file.path()).unwrap();

        assert_eq!(slice.frame.columns(), ["Name", "Number", "Unnamed 2", "Unnamed 3"]);
        assert_eq!(slice.frame.rows()[0][2], Value::text("left"));
        assert_eq!(slice.frame.rows()[0][3], Value::text("right"));

        let mut frame = slice.frame;
        let merged = frame.rename_columns(crate::pipeline::processing::normalize::fields::canonical_column);
        assert_eq!(merged, 0);
        assert_eq!(frame.columns(), ["name", "number", "unnamed2", "unnamed3"]);
    }

    #[test]
    fn test_load_source_missing_file() {
        assert!(matches!(
            load_source(Path::new("/definitely/not/here.xlsx")),
            Err(PipelineError::Ingest(_))
        ));
    }

    #[test]
    fn test_cell_value_mapping() {
        assert_eq!(cell_value(&Data::Float(241234567.0)), Value::Int(241234567));
        assert_eq!(cell_value(&Data::Float(1.5)), Value::text("1.5"));
        assert_eq!(cell_value(&Data::String("  ".into())), Value::Null);
        assert_eq!(cell_value(&Data::Bool(true)), Value::text("TRUE"));
    }
}

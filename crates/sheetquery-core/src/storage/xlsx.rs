//! Workbook loading via calamine (xlsx, xlsm, xlsb, xls, ods).

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use sheetquery_engine::engine::{CellValue, Table};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::error::{QueryError, Result};

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn open(path: &Path) -> Result<Sheets<BufReader<File>>> {
    if !path.is_file() {
        return Err(QueryError::not_found(display_name(path)));
    }
    open_workbook_auto(path).map_err(|e| QueryError::parse(display_name(path), e))
}

/// Sheet names in workbook order.
pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    let workbook = open(path)?;
    let names = workbook.sheet_names();
    debug!(file = %path.display(), sheets = names.len(), "listed sheets");
    Ok(names)
}

/// Load one sheet as a table. `None` selects the first sheet.
///
/// The first row of the used range is the header row. Every call re-reads
/// the file.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let mut workbook = open(path)?;
    let names = workbook.sheet_names();

    let sheet = match sheet {
        Some(requested) if names.iter().any(|n| n == requested) => requested.to_string(),
        Some(requested) => {
            return Err(QueryError::InvalidSheet {
                file: display_name(path),
                sheet: requested.to_string(),
            });
        }
        None => names
            .first()
            .cloned()
            .ok_or_else(|| QueryError::parse(display_name(path), "workbook has no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| QueryError::parse(display_name(path), e))?;
    let table = range_to_table(&range);
    debug!(
        file = %path.display(),
        sheet = %sheet,
        rows = table.row_count(),
        columns = table.column_count(),
        "loaded sheet"
    );
    Ok(table)
}

fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::default();
    };
    let header: Vec<String> = header.iter().map(header_name).collect();
    let body: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    Table::from_rows(header, body)
}

fn header_name(data: &Data) -> String {
    match convert_cell(data) {
        CellValue::Missing => String::new(),
        value => value.to_string(),
    }
}

/// Convert one calamine cell into a table value.
pub(crate) fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Missing,
        Data::String(s) if s.is_empty() => CellValue::Missing,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                CellValue::Number(dt.as_f64())
            } else {
                excel_serial_to_datetime(dt.as_f64())
                    .map(CellValue::DateTime)
                    .unwrap_or(CellValue::Number(dt.as_f64()))
            }
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// Convert an Excel serial date (1900 date system) to a timestamp.
///
/// Serials below 60 predate the phantom 1900-02-29 and use a base one day
/// later.
pub(crate) fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base_day = if serial < 60.0 { 31 } else { 30 };
    let base = NaiveDate::from_ymd_opt(1899, 12, base_day)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(TimeDelta::milliseconds(millis))
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

//! Reading the health log from a workbook or a CSV export.

use calamine::{Data, DataType, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::DashboardError;
use crate::model::{ALL_COLUMNS, Cell, Column, DailyRecord};

pub const DEFAULT_SHEET: &str = "Sheet1";
/// Zero-based index of the header row; the sheet's first row holds a title.
pub const DEFAULT_HEADER_ROW: usize = 1;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Where to find the health log and how it is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub sheet_name: String,
    pub header_row: usize,
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet_name: DEFAULT_SHEET.to_string(),
            header_row: DEFAULT_HEADER_ROW,
        }
    }

    fn is_csv(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SheetValue {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

/// Load every complete row of the configured sheet.
///
/// Rows missing any of the expected fields are dropped. Fails with
/// [`DashboardError::DataSource`] when the file, the sheet or one of the
/// expected header names cannot be found.
pub fn load_records(config: &SourceConfig) -> Result<Vec<DailyRecord>, DashboardError> {
    let path = config.path.as_path();
    if !path.is_file() {
        return Err(DashboardError::DataSource(format!(
            "file not found: {}",
            path.display()
        )));
    }
    let rows = if config.is_csv() {
        read_csv_rows(File::open(path)?)?
    } else {
        read_workbook_rows(path, &config.sheet_name)?
    };
    let records = records_from_rows(&rows, config.header_row)?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    log::info!("Loaded {} records from {}", records.len(), filename);
    Ok(records)
}

fn read_workbook_rows(path: &Path, sheet: &str) -> Result<Vec<Vec<SheetValue>>, DashboardError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(DashboardError::DataSource(format!(
            "sheet {sheet:?} not found in {}",
            path.display()
        )));
    }
    let range = workbook.worksheet_range(sheet)?;
    // calamine trims leading empty rows, pad them back so the header row
    // index stays absolute.
    let leading = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = vec![Vec::new(); leading];
    rows.extend(
        range
            .rows()
            .map(|row| row.iter().map(sheet_value).collect::<Vec<_>>()),
    );
    Ok(rows)
}

fn sheet_value(cell: &Data) -> SheetValue {
    match cell {
        Data::Empty => SheetValue::Empty,
        Data::Float(f) => SheetValue::Number(*f),
        Data::Int(i) => SheetValue::Number(*i as f64),
        Data::String(s) if s.trim().is_empty() => SheetValue::Empty,
        Data::String(s) => SheetValue::Text(s.trim().to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(SheetValue::Date)
            .unwrap_or_else(|| SheetValue::Text(cell.to_string())),
        other => SheetValue::Text(other.to_string()),
    }
}

fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<Vec<SheetValue>>, DashboardError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| match Cell::parse(field) {
                    None => SheetValue::Empty,
                    Some(Cell::Number(v)) => SheetValue::Number(v),
                    Some(Cell::Text(t)) => SheetValue::Text(t),
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn records_from_rows(
    rows: &[Vec<SheetValue>],
    header_row: usize,
) -> Result<Vec<DailyRecord>, DashboardError> {
    let header = rows.get(header_row).ok_or_else(|| {
        DashboardError::DataSource(format!("header row {} is missing", header_row + 1))
    })?;
    let positions = column_positions(header)?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in rows.iter().skip(header_row + 1) {
        if row.iter().all(|v| *v == SheetValue::Empty) {
            continue;
        }
        let fields: Option<Vec<&SheetValue>> = positions
            .iter()
            .map(|&i| row.get(i).filter(|v| **v != SheetValue::Empty))
            .collect();
        match fields {
            Some(fields) => records.push(record_from_fields(&fields)?),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        log::warn!("Dropped {dropped} incomplete rows");
    }
    Ok(records)
}

fn header_text(value: &SheetValue) -> String {
    match value {
        SheetValue::Empty => String::new(),
        SheetValue::Number(v) => v.to_string(),
        SheetValue::Text(s) => s.trim_start_matches('\u{feff}').trim().to_string(),
        SheetValue::Date(d) => d.to_string(),
    }
}

/// Position of every expected column in the header, in [`ALL_COLUMNS`] order.
fn column_positions(header: &[SheetValue]) -> Result<[usize; 9], DashboardError> {
    let names: Vec<String> = header.iter().map(header_text).collect();
    let mut positions = [0usize; 9];
    let mut missing = Vec::new();
    for (slot, column) in positions.iter_mut().zip(ALL_COLUMNS) {
        match names
            .iter()
            .position(|n| Column::from_header(n) == Some(column))
        {
            Some(i) => *slot = i,
            None => missing.push(column),
        }
    }
    if missing.is_empty() {
        return Ok(positions);
    }
    let details: Vec<String> = missing
        .iter()
        .map(|column| match suggest_header(column.header(), &names) {
            Some(found) => format!("{column} (found {found:?})"),
            None => column.to_string(),
        })
        .collect();
    Err(DashboardError::DataSource(format!(
        "header does not match: missing {}",
        details.join(", ")
    )))
}

/// Closest header cell that is not an exact match of any expected column.
fn suggest_header<'a>(expected: &str, names: &'a [String]) -> Option<&'a str> {
    names
        .iter()
        .filter(|n| !n.is_empty() && Column::from_header(n).is_none())
        .map(|n| (n, strsim::jaro_winkler(expected, n)))
        .filter(|(_, score)| *score >= 0.85)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(n, _)| n.as_str())
}

fn record_from_fields(fields: &[&SheetValue]) -> Result<DailyRecord, DashboardError> {
    let date = parse_date(fields[0])
        .ok_or_else(|| DashboardError::malformed(Column::Date, None, &header_text(fields[0])))?;
    let cell = |i: usize| match fields[i] {
        SheetValue::Number(v) => Cell::Number(*v),
        other => Cell::Text(header_text(other)),
    };
    Ok(DailyRecord {
        date,
        weight: cell(1),
        target_weight: cell(2),
        push_ups: cell(3),
        sit_ups: cell(4),
        back_extensions: cell(5),
        squats: cell(6),
        distance: cell(7),
        target_distance: cell(8),
    })
}

fn parse_date(value: &SheetValue) -> Option<NaiveDate> {
    match value {
        SheetValue::Date(d) => Some(*d),
        SheetValue::Number(serial) => from_excel_serial(*serial),
        SheetValue::Text(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .or_else(|| {
                    DATETIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                        .map(|dt| dt.date())
                })
        }
        SheetValue::Empty => None,
    }
}

/// Convert a spreadsheet serial day number (1900 date system).
fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial >= 2_958_466.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

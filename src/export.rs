use crate::{
    analysis::MonthlySummary,
    view::{DataTable, TableRow},
};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Output format picked from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// `.csv` selects CSV; anything else falls back to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
        {
            Some(ext) if ext == "csv" => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(
    value: &T,
    path: P,
) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value).map_err(std::io::Error::other)
}

pub fn write_csv<T: Serialize>(writer: impl Write, records: &[T]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(Into::into)
}

#[derive(Serialize)]
struct MonthlyRow<'a> {
    month: &'a str,
    max_target_distance: f64,
    max_exercise_count: u32,
    summed_distance: f64,
    achievement_rate: Option<f64>,
}

fn monthly_rows(months: &[MonthlySummary]) -> Vec<MonthlyRow<'_>> {
    months
        .iter()
        .map(|m| MonthlyRow {
            month: &m.month,
            max_target_distance: m.max_target_distance,
            max_exercise_count: m.max_exercise_count,
            summed_distance: m.summed_distance,
            achievement_rate: m.achievement_rate,
        })
        .collect()
}

pub fn save_monthly_csv<P: AsRef<Path>>(path: P, months: &[MonthlySummary]) -> csv::Result<()> {
    write_csv(std::fs::File::create(path)?, &monthly_rows(months))
}

pub fn save_monthly_json<P: AsRef<Path>>(path: P, months: &[MonthlySummary]) -> std::io::Result<()> {
    write_json(months, path)
}

/// Write the detail table with the spreadsheet's own header names.
pub fn write_table_csv(writer: impl Write, table: &DataTable) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["日付".to_string()];
    header.extend(table.columns.iter().map(|c| c.header().to_string()));
    wtr.write_record(&header)?;
    for TableRow { date, values } in &table.rows {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(values.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(Into::into)
}

pub fn save_table_csv<P: AsRef<Path>>(path: P, table: &DataTable) -> csv::Result<()> {
    write_table_csv(std::fs::File::create(path)?, table)
}

/// JSON rows keyed by column header.
pub fn save_table_json<P: AsRef<Path>>(path: P, table: &DataTable) -> std::io::Result<()> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = table
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            obj.insert(
                "日付".into(),
                serde_json::Value::String(row.date.format("%Y-%m-%d").to_string()),
            );
            for (c, v) in table.columns.iter().zip(&row.values) {
                obj.insert(c.header().into(), serde_json::json!(v));
            }
            obj
        })
        .collect();
    write_json(&rows, path)
}

//! Placeholder coercion and derived daily fields.

use chrono::NaiveDate;

use crate::error::DashboardError;
use crate::model::{Cell, CleanRecord, Column, DailyRecord};

/// Marker the spreadsheet uses for "not recorded".
pub const DEFAULT_PLACEHOLDER: &str = "-";

/// A numeric type a placeholder cell can collapse to.
pub trait SentinelValue: Sized + Copy {
    fn zero() -> Self;
    fn from_number(value: f64) -> Option<Self>;
}

impl SentinelValue for u32 {
    fn zero() -> Self {
        0
    }

    /// Counts must be finite and non-negative; fractions are truncated.
    fn from_number(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 {
            Some(value.trunc() as u32)
        } else {
            None
        }
    }
}

impl SentinelValue for f64 {
    fn zero() -> Self {
        0.0
    }

    fn from_number(value: f64) -> Option<Self> {
        value.is_finite().then_some(value)
    }
}

/// Coerce one cell, turning the placeholder into zero.
pub fn coerce_with_sentinel<T: SentinelValue>(
    cell: &Cell,
    placeholder: &str,
    column: Column,
    date: NaiveDate,
) -> Result<T, DashboardError> {
    match cell {
        Cell::Number(v) => T::from_number(*v),
        Cell::Text(t) if t.trim() == placeholder => Some(T::zero()),
        Cell::Text(_) => None,
    }
    .ok_or_else(|| DashboardError::malformed(column, Some(date), &cell.to_string()))
}

/// Read a cell that has no placeholder semantics.
fn require_number(cell: &Cell, column: Column, date: NaiveDate) -> Result<f64, DashboardError> {
    match cell {
        Cell::Number(v) if v.is_finite() => Ok(*v),
        other => Err(DashboardError::malformed(column, Some(date), &other.to_string())),
    }
}

/// Clean one loaded row.
pub fn clean_record(record: &DailyRecord, placeholder: &str) -> Result<CleanRecord, DashboardError> {
    let date = record.date;
    let count = |cell: &Cell, column| coerce_with_sentinel::<u32>(cell, placeholder, column, date);

    let push_ups = count(&record.push_ups, Column::PushUps)?;
    let sit_ups = count(&record.sit_ups, Column::SitUps)?;
    let back_extensions = count(&record.back_extensions, Column::BackExtensions)?;
    let squats = count(&record.squats, Column::Squats)?;
    let distance =
        coerce_with_sentinel::<f64>(&record.distance, placeholder, Column::Distance, date)?;
    let weight = require_number(&record.weight, Column::Weight, date)?;
    let target_weight = require_number(&record.target_weight, Column::TargetWeight, date)?;
    let target_distance = require_number(&record.target_distance, Column::TargetDistance, date)?;

    Ok(CleanRecord {
        date,
        weight,
        target_weight,
        push_ups,
        sit_ups,
        back_extensions,
        squats,
        distance,
        target_distance,
        exercise_count: push_ups.max(sit_ups).max(back_extensions).max(squats),
        distance_shortfall: target_distance - distance,
    })
}

/// Clean a whole table, stopping at the first malformed cell.
pub fn clean_records(
    records: &[DailyRecord],
    placeholder: &str,
) -> Result<Vec<CleanRecord>, DashboardError> {
    records.iter().map(|r| clean_record(r, placeholder)).collect()
}

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::Column;

/// Everything that can keep a panel of the dashboard from rendering.
///
/// The enum is cheap to clone so every panel of a [`crate::view::DashboardView`]
/// can hold its own copy of a shared failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("data source error: {0}")]
    DataSource(String),
    #[error("malformed value {value:?} in column {column} on {date}")]
    MalformedValue {
        column: Column,
        date: String,
        value: String,
    },
    #[error("no data recorded for {year}")]
    EmptyYear { year: i32 },
    #[error("correlation unavailable: {0}")]
    DegenerateCorrelation(String),
}

impl DashboardError {
    pub(crate) fn malformed(column: Column, date: Option<NaiveDate>, value: &str) -> Self {
        DashboardError::MalformedValue {
            column,
            date: date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".into()),
            value: value.to_string(),
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(e: std::io::Error) -> Self {
        DashboardError::DataSource(e.to_string())
    }
}

impl From<csv::Error> for DashboardError {
    fn from(e: csv::Error) -> Self {
        DashboardError::DataSource(e.to_string())
    }
}

impl From<calamine::Error> for DashboardError {
    fn from(e: calamine::Error) -> Self {
        DashboardError::DataSource(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_names_column_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5);
        let err = DashboardError::malformed(Column::PushUps, date, "abc");
        assert_eq!(
            err.to_string(),
            "malformed value \"abc\" in column 腕立て on 2024-03-05"
        );
    }

    #[test]
    fn empty_year_message() {
        let err = DashboardError::EmptyYear { year: 2025 };
        assert_eq!(err.to_string(), "no data recorded for 2025");
    }
}

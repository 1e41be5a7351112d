//! The dashboard as plain data.
//!
//! [`build_view`] turns a cleaned table (or the error that prevented loading
//! it), a reference date and the user's selection into a [`DashboardView`].
//! Nothing here touches the UI toolkit; the egui front end only paints the
//! result. Every panel carries its own `Result` so one failing chart never
//! hides the others.

use chrono::{Datelike, NaiveDate};

use crate::analysis::{
    MonthlySummary, YearlyMetrics, date_bounds, filter_range, filter_year, monthly_summary,
    yearly_metrics,
};
use crate::cleaner::clean_records;
use crate::correlation::{CorrelationMatrix, correlation_matrix};
use crate::error::DashboardError;
use crate::loader::{SourceConfig, load_records};
use crate::model::{CleanRecord, Column, DailyRecord, EXERCISE_COLUMNS};
use crate::plotting::{SmoothingMethod, date_points, smooth_points};

/// What the user picked in the detail section.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// `None` means the first recorded date of the year.
    pub start: Option<NaiveDate>,
    /// `None` means the last recorded date of the year.
    pub end: Option<NaiveDate>,
    pub exercises: Vec<Column>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            exercises: EXERCISE_COLUMNS.to_vec(),
        }
    }
}

impl Selection {
    /// Selected exercise columns in sheet order, without duplicates.
    pub fn exercise_columns(&self) -> Vec<Column> {
        EXERCISE_COLUMNS
            .into_iter()
            .filter(|c| self.exercises.contains(c))
            .collect()
    }

    /// Clamp the chosen range to `bounds`.
    pub fn effective_range(&self, bounds: (NaiveDate, NaiveDate)) -> (NaiveDate, NaiveDate) {
        let (lo, hi) = bounds;
        let start = self.start.unwrap_or(lo).clamp(lo, hi);
        let end = self.end.unwrap_or(hi).clamp(lo, hi);
        (start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub method: SmoothingMethod,
    pub window: usize,
}

/// Presentation switches that do not change the underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayOptions {
    pub smoothing: Option<Smoothing>,
}

/// One labelled scalar on the top row.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: Result<String, DashboardError>,
}

/// A named line; x is the day number from the common era, as in the plots.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

/// Date plus distance plus the selected exercise columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub columns: Vec<Column>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub title: String,
    pub year: i32,
    pub metrics: Vec<MetricCard>,
    pub monthly: Result<Vec<MonthlySummary>, DashboardError>,
    /// First and last date of the year's data, bounds for the range picker.
    pub bounds: Option<(NaiveDate, NaiveDate)>,
    /// Range actually applied to the detail panels.
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub exercises: Vec<Column>,
    pub exercise_trend: Result<Vec<Series>, DashboardError>,
    pub distance_trend: Result<Vec<Series>, DashboardError>,
    pub heatmap: Result<CorrelationMatrix, DashboardError>,
    pub table: Result<DataTable, DashboardError>,
}

impl DashboardView {
    /// True when the detail range matched no rows.
    pub fn detail_is_empty(&self) -> bool {
        matches!(&self.table, Ok(t) if t.rows.is_empty())
    }
}

pub const METRIC_LABELS: [&str; 4] = [
    "Days recorded",
    "Gap to target weight",
    "Longest distance",
    "Total distance",
];

pub fn format_days(count: usize) -> String {
    format!("{count} days")
}

pub fn format_kg(value: f64) -> String {
    format!("{value:.1}kg")
}

pub fn format_km(value: f64) -> String {
    format!("{value:.1}km")
}

/// Render the four metric cards, repeating a failure on each of them.
pub fn metric_cards(metrics: &Result<YearlyMetrics, DashboardError>) -> Vec<MetricCard> {
    let values: [Result<String, DashboardError>; 4] = match metrics {
        Ok(m) => [
            Ok(format_days(m.record_count)),
            Ok(format_kg(m.weight_diff)),
            Ok(format_km(m.max_distance)),
            Ok(format_km(m.total_distance)),
        ],
        Err(e) => [Err(e.clone()), Err(e.clone()), Err(e.clone()), Err(e.clone())],
    };
    METRIC_LABELS
        .into_iter()
        .zip(values)
        .map(|(label, value)| MetricCard { label, value })
        .collect()
}

/// Columns shown in the detail table and the heatmap.
pub fn detail_columns(exercises: &[Column]) -> Vec<Column> {
    std::iter::once(Column::Distance)
        .chain(exercises.iter().copied().filter(|c| c.is_exercise()))
        .collect()
}

fn detail_table(records: &[CleanRecord], columns: &[Column]) -> DataTable {
    DataTable {
        columns: columns.to_vec(),
        rows: records
            .iter()
            .map(|r| TableRow {
                date: r.date,
                values: columns.iter().filter_map(|&c| r.value(c)).collect(),
            })
            .collect(),
    }
}

fn exercise_series(records: &[CleanRecord], exercises: &[Column]) -> Vec<Series> {
    exercises
        .iter()
        .map(|&c| Series {
            name: c.label().to_string(),
            points: date_points(records.iter().filter_map(|r| r.value(c).map(|v| (r.date, v)))),
        })
        .collect()
}

fn distance_series(records: &[CleanRecord], options: &DisplayOptions) -> Vec<Series> {
    let points = date_points(records.iter().map(|r| (r.date, r.distance)));
    let mut series = Vec::new();
    if let Some(s) = options.smoothing {
        if let Some(smoothed) = smooth_points(&points, s.method, s.window) {
            series.push(Series {
                name: match s.method {
                    SmoothingMethod::SimpleMA => "Distance MA".to_string(),
                    SmoothingMethod::EMA => "Distance EMA".to_string(),
                },
                points: smoothed,
            });
        }
    }
    series.insert(
        0,
        Series {
            name: Column::Distance.label().to_string(),
            points,
        },
    );
    series
}

fn failed_view(title: String, year: i32, selection: &Selection, err: &DashboardError) -> DashboardView {
    DashboardView {
        title,
        year,
        metrics: metric_cards(&Err(err.clone())),
        monthly: Err(err.clone()),
        bounds: None,
        range: None,
        exercises: selection.exercise_columns(),
        exercise_trend: Err(err.clone()),
        distance_trend: Err(err.clone()),
        heatmap: Err(err.clone()),
        table: Err(err.clone()),
    }
}

/// Build the whole dashboard for the year containing `today`.
pub fn build_view(
    table: &Result<Vec<CleanRecord>, DashboardError>,
    today: NaiveDate,
    selection: &Selection,
    options: &DisplayOptions,
) -> DashboardView {
    let title = today.format("%Y-%m").to_string();
    let year = today.year();
    let records = match table {
        Ok(records) => records,
        Err(e) => return failed_view(title, year, selection, e),
    };

    let this_year = filter_year(records, year);
    let Some(bounds) = date_bounds(&this_year) else {
        return failed_view(title, year, selection, &DashboardError::EmptyYear { year });
    };

    let metrics = metric_cards(&yearly_metrics(&this_year, year));
    let monthly = Ok(monthly_summary(&this_year));

    let exercises = selection.exercise_columns();
    let range = selection.effective_range(bounds);
    let filtered = filter_range(&this_year, range.0, range.1);
    let columns = detail_columns(&exercises);

    DashboardView {
        title,
        year,
        metrics,
        monthly,
        bounds: Some(bounds),
        range: Some(range),
        exercise_trend: Ok(exercise_series(&filtered, &exercises)),
        distance_trend: Ok(distance_series(&filtered, options)),
        heatmap: correlation_matrix(&filtered, &columns),
        table: Ok(detail_table(&filtered, &columns)),
        exercises,
    }
}

/// Load the log and clean the rows dated in `year`.
///
/// Rows from other years are never coerced, so their cells cannot fail the
/// year on display.
pub fn load_table(
    source: &SourceConfig,
    placeholder: &str,
    year: i32,
) -> Result<Vec<CleanRecord>, DashboardError> {
    let raw: Vec<DailyRecord> = load_records(source)?
        .into_iter()
        .filter(|r| r.date.year() == year)
        .collect();
    clean_records(&raw, placeholder)
}

/// One full pass of the pipeline, as run after every interaction.
pub fn run_pipeline(
    source: &SourceConfig,
    placeholder: &str,
    today: NaiveDate,
    selection: &Selection,
    options: &DisplayOptions,
) -> DashboardView {
    let table = load_table(source, placeholder, today.year());
    if let Err(e) = &table {
        log::error!("Failed to load {}: {e}", source.path.display());
    }
    build_view(&table, today, selection, options)
}

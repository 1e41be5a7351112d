//! Row and column types shared by the loading, cleaning and aggregation
//! stages.

use chrono::NaiveDate;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A column of the health log.
///
/// The header names are a compatibility contract with existing spreadsheets
/// and must stay verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Date,
    Weight,
    TargetWeight,
    PushUps,
    SitUps,
    BackExtensions,
    Squats,
    Distance,
    TargetDistance,
}

/// Header text for every column, in sheet order.
pub const ALL_COLUMNS: [Column; 9] = [
    Column::Date,
    Column::Weight,
    Column::TargetWeight,
    Column::PushUps,
    Column::SitUps,
    Column::BackExtensions,
    Column::Squats,
    Column::Distance,
    Column::TargetDistance,
];

/// The four repetition counters, in the order they are offered for selection.
pub const EXERCISE_COLUMNS: [Column; 4] = [
    Column::PushUps,
    Column::SitUps,
    Column::BackExtensions,
    Column::Squats,
];

static HEADERS: phf::Map<&'static str, Column> = phf_map! {
    "日付" => Column::Date,
    "体重" => Column::Weight,
    "目標体重" => Column::TargetWeight,
    "腕立て" => Column::PushUps,
    "腹筋" => Column::SitUps,
    "背筋" => Column::BackExtensions,
    "スクワット" => Column::Squats,
    "移動距離" => Column::Distance,
    "目標移動距離" => Column::TargetDistance,
};

impl Column {
    /// Look up a column by its exact header text.
    pub fn from_header(header: &str) -> Option<Column> {
        HEADERS.get(header.trim()).copied()
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::Date => "日付",
            Column::Weight => "体重",
            Column::TargetWeight => "目標体重",
            Column::PushUps => "腕立て",
            Column::SitUps => "腹筋",
            Column::BackExtensions => "背筋",
            Column::Squats => "スクワット",
            Column::Distance => "移動距離",
            Column::TargetDistance => "目標移動距離",
        }
    }

    /// English label used in the interface.
    pub fn label(self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Weight => "Weight",
            Column::TargetWeight => "Target Weight",
            Column::PushUps => "Push-ups",
            Column::SitUps => "Sit-ups",
            Column::BackExtensions => "Back-extensions",
            Column::Squats => "Squats",
            Column::Distance => "Distance",
            Column::TargetDistance => "Target Distance",
        }
    }

    pub fn is_exercise(self) -> bool {
        EXERCISE_COLUMNS.contains(&self)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// A raw spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    /// Interpret text from a CSV field or a string cell.
    ///
    /// Returns `None` for blank input so the row can be treated as incomplete.
    pub fn parse(text: &str) -> Option<Cell> {
        let t = text.trim();
        if t.is_empty() {
            return None;
        }
        match t.parse::<f64>() {
            Ok(v) => Some(Cell::Number(v)),
            Err(_) => Some(Cell::Text(t.to_string())),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// One loaded row of the health log, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub weight: Cell,
    pub target_weight: Cell,
    pub push_ups: Cell,
    pub sit_ups: Cell,
    pub back_extensions: Cell,
    pub squats: Cell,
    pub distance: Cell,
    pub target_distance: Cell,
}

/// A typed row with the derived daily fields filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub date: NaiveDate,
    pub weight: f64,
    pub target_weight: f64,
    pub push_ups: u32,
    pub sit_ups: u32,
    pub back_extensions: u32,
    pub squats: u32,
    pub distance: f64,
    pub target_distance: f64,
    /// Best of the four exercise counters.
    pub exercise_count: u32,
    /// `target_distance - distance`.
    pub distance_shortfall: f64,
}

impl CleanRecord {
    /// Repetition count for one of the exercise columns.
    ///
    /// Non-exercise columns yield `None`.
    pub fn exercise(&self, column: Column) -> Option<u32> {
        match column {
            Column::PushUps => Some(self.push_ups),
            Column::SitUps => Some(self.sit_ups),
            Column::BackExtensions => Some(self.back_extensions),
            Column::Squats => Some(self.squats),
            _ => None,
        }
    }

    /// Numeric value of any non-date column.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Date => None,
            Column::Weight => Some(self.weight),
            Column::TargetWeight => Some(self.target_weight),
            Column::Distance => Some(self.distance),
            Column::TargetDistance => Some(self.target_distance),
            c => self.exercise(c).map(f64::from),
        }
    }
}

impl From<&CleanRecord> for DailyRecord {
    fn from(r: &CleanRecord) -> Self {
        DailyRecord {
            date: r.date,
            weight: Cell::Number(r.weight),
            target_weight: Cell::Number(r.target_weight),
            push_ups: Cell::Number(f64::from(r.push_ups)),
            sit_ups: Cell::Number(f64::from(r.sit_ups)),
            back_extensions: Cell::Number(f64::from(r.back_extensions)),
            squats: Cell::Number(f64::from(r.squats)),
            distance: Cell::Number(r.distance),
            target_distance: Cell::Number(r.target_distance),
        }
    }
}

// Module for aggregating the cleaned health log
use crate::error::DashboardError;
use crate::model::CleanRecord;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-year scalars shown on the metric cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyMetrics {
    pub record_count: usize,
    /// `target_weight - weight` on the latest recorded date.
    pub weight_diff: f64,
    pub max_distance: f64,
    pub total_distance: f64,
}

/// Aggregated values for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// `YYYY-MM`.
    pub month: String,
    pub max_target_distance: f64,
    pub max_exercise_count: u32,
    pub summed_distance: f64,
    /// Percentage of the month's target covered, capped at 100.
    ///
    /// `None` when no positive target distance was set for the month.
    pub achievement_rate: Option<f64>,
}

impl MonthlySummary {
    /// First day of the month, used as the x coordinate in charts.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&format!("{}-01", self.month), "%Y-%m-%d").ok()
    }
}

/// Keep only the records of one calendar year.
pub fn filter_year(records: &[CleanRecord], year: i32) -> Vec<CleanRecord> {
    records
        .iter()
        .filter(|r| r.date.year() == year)
        .cloned()
        .collect()
}

/// Keep records with `start <= date <= end`.
///
/// An inverted range yields no records.
pub fn filter_range(records: &[CleanRecord], start: NaiveDate, end: NaiveDate) -> Vec<CleanRecord> {
    records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .cloned()
        .collect()
}

/// Earliest and latest date present, if any.
pub fn date_bounds(records: &[CleanRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let min = records.iter().map(|r| r.date).min()?;
    let max = records.iter().map(|r| r.date).max()?;
    Some((min, max))
}

/// Achievement rate for a month from its target and covered distance.
///
/// The raw value is `(1 - shortfall / target) * 100`, which exceeds 100 when
/// the target was overshot; it is capped at 100. Months without a positive
/// target have no rate.
pub fn achievement_rate(max_target_distance: f64, summed_distance: f64) -> Option<f64> {
    if !(max_target_distance > 0.0) {
        return None;
    }
    let shortfall_ratio = (max_target_distance - summed_distance) / max_target_distance;
    Some(((1.0 - shortfall_ratio) * 100.0).min(100.0))
}

/// Group records by calendar month in chronological order.
pub fn monthly_summary(records: &[CleanRecord]) -> Vec<MonthlySummary> {
    let mut map: BTreeMap<(i32, u32), (f64, u32, f64)> = BTreeMap::new();
    for r in records {
        let entry = map
            .entry((r.date.year(), r.date.month()))
            .or_insert((f64::NEG_INFINITY, 0, 0.0));
        entry.0 = entry.0.max(r.target_distance);
        entry.1 = entry.1.max(r.exercise_count);
        entry.2 += r.distance;
    }
    map.into_iter()
        .map(|((year, month), (target, count, distance))| MonthlySummary {
            month: format!("{year:04}-{month:02}"),
            max_target_distance: target,
            max_exercise_count: count,
            summed_distance: distance,
            achievement_rate: achievement_rate(target, distance),
        })
        .collect()
}

/// Compute the metric card values for `year`.
///
/// Records from other years are ignored. Returns
/// [`DashboardError::EmptyYear`] when nothing was recorded in that year.
pub fn yearly_metrics(records: &[CleanRecord], year: i32) -> Result<YearlyMetrics, DashboardError> {
    let mut this_year = records.iter().filter(|r| r.date.year() == year).peekable();
    if this_year.peek().is_none() {
        log::warn!("No records found for {year}");
        return Err(DashboardError::EmptyYear { year });
    }

    let mut record_count = 0usize;
    let mut latest: Option<&CleanRecord> = None;
    let mut max_distance = f64::NEG_INFINITY;
    let mut total_distance = 0.0;
    for r in this_year {
        record_count += 1;
        // First row wins when the latest date repeats.
        if latest.map_or(true, |l| r.date > l.date) {
            latest = Some(r);
        }
        max_distance = max_distance.max(r.distance);
        total_distance += r.distance;
    }
    let latest = latest.ok_or(DashboardError::EmptyYear { year })?;

    Ok(YearlyMetrics {
        record_count,
        weight_diff: latest.target_weight - latest.weight,
        max_distance,
        total_distance,
    })
}

/// Format a user facing message after successfully loading the health log.
pub fn format_load_message(records: usize, filename: &str) -> String {
    format!("Loaded {} records from {}", records, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, distance: f64, target: f64, count: u32) -> CleanRecord {
        CleanRecord {
            date,
            weight: 70.0,
            target_weight: 65.0,
            push_ups: count,
            sit_ups: 0,
            back_extensions: 0,
            squats: 0,
            distance,
            target_distance: target,
            exercise_count: count,
            distance_shortfall: target - distance,
        }
    }

    fn sample() -> Vec<CleanRecord> {
        vec![
            rec(d(2023, 12, 31), 3.0, 8.0, 50),
            rec(d(2024, 1, 1), 5.0, 10.0, 10),
            rec(d(2024, 1, 2), 8.0, 10.0, 30),
            rec(d(2024, 2, 10), 2.0, 20.0, 5),
            rec(d(2024, 2, 11), 4.0, 15.0, 0),
            rec(d(2024, 3, 1), 0.0, 0.0, 0),
        ]
    }

    #[test]
    fn january_scenario_is_clamped() {
        let months = monthly_summary(&filter_year(&sample(), 2024));
        let jan = &months[0];
        assert_eq!(jan.month, "2024-01");
        assert_eq!(jan.max_target_distance, 10.0);
        assert_eq!(jan.summed_distance, 13.0);
        assert_eq!(jan.max_exercise_count, 30);
        assert_eq!(jan.achievement_rate, Some(100.0));
    }

    #[test]
    fn months_are_chronological_and_partial_rate() {
        let months = monthly_summary(&filter_year(&sample(), 2024));
        let labels: Vec<&str> = months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, ["2024-01", "2024-02", "2024-03"]);
        let feb = &months[1];
        assert_eq!(feb.max_target_distance, 20.0);
        assert_eq!(feb.summed_distance, 6.0);
        assert!((feb.achievement_rate.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn zero_target_month_has_no_rate() {
        let months = monthly_summary(&filter_year(&sample(), 2024));
        assert_eq!(months[2].month, "2024-03");
        assert_eq!(months[2].achievement_rate, None);
    }

    #[test]
    fn achievement_rate_bounds() {
        assert_eq!(achievement_rate(10.0, 10.0), Some(100.0));
        assert_eq!(achievement_rate(10.0, 25.0), Some(100.0));
        assert_eq!(achievement_rate(10.0, 0.0), Some(0.0));
        assert_eq!(achievement_rate(0.0, 5.0), None);
        assert_eq!(achievement_rate(-1.0, 5.0), None);
        assert_eq!(achievement_rate(f64::NAN, 5.0), None);
        for (target, sum) in [(1.0, 0.5), (3.0, 9.0), (12.5, 12.4), (7.0, 7.0)] {
            let rate = achievement_rate(target, sum).unwrap();
            assert!(rate <= 100.0);
            if sum >= target {
                assert_eq!(rate, 100.0);
            }
        }
    }

    #[test]
    fn yearly_metrics_scalars() {
        let mut records = sample();
        records[3].weight = 72.0;
        records.push(CleanRecord {
            weight: 70.0,
            target_weight: 65.0,
            ..rec(d(2024, 3, 1), 1.0, 0.0, 0)
        });
        let m = yearly_metrics(&records, 2024).unwrap();
        assert_eq!(m.record_count, 6);
        assert_eq!(m.max_distance, 8.0);
        assert_eq!(m.total_distance, 20.0);
        assert_eq!(m.weight_diff, -5.0);
    }

    #[test]
    fn latest_date_wins_for_weight_gap() {
        let mut records = vec![rec(d(2024, 5, 2), 1.0, 1.0, 0), rec(d(2024, 5, 1), 1.0, 1.0, 0)];
        records[0].weight = 66.0;
        records[1].weight = 80.0;
        let m = yearly_metrics(&records, 2024).unwrap();
        assert_eq!(m.weight_diff, -1.0);
    }

    #[test]
    fn empty_year_is_reported() {
        assert_eq!(
            yearly_metrics(&sample(), 2030),
            Err(DashboardError::EmptyYear { year: 2030 })
        );
        assert_eq!(yearly_metrics(&[], 2024), Err(DashboardError::EmptyYear { year: 2024 }));
    }

    #[test]
    fn widening_a_range_keeps_rows() {
        let records = sample();
        let ranges = [
            (d(2024, 1, 1), d(2024, 1, 2)),
            (d(2024, 1, 2), d(2024, 2, 10)),
            (d(2024, 2, 11), d(2024, 2, 11)),
            (d(2024, 3, 1), d(2024, 1, 1)),
        ];
        for (a, b) in ranges {
            let narrow = filter_range(&records, a, b);
            let wide = filter_range(&records, a.pred_opt().unwrap(), b.succ_opt().unwrap());
            for r in &narrow {
                assert!(wide.contains(r));
            }
        }
    }

    #[test]
    fn range_is_inclusive_and_inverted_is_empty() {
        let records = sample();
        assert_eq!(filter_range(&records, d(2024, 1, 1), d(2024, 1, 2)).len(), 2);
        assert!(filter_range(&records, d(2024, 2, 1), d(2024, 1, 1)).is_empty());
    }

    #[test]
    fn bounds_of_year() {
        let year = filter_year(&sample(), 2024);
        assert_eq!(date_bounds(&year), Some((d(2024, 1, 1), d(2024, 3, 1))));
        assert_eq!(date_bounds(&[]), None);
    }

    #[test]
    fn first_day_of_month() {
        let months = monthly_summary(&sample());
        assert_eq!(months[0].first_day(), Some(d(2023, 12, 1)));
    }

    #[test]
    fn test_format_load_message() {
        let msg = format_load_message(10, "health_data.xlsx");
        assert_eq!(msg, "Loaded 10 records from health_data.xlsx");
    }
}

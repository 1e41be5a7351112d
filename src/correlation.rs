//! Standardized Pearson correlation for the heatmap.

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::model::{CleanRecord, Column};

/// Square matrix of pairwise correlation coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<Column>,
    /// Row-major, `values[i][j]` correlates `columns[i]` with `columns[j]`.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(col)).copied()
    }
}

/// Scale a column to zero mean and unit population variance.
///
/// Fails when the column has fewer than two values or no spread.
pub fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if !std.is_finite() || std <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}

/// Pearson coefficient of two standardized columns of equal length.
fn pearson_standardized(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let r = a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>() / n;
    r.clamp(-1.0, 1.0)
}

/// Correlate the given columns over `records`.
///
/// Each column is standardized first, so the result is unaffected by the
/// columns' units. Fewer than two rows or a constant column make the matrix
/// undefined.
pub fn correlation_matrix(
    records: &[CleanRecord],
    columns: &[Column],
) -> Result<CorrelationMatrix, DashboardError> {
    if records.len() < 2 {
        return Err(DashboardError::DegenerateCorrelation(format!(
            "need at least 2 rows, got {}",
            records.len()
        )));
    }
    if columns.is_empty() {
        return Err(DashboardError::DegenerateCorrelation(
            "no columns selected".into(),
        ));
    }

    let mut scaled = Vec::with_capacity(columns.len());
    for &column in columns {
        let values: Vec<f64> = records.iter().filter_map(|r| r.value(column)).collect();
        if values.len() != records.len() {
            return Err(DashboardError::DegenerateCorrelation(format!(
                "column {} is not numeric",
                column.label()
            )));
        }
        let z = standardize(&values).ok_or_else(|| {
            DashboardError::DegenerateCorrelation(format!(
                "column {} has no variance",
                column.label()
            ))
        })?;
        scaled.push(z);
    }

    let values = scaled
        .iter()
        .enumerate()
        .map(|(i, a)| {
            scaled
                .iter()
                .enumerate()
                .map(|(j, b)| if i == j { 1.0 } else { pearson_standardized(a, b) })
                .collect()
        })
        .collect();

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(day: u32, distance: f64, push_ups: u32, squats: u32) -> CleanRecord {
        CleanRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            weight: 70.0,
            target_weight: 65.0,
            push_ups,
            sit_ups: 0,
            back_extensions: 0,
            squats,
            distance,
            target_distance: 10.0,
            exercise_count: push_ups.max(squats),
            distance_shortfall: 10.0 - distance,
        }
    }

    #[test]
    fn standardize_has_zero_mean_unit_variance() {
        let z = standardize(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let mean: f64 = z.iter().sum::<f64>() / 4.0;
        let var: f64 = z.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        assert!(standardize(&[5.0, 5.0, 5.0]).is_none());
        assert!(standardize(&[1.0]).is_none());
    }

    #[test]
    fn perfectly_related_columns() {
        let records = vec![rec(1, 1.0, 10, 30), rec(2, 2.0, 20, 20), rec(3, 3.0, 30, 10)];
        let m = correlation_matrix(&records, &[Column::Distance, Column::PushUps, Column::Squats])
            .unwrap();
        assert_eq!(m.columns.len(), 3);
        assert!((m.get(0, 1).unwrap() - 1.0).abs() < 1e-9);
        assert!((m.get(0, 2).unwrap() + 1.0).abs() < 1e-9);
        for i in 0..3 {
            assert_eq!(m.get(i, i), Some(1.0));
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn known_coefficient() {
        let records = vec![
            rec(1, 1.0, 2, 0),
            rec(2, 2.0, 1, 1),
            rec(3, 3.0, 4, 0),
            rec(4, 4.0, 3, 1),
        ];
        let m = correlation_matrix(&records, &[Column::Distance, Column::PushUps]).unwrap();
        // Pearson r of (1,2,3,4) and (2,1,4,3) is 0.6.
        assert!((m.get(0, 1).unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn single_row_is_degenerate() {
        let records = vec![rec(1, 1.0, 2, 3)];
        assert!(matches!(
            correlation_matrix(&records, &[Column::Distance, Column::PushUps]),
            Err(DashboardError::DegenerateCorrelation(_))
        ));
    }

    #[test]
    fn constant_column_is_degenerate() {
        let records = vec![rec(1, 1.0, 5, 3), rec(2, 2.0, 5, 4)];
        match correlation_matrix(&records, &[Column::Distance, Column::PushUps]) {
            Err(DashboardError::DegenerateCorrelation(msg)) => assert!(msg.contains("Push-ups")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

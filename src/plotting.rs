use chrono::{Datelike, NaiveDate};
use egui::{Color32, Rgba};
use egui_plot::{AxisHints, HPlacement, Legend, Line, LineStyle, Plot, PlotPoints};

use crate::analysis::MonthlySummary;
use crate::correlation::CorrelationMatrix;
use crate::view::Series;
use serde::{Deserialize, Serialize};

/// Methods available for smoothing plot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmoothingMethod {
    /// Simple moving average using a fixed window size.
    SimpleMA,
    /// Exponential moving average controlled by an alpha value.
    EMA,
}

/// Map dated values to plot coordinates, using the day number as x.
pub fn date_points(values: impl IntoIterator<Item = (NaiveDate, f64)>) -> Vec<[f64; 2]> {
    values
        .into_iter()
        .map(|(d, v)| [d.num_days_from_ce() as f64, v])
        .collect()
}

/// Format a day-number x value as a date label.
pub fn format_day(value: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(value.round() as i32)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| format!("{:.0}", value))
}

fn format_month(value: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(value.round() as i32)
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_else(|| format!("{:.0}", value))
}

/// Calculate a simple moving average of the y-values in `points`.
fn moving_average_points(points: &[[f64; 2]], window: usize) -> Vec<[f64; 2]> {
    if window == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(points.len());
    let mut sum = 0.0;
    for i in 0..points.len() {
        sum += points[i][1];
        if i >= window {
            sum -= points[i - window][1];
        }
        let count = window.min(i + 1) as f64;
        out.push([points[i][0], sum / count]);
    }
    out
}

/// Calculate an exponential moving average of the y-values in `points`.
fn ema_points(points: &[[f64; 2]], alpha: f64) -> Vec<[f64; 2]> {
    if points.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(points.len());
    let mut ema = points[0][1];
    out.push([points[0][0], ema]);
    for p in &points[1..] {
        ema = alpha * p[1] + (1.0 - alpha) * ema;
        out.push([p[0], ema]);
    }
    out
}

/// Smoothed copy of `points`, or `None` when there is nothing to smooth.
pub fn smooth_points(
    points: &[[f64; 2]],
    method: SmoothingMethod,
    window: usize,
) -> Option<Vec<[f64; 2]>> {
    if window <= 1 || points.len() < 2 {
        return None;
    }
    Some(match method {
        SmoothingMethod::SimpleMA => moving_average_points(points, window),
        SmoothingMethod::EMA => {
            let alpha = 2.0 / (window as f64 + 1.0);
            ema_points(points, alpha)
        }
    })
}

fn month_points(
    monthly: &[MonthlySummary],
    value: impl Fn(&MonthlySummary) -> Option<f64>,
) -> Vec<[f64; 2]> {
    monthly
        .iter()
        .filter_map(|m| Some([m.first_day()?.num_days_from_ce() as f64, value(m)?]))
        .collect()
}

/// Line of the largest daily exercise count per month.
pub fn monthly_exercise_line(monthly: &[MonthlySummary]) -> Line {
    let points = month_points(monthly, |m| Some(f64::from(m.max_exercise_count)));
    Line::new(PlotPoints::from(points)).name("Exercise count")
}

/// Line of the total distance per month.
pub fn monthly_distance_line(monthly: &[MonthlySummary]) -> Line {
    let points = month_points(monthly, |m| Some(m.summed_distance));
    Line::new(PlotPoints::from(points)).name("Distance")
}

/// Target distance and achievement rate sharing one plot.
///
/// The rate is scaled into the distance range so both fit; `scale` converts a
/// rate percentage into plot units and is also used by the right axis.
pub struct DualAxisLines {
    pub target: Vec<[f64; 2]>,
    pub rate: Vec<[f64; 2]>,
    pub scale: f64,
}

pub fn target_and_rate_points(monthly: &[MonthlySummary]) -> DualAxisLines {
    let target = month_points(monthly, |m| Some(m.max_target_distance));
    let max_target = target.iter().map(|p| p[1]).fold(0.0_f64, f64::max);
    let scale = if max_target > 0.0 { max_target / 100.0 } else { 1.0 };
    let rate = month_points(monthly, |m| m.achievement_rate.map(|r| r * scale));
    DualAxisLines { target, rate, scale }
}

/// Turn each series into a named plot line.
pub fn series_lines(series: &[Series]) -> Vec<Line> {
    series
        .iter()
        .map(|s| Line::new(PlotPoints::from(s.points.clone())).name(&s.name))
        .collect()
}

/// Plot with a month-labelled x axis, the layout shared by the monthly charts.
pub fn month_plot(id: &str, width: f32, height: f32) -> Plot {
    Plot::new(id)
        .width(width)
        .height(height)
        .x_axis_formatter(|mark, _chars, _| format_month(mark.value))
        .legend(Legend::default())
}

/// Plot with a date-labelled x axis for the daily charts.
pub fn day_plot(id: &str, width: f32, height: f32) -> Plot {
    Plot::new(id)
        .width(width)
        .height(height)
        .x_axis_formatter(|mark, _chars, _| format_day(mark.value))
        .legend(Legend::default())
}

/// Draw target distance on the left axis and achievement rate on the right.
pub fn draw_target_and_rate(ui: &mut egui::Ui, monthly: &[MonthlySummary], width: f32, height: f32) {
    let lines = target_and_rate_points(monthly);
    let scale = lines.scale;
    let axes = vec![
        AxisHints::new_y().label("Target distance (km)"),
        AxisHints::new_y()
            .label("Achievement (%)")
            .placement(HPlacement::Right)
            .formatter(move |mark, _chars, _| format!("{:.0}", mark.value / scale)),
    ];
    month_plot("target_rate_plot", width, height)
        .custom_y_axes(axes)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(PlotPoints::from(lines.target)).name("Target distance"));
            plot_ui.line(
                Line::new(PlotPoints::from(lines.rate))
                    .name("Achievement rate")
                    .style(LineStyle::dotted_dense()),
            );
        });
}

/// Diverging red-white-blue color for a coefficient in [-1, 1].
///
/// Negative values shade towards red and positive ones towards blue.
pub fn heatmap_color(value: f64) -> Color32 {
    let v = if value.is_finite() { value.clamp(-1.0, 1.0) as f32 } else { 0.0 };
    let white = Rgba::from_rgb(0.97, 0.97, 0.97);
    let red = Rgba::from_rgb(0.70, 0.09, 0.17);
    let blue = Rgba::from_rgb(0.13, 0.40, 0.67);
    let (end, t) = if v < 0.0 { (red, -v) } else { (blue, v) };
    let mix = white * (1.0 - t) + end * t;
    Color32::from(mix)
}

/// Paint the correlation matrix as a grid of colored cells.
pub fn draw_heatmap(ui: &mut egui::Ui, matrix: &CorrelationMatrix, cell_size: f32) {
    egui::Grid::new("correlation_heatmap")
        .spacing([2.0, 2.0])
        .show(ui, |ui| {
            ui.label("");
            for c in &matrix.columns {
                ui.label(c.label());
            }
            ui.end_row();
            for (i, row_col) in matrix.columns.iter().enumerate() {
                ui.label(row_col.label());
                for j in 0..matrix.columns.len() {
                    let value = matrix.get(i, j).unwrap_or(f64::NAN);
                    let (rect, response) = ui.allocate_exact_size(
                        egui::vec2(cell_size * 1.6, cell_size),
                        egui::Sense::hover(),
                    );
                    ui.painter().rect_filled(rect, 2.0, heatmap_color(value));
                    let text_color = if value.abs() > 0.6 {
                        Color32::WHITE
                    } else {
                        Color32::BLACK
                    };
                    ui.painter().text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        format!("{value:.2}"),
                        egui::FontId::proportional(12.0),
                        text_color,
                    );
                    response.on_hover_text(format!(
                        "{} / {}: {value:.3}",
                        row_col.label(),
                        matrix.columns[j].label()
                    ));
                }
                ui.end_row();
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui_plot::{PlotGeometry, PlotItem};

    fn month(label: &str, target: f64, count: u32, sum: f64, rate: Option<f64>) -> MonthlySummary {
        MonthlySummary {
            month: label.into(),
            max_target_distance: target,
            max_exercise_count: count,
            summed_distance: sum,
            achievement_rate: rate,
        }
    }

    fn sample_months() -> Vec<MonthlySummary> {
        vec![
            month("2024-01", 10.0, 30, 13.0, Some(100.0)),
            month("2024-02", 20.0, 25, 6.0, Some(30.0)),
            month("2024-03", 0.0, 0, 0.0, None),
        ]
    }

    fn line_points(line: Line) -> Vec<[f64; 2]> {
        if let PlotGeometry::Points(points) = line.geometry() {
            points.iter().map(|p| [p.x, p.y]).collect()
        } else {
            panic!("expected points")
        }
    }

    fn day(y: i32, m: u32, d: u32) -> f64 {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().num_days_from_ce() as f64
    }

    #[test]
    fn test_monthly_exercise_line() {
        let points = line_points(monthly_exercise_line(&sample_months()));
        assert_eq!(
            points,
            vec![
                [day(2024, 1, 1), 30.0],
                [day(2024, 2, 1), 25.0],
                [day(2024, 3, 1), 0.0]
            ]
        );
    }

    #[test]
    fn test_monthly_distance_line() {
        let points = line_points(monthly_distance_line(&sample_months()));
        assert_eq!(points[1], [day(2024, 2, 1), 6.0]);
    }

    #[test]
    fn rate_is_scaled_into_target_range_and_skips_missing() {
        let lines = target_and_rate_points(&sample_months());
        assert_eq!(lines.target.len(), 3);
        assert_eq!(lines.scale, 0.2);
        assert_eq!(lines.rate.len(), 2);
        assert!((lines.rate[0][1] - 20.0).abs() < 1e-9);
        assert!((lines.rate[1][1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn rate_scale_without_targets() {
        let lines = target_and_rate_points(&[month("2024-03", 0.0, 0, 0.0, None)]);
        assert_eq!(lines.scale, 1.0);
        assert!(lines.rate.is_empty());
    }

    #[test]
    fn test_smoothing_ma() {
        let points = vec![[0.0, 2.0], [1.0, 4.0], [2.0, 6.0]];
        let smooth = smooth_points(&points, SmoothingMethod::SimpleMA, 2).unwrap();
        assert_eq!(smooth, vec![[0.0, 2.0], [1.0, 3.0], [2.0, 5.0]]);
    }

    #[test]
    fn test_smoothing_ema() {
        let points = vec![[0.0, 900.0], [1.0, 525.0]];
        // alpha = 2/(2+1)
        let smooth = smooth_points(&points, SmoothingMethod::EMA, 2).unwrap();
        assert_eq!(smooth, vec![[0.0, 900.0], [1.0, 650.0]]);
    }

    #[test]
    fn smoothing_needs_window_and_points() {
        let points = vec![[0.0, 1.0], [1.0, 2.0]];
        assert!(smooth_points(&points, SmoothingMethod::SimpleMA, 1).is_none());
        assert!(smooth_points(&points[..1], SmoothingMethod::EMA, 3).is_none());
    }

    #[test]
    fn test_series_lines() {
        let series = vec![Series {
            name: "Distance".into(),
            points: vec![[1.0, 2.0], [2.0, 3.0]],
        }];
        let lines = series_lines(&series);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            line_points(lines.into_iter().next().unwrap()),
            vec![[1.0, 2.0], [2.0, 3.0]]
        );
    }

    #[test]
    fn test_format_day() {
        assert_eq!(format_day(day(2024, 2, 29)), "2024-02-29");
        assert_eq!(format_month(day(2024, 2, 1)), "2024-02");
    }

    #[test]
    fn heatmap_color_scale() {
        let pos = heatmap_color(1.0);
        let neg = heatmap_color(-1.0);
        let zero = heatmap_color(0.0);
        assert!(pos.b() > pos.r());
        assert!(neg.r() > neg.b());
        assert!(zero.r() > 200 && zero.g() > 200 && zero.b() > 200);
        assert_eq!(heatmap_color(f64::NAN), zero);
        assert_eq!(heatmap_color(3.0), pos);
    }
}

use crate::{
    analysis::MonthlySummary,
    correlation::CorrelationMatrix,
    view::{DashboardView, MetricCard},
};
use maud::{Markup, html};
use plotters::prelude::*;
use std::path::Path;

trait FormatOption {
    fn fmt_opt(self) -> String;
}

impl FormatOption for Option<f64> {
    fn fmt_opt(self) -> String {
        self.map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "n/a".into())
    }
}

impl FormatOption for f64 {
    fn fmt_opt(self) -> String {
        format!("{:.1}", self)
    }
}

/// Write an HTML report for `view` with a PNG chart next to it.
///
/// A chart that cannot be drawn is logged and replaced by a notice.
pub fn export_html_report<P: AsRef<Path>>(path: P, view: &DashboardView) -> std::io::Result<()> {
    let path = path.as_ref();
    let chart_path = path.with_extension("png");
    let chart_file = match &view.monthly {
        Ok(months) if !months.is_empty() => match generate_monthly_chart(months, &chart_path) {
            Ok(_) => chart_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("")),
            Err(e) => {
                log::error!("Failed to generate chart: {}", e);
                std::ffi::OsStr::new("")
            }
        },
        _ => std::ffi::OsStr::new(""),
    };
    let markup = build_html(view, chart_file);
    std::fs::write(path, markup.into_string())
}

fn generate_monthly_chart(
    months: &[MonthlySummary],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (800, 400)).into_drawing_area();
    root.fill(&WHITE)?;
    let max = months
        .iter()
        .map(|m| m.max_target_distance)
        .fold(1.0_f64, f64::max);
    let n = months.len();
    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Target Distance and Achievement", ("sans-serif", 25))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .right_y_label_area_size(40)
        .build_cartesian_2d(0..n, 0f64..max * 1.05)?
        .set_secondary_coord(0..n, 0f64..105.0);
    let labels: Vec<String> = months.iter().map(|m| m.month.clone()).collect();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n.max(1))
        .x_label_formatter(&|i| labels.get(*i).cloned().unwrap_or_default())
        .x_desc("Month")
        .y_desc("Target distance (km)")
        .draw()?;
    chart
        .configure_secondary_axes()
        .y_desc("Achievement (%)")
        .draw()?;
    chart
        .draw_series(LineSeries::new(
            months
                .iter()
                .enumerate()
                .map(|(i, m)| (i, m.max_target_distance)),
            &BLUE,
        ))?
        .label("Target distance")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .draw_secondary_series(LineSeries::new(
            months
                .iter()
                .enumerate()
                .filter_map(|(i, m)| m.achievement_rate.map(|r| (i, r))),
            &RED,
        ))?
        .label("Achievement rate")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn metric_text(card: &MetricCard) -> String {
    match &card.value {
        Ok(v) => v.clone(),
        Err(e) => e.to_string(),
    }
}

fn build_html(view: &DashboardView, chart_file: &std::ffi::OsStr) -> Markup {
    html! {
        html {
            head { meta charset="utf-8"; title { "Health Report " (view.title) } }
            body {
                h1 { (view.title) }
                table border="1" {
                    @for card in &view.metrics {
                        tr { th { (card.label) } td { (metric_text(card)) } }
                    }
                }
                h1 { "Monthly Summary" }
                @match &view.monthly {
                    Ok(months) => {
                        table border="1" {
                            tr {
                                th { "Month" } th { "Target Distance" } th { "Exercise Count" }
                                th { "Distance" } th { "Achievement (%)" }
                            }
                            @for m in months {
                                tr {
                                    td { (m.month) }
                                    td { (m.max_target_distance.fmt_opt()) }
                                    td { (m.max_exercise_count) }
                                    td { (m.summed_distance.fmt_opt()) }
                                    td { (m.achievement_rate.fmt_opt()) }
                                }
                            }
                        }
                    }
                    Err(e) => { p { (e.to_string()) } }
                }
                @if chart_file.is_empty() {
                    p { "Chart unavailable" }
                } @else {
                    img src=(chart_file.to_string_lossy());
                }
                h1 { "Correlation" }
                @match &view.heatmap {
                    Ok(matrix) => { (correlation_table(matrix)) }
                    Err(e) => { p { (e.to_string()) } }
                }
            }
        }
    }
}

fn correlation_table(matrix: &CorrelationMatrix) -> Markup {
    html! {
        table border="1" {
            tr {
                th {}
                @for c in &matrix.columns { th { (c.label()) } }
            }
            @for (i, c) in matrix.columns.iter().enumerate() {
                tr {
                    th { (c.label()) }
                    @for j in 0..matrix.columns.len() {
                        td { (matrix.get(i, j).map(|v| format!("{:.2}", v)).unwrap_or_default()) }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::model::Column;
    use crate::view::{DisplayOptions, Selection, build_view};
    use chrono::NaiveDate;
    use std::ffi::OsStr;

    fn empty_view() -> DashboardView {
        build_view(
            &Ok(Vec::new()),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            &Selection::default(),
            &DisplayOptions::default(),
        )
    }

    #[test]
    fn format_option_for_option_f64() {
        let none: Option<f64> = None;
        assert_eq!(none.fmt_opt(), "n/a");
        assert_eq!(Some(3.46_f64).fmt_opt(), "3.5");
        assert_eq!(Some(-1.27_f64).fmt_opt(), "-1.3");
    }

    #[test]
    fn build_html_renders_errors_in_place() {
        let output = build_html(&empty_view(), OsStr::new("")).into_string();
        assert!(output.contains("2024-05"));
        assert!(output.contains("no data recorded for 2024"));
        assert!(output.contains("Chart unavailable"));
        assert!(!output.contains("<img"));
    }

    #[test]
    fn build_html_renders_tables() {
        let mut view = empty_view();
        view.metrics[0].value = Ok("12 days".into());
        view.monthly = Ok(vec![MonthlySummary {
            month: "2024-01".into(),
            max_target_distance: 10.0,
            max_exercise_count: 30,
            summed_distance: 13.0,
            achievement_rate: None,
        }]);
        view.heatmap = Ok(CorrelationMatrix {
            columns: vec![Column::Distance, Column::Squats],
            values: vec![vec![1.0, -0.25], vec![-0.25, 1.0]],
        });
        let output = build_html(&view, OsStr::new("report.png")).into_string();
        assert!(output.contains("12 days"));
        assert!(output.contains("<td>n/a</td>"));
        assert!(output.contains("<td>13.0</td>"));
        assert!(output.contains("-0.25"));
        assert!(output.contains("Squats"));
        assert!(output.contains("src=\"report.png\""));
    }

    #[test]
    fn degenerate_heatmap_message() {
        let mut view = empty_view();
        view.heatmap = Err(DashboardError::DegenerateCorrelation("need at least 2 rows, got 1".into()));
        let output = build_html(&view, OsStr::new("")).into_string();
        assert!(output.contains("correlation unavailable: need at least 2 rows, got 1"));
    }

    #[test]
    fn export_writes_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");
        export_html_report(&path, &empty_view()).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<html>"));
    }
}

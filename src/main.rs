//! Main application logic and persistent user settings.

use clap::Parser;
use dirs_next as dirs;
use eframe::{App, Frame, NativeOptions, egui};
use egui_extras::DatePickerButton;
use rfd::FileDialog;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use log::info;

mod analysis;
use analysis::format_load_message;
mod cleaner;
use cleaner::DEFAULT_PLACEHOLDER;
mod correlation;
mod error;
mod export;
use export::{
    ExportFormat, save_monthly_csv, save_monthly_json, save_table_csv, save_table_json,
};
mod loader;
use loader::{DEFAULT_HEADER_ROW, DEFAULT_SHEET, SourceConfig};
mod model;
use model::{Column, EXERCISE_COLUMNS};
mod plotting;
use plotting::{
    SmoothingMethod, day_plot, draw_heatmap, draw_target_and_rate, month_plot,
    monthly_distance_line, monthly_exercise_line, series_lines,
};
mod report;
use report::export_html_report;
mod view;
use view::{DashboardView, DisplayOptions, Selection, Smoothing, run_pipeline};

/// Interactive dashboard for a personal health log.
#[derive(Parser, Debug)]
#[command(name = "health-dashboard", about, long_about = None)]
struct Cli {
    /// Spreadsheet (.xlsx) or CSV export to open, instead of the last file used
    path: Option<PathBuf>,
    /// Worksheet holding the log
    #[arg(long)]
    sheet: Option<String>,
    /// Zero-based index of the header row
    #[arg(long)]
    header_row: Option<usize>,
    /// Reference date (YYYY-MM-DD) that selects the year shown; defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Write an HTML report to this path and exit without opening a window
    #[arg(long)]
    report: Option<PathBuf>,
}

fn default_plot_width() -> f32 {
    360.0
}

fn default_plot_height() -> f32 {
    220.0
}

fn default_sheet() -> String {
    DEFAULT_SHEET.to_string()
}

fn default_header_row() -> usize {
    DEFAULT_HEADER_ROW
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_exercises() -> Vec<Column> {
    EXERCISE_COLUMNS.to_vec()
}

fn default_ma_window() -> usize {
    7
}

/// Persistent configuration for the data source and display choices.
///
/// The values are serialized to a JSON file so choices survive across
/// application restarts. Fields added after the first release carry
/// `#[serde(default)]` so older configuration files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Settings {
    last_file: Option<String>,
    #[serde(default)]
    auto_load_last: bool,
    #[serde(default = "default_sheet")]
    sheet_name: String,
    #[serde(default = "default_header_row")]
    header_row: usize,
    /// Cell text meaning "not recorded".
    #[serde(default = "default_placeholder")]
    placeholder: String,
    #[serde(default = "default_exercises")]
    selected_exercises: Vec<Column>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    show_smoothed: bool,
    #[serde(default = "default_ma_window")]
    ma_window: usize,
    #[serde(default = "default_smoothing")]
    smoothing_method: SmoothingMethod,
    #[serde(default = "default_plot_width")]
    plot_width: f32,
    #[serde(default = "default_plot_height")]
    plot_height: f32,
    #[serde(default)]
    show_table: bool,
    #[serde(default)]
    open_report_after_export: bool,
}

fn default_smoothing() -> SmoothingMethod {
    SmoothingMethod::SimpleMA
}

impl Settings {
    const FILE: &'static str = "health_dashboard_settings.json";

    fn path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings from the JSON configuration file.
    ///
    /// A missing or unreadable file yields the defaults.
    fn load() -> Self {
        if let Some(path) = Self::path() {
            if let Ok(data) = std::fs::read_to_string(&path) {
                match serde_json::from_str(&data) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring invalid settings file: {e}"),
                }
            }
        }
        Self::default()
    }

    fn save(&self) {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match serde_json::to_string_pretty(self) {
                Ok(data) => {
                    if let Err(e) = std::fs::write(&path, data) {
                        log::error!("Failed to save settings: {e}");
                    }
                }
                Err(e) => log::error!("Failed to serialize settings: {e}"),
            }
        }
    }

    fn source_config(&self) -> Option<SourceConfig> {
        self.last_file.as_ref().map(|p| SourceConfig {
            path: PathBuf::from(p),
            sheet_name: self.sheet_name.clone(),
            header_row: self.header_row,
        })
    }

    fn selection(&self) -> Selection {
        Selection {
            start: self.start_date,
            end: self.end_date,
            exercises: self.selected_exercises.clone(),
        }
    }

    fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            smoothing: self.show_smoothed.then_some(Smoothing {
                method: self.smoothing_method,
                window: self.ma_window,
            }),
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.path {
            self.last_file = Some(path.display().to_string());
        }
        if let Some(sheet) = &cli.sheet {
            self.sheet_name = sheet.clone();
        }
        if let Some(row) = cli.header_row {
            self.header_row = row;
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_file: None,
            auto_load_last: true,
            sheet_name: default_sheet(),
            header_row: DEFAULT_HEADER_ROW,
            placeholder: default_placeholder(),
            selected_exercises: default_exercises(),
            start_date: None,
            end_date: None,
            show_smoothed: false,
            ma_window: default_ma_window(),
            smoothing_method: SmoothingMethod::SimpleMA,
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
            show_table: true,
            open_report_after_export: false,
        }
    }
}

/// What an export menu entry writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportKind {
    Monthly,
    Table,
    Report,
}

struct HealthApp {
    settings: Settings,
    view: Option<DashboardView>,
    /// Fixed reference date; `None` follows the local clock.
    reference_date: Option<NaiveDate>,
    last_loaded: Option<String>,
    toast_start: Option<Instant>,
    settings_dirty: bool,
    needs_refresh: bool,
    show_settings: bool,
    show_about: bool,
}

impl Default for HealthApp {
    fn default() -> Self {
        Self::new(Settings::load(), None)
    }
}

impl HealthApp {
    fn new(settings: Settings, reference_date: Option<NaiveDate>) -> Self {
        let needs_refresh = settings.auto_load_last && settings.last_file.is_some();
        Self {
            settings,
            view: None,
            reference_date,
            last_loaded: None,
            toast_start: None,
            settings_dirty: false,
            needs_refresh,
            show_settings: false,
            show_about: false,
        }
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Re-run the whole pipeline from the source file.
    fn refresh(&mut self) {
        self.needs_refresh = false;
        let Some(source) = self.settings.source_config() else {
            self.view = None;
            return;
        };
        let view = run_pipeline(
            &source,
            &self.settings.placeholder,
            self.today(),
            &self.settings.selection(),
            &self.settings.display_options(),
        );
        if let Ok(table) = &view.table {
            let filename = source
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| source.path.display().to_string());
            if self.last_loaded.as_deref() != Some(filename.as_str()) {
                info!("Showing {} rows from {}", table.rows.len(), filename);
                self.last_loaded = Some(filename);
                self.toast_start = Some(Instant::now());
            }
        }
        self.view = Some(view);
    }

    fn open_file(&mut self, path: PathBuf) {
        self.settings.last_file = Some(path.display().to_string());
        self.settings.start_date = None;
        self.settings.end_date = None;
        self.last_loaded = None;
        self.settings_dirty = true;
        self.needs_refresh = true;
    }

    fn record_count(&self) -> usize {
        self.view
            .as_ref()
            .and_then(|v| v.table.as_ref().ok())
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    fn toggle_exercise(&mut self, column: Column, on: bool) {
        let selected = &mut self.settings.selected_exercises;
        if on && !selected.contains(&column) {
            selected.push(column);
        } else if !on {
            selected.retain(|c| *c != column);
        }
        self.settings_dirty = true;
        self.needs_refresh = true;
    }

    fn export(&self, kind: ExportKind) {
        let Some(view) = &self.view else {
            return;
        };
        let dialog = match kind {
            ExportKind::Report => FileDialog::new().add_filter("HTML", &["html"]),
            _ => FileDialog::new()
                .add_filter("CSV", &["csv"])
                .add_filter("JSON", &["json"]),
        };
        let Some(path) = dialog.save_file() else {
            return;
        };
        let result: Result<(), String> = match (kind, ExportFormat::from_path(&path)) {
            (ExportKind::Report, _) => export_html_report(&path, view).map_err(|e| e.to_string()),
            (ExportKind::Monthly, format) => match &view.monthly {
                Ok(months) => match format {
                    ExportFormat::Csv => save_monthly_csv(&path, months).map_err(|e| e.to_string()),
                    ExportFormat::Json => {
                        save_monthly_json(&path, months).map_err(|e| e.to_string())
                    }
                },
                Err(e) => Err(e.to_string()),
            },
            (ExportKind::Table, format) => match &view.table {
                Ok(table) => match format {
                    ExportFormat::Csv => save_table_csv(&path, table).map_err(|e| e.to_string()),
                    ExportFormat::Json => save_table_json(&path, table).map_err(|e| e.to_string()),
                },
                Err(e) => Err(e.to_string()),
            },
        };
        match result {
            Ok(()) => {
                info!("Exported {:?} to {}", kind, path.display());
                if kind == ExportKind::Report && self.settings.open_report_after_export {
                    if let Err(e) = open::that(&path) {
                        log::error!("Failed to open report: {e}");
                    }
                }
            }
            Err(e) => log::error!("Failed to export {:?}: {e}", kind),
        }
    }

    fn show_error(ui: &mut egui::Ui, err: &error::DashboardError) {
        ui.colored_label(egui::Color32::LIGHT_RED, err.to_string());
    }

    fn draw_metrics(ui: &mut egui::Ui, view: &DashboardView) {
        ui.columns(view.metrics.len().max(1), |cols| {
            for (col, card) in cols.iter_mut().zip(&view.metrics) {
                col.group(|ui| {
                    ui.label(card.label);
                    match &card.value {
                        Ok(v) => {
                            ui.heading(v);
                        }
                        Err(e) => Self::show_error(ui, e),
                    }
                });
            }
        });
    }

    fn draw_monthly(&self, ui: &mut egui::Ui, view: &DashboardView) {
        let (w, h) = (self.settings.plot_width, self.settings.plot_height);
        let months = match &view.monthly {
            Ok(months) => months,
            Err(e) => {
                Self::show_error(ui, e);
                return;
            }
        };
        ui.columns(3, |cols| {
            cols[0].label("Monthly target distance and achievement rate");
            draw_target_and_rate(&mut cols[0], months, w, h);
            cols[1].label("Monthly exercise count");
            month_plot("monthly_exercise_plot", w, h).show(&mut cols[1], |plot_ui| {
                plot_ui.line(monthly_exercise_line(months));
            });
            cols[2].label("Monthly distance");
            month_plot("monthly_distance_plot", w, h).show(&mut cols[2], |plot_ui| {
                plot_ui.line(monthly_distance_line(months));
            });
        });
    }

    /// Range pickers and exercise toggles.
    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        let (bounds, range) = match &self.view {
            Some(v) => (v.bounds, v.range),
            None => (None, None),
        };
        if let (Some((lo, hi)), Some((start0, end0))) = (bounds, range) {
            ui.horizontal(|ui| {
                ui.label("From:");
                let mut start = start0;
                if ui
                    .add(DatePickerButton::new(&mut start).id_source("start_date"))
                    .changed()
                {
                    self.settings.start_date = Some(start.clamp(lo, hi));
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                ui.label("To:");
                let mut end = end0;
                if ui
                    .add(DatePickerButton::new(&mut end).id_source("end_date"))
                    .changed()
                {
                    self.settings.end_date = Some(end.clamp(lo, hi));
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                if (self.settings.start_date.is_some() || self.settings.end_date.is_some())
                    && ui.button("Full year").clicked()
                {
                    self.settings.start_date = None;
                    self.settings.end_date = None;
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                ui.label(format!("({lo} to {hi})"));
            });
        }
        ui.horizontal(|ui| {
            ui.label("Exercises:");
            for column in EXERCISE_COLUMNS {
                let mut on = self.settings.selected_exercises.contains(&column);
                if ui.checkbox(&mut on, column.label()).changed() {
                    self.toggle_exercise(column, on);
                }
            }
        });
    }

    fn draw_details(&self, ui: &mut egui::Ui, view: &DashboardView) {
        let (w, h) = (self.settings.plot_width * 2.0, self.settings.plot_height);
        let range_text = view
            .range
            .map(|(a, b)| format!("{a} to {b}"))
            .unwrap_or_default();

        ui.label(format!("Selected exercises ({range_text})"));
        match &view.exercise_trend {
            Ok(_) if view.detail_is_empty() => {
                ui.label("No data matches the selected range.");
            }
            Ok(series) => {
                day_plot("exercise_trend_plot", w, h).show(ui, |plot_ui| {
                    for line in series_lines(series) {
                        plot_ui.line(line);
                    }
                });
            }
            Err(e) => Self::show_error(ui, e),
        }

        ui.label(format!("Distance ({range_text})"));
        match &view.distance_trend {
            Ok(series) => {
                day_plot("distance_trend_plot", w, h).show(ui, |plot_ui| {
                    for line in series_lines(series) {
                        plot_ui.line(line);
                    }
                });
            }
            Err(e) => Self::show_error(ui, e),
        }

        ui.label("Standardized correlation of distance and selected exercises");
        match &view.heatmap {
            Ok(matrix) => draw_heatmap(ui, matrix, 32.0),
            Err(e) => Self::show_error(ui, e),
        }

        if self.settings.show_table {
            ui.separator();
            ui.label("Distance and selected exercises");
            match &view.table {
                Ok(table) => {
                    let row_height = ui.text_style_height(&egui::TextStyle::Body);
                    let mut builder = egui_extras::TableBuilder::new(ui)
                        .striped(true)
                        .resizable(true)
                        .vscroll(false)
                        .column(egui_extras::Column::auto());
                    for _ in &table.columns {
                        builder = builder.column(egui_extras::Column::auto());
                    }
                    builder
                        .header(row_height, |mut header| {
                            header.col(|ui| {
                                ui.strong(Column::Date.label());
                            });
                            for c in &table.columns {
                                header.col(|ui| {
                                    ui.strong(c.label());
                                });
                            }
                        })
                        .body(|mut body| {
                            for r in &table.rows {
                                body.row(row_height, |mut row| {
                                    row.col(|ui| {
                                        ui.label(r.date.format("%Y-%m-%d").to_string());
                                    });
                                    for v in &r.values {
                                        row.col(|ui| {
                                            ui.label(format!("{v}"));
                                        });
                                    }
                                });
                            }
                        });
                }
                Err(e) => Self::show_error(ui, e),
            }
        }
    }

    fn draw_settings(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        egui::Window::new("Settings").open(&mut open).show(ctx, |ui| {
            egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
                ui.label("Sheet name:");
                if ui.text_edit_singleline(&mut self.settings.sheet_name).lost_focus() {
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                ui.end_row();

                ui.label("Header row (0-based):");
                if ui
                    .add(egui::DragValue::new(&mut self.settings.header_row).clamp_range(0..=100))
                    .changed()
                {
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                ui.end_row();

                ui.label("Placeholder:");
                if ui.text_edit_singleline(&mut self.settings.placeholder).lost_focus() {
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                ui.end_row();

                if ui
                    .checkbox(&mut self.settings.show_smoothed, "Smooth distance trend")
                    .changed()
                {
                    self.settings_dirty = true;
                    self.needs_refresh = true;
                }
                ui.horizontal(|ui| {
                    let prev = self.settings.smoothing_method;
                    egui::ComboBox::from_id_source("smoothing_method_combo")
                        .selected_text(match self.settings.smoothing_method {
                            SmoothingMethod::SimpleMA => "Simple MA",
                            SmoothingMethod::EMA => "EMA",
                        })
                        .show_ui(ui, |ui| {
                            ui.selectable_value(
                                &mut self.settings.smoothing_method,
                                SmoothingMethod::SimpleMA,
                                "Simple MA",
                            );
                            ui.selectable_value(
                                &mut self.settings.smoothing_method,
                                SmoothingMethod::EMA,
                                "EMA",
                            );
                        });
                    if prev != self.settings.smoothing_method {
                        self.settings_dirty = true;
                        self.needs_refresh = true;
                    }
                    ui.label("Window:");
                    if ui
                        .add(egui::DragValue::new(&mut self.settings.ma_window).clamp_range(1..=90))
                        .changed()
                    {
                        self.settings_dirty = true;
                        self.needs_refresh = true;
                    }
                });
                ui.end_row();

                ui.label("Plot width:");
                if ui
                    .add(egui::DragValue::new(&mut self.settings.plot_width).clamp_range(100.0..=1200.0))
                    .changed()
                {
                    self.settings_dirty = true;
                }
                ui.end_row();
                ui.label("Plot height:");
                if ui
                    .add(egui::DragValue::new(&mut self.settings.plot_height).clamp_range(80.0..=800.0))
                    .changed()
                {
                    self.settings_dirty = true;
                }
                ui.end_row();

                if ui
                    .checkbox(&mut self.settings.show_table, "Show data table")
                    .changed()
                {
                    self.settings_dirty = true;
                }
                if ui
                    .checkbox(&mut self.settings.auto_load_last, "Open last file on start")
                    .changed()
                {
                    self.settings_dirty = true;
                }
                ui.end_row();
                if ui
                    .checkbox(
                        &mut self.settings.open_report_after_export,
                        "Open report after export",
                    )
                    .changed()
                {
                    self.settings_dirty = true;
                }
                ui.end_row();
            });
        });
        self.show_settings = open;
    }
}

impl App for HealthApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Handle spreadsheet drag-and-drop
        for file in ctx.input(|i| i.raw.dropped_files.clone()) {
            match file.path {
                Some(path) => self.open_file(path),
                None => log::warn!("Ignoring dropped file {} without a path", file.name),
            }
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        if let Some(path) = FileDialog::new()
                            .add_filter("Spreadsheet", &["xlsx", "xlsm", "xls", "ods", "csv"])
                            .pick_file()
                        {
                            self.open_file(path);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Reload").clicked() {
                        self.needs_refresh = true;
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Export Monthly Summary").clicked() {
                        self.export(ExportKind::Monthly);
                        ui.close_menu();
                    }
                    if ui.button("Export Table").clicked() {
                        self.export(ExportKind::Table);
                        ui.close_menu();
                    }
                    if ui.button("Export HTML Report").clicked() {
                        self.export(ExportKind::Report);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Settings").clicked() {
                        self.show_settings = true;
                        ui.close_menu();
                    }
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            });
        });

        if self.needs_refresh {
            self.refresh();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                let Some(view) = self.view.clone() else {
                    ui.heading("No spreadsheet loaded");
                    ui.label("Open a health log from the File menu or drop it here.");
                    return;
                };
                ui.heading(&view.title);
                Self::draw_metrics(ui, &view);
                ui.separator();
                self.draw_monthly(ui, &view);
                ui.separator();
                egui::CollapsingHeader::new("Details")
                    .default_open(true)
                    .show(ui, |ui| {
                        self.draw_controls(ui);
                        self.draw_details(ui, &view);
                    });
            });
        });

        if self.show_settings {
            self.draw_settings(ctx);
        }

        if self.show_about {
            egui::Window::new("About")
                .open(&mut self.show_about)
                .show(ctx, |ui| {
                    ui.label("Health dashboard");
                    ui.label(format!(
                        "Reads sheet \"{}\" with the header on row {}.",
                        self.settings.sheet_name,
                        self.settings.header_row + 1
                    ));
                    ui.label("Placeholder cells count as zero for exercises and distance.");
                });
        }

        if let Some(start) = self.toast_start {
            if start.elapsed() < Duration::from_secs(3) {
                let file = self.last_loaded.as_deref().unwrap_or("file");
                egui::Area::new(egui::Id::new("load_toast"))
                    .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
                    .show(ctx, |ui| {
                        ui.label(format_load_message(self.record_count(), file));
                    });
            } else {
                self.toast_start = None;
            }
        }

        if self.settings_dirty {
            self.settings.save();
            self.settings_dirty = false;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.save();
    }
}

/// Render a report without opening a window.
fn write_report(settings: &Settings, today: NaiveDate, out: &std::path::Path) -> std::io::Result<()> {
    let Some(source) = settings.source_config() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no spreadsheet given",
        ));
    };
    let view = run_pipeline(
        &source,
        &settings.placeholder,
        today,
        &settings.selection(),
        &settings.display_options(),
    );
    export_html_report(out, &view)
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut settings = Settings::load();
    settings.apply_cli(&cli);

    if let Some(out) = &cli.report {
        let today = cli.date.unwrap_or_else(|| Local::now().date_naive());
        match write_report(&settings, today, out) {
            Ok(()) => info!("Wrote report to {}", out.display()),
            Err(e) => {
                log::error!("Failed to write report: {e}");
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut app = HealthApp::new(settings, cli.date);
    if cli.path.is_some() {
        app.needs_refresh = true;
        app.settings_dirty = true;
    }
    let options = NativeOptions::default();
    eframe::run_native(
        "Health Dashboard",
        options,
        Box::new(|_cc| Box::new(app)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const SAMPLE_CSV: &str = "健康記録\n\
日付,体重,目標体重,腕立て,腹筋,背筋,スクワット,移動距離,目標移動距離\n\
2024-01-01,70,65,10,-,5,20,5,10\n\
2024-01-02,69.5,65,12,8,-,15,8,10\n\
2024-02-01,69,65,14,9,6,-,-,12\n";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn with_config_dir<F: FnOnce()>(f: F) {
        use std::env;

        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let prev_config = env::var_os("XDG_CONFIG_HOME");
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
        }

        f();

        if let Some(val) = prev_config {
            unsafe {
                env::set_var("XDG_CONFIG_HOME", val);
            }
        } else {
            unsafe {
                env::remove_var("XDG_CONFIG_HOME");
            }
        }
    }

    #[test]
    fn settings_roundtrip() {
        let mut s = Settings::default();
        s.last_file = Some("/tmp/health_data.xlsx".into());
        s.auto_load_last = false;
        s.sheet_name = "Log".into();
        s.header_row = 0;
        s.placeholder = "n/a".into();
        s.selected_exercises = vec![Column::Squats];
        s.start_date = Some(d(2024, 1, 1));
        s.end_date = Some(d(2024, 2, 1));
        s.show_smoothed = true;
        s.ma_window = 3;
        s.smoothing_method = SmoothingMethod::EMA;
        s.show_table = false;
        s.open_report_after_export = true;

        let json = serde_json::to_string(&s).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, loaded);
    }

    #[test]
    fn older_settings_files_get_defaults() {
        let loaded: Settings = serde_json::from_str("{\"last_file\": \"a.xlsx\"}").unwrap();
        assert_eq!(loaded.last_file.as_deref(), Some("a.xlsx"));
        assert_eq!(loaded.sheet_name, "Sheet1");
        assert_eq!(loaded.header_row, 1);
        assert_eq!(loaded.placeholder, "-");
        assert_eq!(loaded.selected_exercises, EXERCISE_COLUMNS.to_vec());
        assert_eq!(loaded.ma_window, 7);
    }

    #[test]
    fn settings_persistence() {
        with_config_dir(|| {
            let mut s = Settings::default();
            s.sheet_name = "Log".into();
            s.save();
            let loaded = Settings::load();
            assert_eq!(loaded.sheet_name, "Log");

            let path = Settings::path().unwrap();
            std::fs::write(&path, "not json").unwrap();
            assert_eq!(Settings::load(), Settings::default());
        });
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "health-dashboard",
            "data.csv",
            "--sheet",
            "Log",
            "--header-row",
            "0",
            "--date",
            "2024-03-01",
        ]);
        let mut s = Settings::default();
        s.apply_cli(&cli);
        assert_eq!(s.last_file.as_deref(), Some("data.csv"));
        assert_eq!(s.sheet_name, "Log");
        assert_eq!(s.header_row, 0);
        assert_eq!(cli.date, Some(d(2024, 3, 1)));
    }

    #[test]
    fn smoothing_option_follows_toggle() {
        let mut s = Settings::default();
        assert_eq!(s.display_options().smoothing, None);
        s.show_smoothed = true;
        s.ma_window = 4;
        let smoothing = s.display_options().smoothing.unwrap();
        assert_eq!(smoothing.window, 4);
        assert_eq!(smoothing.method, SmoothingMethod::SimpleMA);
    }

    #[test]
    fn app_refresh_runs_pipeline_with_reference_date() {
        with_config_dir(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("health_data.csv");
            std::fs::write(&path, SAMPLE_CSV).unwrap();

            let mut app = HealthApp::new(Settings::default(), Some(d(2024, 2, 15)));
            app.open_file(path);
            assert!(app.needs_refresh);
            app.refresh();

            let view = app.view.as_ref().unwrap();
            assert_eq!(view.title, "2024-02");
            assert_eq!(view.metrics[0].value, Ok("3 days".to_string()));
            assert_eq!(view.metrics[1].value, Ok("-4.0kg".to_string()));
            assert_eq!(app.record_count(), 3);
            assert_eq!(app.last_loaded.as_deref(), Some("health_data.csv"));
            assert!(app.toast_start.is_some());
        });
    }

    #[test]
    fn toggling_exercises_reruns_detail_panels() {
        with_config_dir(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("health_data.csv");
            std::fs::write(&path, SAMPLE_CSV).unwrap();

            let mut app = HealthApp::new(Settings::default(), Some(d(2024, 2, 15)));
            app.open_file(path);
            app.refresh();
            app.toggle_exercise(Column::SitUps, false);
            app.toggle_exercise(Column::BackExtensions, false);
            assert!(app.needs_refresh);
            app.refresh();

            let view = app.view.as_ref().unwrap();
            assert_eq!(view.exercises, vec![Column::PushUps, Column::Squats]);
            let table = view.table.as_ref().unwrap();
            assert_eq!(
                table.columns,
                vec![Column::Distance, Column::PushUps, Column::Squats]
            );
        });
    }

    #[test]
    fn app_shows_load_errors_per_panel() {
        with_config_dir(|| {
            let mut app = HealthApp::new(Settings::default(), Some(d(2024, 1, 1)));
            app.open_file(PathBuf::from("/definitely/missing/health_data.xlsx"));
            app.refresh();
            let view = app.view.as_ref().unwrap();
            assert!(view.metrics.iter().all(|c| c.value.is_err()));
            assert!(app.last_loaded.is_none());
        });
    }

    #[test]
    fn app_renders_a_frame() {
        with_config_dir(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("health_data.csv");
            std::fs::write(&path, SAMPLE_CSV).unwrap();

            let mut app = HealthApp::new(Settings::default(), Some(d(2024, 2, 15)));
            app.open_file(path);
            let ctx = egui::Context::default();
            let _ = ctx.run(Default::default(), |ctx| {
                if app.needs_refresh {
                    app.refresh();
                }
                egui::CentralPanel::default().show(ctx, |ui| {
                    let view = app.view.clone().unwrap();
                    HealthApp::draw_metrics(ui, &view);
                    app.draw_monthly(ui, &view);
                    app.draw_details(ui, &view);
                });
            });
            assert!(app.view.is_some());
        });
    }

    #[test]
    fn headless_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health_data.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();
        let out = dir.path().join("report.html");

        let mut settings = Settings::default();
        settings.last_file = Some(path.display().to_string());
        write_report(&settings, d(2024, 2, 15), &out).unwrap();
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("2024-02"));
        assert!(html.contains("3 days"));

        assert!(write_report(&Settings::default(), d(2024, 2, 15), &out).is_err());
    }
}

use eframe::egui::{self, Color32, Grid, Id, RichText, ScrollArea, Ui};

use crate::chart::PlotKind;
use crate::color;
use crate::config::Theme;
use crate::data::clean::FillMethod;
use crate::data::stats::{self, ColumnSummary};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Modal error dialog
// ---------------------------------------------------------------------------

/// Blocks the rest of the UI until the user acknowledges the error.
pub fn error_dialog(ctx: &egui::Context, state: &mut AppState) {
    let Some(message) = state.error.clone() else {
        return;
    };
    let modal = egui::Modal::new(Id::new("error_dialog")).show(ctx, |ui: &mut Ui| {
        ui.set_max_width(420.0);
        ui.heading("Error");
        ui.add_space(4.0);
        ui.label(RichText::new(message).color(Color32::RED));
        ui.add_space(8.0);
        ui.button("OK").clicked()
    });
    if modal.inner || modal.should_close() {
        state.error = None;
    }
}

// ---------------------------------------------------------------------------
// Available columns
// ---------------------------------------------------------------------------

/// Lists the backtick-quoted names; clicking one appends it to the filter.
pub fn columns_window(ctx: &egui::Context, state: &mut AppState) {
    let mut open = state.show_columns;
    let names = state.data.quoted_column_names();
    egui::Window::new("Available columns")
        .open(&mut open)
        .default_width(240.0)
        .show(ctx, |ui: &mut Ui| {
            if names.is_empty() {
                ui.label("No data loaded.");
                return;
            }
            ui.weak("Click a name to add it to the filter.");
            ScrollArea::vertical().show(ui, |ui: &mut Ui| {
                for name in &names {
                    if ui.button(RichText::new(name).monospace()).clicked() {
                        if !state.filter_text.is_empty() && !state.filter_text.ends_with(' ') {
                            state.filter_text.push(' ');
                        }
                        state.filter_text.push_str(name);
                    }
                }
            });
        });
    state.show_columns = open;
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

pub fn stats_window(ctx: &egui::Context, state: &mut AppState) {
    let mut open = state.show_stats;
    egui::Window::new("Statistics")
        .open(&mut open)
        .default_width(320.0)
        .show(ctx, |ui: &mut Ui| {
            let Some(view) = state.data.display_data() else {
                ui.label("No data loaded.");
                return;
            };
            let current = state.stats_column.clone().unwrap_or_default();
            egui::ComboBox::from_id_salt("stats_column")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for col in view.column_names() {
                        ui.selectable_value(&mut state.stats_column, Some(col.clone()), col);
                    }
                });
            ui.separator();

            let dp = state.config.decimal_places;
            let summary = match stats::column_summary(&view, &current) {
                Ok(s) => s,
                Err(e) => {
                    ui.label(format!("{e:#}"));
                    return;
                }
            };
            Grid::new("stats_grid").striped(true).show(ui, |ui: &mut Ui| {
                let mut row = |label: &str, value: String| {
                    ui.label(label);
                    ui.monospace(value);
                    ui.end_row();
                };
                match &summary {
                    ColumnSummary::Numeric {
                        count,
                        nulls,
                        min,
                        max,
                        mean,
                        std,
                        quartiles,
                        ..
                    } => {
                        row("Count", count.to_string());
                        row("Nulls", nulls.to_string());
                        row("Mean", format!("{mean:.dp$}"));
                        row("Std", format!("{std:.dp$}"));
                        row("Min", format!("{min:.dp$}"));
                        row("25%", format!("{:.dp$}", quartiles.q1));
                        row("50%", format!("{:.dp$}", quartiles.median));
                        row("75%", format!("{:.dp$}", quartiles.q3));
                        row("Max", format!("{max:.dp$}"));
                    }
                    ColumnSummary::Categorical {
                        count,
                        nulls,
                        unique,
                        most_common,
                        ..
                    } => {
                        row("Count", count.to_string());
                        row("Nulls", nulls.to_string());
                        row("Unique", unique.to_string());
                        if let Some((value, n)) = most_common {
                            row("Most common", format!("{value} ({n})"));
                        }
                    }
                }
            });

            if let Ok(d) = stats::distribution(&view, &current) {
                ui.separator();
                ui.label(format!(
                    "Skewness {:.dp$}   Kurtosis {:.dp$}",
                    d.skewness, d.kurtosis
                ));
            }

            ui.separator();
            ui.collapsing("Correlation", |ui: &mut Ui| {
                match stats::correlation_matrix(&view, &[]) {
                    Ok(m) => correlation_grid(ui, &m, dp),
                    Err(e) => {
                        ui.label(format!("{e:#}"));
                    }
                }
            });
        });
    state.show_stats = open;
}

fn correlation_grid(ui: &mut Ui, matrix: &stats::CorrelationMatrix, dp: usize) {
    ScrollArea::both().max_height(240.0).show(ui, |ui: &mut Ui| {
        Grid::new("corr_grid").striped(true).show(ui, |ui: &mut Ui| {
            ui.label("");
            for c in &matrix.columns {
                ui.strong(c);
            }
            ui.end_row();
            for (name, row) in matrix.columns.iter().zip(&matrix.values) {
                ui.strong(name);
                for r in row {
                    ui.monospace(format!("{r:.dp$}"));
                }
                ui.end_row();
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Data cleaning
// ---------------------------------------------------------------------------

pub fn clean_window(ctx: &egui::Context, state: &mut AppState) {
    let mut open = state.show_clean;
    let mut run = false;
    egui::Window::new("Clean data")
        .open(&mut open)
        .resizable(false)
        .show(ctx, |ui: &mut Ui| {
            let opts = &mut state.clean_options;
            ui.checkbox(&mut opts.drop_na, "Drop rows with missing values");
            ui.checkbox(&mut opts.fill_na, "Fill missing values");
            ui.add_enabled_ui(opts.fill_na, |ui: &mut Ui| {
                ui.horizontal(|ui: &mut Ui| {
                    for (method, label) in [
                        (FillMethod::Mean, "Mean"),
                        (FillMethod::Median, "Median"),
                        (FillMethod::Mode, "Mode"),
                        (FillMethod::Constant, "Value"),
                    ] {
                        ui.radio_value(&mut opts.fill_method, method, label);
                    }
                });
                if opts.fill_method == FillMethod::Constant {
                    ui.add(egui::DragValue::new(&mut opts.fill_value).speed(0.1));
                }
            });
            ui.checkbox(&mut opts.drop_duplicates, "Drop duplicate rows");
            ui.checkbox(&mut opts.convert_numeric, "Convert text columns to numbers");

            let mut round = opts.round_decimals.is_some();
            ui.horizontal(|ui: &mut Ui| {
                ui.checkbox(&mut round, "Round to");
                let mut places = opts.round_decimals.unwrap_or(2);
                ui.add_enabled(round, egui::DragValue::new(&mut places).range(0..=10));
                opts.round_decimals = round.then_some(places);
            });

            ui.separator();
            run = ui
                .add_enabled(state.data.has_data(), egui::Button::new("Apply"))
                .clicked();
        });
    state.show_clean = open;
    if run {
        state.clean();
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

enum PreferencesAction {
    Save,
    Cancel,
}

/// Edits a draft of the config; nothing changes until Save.
pub fn preferences_window(ctx: &egui::Context, state: &mut AppState) {
    let Some(draft) = state.preferences.as_mut() else {
        return;
    };
    let mut open = true;
    let mut action = None;
    egui::Window::new("Preferences")
        .open(&mut open)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui: &mut Ui| {
            Grid::new("preferences_grid").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Theme");
                ui.horizontal(|ui: &mut Ui| {
                    ui.radio_value(&mut draft.theme, Theme::Light, "Light");
                    ui.radio_value(&mut draft.theme, Theme::Dark, "Dark");
                });
                ui.end_row();

                ui.label("Default plot");
                egui::ComboBox::from_id_salt("default_plot_kind")
                    .selected_text(draft.default_plot_kind.label())
                    .show_ui(ui, |ui: &mut Ui| {
                        for kind in PlotKind::ALL {
                            ui.selectable_value(&mut draft.default_plot_kind, kind, kind.label());
                        }
                    });
                ui.end_row();

                ui.label("Default colour");
                let mut colour =
                    color::parse_hex(&draft.default_plot_color).unwrap_or(Color32::LIGHT_BLUE);
                if ui.color_edit_button_srgba(&mut colour).changed() {
                    draft.default_plot_color = color::to_hex(colour);
                }
                ui.end_row();

                ui.label("Show grid");
                ui.checkbox(&mut draft.show_grid, "");
                ui.end_row();

                ui.label("Decimal places");
                ui.add(egui::DragValue::new(&mut draft.decimal_places).range(0..=10));
                ui.end_row();

                ui.label("Recent files kept");
                ui.add(egui::DragValue::new(&mut draft.max_recent_files).range(1..=50));
                ui.end_row();

                ui.label("Save settings on change");
                ui.checkbox(&mut draft.auto_save_settings, "");
                ui.end_row();
            });

            ui.separator();
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Reset to defaults").clicked() {
                    draft.reset_to_defaults();
                }
                if ui
                    .add_enabled(
                        !draft.recent_files.is_empty(),
                        egui::Button::new("Clear recent files"),
                    )
                    .clicked()
                {
                    draft.clear_recent_files();
                }
            });
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Save").clicked() {
                    action = Some(PreferencesAction::Save);
                }
                if ui.button("Cancel").clicked() {
                    action = Some(PreferencesAction::Cancel);
                }
            });
        });

    match action {
        Some(PreferencesAction::Save) => {
            if let Some(draft) = state.preferences.take() {
                state.apply_preferences(draft);
            }
        }
        Some(PreferencesAction::Cancel) => state.preferences = None,
        None if !open => state.preferences = None,
        None => {}
    }
}

// ---------------------------------------------------------------------------
// About
// ---------------------------------------------------------------------------

pub fn about_window(ctx: &egui::Context, state: &mut AppState) {
    egui::Window::new("About")
        .open(&mut state.show_about)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui: &mut Ui| {
            ui.heading(format!("PlotData {}", env!("CARGO_PKG_VERSION")));
            ui.label(env!("CARGO_PKG_DESCRIPTION"));
        });
}

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::chart::PlotKind;
use crate::config::Theme;
use crate::data::stats;
use crate::state::{AppState, with_default_extension};
use crate::ui::plot::{self, PlotImageRequest};

// ---------------------------------------------------------------------------
// Left side panel: plot settings and filter
// ---------------------------------------------------------------------------

fn column_combo(
    ui: &mut Ui,
    id: &str,
    label: &str,
    value: &mut Option<String>,
    columns: &[String],
    optional: bool,
) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        egui::ComboBox::from_id_salt(id)
            .selected_text(value.as_deref().unwrap_or("—"))
            .show_ui(ui, |ui: &mut Ui| {
                if optional {
                    ui.selectable_value(value, None, "—");
                }
                for col in columns {
                    ui.selectable_value(value, Some(col.clone()), col);
                }
            });
    });
}

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    let Some(view) = state.data.display_data() else {
        ui.heading("PlotData");
        ui.separator();
        ui.label("No dataset loaded.");
        return;
    };
    let numeric = stats::numeric_columns(&view);
    let all_columns = view.column_names().to_vec();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Filter");
            filter_box(ui, state);
            ui.separator();

            ui.heading("Plot");
            let plot = &mut state.plot;
            egui::ComboBox::from_id_salt("plot_kind")
                .selected_text(plot.kind.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for kind in PlotKind::ALL {
                        ui.selectable_value(&mut plot.kind, kind, kind.label());
                    }
                });

            column_combo(ui, "x_column", "X", &mut plot.x, &numeric, false);
            if plot.kind.needs_y() {
                column_combo(ui, "y_column", "Y", &mut plot.y, &numeric, false);
            }
            match plot.kind {
                PlotKind::Scatter => {
                    column_combo(
                        ui,
                        "color_by",
                        "Colour by",
                        &mut plot.color_by,
                        &all_columns,
                        true,
                    );
                    ui.add(egui::Slider::new(&mut plot.point_size, 1.0..=10.0).text("Point size"));
                }
                PlotKind::ErrorBar => {
                    column_combo(ui, "x_err", "X error", &mut plot.x_err, &numeric, true);
                    column_combo(ui, "y_err", "Y error", &mut plot.y_err, &numeric, true);
                    ui.add(egui::Slider::new(&mut plot.point_size, 1.0..=10.0).text("Point size"));
                }
                PlotKind::Histogram | PlotKind::Density => {
                    ui.add(egui::Slider::new(&mut plot.bins, 2..=200).text("Bins"));
                }
            }
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Colour");
                ui.color_edit_button_srgba(&mut plot.color);
            });
            ui.checkbox(&mut plot.show_grid, "Show grid");
        });
}

fn filter_box(ui: &mut Ui, state: &mut AppState) {
    ui.weak("e.g. MJD > 52000 and `Col A` < 10");
    let response = ui.add(
        egui::TextEdit::multiline(&mut state.filter_text)
            .desired_rows(2)
            .desired_width(f32::INFINITY)
            .code_editor()
            .hint_text("Filter expression"),
    );
    let submitted =
        response.has_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter) && i.modifiers.command);

    ui.horizontal(|ui: &mut Ui| {
        let busy = state.data.filter_pending();
        if ui.add_enabled(!busy, egui::Button::new("Apply")).clicked() || submitted {
            state.apply_filter();
        }
        if ui.button("Clear").clicked() {
            state.clear_filter();
        }
        if ui.button("Columns…").clicked() {
            state.show_columns = true;
        }
        if busy {
            ui.spinner();
        }
    });
    if let Some(expr) = state.data.filter_expression() {
        ui.label(RichText::new(format!("Active: {expr}")).small().weak());
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu bar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                ui.close_menu();
                open_file_dialog(state);
            }
            ui.menu_button("Recent files", |ui: &mut Ui| {
                if state.config.recent_files.is_empty() {
                    ui.weak("None");
                }
                for path in state.config.recent_files.clone() {
                    if ui.button(path.display().to_string()).clicked() {
                        ui.close_menu();
                        state.open_file(&path);
                    }
                }
                ui.separator();
                if ui
                    .add_enabled(
                        !state.config.recent_files.is_empty(),
                        egui::Button::new("Clear recent files"),
                    )
                    .clicked()
                {
                    ui.close_menu();
                    state.clear_recent_files();
                }
            });
            if ui
                .add_enabled(state.data.has_data(), egui::Button::new("Export…"))
                .clicked()
            {
                ui.close_menu();
                export_file_dialog(state);
            }
            if ui
                .add_enabled(state.data.has_data(), egui::Button::new("Save plot as PNG…"))
                .clicked()
            {
                ui.close_menu();
                save_plot_dialog(ui.ctx(), state);
            }
            ui.separator();
            if ui.button("Save plot settings…").clicked() {
                ui.close_menu();
                save_plot_settings_dialog(state);
            }
            if ui.button("Load plot settings…").clicked() {
                ui.close_menu();
                load_plot_settings_dialog(state);
            }
            ui.separator();
            if ui.button("Quit").clicked() {
                ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });

        ui.menu_button("Data", |ui: &mut Ui| {
            let has_data = state.data.has_data();
            if ui.add_enabled(has_data, egui::Button::new("Clean…")).clicked() {
                ui.close_menu();
                state.show_clean = true;
            }
            if ui
                .add_enabled(has_data, egui::Button::new("Flag outliers"))
                .clicked()
            {
                ui.close_menu();
                state.flag_outliers();
            }
            if ui.add_enabled(has_data, egui::Button::new("Statistics…")).clicked() {
                ui.close_menu();
                state.show_stats = true;
            }
        });

        ui.menu_button("View", |ui: &mut Ui| {
            if ui.button("Available columns").clicked() {
                ui.close_menu();
                state.show_columns = true;
            }
            let dark = state.config.theme == Theme::Dark;
            if ui.selectable_label(dark, "Dark theme").clicked() {
                ui.close_menu();
                state.set_theme(if dark { Theme::Light } else { Theme::Dark });
            }
            ui.separator();
            if ui.button("Preferences…").clicked() {
                ui.close_menu();
                state.open_preferences();
            }
        });

        ui.menu_button("Help", |ui: &mut Ui| {
            if ui.button("About").clicked() {
                ui.close_menu();
                state.show_about = true;
            }
        });

        ui.separator();

        if let Some(view) = state.data.display_data() {
            let total = view.source().n_rows();
            if view.is_filtered() {
                ui.label(format!("{} of {} rows", view.n_rows(), total));
            } else {
                ui.label(format!("{total} rows"));
            }
        }
        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::GRAY));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open data file")
        .add_filter(
            "Supported files",
            &["csv", "tsv", "txt", "dat", "xlsx", "xls", "xlsm", "ods", "json", "parquet", "pq"],
        )
        .add_filter("Text", &["csv", "tsv", "txt", "dat"])
        .add_filter("Excel", &["xlsx", "xls", "xlsm", "ods"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open_file(&path);
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export displayed rows")
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .set_file_name("export.csv")
        .save_file();

    if let Some(path) = file {
        state.export(&path);
    }
}

fn save_plot_dialog(ctx: &egui::Context, state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save plot")
        .add_filter("PNG image", &["png"])
        .set_file_name("plot.png")
        .save_file();

    if let Some(path) = file {
        plot::request_plot_image(
            ctx,
            PlotImageRequest {
                path: with_default_extension(&path, "png"),
                rect: state.plot_rect,
            },
        );
    }
}

fn save_plot_settings_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save plot settings")
        .add_filter("JSON", &["json"])
        .set_file_name("plot_settings.json")
        .save_file();

    if let Some(path) = file {
        state.save_plot_settings(&path);
    }
}

fn load_plot_settings_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Load plot settings")
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.load_plot_settings(&path);
    }
}

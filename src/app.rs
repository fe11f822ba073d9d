use eframe::egui;

use crate::config::Theme;
use crate::state::AppState;
use crate::ui::{dialogs, panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct PlotDataApp {
    pub state: AppState,
}

impl PlotDataApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for PlotDataApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(match self.state.config.theme {
            Theme::Light => egui::Visuals::light(),
            Theme::Dark => egui::Visuals::dark(),
        });

        self.state.poll();
        if let Some((request, image)) = plot::take_plot_image(ctx) {
            let result = plot::save_png(&image, &request.path);
            self.state.plot_image_saved(&request.path, result);
        }
        if self.state.data.filter_pending() {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filter and plot settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        let view = self.state.data.display_data();

        // ---- Bottom panel: data preview ----
        if let Some(view) = &view {
            egui::TopBottomPanel::bottom("data_table")
                .resizable(true)
                .default_height(220.0)
                .show(ctx, |ui| {
                    table::data_table(ui, view, self.state.config.decimal_places);
                });
        }

        // ---- Central panel: plot ----
        let central = egui::CentralPanel::default().show(ctx, |ui| {
            plot::data_plot(ui, view.as_ref(), &self.state.plot);
        });
        self.state.plot_rect = Some(central.response.rect);

        dialogs::columns_window(ctx, &mut self.state);
        dialogs::stats_window(ctx, &mut self.state);
        dialogs::clean_window(ctx, &mut self.state);
        dialogs::about_window(ctx, &mut self.state);
        dialogs::preferences_window(ctx, &mut self.state);
        dialogs::error_dialog(ctx, &mut self.state);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.save_config();
    }
}

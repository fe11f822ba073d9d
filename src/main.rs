use eframe::egui;
use plotdata::app::PlotDataApp;
use plotdata::config::{AppConfig, default_config_path};
use plotdata::state::AppState;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = default_config_path();
    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path),
        None => {
            log::warn!("No home directory; settings will not be saved");
            AppConfig::default()
        }
    };
    let [width, height] = config.window_size;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width, height])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    let mut state = AppState::new(config, config_path);
    if let Some(path) = std::env::args_os().nth(1) {
        state.open_file(std::path::Path::new(&path));
    }

    eframe::run_native(
        "PlotData",
        options,
        Box::new(|_cc| Ok(Box::new(PlotDataApp::new(state)))),
    )
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use eframe::egui::{self, Color32};
use serde::{Deserialize, Serialize};

use crate::chart::PlotKind;
use crate::color;
use crate::config::{AppConfig, Theme};
use crate::data::clean::CleanOptions;
use crate::data::export;
use crate::data::manager::DataManager;
use crate::data::stats;

// ---------------------------------------------------------------------------
// Plot settings
// ---------------------------------------------------------------------------

/// What the central plot draws. Column choices are names in the current
/// dataset; stale ones are reset when a new file is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSettings {
    pub kind: PlotKind,
    pub x: Option<String>,
    pub y: Option<String>,
    pub color_by: Option<String>,
    pub x_err: Option<String>,
    pub y_err: Option<String>,
    pub bins: usize,
    pub point_size: f32,
    pub color: Color32,
    pub show_grid: bool,
}

impl PlotSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            kind: config.default_plot_kind,
            x: None,
            y: None,
            color_by: None,
            x_err: None,
            y_err: None,
            bins: 30,
            point_size: 3.0,
            color: color::parse_hex(&config.default_plot_color).unwrap_or(Color32::LIGHT_BLUE),
            show_grid: config.show_grid,
        }
    }

    /// Take the kind, colour and grid defaults from `config`, keeping the
    /// column choices.
    fn apply_defaults(&mut self, config: &AppConfig) {
        let defaults = Self::from_config(config);
        self.kind = defaults.kind;
        self.color = defaults.color;
        self.show_grid = defaults.show_grid;
    }

    /// Point the axes at the first numeric columns of a fresh dataset.
    fn reset_columns(&mut self, numeric: &[String]) {
        self.x = numeric.first().cloned();
        self.y = numeric.get(1).or(numeric.first()).cloned();
        self.color_by = None;
        self.x_err = None;
        self.y_err = None;
    }
}

/// On-disk form of [`PlotSettings`]; the colour is kept as `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct PlotSettingsFile {
    kind: PlotKind,
    x: Option<String>,
    y: Option<String>,
    color_by: Option<String>,
    x_err: Option<String>,
    y_err: Option<String>,
    bins: usize,
    point_size: f32,
    color: String,
    show_grid: bool,
}

impl Default for PlotSettingsFile {
    fn default() -> Self {
        Self::from(&PlotSettings::from_config(&AppConfig::default()))
    }
}

impl From<&PlotSettings> for PlotSettingsFile {
    fn from(s: &PlotSettings) -> Self {
        Self {
            kind: s.kind,
            x: s.x.clone(),
            y: s.y.clone(),
            color_by: s.color_by.clone(),
            x_err: s.x_err.clone(),
            y_err: s.y_err.clone(),
            bins: s.bins,
            point_size: s.point_size,
            color: color::to_hex(s.color),
            show_grid: s.show_grid,
        }
    }
}

impl PlotSettings {
    /// Write the settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&PlotSettingsFile::from(self))?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }

    /// Read settings written by [`PlotSettings::save`]. Missing keys take
    /// their defaults; a bad colour falls back to the current one.
    pub fn load(&self, path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let file: PlotSettingsFile = serde_json::from_str(&text).context("parsing plot settings")?;
        Ok(Self {
            kind: file.kind,
            x: file.x,
            y: file.y,
            color_by: file.color_by,
            x_err: file.x_err,
            y_err: file.y_err,
            bins: file.bins.clamp(2, 200),
            point_size: file.point_size.clamp(1.0, 10.0),
            color: color::parse_hex(&file.color).unwrap_or(self.color),
            show_grid: file.show_grid,
        })
    }
}

/// `path` with extension `ext` when it has none.
pub fn with_default_extension(path: &Path, ext: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub data: DataManager,
    pub config: AppConfig,
    /// Where the config is saved; `None` disables saving.
    pub config_path: Option<PathBuf>,
    pub plot: PlotSettings,

    /// Contents of the filter box.
    pub filter_text: String,
    pub clean_options: CleanOptions,

    /// Status line shown in the menu bar.
    pub status_message: Option<String>,
    /// Message for the modal error dialog.
    pub error: Option<String>,

    pub show_columns: bool,
    pub show_stats: bool,
    pub show_clean: bool,
    pub show_about: bool,
    pub stats_column: Option<String>,
    /// Draft edited by the preferences window; `Some` while it is open.
    pub preferences: Option<AppConfig>,
    /// Screen area of the plot, for cropping saved images.
    pub plot_rect: Option<egui::Rect>,
}

impl AppState {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            data: DataManager::new(config.background_filter_rows),
            plot: PlotSettings::from_config(&config),
            config,
            config_path,
            filter_text: String::new(),
            clean_options: CleanOptions::default(),
            status_message: None,
            error: None,
            show_columns: false,
            show_stats: false,
            show_clean: false,
            show_about: false,
            stats_column: None,
            preferences: None,
            plot_rect: None,
        }
    }

    fn report_error(&mut self, message: String) {
        log::error!("{message}");
        self.error = Some(message);
    }

    /// Load a file, remember it in the recent list and reset the plot axes.
    pub fn open_file(&mut self, path: &Path) {
        match self.data.load_file(path) {
            Ok(info) => {
                self.status_message = Some(format!(
                    "Loaded {} rows × {} columns from {}",
                    info.n_rows,
                    info.n_cols,
                    path.display()
                ));
                self.after_dataset_change();
                self.filter_text.clear();
                self.config.add_recent_file(path);
                self.autosave();
            }
            Err(e) => self.report_error(format!("{e:#}")),
        }
    }

    fn after_dataset_change(&mut self) {
        let numeric = self
            .data
            .display_data()
            .map(|view| stats::numeric_columns(&view))
            .unwrap_or_default();
        self.plot.reset_columns(&numeric);
        self.stats_column = self.data.column_names().first().cloned();
    }

    /// Apply the filter box. Large datasets are filtered in the background
    /// and finish in [`AppState::poll`].
    pub fn apply_filter(&mut self) {
        let expression = self.filter_text.clone();
        match self.data.submit_filter(&expression) {
            None => self.status_message = Some("Filtering…".to_string()),
            Some(result) => self.filter_finished(result),
        }
    }

    fn filter_finished(&mut self, result: Result<String, crate::data::filter::FilterError>) {
        match result {
            Ok(message) => self.status_message = Some(message),
            Err(e) => {
                log::warn!("Filter failed: {e}");
                self.error = Some(e.to_string());
            }
        }
    }

    /// Called once per frame.
    pub fn poll(&mut self) {
        if let Some(result) = self.data.poll_filter() {
            self.filter_finished(result);
        }
    }

    pub fn clear_filter(&mut self) {
        self.data.clear_filter();
        self.filter_text.clear();
        self.status_message = Some("Filter cleared".to_string());
    }

    pub fn clean(&mut self) {
        let options = self.clean_options.clone();
        match self.data.clean(&options) {
            Ok(message) => {
                self.status_message = Some(message);
                self.after_dataset_change();
            }
            Err(e) => self.report_error(format!("Cleaning failed: {e:#}")),
        }
    }

    pub fn flag_outliers(&mut self) {
        match self.data.flag_outliers() {
            Ok(message) => {
                self.status_message = Some(message);
                self.after_dataset_change();
            }
            Err(e) => self.report_error(format!("Outlier detection failed: {e:#}")),
        }
    }

    /// Export the displayed rows; the format follows the extension.
    pub fn export(&mut self, path: &Path) {
        if let Err(e) = self.try_export(path) {
            self.report_error(format!("Export failed: {e:#}"));
        }
    }

    fn try_export(&mut self, path: &Path) -> Result<()> {
        let Some(view) = self.data.display_data() else {
            bail!("No data loaded");
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => export::export_json(&view, path)?,
            _ => export::export_csv(&view, path)?,
        }
        self.status_message = Some(format!("Exported {} rows to {}", view.n_rows(), path.display()));
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.config.set_theme(theme);
        self.autosave();
    }

    pub fn clear_recent_files(&mut self) {
        self.config.clear_recent_files();
        self.status_message = Some("Recent files cleared".to_string());
        self.autosave();
    }

    pub fn open_preferences(&mut self) {
        let mut draft = self.config.clone();
        // the draft shows what is on screen now
        draft.default_plot_kind = self.plot.kind;
        draft.default_plot_color = color::to_hex(self.plot.color);
        draft.show_grid = self.plot.show_grid;
        self.preferences = Some(draft);
    }

    /// Make `config` current and save it. The plot picks up the new kind,
    /// colour and grid defaults; recent files are kept unless the draft
    /// dropped them.
    pub fn apply_preferences(&mut self, mut config: AppConfig) {
        let cap = config.max_recent_files;
        config.set_max_recent_files(cap);
        self.plot.apply_defaults(&config);
        self.config = config;
        self.status_message = Some("Preferences saved".to_string());
        self.save_config();
    }

    pub fn save_plot_settings(&mut self, path: &Path) {
        let path = with_default_extension(path, "json");
        match self.plot.save(&path) {
            Ok(()) => self.status_message = Some(format!("Plot settings saved to {}", path.display())),
            Err(e) => self.report_error(format!("Could not save plot settings: {e:#}")),
        }
    }

    /// Load plot settings; column choices missing from the current dataset
    /// keep their present value.
    pub fn load_plot_settings(&mut self, path: &Path) {
        let loaded = match self.plot.load(path) {
            Ok(settings) => settings,
            Err(e) => {
                self.report_error(format!("Could not load plot settings: {e:#}"));
                return;
            }
        };
        let columns = self.data.column_names().to_vec();
        let known = |choice: &Option<String>| {
            choice.as_ref().is_none_or(|c| columns.is_empty() || columns.contains(c))
        };
        let mut next = loaded;
        for (slot, current) in [
            (&mut next.x, &self.plot.x),
            (&mut next.y, &self.plot.y),
            (&mut next.color_by, &self.plot.color_by),
            (&mut next.x_err, &self.plot.x_err),
            (&mut next.y_err, &self.plot.y_err),
        ] {
            if !known(&*slot) {
                log::warn!("Plot settings name unknown column {slot:?}");
                *slot = current.clone();
            }
        }
        self.plot = next;
        self.status_message = Some(format!("Plot settings loaded from {}", path.display()));
    }

    /// Report the outcome of writing a plot image.
    pub fn plot_image_saved(&mut self, path: &Path, result: Result<()>) {
        match result {
            Ok(()) => self.status_message = Some(format!("Plot saved to {}", path.display())),
            Err(e) => self.report_error(format!("Could not save plot: {e:#}")),
        }
    }

    fn autosave(&mut self) {
        if self.config.auto_save_settings {
            self.save_config();
        }
    }

    pub fn save_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            return;
        };
        self.config.default_plot_kind = self.plot.kind;
        self.config.default_plot_color = color::to_hex(self.plot.color);
        self.config.show_grid = self.plot.show_grid;
        if let Err(e) = self.config.save(&path) {
            log::warn!("Could not save settings: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn csv_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "MJD,band,Col A").unwrap();
        writeln!(file, "51000,g,1.5").unwrap();
        writeln!(file, "52500,r,2.5").unwrap();
        writeln!(file, "60100,g,3.5").unwrap();
        file
    }

    fn state() -> AppState {
        AppState::new(AppConfig::default(), None)
    }

    #[test]
    fn opening_a_file_sets_axes_and_recent_list() {
        let file = csv_file();
        let mut st = state();
        st.open_file(file.path());
        assert!(st.error.is_none());
        assert_eq!(st.plot.x.as_deref(), Some("MJD"));
        assert_eq!(st.plot.y.as_deref(), Some("Col A"));
        assert_eq!(st.config.recent_files, vec![file.path().to_path_buf()]);

        st.open_file(Path::new("/does/not/exist.csv"));
        assert!(st.error.is_some());
        assert_eq!(st.data.display_data().unwrap().n_rows(), 3);
    }

    #[test]
    fn filter_errors_go_to_the_dialog() {
        let file = csv_file();
        let mut st = state();
        st.open_file(file.path());

        st.filter_text = "MJD > 52000 and MJD < 60000".into();
        st.apply_filter();
        assert_eq!(st.status_message.as_deref(), Some("Found 1 of 3 rows"));

        st.filter_text = "`a` > 1 & `c` < 5".into();
        st.apply_filter();
        assert!(st.error.as_deref().unwrap().contains("Unknown column"));
        assert_eq!(st.data.display_data().unwrap().n_rows(), 1);

        st.clear_filter();
        assert!(st.filter_text.is_empty());
        assert_eq!(st.data.display_data().unwrap().n_rows(), 3);
    }

    #[test]
    fn export_writes_displayed_rows() {
        let file = csv_file();
        let mut st = state();
        st.open_file(file.path());
        st.filter_text = "band == 'g'".into();
        st.apply_filter();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("subset.json");
        st.export(&out);
        assert!(st.error.is_none());
        let back = crate::data::loader::load_file(&out).unwrap();
        assert_eq!(back.n_rows(), 2);
    }

    #[test]
    fn settings_are_saved_with_plot_choices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut st = AppState::new(AppConfig::default(), Some(path.clone()));
        st.plot.kind = PlotKind::Histogram;
        st.set_theme(Theme::Dark);
        assert!(!path.exists());
        st.save_config();
        let saved = AppConfig::load_or_default(&path);
        assert_eq!(saved.theme, Theme::Dark);
        assert_eq!(saved.default_plot_kind, PlotKind::Histogram);
    }

    #[test]
    fn preferences_apply_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut st = AppState::new(AppConfig::default(), Some(path.clone()));
        st.config.add_recent_file(Path::new("a.csv"));
        st.config.add_recent_file(Path::new("b.csv"));

        st.open_preferences();
        let mut draft = st.preferences.take().unwrap();
        draft.decimal_places = 4;
        draft.auto_save_settings = true;
        draft.default_plot_kind = PlotKind::Density;
        draft.default_plot_color = "#ff0000".into();
        draft.max_recent_files = 1;
        st.apply_preferences(draft);

        assert_eq!(st.plot.kind, PlotKind::Density);
        assert_eq!(st.plot.color, Color32::from_rgb(255, 0, 0));
        assert_eq!(st.config.recent_files, vec![PathBuf::from("b.csv")]);
        let saved = AppConfig::load_or_default(&path);
        assert_eq!(saved.decimal_places, 4);
        assert!(saved.auto_save_settings);

        st.open_preferences();
        let mut draft = st.preferences.take().unwrap();
        draft.reset_to_defaults();
        st.apply_preferences(draft);
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        assert_eq!(st.plot.kind, PlotKind::Scatter);
    }

    #[test]
    fn clearing_recent_files_autosaves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig {
            auto_save_settings: true,
            ..Default::default()
        };
        let mut st = AppState::new(config, Some(path.clone()));
        let file = csv_file();
        st.open_file(file.path());
        assert_eq!(AppConfig::load_or_default(&path).recent_files.len(), 1);

        st.clear_recent_files();
        assert!(st.config.recent_files.is_empty());
        assert!(AppConfig::load_or_default(&path).recent_files.is_empty());
    }

    #[test]
    fn plot_settings_round_trip_through_json() {
        let file = csv_file();
        let mut st = state();
        st.open_file(file.path());
        st.plot.kind = PlotKind::ErrorBar;
        st.plot.color_by = Some("band".into());
        st.plot.bins = 12;
        st.plot.color = Color32::from_rgb(0x12, 0x34, 0x56);

        let dir = tempfile::tempdir().unwrap();
        st.save_plot_settings(&dir.path().join("plot"));
        let saved = dir.path().join("plot.json");
        assert!(saved.exists());

        let expected = st.plot.clone();
        st.plot = PlotSettings::from_config(&st.config);
        st.load_plot_settings(&saved);
        assert!(st.error.is_none());
        assert_eq!(st.plot, expected);
    }

    #[test]
    fn loaded_plot_settings_keep_known_columns() {
        let file = csv_file();
        let mut st = state();
        st.open_file(file.path());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.json");
        std::fs::write(&path, r##"{"kind": "histogram", "x": "nope", "y": "MJD", "color": "#00ff00"}"##)
            .unwrap();

        st.load_plot_settings(&path);
        assert_eq!(st.plot.kind, PlotKind::Histogram);
        assert_eq!(st.plot.x.as_deref(), Some("MJD"));
        assert_eq!(st.plot.y.as_deref(), Some("MJD"));
        assert_eq!(st.plot.color, Color32::from_rgb(0, 255, 0));

        st.load_plot_settings(&dir.path().join("missing.json"));
        assert!(st.error.as_deref().unwrap().contains("plot settings"));
    }
}

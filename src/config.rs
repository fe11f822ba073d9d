use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::chart::PlotKind;

const CONFIG_DIR: &str = ".plotdata";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Persistent user preferences.
///
/// Unknown keys are ignored and missing keys take their defaults, so older
/// config files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Most recent first.
    pub recent_files: Vec<PathBuf>,
    pub max_recent_files: usize,
    pub theme: Theme,
    pub default_plot_kind: PlotKind,
    /// `#rrggbb`
    pub default_plot_color: String,
    pub window_size: [f32; 2],
    pub show_grid: bool,
    /// Save on every change instead of only on exit.
    pub auto_save_settings: bool,
    pub decimal_places: usize,
    /// Row count above which filters run on a worker thread.
    pub background_filter_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recent_files: Vec::new(),
            max_recent_files: 10,
            theme: Theme::Light,
            default_plot_kind: PlotKind::Scatter,
            default_plot_color: "#1f77b4".to_string(),
            window_size: [1200.0, 800.0],
            show_grid: true,
            auto_save_settings: false,
            decimal_places: 2,
            background_filter_rows: 200_000,
        }
    }
}

/// `~/.plotdata/config.json`, or `None` without a home directory.
pub fn default_config_path() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl AppConfig {
    /// Read the config at `path`. A missing file gives the defaults; an
    /// unreadable or malformed one is logged and also gives the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring config {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).context("reading config")?;
        let mut config: Self = serde_json::from_str(&text).context("parsing config")?;
        config.recent_files.truncate(config.max_recent_files);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Move `file` to the front of the recent list, capped at
    /// `max_recent_files`.
    pub fn add_recent_file(&mut self, file: &Path) {
        self.recent_files.retain(|f| f != file);
        self.recent_files.insert(0, file.to_path_buf());
        self.recent_files.truncate(self.max_recent_files);
    }

    pub fn clear_recent_files(&mut self) {
        self.recent_files.clear();
    }

    /// Change the recent-list cap, dropping entries beyond it.
    pub fn set_max_recent_files(&mut self, max: usize) {
        self.max_recent_files = max;
        self.recent_files.truncate(max);
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.set_theme(Theme::Dark);
        config.decimal_places = 4;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load_or_default(&path), config);
    }

    #[test]
    fn partial_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"theme": "dark", "unknown_key": 1}"#).unwrap();
        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.max_recent_files, 10);

        fs::write(&path, "{not json").unwrap();
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }

    #[test]
    fn recent_files_are_deduplicated_and_capped() {
        let mut config = AppConfig {
            max_recent_files: 2,
            ..Default::default()
        };
        config.add_recent_file(Path::new("a.csv"));
        config.add_recent_file(Path::new("b.csv"));
        config.add_recent_file(Path::new("a.csv"));
        config.add_recent_file(Path::new("c.csv"));
        assert_eq!(
            config.recent_files,
            vec![PathBuf::from("c.csv"), PathBuf::from("a.csv")]
        );
        config.set_max_recent_files(1);
        assert_eq!(config.recent_files, vec![PathBuf::from("c.csv")]);
        config.clear_recent_files();
        assert!(config.recent_files.is_empty());
    }

    #[test]
    fn reset_restores_every_key() {
        let mut config = AppConfig {
            theme: Theme::Dark,
            decimal_places: 5,
            auto_save_settings: true,
            default_plot_kind: PlotKind::Density,
            ..Default::default()
        };
        config.add_recent_file(Path::new("a.csv"));
        config.reset_to_defaults();
        assert_eq!(config, AppConfig::default());
    }
}

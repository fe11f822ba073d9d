use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::clean::{self, CleanOptions};
use super::filter::{self, FilterError, FilterOutcome};
use super::jobs::FilterJobs;
use super::loader;
use super::model::{Dataset, TableView};

/// Where the current dataset came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub n_rows: usize,
    pub n_cols: usize,
}

/// Owns the loaded dataset and the current filter selection.
///
/// The dataset is shared behind an `Arc` so views and background filter
/// jobs can hold it without copying. A failed filter request never touches
/// the current selection.
#[derive(Debug)]
pub struct DataManager {
    dataset: Option<Arc<Dataset>>,
    filtered: Option<TableView>,
    filter_expression: Option<String>,
    file_info: Option<FileInfo>,
    jobs: FilterJobs,
    background_rows: usize,
}

impl Default for DataManager {
    fn default() -> Self {
        Self::new(200_000)
    }
}

impl DataManager {
    /// `background_rows`: datasets with more rows than this are filtered on a
    /// worker thread by [`DataManager::submit_filter`].
    pub fn new(background_rows: usize) -> Self {
        Self {
            dataset: None,
            filtered: None,
            filter_expression: None,
            file_info: None,
            jobs: FilterJobs::default(),
            background_rows,
        }
    }

    /// Load a file and make it the current dataset.
    pub fn load_file(&mut self, path: &Path) -> Result<&FileInfo> {
        let dataset = loader::load_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        self.set_dataset(dataset, Some(path.to_path_buf()));
        self.file_info
            .as_ref()
            .context("file info missing after load")
    }

    /// Replace the dataset. Any filter (applied or in flight) is dropped.
    pub fn set_dataset(&mut self, dataset: Dataset, path: Option<PathBuf>) {
        self.file_info = path.map(|path| FileInfo {
            path,
            n_rows: dataset.n_rows(),
            n_cols: dataset.n_cols(),
        });
        self.dataset = Some(Arc::new(dataset));
        self.filtered = None;
        self.filter_expression = None;
        self.jobs.invalidate();
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        self.file_info.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.dataset.is_some()
    }

    /// Filter synchronously. On success the selection is replaced (or
    /// cleared, for an empty expression) and the status message returned.
    pub fn apply_filter(&mut self, expression: &str) -> Result<String, FilterError> {
        self.jobs.invalidate();
        let outcome = filter::apply_filter(expression, self.dataset.as_ref())?;
        Ok(self.accept(outcome))
    }

    /// Filter on a worker thread when the dataset is large, otherwise
    /// synchronously. Returns `None` when the work was queued; the result
    /// then arrives through [`DataManager::poll_filter`].
    pub fn submit_filter(&mut self, expression: &str) -> Option<Result<String, FilterError>> {
        let large = self
            .dataset
            .as_ref()
            .filter(|ds| ds.n_rows() > self.background_rows && !expression.trim().is_empty())
            .cloned();
        match large {
            Some(ds) => {
                self.jobs.submit(expression.to_string(), ds);
                None
            }
            None => Some(self.apply_filter(expression)),
        }
    }

    /// Pick up a finished background filter, if any.
    pub fn poll_filter(&mut self) -> Option<Result<String, FilterError>> {
        let result = self.jobs.poll()?;
        Some(result.map(|outcome| self.accept(outcome)))
    }

    pub fn filter_pending(&self) -> bool {
        self.jobs.is_pending()
    }

    fn accept(&mut self, outcome: FilterOutcome) -> String {
        match outcome.view {
            Some(view) => {
                log::info!("{} ({})", outcome.message, outcome.expression);
                self.filtered = Some(view);
                self.filter_expression = Some(outcome.expression);
            }
            None => {
                self.filtered = None;
                self.filter_expression = None;
            }
        }
        outcome.message
    }

    /// Drop the filter; the full dataset is displayed again.
    pub fn clear_filter(&mut self) {
        self.jobs.invalidate();
        self.filtered = None;
        self.filter_expression = None;
    }

    pub fn has_filter(&self) -> bool {
        self.filtered.is_some()
    }

    /// The expression behind the current selection, after quoting.
    pub fn filter_expression(&self) -> Option<&str> {
        self.filter_expression.as_deref()
    }

    /// What the table, stats and plots show: the filtered rows if a filter
    /// is active, otherwise every row.
    pub fn display_data(&self) -> Option<TableView> {
        match &self.filtered {
            Some(view) => Some(view.clone()),
            None => self.dataset.clone().map(TableView::full),
        }
    }

    pub fn column_names(&self) -> &[String] {
        match &self.dataset {
            Some(ds) => ds.column_names(),
            None => &[],
        }
    }

    pub fn quoted_column_names(&self) -> Vec<String> {
        self.dataset
            .as_ref()
            .map(|ds| filter::quoted_column_names(ds))
            .unwrap_or_default()
    }

    /// Clean the full dataset and make the result current.
    pub fn clean(&mut self, options: &CleanOptions) -> Result<String> {
        let dataset = self.dataset.as_ref().context("No data loaded")?;
        let (cleaned, report) = clean::clean(dataset, options)?;
        let path = self.file_info.as_ref().map(|f| f.path.clone());
        self.set_dataset(cleaned, path);
        log::info!("{}", report.message());
        Ok(report.message())
    }

    /// Add `{col}_outlier` flag columns to the full dataset.
    pub fn flag_outliers(&mut self) -> Result<String> {
        let dataset = self.dataset.as_ref().context("No data loaded")?;
        let (flagged, dropped) = clean::flag_outliers(dataset)?;
        let added = flagged.n_cols() - dataset.n_cols();
        let path = self.file_info.as_ref().map(|f| f.path.clone());
        self.set_dataset(flagged, path);
        Ok(format!(
            "Added {added} outlier column(s), dropped {dropped} empty row(s)"
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::data::model::Value;

    fn dataset(n: i64) -> Dataset {
        Dataset::new(
            vec!["MJD".into(), "Col A".into()],
            vec![
                (0..n).map(|i| Value::Integer(51000 + i * 1000)).collect(),
                (0..n).map(|i| Value::Float(i as f64)).collect(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn display_data_follows_filter() {
        let mut dm = DataManager::default();
        assert!(dm.display_data().is_none());
        assert_eq!(dm.apply_filter("MJD > 1"), Err(FilterError::NoDataLoaded));

        dm.set_dataset(dataset(10), None);
        assert_eq!(dm.display_data().unwrap().n_rows(), 10);

        let msg = dm.apply_filter("Col A >= 7").unwrap();
        assert_eq!(msg, "Found 3 of 10 rows");
        assert!(dm.has_filter());
        assert_eq!(dm.filter_expression(), Some("`Col A` >= 7"));
        assert_eq!(dm.display_data().unwrap().n_rows(), 3);

        dm.clear_filter();
        assert!(!dm.has_filter());
        assert_eq!(dm.display_data().unwrap().n_rows(), 10);
    }

    #[test]
    fn failed_filter_keeps_previous_selection() {
        let mut dm = DataManager::default();
        dm.set_dataset(dataset(10), None);
        dm.apply_filter("MJD < 53000").unwrap();
        let before = dm.display_data();

        assert!(matches!(dm.apply_filter("`nope` > 1"), Err(FilterError::UnknownColumn(_))));
        assert_eq!(dm.apply_filter("MJD > 99999"), Err(FilterError::EmptyResult));
        assert_eq!(dm.display_data(), before);

        assert_eq!(dm.apply_filter("  ").unwrap(), "Filter cleared");
        assert!(!dm.has_filter());
    }

    #[test]
    fn new_dataset_resets_filter() {
        let mut dm = DataManager::default();
        dm.set_dataset(dataset(10), None);
        dm.apply_filter("MJD > 51000").unwrap();
        dm.set_dataset(dataset(4), None);
        assert!(!dm.has_filter());
        assert_eq!(dm.display_data().unwrap().n_rows(), 4);
    }

    #[test]
    fn large_datasets_filter_in_background() {
        let mut dm = DataManager::new(5);
        dm.set_dataset(dataset(10), None);
        assert!(dm.submit_filter("MJD >= 59000").is_none());
        assert!(dm.filter_pending());

        let deadline = Instant::now() + Duration::from_secs(10);
        let result = loop {
            if let Some(r) = dm.poll_filter() {
                break r;
            }
            assert!(Instant::now() < deadline, "background filter never finished");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(result.unwrap(), "Found 2 of 10 rows");
        assert_eq!(dm.display_data().unwrap().n_rows(), 2);
    }

    #[test]
    fn quoted_names_and_outliers() {
        let mut dm = DataManager::default();
        assert!(dm.quoted_column_names().is_empty());
        dm.set_dataset(dataset(3), None);
        assert_eq!(dm.quoted_column_names(), vec!["`MJD`", "`Col A`"]);

        let msg = dm.flag_outliers().unwrap();
        assert_eq!(msg, "Added 2 outlier column(s), dropped 0 empty row(s)");
        assert!(dm.column_names().contains(&"MJD_outlier".to_string()));
    }
}

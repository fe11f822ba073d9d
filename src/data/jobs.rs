use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use super::filter::{FilterError, FilterOutcome, apply_filter};
use super::model::Dataset;

type JobResult = (u64, Result<FilterOutcome, FilterError>);

/// Runs filter requests off the UI thread.
///
/// Each submission is tagged with a generation; only the result of the most
/// recent submission is ever handed back; older ones are dropped on arrival.
/// Jobs work on the `Arc<Dataset>` captured at submit time, so a reload never
/// races an in-flight filter.
#[derive(Debug)]
pub struct FilterJobs {
    generation: u64,
    pending: bool,
    tx: Sender<JobResult>,
    rx: Receiver<JobResult>,
}

impl Default for FilterJobs {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: 0,
            pending: false,
            tx,
            rx,
        }
    }
}

impl FilterJobs {
    /// Start filtering `dataset` in the background. Supersedes any job still
    /// in flight.
    pub fn submit(&mut self, expression: String, dataset: Arc<Dataset>) -> u64 {
        self.generation += 1;
        self.pending = true;
        let generation = self.generation;
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("filter-{generation}"))
            .spawn(move || {
                let result = apply_filter(&expression, Some(&dataset));
                // Receiver gone means the manager was dropped.
                let _ = tx.send((generation, result));
            });
        if let Err(e) = spawned {
            log::error!("Could not spawn filter thread: {e}");
            let _ = self.tx.send((
                generation,
                Err(FilterError::InvalidExpression(format!(
                    "could not start background filter: {e}"
                ))),
            ));
        }
        log::debug!("Submitted background filter #{generation}");
        generation
    }

    /// Forget whatever is in flight (new data loaded, filter cleared).
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Collect the latest finished result, if it belongs to the newest
    /// submission.
    pub fn poll(&mut self) -> Option<Result<FilterOutcome, FilterError>> {
        let mut latest = None;
        while let Ok((generation, result)) = self.rx.try_recv() {
            if generation == self.generation {
                self.pending = false;
                latest = Some(result);
            } else {
                log::debug!("Dropping stale filter result #{generation}");
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::data::model::Value;

    fn dataset() -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                vec!["a".into()],
                vec![(0..100).map(Value::Integer).collect()],
            )
            .unwrap(),
        )
    }

    fn wait(jobs: &mut FilterJobs) -> Option<Result<FilterOutcome, FilterError>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Some(r) = jobs.poll() {
                return Some(r);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn last_submission_wins() {
        let mut jobs = FilterJobs::default();
        let ds = dataset();
        jobs.submit("a < 10".into(), ds.clone());
        jobs.submit("a >= 90".into(), ds);
        assert!(jobs.is_pending());
        let outcome = wait(&mut jobs).unwrap().unwrap();
        assert_eq!(outcome.view.unwrap().n_rows(), 10);
        assert_eq!(outcome.message, "Found 10 of 100 rows");
        assert!(!jobs.is_pending());
    }

    #[test]
    fn invalidated_results_are_dropped() {
        let mut jobs = FilterJobs::default();
        jobs.submit("a < 10".into(), dataset());
        jobs.invalidate();
        thread::sleep(Duration::from_millis(200));
        assert!(jobs.poll().is_none());
        assert!(!jobs.is_pending());
    }

    #[test]
    fn errors_come_back_too() {
        let mut jobs = FilterJobs::default();
        jobs.submit("a > 1000".into(), dataset());
        assert_eq!(wait(&mut jobs).unwrap().unwrap_err(), FilterError::EmptyResult);
    }
}

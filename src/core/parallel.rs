//! Bounded fan-out of per-item work onto a dedicated rayon pool.
//!
//! A `WorkerPool` is built once per stage flavour and passed by reference into
//! the engines. Results always come back in input order, one `Result` per item,
//! regardless of the order in which workers finish.
use std::num::NonZeroUsize;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::ExecutionMode;

/// Items pulled per worker when fanning out a lazy stream.
const STREAM_WINDOW_PER_WORKER: usize = 2;

/// Blocking pools get this many workers per core by default.
const BLOCKING_OVERSUBSCRIPTION: usize = 2;

pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// A failed item inside a fan-out.
#[derive(Debug)]
pub struct ItemFailure {
    pub index: usize,
    pub error: Error,
}

/// Per-item results of one fan-out, in input order.
#[derive(Debug)]
pub struct BatchResults<R> {
    outcomes: Vec<Result<R>>,
}

impl<R> BatchResults<R> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[Result<R>] {
        &self.outcomes
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    /// All results, or the first failure.
    pub fn into_all(self) -> Result<Vec<R>> {
        self.outcomes.into_iter().collect()
    }

    /// Successful results (in order) and the failures with their item index.
    pub fn partition(self) -> (Vec<R>, Vec<ItemFailure>) {
        let mut ok = Vec::with_capacity(self.outcomes.len());
        let mut failed = Vec::new();
        for (index, outcome) in self.outcomes.into_iter().enumerate() {
            match outcome {
                Ok(r) => ok.push(r),
                Err(error) => failed.push(ItemFailure { index, error }),
            }
        }
        (ok, failed)
    }
}

/// Fixed-size pool of workers with an execution mode.
pub struct WorkerPool {
    mode: ExecutionMode,
    jobs: usize,
    progress: bool,
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool. `jobs = None` sizes it from the available cores.
    pub fn new(mode: ExecutionMode, jobs: Option<usize>) -> Result<Self> {
        let jobs = match jobs {
            Some(0) => {
                return Err(Error::InvalidArgument {
                    arg: "jobs",
                    value: "0".to_string(),
                });
            }
            Some(n) => n,
            None => match mode {
                ExecutionMode::Compute => available_cores(),
                ExecutionMode::Blocking => available_cores() * BLOCKING_OVERSUBSCRIPTION,
            },
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(move |i| format!("{mode}-{i}"))
            .build()
            .map_err(Error::external)?;
        debug!("Built {} pool with {} workers", mode, jobs);
        Ok(WorkerPool {
            mode,
            jobs,
            progress: true,
            pool,
        })
    }

    /// Enable or disable the progress bar.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    fn progress_bar(&self, total: Option<u64>, label: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = match total {
            Some(n) => ProgressBar::new(n),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(label.to_string());
        pb
    }

    fn run_window<T, R, F>(&self, window: Vec<T>, offset: usize, label: &str, pb: &ProgressBar, f: &F) -> Vec<Result<R>>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> Result<R> + Sync,
    {
        self.pool.install(|| {
            window
                .into_par_iter()
                .enumerate()
                .map(|(i, item)| {
                    let index = offset + i;
                    let outcome = f(index, item);
                    if let Err(e) = &outcome {
                        warn!("[{}] item {} failed: {}", label, index, e);
                    }
                    pb.inc(1);
                    outcome
                })
                .collect()
        })
    }

    /// Apply `f(index, item)` to every item of an owned collection.
    pub fn map<T, R, F>(&self, items: Vec<T>, label: &str, f: F) -> BatchResults<R>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> Result<R> + Sync,
    {
        let pb = self.progress_bar(Some(items.len() as u64), label);
        let outcomes = self.run_window(items, 0, label, &pb, &f);
        pb.finish_and_clear();
        BatchResults { outcomes }
    }

    /// Apply `f(index, item)` to a lazy stream, holding at most
    /// `jobs * STREAM_WINDOW_PER_WORKER` items in memory at a time.
    /// `total` is only used for progress reporting.
    pub fn map_stream<I, T, R, F>(&self, items: I, total: Option<usize>, label: &str, f: F) -> BatchResults<R>
    where
        I: IntoIterator<Item = T>,
        T: Send,
        R: Send,
        F: Fn(usize, T) -> Result<R> + Sync,
    {
        let pb = self.progress_bar(total.map(|t| t as u64), label);
        let window_size = self.jobs * STREAM_WINDOW_PER_WORKER;
        let mut outcomes = Vec::with_capacity(total.unwrap_or(0));
        let mut source = items.into_iter();
        loop {
            let window: Vec<T> = source.by_ref().take(window_size).collect();
            if window.is_empty() {
                break;
            }
            let offset = outcomes.len();
            outcomes.extend(self.run_window(window, offset, label, &pb, &f));
        }
        pb.finish_and_clear();
        BatchResults { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pool(mode: ExecutionMode, jobs: usize) -> WorkerPool {
        WorkerPool::new(mode, Some(jobs)).unwrap().with_progress(false)
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(WorkerPool::new(ExecutionMode::Compute, Some(0)).is_err());
    }

    #[test]
    fn default_blocking_pool_is_larger_than_compute() {
        let compute = WorkerPool::new(ExecutionMode::Compute, None).unwrap();
        let blocking = WorkerPool::new(ExecutionMode::Blocking, None).unwrap();
        assert!(blocking.jobs() >= compute.jobs());
        assert_eq!(blocking.mode(), ExecutionMode::Blocking);
    }

    #[test]
    fn map_preserves_input_order() {
        let p = pool(ExecutionMode::Compute, 4);
        let items: Vec<u64> = (0..200).collect();
        let results = p.map(items, "square", |_, x| {
            // Reverse the natural finishing order.
            std::thread::sleep(Duration::from_micros(200 - x));
            Ok(x * x)
        });
        let values = results.into_all().unwrap();
        assert_eq!(values, (0..200).map(|x| x * x).collect::<Vec<_>>());
    }

    #[test]
    fn index_matches_item_position() {
        let p = pool(ExecutionMode::Blocking, 3);
        let items: Vec<char> = "abcdefg".chars().collect();
        let results = p.map(items.clone(), "index", |i, c| Ok((i, c)));
        let values = results.into_all().unwrap();
        for (pos, (i, c)) in values.into_iter().enumerate() {
            assert_eq!(pos, i);
            assert_eq!(items[pos], c);
        }
    }

    #[test]
    fn failures_do_not_abort_siblings() {
        let p = pool(ExecutionMode::Blocking, 4);
        let ran = AtomicUsize::new(0);
        let results = p.map((0..10).collect::<Vec<u32>>(), "flaky", |_, x| {
            ran.fetch_add(1, Ordering::SeqCst);
            if x % 3 == 0 {
                Err(Error::Processing(format!("item {x}")))
            } else {
                Ok(x)
            }
        });
        assert_eq!(ran.load(Ordering::SeqCst), 10);
        assert_eq!(results.len(), 10);
        assert_eq!(results.failure_count(), 4);
        let (ok, failed) = results.partition();
        assert_eq!(ok, vec![1, 2, 4, 5, 7, 8]);
        let indices: Vec<usize> = failed.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 3, 6, 9]);
    }

    #[test]
    fn into_all_returns_first_failure() {
        let p = pool(ExecutionMode::Compute, 2);
        let results = p.map(vec![1, 2, 3], "fail", |_, x| {
            if x >= 2 {
                Err(Error::Processing(format!("bad {x}")))
            } else {
                Ok(x)
            }
        });
        match results.into_all() {
            Err(Error::Processing(msg)) => assert_eq!(msg, "bad 2"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn stream_bounds_items_in_flight() {
        let p = pool(ExecutionMode::Compute, 2);
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);
        let results = p.map_stream(0..50usize, Some(50), "stream", |i, x| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            assert_eq!(i, x);
            Ok(x + 1)
        });
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(results.into_all().unwrap(), (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_yields_empty_results() {
        let p = pool(ExecutionMode::Compute, 2);
        let results = p.map_stream(std::iter::empty::<u8>(), None, "empty", |_, x| Ok(x));
        assert!(results.is_empty());
    }
}

//! Task scheduling for independent, embarrassingly parallel jobs.
//!
//! A [`TaskScheduler`] runs one closure per task and returns the results in
//! task order once every task has finished. Callers receive the scheduler as
//! a parameter; there is no process-wide pool getter.

use std::sync::Arc;

use rayon::prelude::*;

/// Runs independent tasks and joins on all of them.
pub trait TaskScheduler: Sync {
    /// Applies `f` to every task. Results keep the order of `tasks`.
    fn map<T, R, F>(&self, tasks: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync;
}

/// Runs tasks one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialScheduler;

impl TaskScheduler for SequentialScheduler {
    fn map<T, R, F>(&self, tasks: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        tasks.iter().map(f).collect()
    }
}

/// Rayon-backed scheduler, optionally capping the number of tasks in flight
/// and optionally running on a dedicated thread pool.
#[derive(Debug, Clone, Default)]
pub struct RayonScheduler {
    max_concurrent: Option<usize>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mosaic-worker-{i}"))
            .build()?;
        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    fn run<T, R, F>(&self, tasks: &[T], f: &F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        match self.max_concurrent {
            Some(limit) => par_map_limited(tasks, limit, f),
            None => tasks.par_iter().map(f).collect(),
        }
    }
}

impl TaskScheduler for RayonScheduler {
    fn map<T, R, F>(&self, tasks: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| self.run(tasks, &f)),
            None => self.run(tasks, &f),
        }
    }
}

/// Maps `f` over `items` in parallel, with at most `max_concurrent` items in flight.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn par_map_limited<T, R, F>(items: &[T], max_concurrent: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(max_concurrent) {
        let chunk_results: Vec<R> = chunk.par_iter().map(&f).collect();
        results.extend(chunk_results);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn par_map_limited_preserves_order() {
        let items: Vec<i32> = (0..100).collect();
        let result = par_map_limited(&items, 4, |&x| x * 2);
        let expected: Vec<i32> = (0..100).map(|x| x * 2).collect();
        assert_eq!(result, expected);
    }

    #[test]
    #[should_panic(expected = "max_concurrent must be > 0")]
    fn par_map_limited_zero_panics() {
        par_map_limited(&[1, 2, 3], 0, |&x| x);
    }

    #[test]
    fn par_map_limited_caps_in_flight() {
        let items: Vec<i32> = (0..20).collect();
        let in_flight = AtomicUsize::new(0);
        let max_observed = AtomicUsize::new(0);

        par_map_limited(&items, 3, |&x| {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_observed.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            x
        });

        let max = max_observed.load(Ordering::SeqCst);
        assert!(max <= 3, "max in-flight was {max}, expected <= 3");
    }

    #[test]
    fn schedulers_agree() {
        let items: Vec<u64> = (0..57).collect();
        let square = |x: &u64| x * x;

        let sequential = SequentialScheduler.map(&items, square);
        let rayon = RayonScheduler::new().map(&items, square);
        let limited = RayonScheduler::new().with_max_concurrent(5).map(&items, square);
        let pooled = RayonScheduler::new()
            .with_threads(2)
            .unwrap()
            .map(&items, square);

        assert_eq!(sequential, rayon);
        assert_eq!(sequential, limited);
        assert_eq!(sequential, pooled);
    }

    #[test]
    fn empty_task_list() {
        let items: Vec<u8> = Vec::new();
        assert!(RayonScheduler::new().map(&items, |&x| x).is_empty());
        assert!(SequentialScheduler.map(&items, |&x| x).is_empty());
    }
}

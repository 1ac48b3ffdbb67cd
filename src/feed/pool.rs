use futures::stream::{self, StreamExt};
use std::future::Future;
use thiserror::Error;

/// The pool could not schedule the batch at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,
}

/// Runs a homogeneous batch of async tasks with bounded parallelism.
///
/// Tasks start in input order and may finish in any order; results are
/// handed back aligned to the inputs. A task's error is a value in its slot,
/// it never aborts the rest of the batch.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WORKERS)
    }
}

impl WorkerPool {
    pub const DEFAULT_WORKERS: usize = 30;

    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `task` over every input, at most `workers` at a time.
    ///
    /// The returned vector has one entry per input, in input order. An empty
    /// input yields an empty result.
    pub async fn run<I, T, E, F, Fut>(
        &self,
        inputs: impl IntoIterator<Item = I>,
        task: F,
    ) -> Result<Vec<Result<T, E>>, PoolError>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let mut finished: Vec<(usize, Result<T, E>)> = stream::iter(inputs.into_iter().enumerate())
            .map(|(index, input)| {
                let pending = task(input);
                async move { (index, pending.await) }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        // buffer_unordered yields in completion order
        finished.sort_unstable_by_key(|(index, _)| *index);

        Ok(finished.into_iter().map(|(_, result)| result).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_aligned_with_inputs_despite_completion_order() {
        let pool = WorkerPool::new(4);
        // Later inputs finish first
        let delays = vec![40u64, 30, 20, 10];

        let results = pool
            .run(delays.clone(), |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, String>(ms)
            })
            .await
            .unwrap();

        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, delays);
    }

    #[tokio::test]
    async fn test_errors_stay_in_their_slot() {
        let pool = WorkerPool::new(2);
        let results = pool
            .run(1..=5, |n| async move {
                if n % 2 == 0 {
                    Err(format!("even {n}"))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(results[0], Ok(1));
        assert_eq!(results[1], Err("even 2".to_string()));
        assert_eq!(results[2], Ok(3));
        assert_eq!(results[3], Err("even 4".to_string()));
        assert_eq!(results[4], Ok(5));
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = pool
            .run(0..12, |_| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results = WorkerPool::default()
            .run(Vec::<u8>::new(), |n| async move { Ok::<_, ()>(n) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let result = WorkerPool::new(0)
            .run(vec![1], |n| async move { Ok::<_, ()>(n) })
            .await;
        assert_eq!(result.unwrap_err(), PoolError::NoWorkers);
    }
}

//! Worker pool engine — ordered fan-out/fan-in over a bounded set of workers.
//!
//! Architecture (single `run`):
//! 1. A dispatcher offers `(index, input)` units to a rendezvous intake channel.
//! 2. N workers pull units, run the task, and push `(index, result)` to a
//!    rendezvous results channel. The intake receiver is shared across workers
//!    behind a mutex, so a free worker picks up the next unit naturally.
//! 3. A collector writes each result back into the slot matching its original
//!    index, so output order never depends on completion order.
//!
//! Per-item failures stay in their slot and never abort sibling items. Only
//! the run-level cancellation token stops dispatch, and already-dispatched
//! items still run to completion.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::observability;

/// Built-in worker count used when the caller passes 0 and the shared
/// configuration does not override `pool.default_workers`.
pub const DEFAULT_NUM_WORKERS: usize = 10;

/// Pool-level error, distinct from and orthogonal to per-item errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("run cancelled before all items were dispatched")]
    Cancelled,
}

/// Aggregate verdict over the per-item slots of one run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContentError {
    #[error("failed to retrieve any content")]
    NoContent,
    #[error("failed to retrieve some of the content")]
    PartialContent,
}

/// One unit of work flowing dispatcher -> worker.
struct TaskUnit<I> {
    index: usize,
    input: I,
}

/// One finished unit flowing worker -> collector.
struct Finished<O, E> {
    index: usize,
    result: Result<O, E>,
}

/// Outcome of one pool run.
///
/// `results` has the same length as the input sequence and `results[i]`
/// always corresponds to `inputs[i]`:
/// - `Some(Ok(output))` — the task succeeded for this item
/// - `Some(Err(error))` — the task ran and failed for this item
/// - `None` — the item was never dispatched (the run was cancelled first);
///   explicitly distinguishable from a trivial success
#[derive(Debug)]
pub struct PoolRun<O, E> {
    pub results: Vec<Option<Result<O, E>>>,
    pub error: Option<PoolError>,
}

impl<O, E> PoolRun<O, E> {
    /// Collapse the per-item slots into an all/some/none verdict.
    ///
    /// Returns `None` when every item succeeded, [`ContentError::NoContent`]
    /// when no item produced an output, and [`ContentError::PartialContent`]
    /// otherwise. Undispatched slots count as failures here.
    pub fn content_error(&self) -> Option<ContentError> {
        let failed = self
            .results
            .iter()
            .filter(|slot| !matches!(slot, Some(Ok(_))))
            .count();

        if failed == 0 {
            None
        } else if failed == self.results.len() {
            Some(ContentError::NoContent)
        } else {
            Some(ContentError::PartialContent)
        }
    }
}

/// One pool invocation: an input sequence, a task, a worker count, and a
/// cancellation token. Nothing outlives the `run` call.
///
/// ```no_run
/// use fetchpool::pool::Job;
///
/// # async fn demo() {
/// let run = Job::new(|n: u32| async move { Ok::<_, String>(n * 2) }, vec![1, 2, 3])
///     .workers(2)
///     .run()
///     .await;
/// assert!(run.error.is_none());
/// # }
/// ```
pub struct Job<I, F> {
    inputs: Vec<I>,
    task: F,
    workers: usize,
    cancel: CancellationToken,
}

impl<I, F> Job<I, F> {
    /// Create a job with the default worker count and a never-cancelled token.
    pub fn new(task: F, inputs: Vec<I>) -> Self {
        Self {
            inputs,
            task,
            workers: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the worker count. 0 selects the configured default
    /// (`pool.default_workers`, [`DEFAULT_NUM_WORKERS`] unless overridden);
    /// a positive count is clamped to the number of inputs at run time.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Attach a cancellation token scoped to this run. Cancellation stops
    /// further dispatch; it never preempts a task already executing.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the task for every input across the worker pool.
    pub async fn run<O, E, Fut>(self) -> PoolRun<O, E>
    where
        I: Send + 'static,
        O: Send + 'static,
        E: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let Job {
            inputs,
            task,
            workers,
            cancel,
        } = self;

        let total = inputs.len();
        let mut results: Vec<Option<Result<O, E>>> = Vec::with_capacity(total);
        results.resize_with(total, || None);

        if total == 0 {
            return PoolRun {
                results,
                error: None,
            };
        }

        let workers = clamp_workers(workers, total);
        debug!(total, workers, "Starting pool run");

        // Capacity-1 channels act as the rendezvous queues: a slow collector
        // throttles workers, and no worker is ready means dispatch blocks.
        let (intake_tx, intake_rx) = mpsc::channel::<TaskUnit<I>>(1);
        let intake_rx = Arc::new(Mutex::new(intake_rx));
        let (results_tx, mut results_rx) = mpsc::channel::<Finished<O, E>>(1);

        let task = Arc::new(task);
        let mut pool = JoinSet::new();

        for _ in 0..workers {
            let intake = Arc::clone(&intake_rx);
            let results_tx = results_tx.clone();
            let task = Arc::clone(&task);

            pool.spawn(async move {
                loop {
                    // Hold the intake lock only while pulling; the task itself
                    // runs unlocked so workers execute in parallel.
                    let unit = { intake.lock().await.recv().await };
                    let Some(unit) = unit else { break };

                    let result = (task)(unit.input).await;
                    match &result {
                        Ok(_) => observability::metrics().task_completed(),
                        Err(_) => observability::metrics().task_failed(),
                    }

                    let finished = Finished {
                        index: unit.index,
                        result,
                    };
                    if results_tx.send(finished).await.is_err() {
                        break;
                    }
                }
            });
        }

        // Workers hold the only remaining result senders; the collector loop
        // below ends exactly when the last worker exits.
        drop(results_tx);

        let dispatcher = tokio::spawn(async move {
            for (index, input) in inputs.into_iter().enumerate() {
                // Fair select between the blocking send and the cancellation
                // signal: cancellation is observed even when a worker is
                // always ready to receive.
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(dispatched = index, total, "Run cancelled, stopping dispatch");
                        observability::metrics().run_cancelled();
                        return true;
                    }
                    sent = intake_tx.send(TaskUnit { index, input }) => {
                        if sent.is_err() {
                            return false;
                        }
                    }
                }
            }
            false
        });

        while let Some(finished) = results_rx.recv().await {
            results[finished.index] = Some(finished.result);
        }

        while pool.join_next().await.is_some() {}

        let cancelled = dispatcher.await.unwrap_or(false);

        PoolRun {
            results,
            error: cancelled.then_some(PoolError::Cancelled),
        }
    }
}

/// Clamp a requested worker count against the input length.
///
/// A request of 0 maps to the configured default and is intentionally not
/// clamped to the input length; surplus workers find the intake closed and
/// exit.
fn clamp_workers(requested: usize, input_len: usize) -> usize {
    if requested == 0 {
        Config::shared().pool.default_workers
    } else {
        requested.min(input_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn double(n: usize) -> Result<usize, String> {
        // Stagger completion so results arrive out of dispatch order.
        tokio::time::sleep(Duration::from_millis((n % 3) as u64)).await;
        Ok(n * 2)
    }

    #[tokio::test]
    async fn results_align_with_inputs() {
        let inputs: Vec<usize> = (0..20).collect();
        let run = Job::new(double, inputs.clone()).workers(4).run().await;

        assert!(run.error.is_none());
        assert_eq!(run.results.len(), inputs.len());
        for (i, slot) in run.results.iter().enumerate() {
            assert_eq!(slot.as_ref().unwrap().as_ref().unwrap(), &(i * 2));
        }
    }

    #[tokio::test]
    async fn single_worker_and_saturated_pool_agree() {
        let inputs: Vec<usize> = (0..15).collect();

        let serial = Job::new(double, inputs.clone()).workers(1).run().await;
        let parallel = Job::new(double, inputs.clone()).workers(50).run().await;

        assert_eq!(serial.results, parallel.results);
    }

    #[tokio::test]
    async fn empty_input_returns_immediately() {
        let run = Job::new(double, Vec::new()).run().await;

        assert!(run.results.is_empty());
        assert!(run.error.is_none());
        assert!(run.content_error().is_none());
    }

    #[tokio::test]
    async fn per_item_failures_do_not_abort_siblings() {
        let task = |n: usize| async move {
            if n % 2 == 1 {
                Err(format!("item {n} failed"))
            } else {
                Ok(n)
            }
        };

        let run = Job::new(task, (0..10).collect()).workers(3).run().await;

        assert!(run.error.is_none());
        for (i, slot) in run.results.iter().enumerate() {
            match slot.as_ref().unwrap() {
                Ok(n) => assert_eq!(*n, i),
                Err(msg) => {
                    assert_eq!(i % 2, 1);
                    assert_eq!(msg, &format!("item {i} failed"));
                }
            }
        }
        assert_eq!(run.content_error(), Some(ContentError::PartialContent));
    }

    #[tokio::test]
    async fn all_failures_yield_no_content() {
        let task = |_: usize| async move { Err::<usize, _>("boom".to_string()) };
        let run = Job::new(task, (0..5).collect()).run().await;

        assert_eq!(run.content_error(), Some(ContentError::NoContent));
        assert!(run.error.is_none());
    }

    #[tokio::test]
    async fn cancellation_stops_dispatch() {
        let token = CancellationToken::new();
        token.cancel();

        let task = |n: usize| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, String>(n)
        };

        let run = Job::new(task, (0..100).collect())
            .workers(2)
            .cancel(token)
            .run()
            .await;

        assert_eq!(run.error, Some(PoolError::Cancelled));
        assert!(
            run.results.iter().any(|slot| slot.is_none()),
            "a pre-fired token must leave undispatched slots"
        );
        // Dispatched items still ran to completion.
        for slot in run.results.iter().flatten() {
            assert!(slot.is_ok());
        }
    }

    #[test]
    fn worker_count_clamping() {
        // A zero request follows the shared configuration, which resolves to
        // the built-in default when nothing overrides it.
        assert_eq!(clamp_workers(0, 3), Config::shared().pool.default_workers);
        assert_eq!(clamp_workers(0, 3), DEFAULT_NUM_WORKERS);
        assert_eq!(clamp_workers(0, 100), DEFAULT_NUM_WORKERS);
        assert_eq!(clamp_workers(5, 3), 3);
        assert_eq!(clamp_workers(2, 3), 2);
    }
}

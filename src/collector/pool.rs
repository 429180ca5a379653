use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::{Id, JoinSet};

/// Result of one pool task.
#[derive(Debug)]
pub enum TaskOutcome<I, T> {
    Done(T),
    /// The task panicked; the item is handed back to the caller.
    Panicked(I),
}

/// Fixed-size worker pool for one fan-out level.
///
/// DESIGN:
/// - Each `run` call is its own task group. Nested levels create
///   their own pool run instead of sharing slots with the parent,
///   so an outer task waiting on its children can never starve
///   them of a slot.
/// - At most `workers` tasks of one run are alive at a time.
/// - No work stealing, no priorities. Results come back in
///   completion order.
/// - A panicking task is isolated and reported as `Panicked`;
///   siblings keep running.
///
/// With concurrency disabled, items run one after another on the
/// calling task (panics still isolated per item).
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    concurrent: bool,
}

impl WorkerPool {
    pub fn new(workers: usize, concurrent: bool) -> Self {
        Self {
            workers: workers.max(1),
            concurrent,
        }
    }

    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<TaskOutcome<I, T>>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        if self.concurrent {
            self.run_concurrent(items, task).await
        } else {
            Self::run_sequential(items, task).await
        }
    }

    async fn run_sequential<I, T, F, Fut>(items: Vec<I>, task: F) -> Vec<TaskOutcome<I, T>>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            let outcome = match AssertUnwindSafe(task(item.clone())).catch_unwind().await {
                Ok(value) => TaskOutcome::Done(value),
                Err(_) => TaskOutcome::Panicked(item),
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn run_concurrent<I, T, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<TaskOutcome<I, T>>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut outcomes = Vec::with_capacity(items.len());
        let mut in_flight: HashMap<Id, I> = HashMap::new();
        let mut set = JoinSet::new();
        let mut queue = items.into_iter();

        loop {
            while set.len() < self.workers {
                let Some(item) = queue.next() else { break };
                let handle = set.spawn(task(item.clone()));
                in_flight.insert(handle.id(), item);
            }

            let Some(joined) = set.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((id, value)) => {
                    in_flight.remove(&id);
                    outcomes.push(TaskOutcome::Done(value));
                }
                Err(e) => {
                    if let Some(item) = in_flight.remove(&e.id()) {
                        outcomes.push(TaskOutcome::Panicked(item));
                    }
                }
            }
        }

        outcomes
    }
}

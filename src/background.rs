//! Tracked background work
//!
//! Handlers may leave work running after they have produced a response
//! (cache writes behind a timeout race, install-time pre-warm). Everything is
//! spawned through `BackgroundTasks` so the harness can wait for it before
//! treating an event as finished.

use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Set of detached tasks that can be drained
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task. Its outcome is observed only through logs.
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        // Reap anything already finished
        while let Some(done) = set.try_join_next() {
            log_join(done);
        }
        set.spawn(task);
        debug!("Spawned background task {} ({} pending)", label, set.len());
    }

    /// Number of tasks not yet reaped
    pub fn pending(&self) -> usize {
        self.set.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait for every task, including ones spawned while draining.
    /// Returns how many tasks were awaited.
    pub async fn drain(&self) -> usize {
        let mut drained = 0;
        loop {
            let mut batch = {
                let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *set)
            };
            if batch.is_empty() {
                break;
            }
            while let Some(done) = batch.join_next().await {
                log_join(done);
                drained += 1;
            }
        }
        drained
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!("Background task did not complete: {}", e);
    }
}

/// Run `work` over `items` with at most `concurrency` in flight
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, concurrency: usize, work: F)
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ()>,
{
    stream::iter(items)
        .for_each_concurrent(concurrency.max(1), work)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_nested_spawns() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let inner_counter = counter.clone();
        tasks.spawn("outer", async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            inner_counter.fetch_add(1, Ordering::SeqCst);
            let nested_counter = inner_counter.clone();
            inner_tasks.spawn("nested", async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                nested_counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(tasks.drain().await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn panicking_task_does_not_poison_drain() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("boom", async { panic!("task failure") });
        tasks.spawn("fine", async {});
        assert_eq!(tasks.drain().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_pool_limits_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_bounded((0..10).collect(), 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }
}

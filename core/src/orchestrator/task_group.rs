//! Bounded group of independent async tasks
//!
//! A `TaskGroup` knows nothing about bees: it runs units of work on the
//! tokio runtime with at most `limit` in flight, waits for all of them and
//! returns one result per unit in submission order. A unit that panics
//! yields `Err` for that unit only.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Runs independent futures with bounded parallelism and gathers them
#[derive(Debug, Clone)]
pub struct TaskGroup {
    limit: usize,
}

impl TaskGroup {
    /// Group allowing `limit` units in flight (at least one)
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Maximum units in flight
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every unit to completion and return their results in order
    pub async fn run<F, T>(&self, units: Vec<F>) -> Vec<Result<T, JoinError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));

        let handles: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquire cannot fail.
                    let _permit = semaphore.acquire_owned().await.ok();
                    unit.await
                })
            })
            .collect();

        futures::future::join_all(handles).await
    }
}

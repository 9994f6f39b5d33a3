//! Batch reducers for per-record remote work.

use std::future::Future;

use futures::future;
use futures::stream::{self, StreamExt};

use crate::{Error, Result};

/// Aggregate of a batch that kept going past failures.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<Error>,
}

impl<T> BatchOutcome<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }
}

/// Run every task with at most `parallelism` in flight, collecting successes
/// and failures. One failure never stops the rest.
pub async fn collect_results<T, F, I>(tasks: I, parallelism: usize) -> BatchOutcome<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    let results: Vec<Result<T>> = stream::iter(tasks)
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome {
        succeeded: Vec::with_capacity(results.len()),
        failures: Vec::new(),
    };
    for result in results {
        match result {
            Ok(value) => outcome.succeeded.push(value),
            Err(error) => outcome.failures.push(error),
        }
    }
    outcome
}

/// Run every task concurrently and report the first failure.
///
/// All tasks are driven to completion before the error is returned, so a
/// failure does not cancel work already issued.
pub async fn fail_fast<T, F, I>(tasks: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    future::join_all(tasks).await.into_iter().collect()
}

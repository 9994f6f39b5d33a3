//! Non-blocking cleanup
//!
//! Secondary work (removing an orphaned image, stamping a backup time) must
//! never fail the primary operation. These helpers log the failure at `warn`
//! and hand back `None`.

use std::fmt::Display;
use std::future::Future;

/// Swallow the error of a finished cleanup step.
pub fn best_effort<T, E: Display>(what: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!("{what} failed: {error}");
            None
        }
    }
}

/// Await a cleanup step and swallow its error.
pub async fn best_effort_async<T, E, F>(what: &str, future: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    best_effort(what, future.await)
}

//! Bounded retry for flaky external queries

use std::fmt;
use std::future::Future;

/// Why a bounded retry gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; holds the last one
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with an error the predicate refused to retry
    Aborted(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "failed after {} attempts: {}", attempts, last)
            }
            RetryError::Aborted(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Run `op` until it succeeds, at most `max_attempts` times
///
/// `op` receives the 1-based attempt number. Errors for which
/// `should_retry` returns false end the loop immediately.
pub async fn retry_bounded<T, E, F, Fut, P>(
    max_attempts: u32,
    mut should_retry: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !should_retry(&e) => return Err(RetryError::Aborted(e)),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                })
            }
            Err(e) => {
                tracing::debug!("Attempt {}/{} failed: {}", attempt, max_attempts, e);
            }
        }
    }
}

//! Bounded poll-until-true.
//!
//! The poller only reports a timeout; whether that timeout is fatal is decided
//! by each caller.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// The condition never became true within the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("condition not met within {0:?}")]
pub struct PollTimeout(pub Duration);

/// One evaluation of a poll condition, borrowing the polled state.
pub type Condition<'a, E> = Pin<Box<dyn Future<Output = Result<bool, E>> + Send + 'a>>;

/// Evaluate `condition(state)` immediately, then once per `interval`, until it
/// yields `Ok(true)` or `timeout` elapses.
///
/// Errors from the condition itself end the poll and are returned as-is, so
/// the outer `Result` is the bus, the inner one is the timeout.
pub async fn wait_for<S, E, F>(
    state: &mut S,
    mut condition: F,
    timeout: Duration,
    interval: Duration,
) -> Result<Result<(), PollTimeout>, E>
where
    S: ?Sized,
    F: for<'a> FnMut(&'a mut S) -> Condition<'a, E>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if condition(state).await? {
            return Ok(Ok(()));
        }
        if Instant::now() >= deadline {
            return Ok(Err(PollTimeout(timeout)));
        }
        sleep(interval).await;
    }
}

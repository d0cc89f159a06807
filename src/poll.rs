//! The single chokepoint every waiting operation flows through: a probe
//! evaluated on a fixed tick until it succeeds, fails fatally, or a
//! deadline elapses.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::error::{DroverError, Result};

/// Shared cadence of every waiting operation.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one probe evaluation.
#[derive(Debug)]
pub enum Tick<T> {
    /// Condition not met yet, keep waiting.
    Pending,
    /// Condition met.
    Ready(T),
}

/// Repeatedly evaluates `probe` on a fixed one-second tick until it yields
/// [`Tick::Ready`], fails, or `deadline` elapses.
///
/// The first tick fires after one full interval. A probe error is fatal:
/// it aborts the wait immediately and propagates verbatim. The deadline is
/// only observed between probe evaluations, never mid-probe; expiry yields
/// [`DroverError::WaitTimeout`] with a captured backtrace.
pub async fn poll_until<T, F, Fut>(mut probe: F, deadline: Duration) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Tick<T>>>,
{
    let expiry = Instant::now() + deadline;
    let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => match probe().await? {
                Tick::Ready(value) => return Ok(value),
                Tick::Pending => {}
            },
            _ = sleep_until(expiry) => return Err(DroverError::wait_timeout()),
        }
    }
}

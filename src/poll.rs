//! Fixed-interval polling with a hard ceiling.
//!
//! Transcript and render polling both go through [`poll_until`]. Time is read
//! from `tokio::time`, so tests can run the loops on a paused clock.

use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::debug;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const TRANSCRIPT_CEILING: Duration = Duration::from_secs(300);
pub const RENDER_CEILING: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl PollPolicy {
    pub const fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }

    pub const fn transcript() -> Self {
        Self::new(POLL_INTERVAL, TRANSCRIPT_CEILING)
    }

    pub const fn render() -> Self {
        Self::new(POLL_INTERVAL, RENDER_CEILING)
    }
}

#[derive(Debug)]
pub enum PollError<E> {
    /// The ceiling elapsed without `ready` ever accepting a fetched value.
    TimedOut { waited: Duration },
    /// A fetch failed; polling stops at the first error.
    Failed(E),
}

/// Calls `fetch` right away and then once per `policy.interval` until `ready`
/// accepts the fetched value. The final probe runs exactly at the ceiling, and
/// a fetch still in flight when the ceiling passes is abandoned.
pub async fn poll_until<T, E, F, Fut, P>(
    policy: &PollPolicy,
    mut fetch: F,
    ready: P,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();
    let deadline = started + policy.ceiling;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let value = match timeout_at(deadline, fetch()).await {
            Ok(fetched) => fetched.map_err(PollError::Failed)?,
            Err(_) => {
                return Err(PollError::TimedOut {
                    waited: started.elapsed(),
                });
            }
        };
        if ready(&value) {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::TimedOut {
                waited: now - started,
            });
        }
        debug!(attempt, "condition not reached yet, waiting {:?}", policy.interval);
        sleep_until((now + policy.interval).min(deadline)).await;
    }
}

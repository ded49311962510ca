//! Bounded status polling with exponential backoff
//!
//! The report job is asynchronous on the remote side: the generation request
//! returns immediately and the report lands in the bucket some time later.
//! Instead of a fixed sleep, the collector probes the job status repeatedly
//! with exponentially growing delays, optional jitter, and a hard overall
//! deadline.

use crate::config::PollConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

/// What a single status probe observed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The awaited condition holds; polling stops with this value
    Ready(T),
    /// Not there yet; polling continues after a backoff delay
    Pending,
}

/// Probe an async condition until it is ready, fails, or the deadline passes
///
/// The probe runs once immediately; subsequent probes are separated by
/// exponentially growing delays starting at `initial_delay` and capped at
/// `max_delay`. A probe error ends polling immediately. Once `max_wait` has
/// elapsed and the condition is still pending, [`Error::PollTimeout`] is
/// returned.
///
/// # Errors
///
/// Returns the probe's error unchanged, or [`Error::PollTimeout`] when the
/// deadline passes first.
pub async fn poll_until<F, Fut, T>(config: &PollConfig, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollOutcome<T>>>,
{
    let started = Instant::now();
    let mut delay = config.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if let PollOutcome::Ready(value) = probe().await? {
            if attempt > 1 {
                tracing::debug!(attempts = attempt, waited = ?started.elapsed(), "condition ready");
            }
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited >= config.max_wait {
            tracing::warn!(attempts = attempt, waited = ?waited, "polling deadline exceeded");
            return Err(Error::PollTimeout { waited });
        }

        let sleep_for = if config.jitter { add_jitter(delay) } else { delay };
        tracing::debug!(
            attempt = attempt,
            delay_ms = sleep_for.as_millis(),
            "condition pending, backing off"
        );
        tokio::time::sleep(sleep_for).await;

        let next = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
        delay = next.min(config.max_delay);
    }
}

/// Add random jitter to a delay to avoid probing in lockstep
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay falls between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

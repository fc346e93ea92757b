//! Fixed-interval polling against the provider.
//!
//! Both waits in a deployment (managed database readiness and App Platform
//! deployment progress) run through [`poll_until`]. A probe reports one of
//! three outcomes; probe errors are treated as transient and retried until
//! the timeout elapses.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Interval and overall timeout of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Upper bound on probes: one per started interval.
    pub fn max_attempts(&self) -> u64 {
        if self.interval.is_zero() {
            return 1;
        }
        let timeout = self.timeout.as_millis();
        let interval = self.interval.as_millis();
        (timeout.div_ceil(interval)).max(1) as u64
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// Condition met; stop polling with this value.
    Ready(T),
    /// Not there yet; the string is the observed status.
    Pending(String),
    /// Terminal failure; stop polling without waiting for the timeout.
    Failed(String),
}

/// Why a poll loop stopped without a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("timed out waiting for {label} after {elapsed_secs}s ({attempts} checks, last status: {last_status})")]
    TimedOut {
        label: String,
        attempts: u32,
        elapsed_secs: u64,
        last_status: String,
    },

    #[error("{label} failed: {reason}")]
    Failed {
        label: String,
        reason: String,
        attempts: u32,
    },
}

/// Probe every `policy.interval` until the probe is ready, fails, or
/// `policy.timeout` has elapsed.
///
/// A probe is only started while the elapsed time is below the timeout, so a
/// 600s timeout with a 30s interval makes at most 20 probes. `Err` from the
/// probe counts as pending.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    label: &str,
    mut probe: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
    E: Display,
{
    debug!(
        "Polling {} every {}s, at most {} checks",
        label,
        policy.interval.as_secs(),
        policy.max_attempts()
    );
    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_status = String::from("unknown");

    while start.elapsed() < policy.timeout {
        attempts += 1;

        match probe().await {
            Ok(PollStatus::Ready(value)) => {
                debug!("{} ready after {} checks", label, attempts);
                return Ok(value);
            }
            Ok(PollStatus::Failed(reason)) => {
                return Err(PollError::Failed {
                    label: label.to_string(),
                    reason,
                    attempts,
                });
            }
            Ok(PollStatus::Pending(status)) => {
                info!("{} status: {}. Waiting...", label, status);
                last_status = status;
            }
            Err(e) => {
                warn!("Checking {} failed, will retry: {}", label, e);
                last_status = format!("check failed: {}", e);
            }
        }

        sleep(policy.interval).await;
    }

    Err(PollError::TimedOut {
        label: label.to_string(),
        attempts,
        elapsed_secs: start.elapsed().as_secs(),
        last_status,
    })
}

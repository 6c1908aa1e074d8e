//! Fixed-delay retry wrapper for fallible async operations.
//!
//! `attempts` counts attempts, not additional retries: a policy with
//! `attempts = 1` performs exactly one call and propagates its failure
//! verbatim. The delay between attempts is fixed — no backoff growth, no
//! jitter. Page workers are already bounded by the orchestrator's worker
//! count, so a recovering API endpoint only ever sees `worker_count`
//! retries at once.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Retry policy: how many attempts, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts (≥ 1).
    pub attempts: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Invoke `op` up to `policy.attempts` times, sleeping `policy.delay`
/// between attempts.
///
/// Logs a warning per failed attempt and an error on final exhaustion, then
/// returns the last error. `label` names the operation in log lines.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_err: Option<E> = None;

    for attempt in 1..=policy.attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < policy.attempts {
                    warn!(
                        "{}: attempt {}/{} failed: {}. Retrying in {:?}",
                        label, attempt, policy.attempts, e, policy.delay
                    );
                    sleep(policy.delay).await;
                } else {
                    error!(
                        "{}: all {} attempts failed. Last error: {}",
                        label, policy.attempts, e
                    );
                }
                last_err = Some(e);
            }
        }
    }

    // attempts ≥ 1 guarantees at least one iteration ran.
    Err(last_err.expect("retry loop ran at least once"))
}

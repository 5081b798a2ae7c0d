//! Bounded retry for operations that lost the write lock.
//!
//! Only `ClinicError::Busy` is retried. Every other error returns on the
//! first attempt.

use std::time::Duration;

use rand::Rng;

use crate::error::{ClinicError, ClinicResult};

/// Total attempts, including the first.
pub const MAX_BUSY_ATTEMPTS: u32 = 3;

const BASE_BACKOFF: Duration = Duration::from_millis(25);

/// Delay before retry number `attempt` (1-based): exponential with up to
/// 50% random jitter.
fn backoff(attempt: u32) -> Duration {
    let base = BASE_BACKOFF * 2u32.saturating_pow(attempt.saturating_sub(1));
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter_ms)
}

/// Run `op` up to `max_attempts` times while it fails with `Busy`.
/// Blocks the calling thread between attempts.
pub fn with_busy_retry<T, F>(max_attempts: u32, mut op: F) -> ClinicResult<T>
where
    F: FnMut() -> ClinicResult<T>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Storage busy, retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(ClinicError::Busy(detail)) => {
                return Err(ClinicError::Busy(format!("{detail} (after {attempt} attempts)")));
            }
            other => return other,
        }
    }
}

//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate the delay before retry number `retry` (1-based).
///
/// The delay is `factor × 2^(retry-1)`, capped at `max`. With `jitter` set,
/// up to 10% of the capped delay is added.
pub fn calculate_backoff(retry: u32, factor: Duration, max: Duration, jitter: bool) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(retry - 1);
    let delay = factor.saturating_mul(exponential_base);
    let capped_delay = delay.min(max);

    if !jitter {
        return capped_delay;
    }

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay.as_millis() as u64 / 10;
    let extra = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped_delay + Duration::from_millis(extra)
}

//! Small helpers shared across modules.

use std::time::Duration;

use rand::Rng;

/// Default exponential backoff schedule: 200ms, 400ms, 800ms, 1600ms, ...
/// with +/-20% jitter, used by the LLM client's retry loop (§6).
pub fn backoff(attempt: u64) -> Duration {
    let base_delay_ms = 200u64 * (1u64 << attempt.saturating_sub(1).min(16));
    let jitter = rand::rng().random_range(0.8..1.2);
    Duration::from_millis((base_delay_ms as f64 * jitter) as u64)
}

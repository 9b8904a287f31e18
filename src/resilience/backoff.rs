//! Retry backoff.

use std::time::Duration;

/// Delay before retry number `attempt`: `attempt² × base`.
///
/// With the default one-second base this is 1s, 4s, 9s, ...
pub fn quadratic_backoff(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt.saturating_mul(attempt))
}

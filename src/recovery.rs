// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Retry strategies for history fetches.

use std::time::Duration;

/// Retry strategy for operations
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RetryStrategy {
    /// No retries
    #[default]
    None,
    /// Exponential backoff
    ExponentialBackoff {
        /// Maximum number of retry attempts
        max_retries: u32,
        /// Initial delay
        initial_delay: Duration,
        /// Maximum delay
        max_delay: Duration,
        /// Multiplier for each attempt
        multiplier: f64,
    },
}

impl RetryStrategy {
    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// Returns None once the retry budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::ExponentialBackoff {
                max_retries,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt < *max_retries {
                    let delay_ms =
                        initial_delay.as_millis() as f64 * multiplier.powi(attempt as i32);
                    Some(Duration::from_millis(delay_ms as u64).min(*max_delay))
                } else {
                    None
                }
            }
        }
    }

    /// Create an exponential backoff strategy (doubling, capped at 30s)
    pub fn exponential(max_retries: u32, initial_delay: Duration) -> Self {
        if max_retries == 0 {
            return Self::None;
        }
        Self::ExponentialBackoff {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Run `operation`, retrying while `should_retry` accepts the error and the
/// strategy still has budget.
///
/// Returns the value together with the number of attempts made.
pub fn retry_if<T, E, F, P>(
    strategy: &RetryStrategy,
    mut operation: F,
    should_retry: P,
) -> (Result<T, E>, u32)
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return (Ok(value), attempt + 1),
            Err(e) => match strategy.delay_for_attempt(attempt) {
                Some(delay) if should_retry(&e) => {
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                _ => return (Err(e), attempt + 1),
            },
        }
    }
}

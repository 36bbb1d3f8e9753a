// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Timeout and retry around another source.

use super::SensorHistorySource;
use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::reading::RawSeries;
use crate::recovery::{retry_if, RetryStrategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bounds every fetch of the inner source.
///
/// Each attempt runs on a worker thread; if it does not answer within the
/// timeout the attempt is abandoned (the worker finishes in the background
/// and its result is dropped). Transient failures are retried.
///
/// A thread stuck inside the inner source cannot be cancelled, so at most
/// `max_in_flight` workers may be alive at once. Once that many are running,
/// new attempts fail with `Unavailable` until one of them returns.
pub struct GuardedSource<S> {
    inner: Arc<S>,
    timeout: Duration,
    retry: RetryStrategy,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

/// Releases a worker slot when the worker exits, even on panic.
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S: SensorHistorySource + 'static> GuardedSource<S> {
    pub fn new(inner: S, config: &SourceConfig) -> Self {
        Self::from_arc(Arc::new(inner), config)
    }

    pub fn from_arc(inner: Arc<S>, config: &SourceConfig) -> Self {
        Self {
            inner,
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryStrategy::exponential(
                config.retries,
                Duration::from_millis(config.retry_delay_ms),
            ),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: config.max_in_flight.max(1),
        }
    }

    fn acquire_slot(&self) -> Result<SlotGuard, FetchError> {
        let max = self.max_in_flight;
        self.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| SlotGuard(Arc::clone(&self.in_flight)))
            .map_err(|n| FetchError::Unavailable {
                reason: format!("{} fetches still in flight", n),
            })
    }

    fn fetch_once(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError> {
        let slot = self.acquire_slot()?;
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let id = sensor_id.to_string();

        thread::Builder::new()
            .name("hydrocast-fetch".to_string())
            .spawn(move || {
                let _slot = slot;
                // The receiver is gone if the attempt already timed out.
                let _ = tx.send(inner.fetch(&id, window_days));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(FetchError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(FetchError::Unavailable {
                reason: "fetch worker exited without a result".to_string(),
            }),
        }
    }
}

impl<S: SensorHistorySource + 'static> SensorHistorySource for GuardedSource<S> {
    fn fetch(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError> {
        let (result, attempts) = retry_if(
            &self.retry,
            || self.fetch_once(sensor_id, window_days),
            FetchError::is_transient,
        );
        if attempts > 1 {
            match &result {
                Ok(_) => log::info!(
                    "{} fetch for {} succeeded after {} attempts",
                    self.inner.name(),
                    sensor_id,
                    attempts
                ),
                Err(e) => log::warn!(
                    "{} fetch for {} failed after {} attempts: {}",
                    self.inner.name(),
                    sensor_id,
                    attempts,
                    e
                ),
            }
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

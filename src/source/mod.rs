// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor history sources
//!
//! A source answers `fetch(sensor_id, window_days)` with a [`RawSeries`] or a
//! [`FetchError`]. Failures are handed to the engine, which decides to fall
//! back to the [`synthetic`] generator.

pub mod file;
pub mod guarded;
pub mod memory;
pub mod synthetic;

pub use file::CsvHistorySource;
pub use guarded::GuardedSource;
pub use memory::{MemorySource, UnavailableSource};
pub use synthetic::SyntheticGenerator;

use crate::error::FetchError;
use crate::reading::{RawReading, RawSeries};
use chrono::Duration;
use std::sync::Arc;

/// Supplier of raw history for a sensor.
pub trait SensorHistorySource: Send + Sync {
    /// Readings for `sensor_id` covering the last `window_days` days.
    fn fetch(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

impl<S: SensorHistorySource + ?Sized> SensorHistorySource for Box<S> {
    fn fetch(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError> {
        (**self).fetch(sensor_id, window_days)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: SensorHistorySource + ?Sized> SensorHistorySource for Arc<S> {
    fn fetch(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError> {
        (**self).fetch(sensor_id, window_days)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Keep the readings within `window_days` of the newest one.
pub fn within_window(readings: Vec<RawReading>, window_days: u32) -> Vec<RawReading> {
    let newest = match readings.iter().map(|r| r.timestamp).max() {
        Some(t) => t,
        None => return readings,
    };
    let cutoff = newest - Duration::days(i64::from(window_days));
    readings
        .into_iter()
        .filter(|r| r.timestamp >= cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_within_window_is_relative_to_newest() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let readings = vec![
            RawReading::new(t0, 20.0, 50.0, 40.0),
            RawReading::new(t0 + Duration::days(8), 20.0, 50.0, 40.0),
            RawReading::new(t0 + Duration::days(10), 20.0, 50.0, 40.0),
        ];
        let kept = within_window(readings, 7);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.timestamp >= t0 + Duration::days(3)));
    }

    #[test]
    fn test_boxed_source() {
        let source: Box<dyn SensorHistorySource> = Box::new(UnavailableSource::new("down"));
        assert_eq!(source.name(), "unavailable");
        assert!(source.fetch("P1", 7).is_err());
    }
}

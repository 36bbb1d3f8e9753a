// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! In-process sources.

use super::{within_window, SensorHistorySource};
use crate::error::FetchError;
use crate::reading::{RawReading, RawSeries};
use std::collections::HashMap;
use std::sync::RwLock;

/// History held in memory, keyed by sensor.
#[derive(Debug, Default)]
pub struct MemorySource {
    series: RwLock<HashMap<String, Vec<RawReading>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_series(self, series: RawSeries) -> Self {
        self.insert(series);
        self
    }

    /// Append a series' readings to what is stored for its sensor.
    pub fn insert(&self, series: RawSeries) {
        let mut map = match self.series.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(series.sensor_id).or_default().extend(series.readings);
    }
}

impl SensorHistorySource for MemorySource {
    fn fetch(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError> {
        let map = self.series.read().map_err(|_| FetchError::Unavailable {
            reason: "memory store lock poisoned".to_string(),
        })?;
        let readings = map
            .get(sensor_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                sensor_id: sensor_id.to_string(),
            })?;
        Ok(RawSeries::new(sensor_id, within_window(readings, window_days)))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// A source that always fails, for running on synthetic history only.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SensorHistorySource for UnavailableSource {
    fn fetch(&self, _sensor_id: &str, _window_days: u32) -> Result<RawSeries, FetchError> {
        Err(FetchError::Unavailable {
            reason: self.reason.clone(),
        })
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

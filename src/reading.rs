// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Raw sensor readings as supplied by a history source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw row for a sensor.
///
/// A non-finite value in a required field means the sensor did not report
/// it; the feature pipeline treats it as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub timestamp: DateTime<Utc>,
    /// Air temperature, °C.
    pub temperature: f64,
    /// Relative air humidity, %.
    pub humidity_air: f64,
    /// Volumetric soil moisture, %.
    pub humidity_soil: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    /// Illuminance, lux.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
}

impl RawReading {
    /// Create a reading with the required fields only.
    pub fn new(
        timestamp: DateTime<Utc>,
        temperature: f64,
        humidity_air: f64,
        humidity_soil: f64,
    ) -> Self {
        Self {
            timestamp,
            temperature,
            humidity_air,
            humidity_soil,
            ph: None,
            light: None,
        }
    }

    /// Attach a pH value.
    pub fn with_ph(mut self, ph: f64) -> Self {
        self.ph = Some(ph);
        self
    }

    /// Attach a light value.
    pub fn with_light(mut self, light: f64) -> Self {
        self.light = Some(light);
        self
    }
}

/// History of one sensor over a bounded lookback window.
///
/// Readings may be unordered, irregular, and may repeat timestamps. The
/// series is read-only input: the pipeline derives new structures from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub sensor_id: String,
    pub readings: Vec<RawReading>,
}

impl RawSeries {
    pub fn new(sensor_id: impl Into<String>, readings: Vec<RawReading>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            readings,
        }
    }

    pub fn empty(sensor_id: impl Into<String>) -> Self {
        Self::new(sensor_id, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Most recent reading by timestamp.
    pub fn latest(&self) -> Option<&RawReading> {
        self.readings.iter().max_by_key(|r| r.timestamp)
    }

    /// The last `n` readings in ascending time order.
    pub fn tail(&self, n: usize) -> Vec<RawReading> {
        let mut sorted = self.readings.clone();
        sorted.sort_by_key(|r| r.timestamp);
        let skip = sorted.len().saturating_sub(n);
        sorted.split_off(skip)
    }

    /// Instantaneous readings from the most recent row.
    pub fn current(&self) -> Option<CurrentReadings> {
        self.latest().map(CurrentReadings::from)
    }
}

/// Latest readings handed to downstream consumers.
///
/// Every field is optional: a missing reading omits that field, it never
/// fails the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReadings {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_air: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_soil: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl From<&RawReading> for CurrentReadings {
    fn from(reading: &RawReading) -> Self {
        Self {
            timestamp: reading.timestamp,
            temperature: finite(reading.temperature),
            humidity_air: finite(reading.humidity_air),
            humidity_soil: finite(reading.humidity_soil),
            ph: reading.ph.and_then(finite),
            light: reading.light.and_then(finite),
        }
    }
}

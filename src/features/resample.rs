// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fixed-frequency resampling by bucket mean.

use crate::config::Frequency;
use crate::reading::RawReading;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Running mean of one field inside a bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    temperature: Mean,
    humidity_air: Mean,
    humidity_soil: Mean,
    ph: Mean,
    light: Mean,
}

/// Regular grid of bucket means. `NaN` marks a bucket with no value.
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    /// Bucket start times, epoch seconds.
    pub times: Vec<i64>,
    pub temperature: Vec<f64>,
    pub humidity_air: Vec<f64>,
    pub humidity_soil: Vec<f64>,
    /// `None` when no reading carried the field.
    pub ph: Option<Vec<f64>>,
    pub light: Option<Vec<f64>>,
}

impl Resampled {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Start of the bucket containing `timestamp`, aligned to the Unix epoch.
pub fn bucket_start(timestamp: DateTime<Utc>, freq: Frequency) -> i64 {
    timestamp.timestamp().div_euclid(freq.seconds()) * freq.seconds()
}

/// Average readings into consecutive `freq` buckets.
///
/// The grid runs from the earliest to the latest occupied bucket with no
/// holes; buckets without readings hold `NaN`. Duplicate timestamps are
/// averaged like any other readings in the same bucket.
pub fn resample(readings: &[RawReading], freq: Frequency) -> Resampled {
    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    let mut has_ph = false;
    let mut has_light = false;

    for r in readings {
        let bucket = buckets.entry(bucket_start(r.timestamp, freq)).or_default();
        bucket.temperature.push(r.temperature);
        bucket.humidity_air.push(r.humidity_air);
        bucket.humidity_soil.push(r.humidity_soil);
        if let Some(ph) = r.ph.filter(|v| v.is_finite()) {
            bucket.ph.push(ph);
            has_ph = true;
        }
        if let Some(light) = r.light.filter(|v| v.is_finite()) {
            bucket.light.push(light);
            has_light = true;
        }
    }

    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            return Resampled {
                times: Vec::new(),
                temperature: Vec::new(),
                humidity_air: Vec::new(),
                humidity_soil: Vec::new(),
                ph: None,
                light: None,
            }
        }
    };

    let step = freq.seconds();
    let len = ((last - first) / step + 1) as usize;
    let mut out = Resampled {
        times: Vec::with_capacity(len),
        temperature: Vec::with_capacity(len),
        humidity_air: Vec::with_capacity(len),
        humidity_soil: Vec::with_capacity(len),
        ph: has_ph.then(|| Vec::with_capacity(len)),
        light: has_light.then(|| Vec::with_capacity(len)),
    };

    let empty = Bucket::default();
    for i in 0..len {
        let t = first + i as i64 * step;
        let b = buckets.get(&t).unwrap_or(&empty);
        out.times.push(t);
        out.temperature.push(b.temperature.value());
        out.humidity_air.push(b.humidity_air.value());
        out.humidity_soil.push(b.humidity_soil.value());
        if let Some(ph) = out.ph.as_mut() {
            ph.push(b.ph.value());
        }
        if let Some(light) = out.light.as_mut() {
            light.push(b.light.value());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_mean_and_duplicates() {
        let t0 = base();
        let readings = vec![
            RawReading::new(t0 + Duration::minutes(10), 20.0, 60.0, 40.0),
            RawReading::new(t0 + Duration::minutes(10), 22.0, 62.0, 42.0),
            RawReading::new(t0 + Duration::minutes(50), 24.0, 64.0, 44.0),
        ];
        let out = resample(&readings, Frequency::HOURLY);
        assert_eq!(out.len(), 1);
        assert_eq!(out.times[0], t0.timestamp());
        assert_eq!(out.temperature[0], 22.0);
        assert_eq!(out.humidity_soil[0], 42.0);
        assert!(out.ph.is_none());
    }

    #[test]
    fn test_gaps_become_nan() {
        let t0 = base();
        let readings = vec![
            RawReading::new(t0 + Duration::hours(3), 21.0, 60.0, 40.0),
            RawReading::new(t0, 20.0, 60.0, 40.0).with_ph(6.4),
        ];
        let out = resample(&readings, Frequency::HOURLY);
        assert_eq!(out.len(), 4);
        assert_eq!(out.temperature[0], 20.0);
        assert!(out.temperature[1].is_nan());
        assert!(out.temperature[2].is_nan());
        assert_eq!(out.temperature[3], 21.0);

        let ph = out.ph.unwrap();
        assert_eq!(ph[0], 6.4);
        assert!(ph[3].is_nan());
    }

    #[test]
    fn test_non_finite_values_skipped() {
        let t0 = base();
        let readings = vec![
            RawReading::new(t0, f64::NAN, 60.0, 40.0),
            RawReading::new(t0 + Duration::minutes(30), 18.0, f64::INFINITY, 40.0),
        ];
        let out = resample(&readings, Frequency::HOURLY);
        assert_eq!(out.temperature[0], 18.0);
        assert_eq!(out.humidity_air[0], 60.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], Frequency::HOURLY).is_empty());
    }
}

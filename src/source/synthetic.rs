// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Seeded synthetic sensor history.
//!
//! Used when the real source is empty or unreachable. The same
//! `(sensor_id, rows, seed, end)` always yields the same series.

use crate::reading::{RawReading, RawSeries};
use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// `n` evenly spaced values from 0 to `end` inclusive.
fn linspace(end: f64, n: usize, i: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        end * i as f64 / (n - 1) as f64
    }
}

/// Hourly synthetic series generator.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    seed: u64,
    rows: usize,
    end: Option<DateTime<Utc>>,
}

impl SyntheticGenerator {
    /// Generator with 200 rows ending now.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rows: 200,
            end: None,
        }
    }

    /// Set number of hourly rows.
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    /// Anchor the last row at `end` (floored to the hour).
    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Synthesise the series.
    ///
    /// Temperature is one half-sine swing of 24 ± 4 °C, air humidity one
    /// full cosine period around 60 %, soil moisture a seeded random walk
    /// clipped to [15, 85], light a clipped sinusoid, pH normal around 6.5.
    pub fn generate(&self, sensor_id: &str) -> RawSeries {
        let n = self.rows;
        let end = self.end.unwrap_or_else(Utc::now);
        let end = end.duration_trunc(Duration::hours(1)).unwrap_or(end);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut walk = 0.0;
        let soil: Vec<f64> = (0..n)
            .map(|_| {
                let step: f64 = rng.sample(StandardNormal);
                walk += 0.5 * step;
                (45.0 + 15.0 * walk / n as f64 + 10.0).clamp(15.0, 85.0)
            })
            .collect();
        let ph: Vec<f64> = (0..n)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                6.5 + 0.2 * z
            })
            .collect();

        let readings = (0..n)
            .map(|i| {
                let timestamp = end - Duration::hours((n - 1 - i) as i64);
                let temperature = 24.0 + 4.0 * linspace(PI, n, i).sin();
                let humidity_air = 60.0 + 10.0 * linspace(2.0 * PI, n, i).cos();
                let light = (500.0 + 200.0 * linspace(4.0 * PI, n, i).sin()).clamp(100.0, 900.0);
                RawReading::new(timestamp, temperature, humidity_air, soil[i])
                    .with_ph(ph[i])
                    .with_light(light)
            })
            .collect();

        log::info!("generated synthetic series ({} rows) for {}", n, sensor_id);
        RawSeries::new(sensor_id, readings)
    }
}

/// Shorthand for `SyntheticGenerator::new(seed).with_rows(rows).ending_at(end).generate(sensor_id)`.
pub fn generate(sensor_id: &str, rows: usize, seed: u64, end: DateTime<Utc>) -> RawSeries {
    SyntheticGenerator::new(seed)
        .with_rows(rows)
        .ending_at(end)
        .generate(sensor_id)
}

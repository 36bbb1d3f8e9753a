// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Recurrent sequence-regression strategy.
//!
//! `train_and_predict` is a pure function of the frame and configuration:
//! a fresh network is trained on every call and dropped afterwards.

use super::lstm::LstmRegressor;
use super::{Forecaster, Projection};
use crate::config::{EngineConfig, SequenceConfig};
use crate::error::ForecastError;
use crate::features::DerivedFrame;
use crate::forecast::{ConfidenceBand, ForecastPoint};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SOIL_FACTOR: f64 = 0.25;
const BAND_HALF_WIDTH: f64 = 5.0;

/// Min-max scaling to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max > min { max - min } else { 0.0 };
        Self {
            min: if min.is_finite() { min } else { 0.0 },
            range,
        }
    }

    /// A constant series scales to all zeros.
    pub fn transform(&self, value: f64) -> f64 {
        if self.range == 0.0 {
            0.0
        } else {
            (value - self.min) / self.range
        }
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range + self.min
    }
}

/// LSTM-backed strategy.
#[derive(Debug, Clone)]
pub struct SequenceStrategy {
    config: SequenceConfig,
    projection: Projection,
}

impl SequenceStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.sequence.clone(),
            projection: Projection::new(config),
        }
    }

    /// Train on the frame's stress history and roll out `steps` samples.
    pub fn train_and_predict(
        &self,
        stress: &[f64],
        steps: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        let len = self.config.sequence_length;
        if stress.len() <= len + 1 {
            return Err(ForecastError::InsufficientHistory {
                available: stress.len(),
                required: len + 2,
            });
        }

        let scaler = MinMaxScaler::fit(stress);
        let scaled: Vec<f64> = stress.iter().map(|&v| scaler.transform(v)).collect();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut model = LstmRegressor::new(self.config.hidden_size, &mut rng);
        let loss = model.fit(&scaled, &self.config, &mut rng)?;
        log::debug!(
            "sequence model trained on {} samples, final loss {:.6}",
            scaled.len(),
            loss
        );

        let mut window: Vec<f64> = scaled[scaled.len() - len..].to_vec();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = model.predict(&window);
            if !next.is_finite() {
                return Err(ForecastError::ModelFit("sequence model produced a non-finite value".into()));
            }
            out.push(scaler.inverse(next));
            window.remove(0);
            window.push(next);
        }
        Ok(out)
    }
}

impl Forecaster for SequenceStrategy {
    fn forecast(
        &self,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let per_period = frame.frequency().steps_in(self.projection.aggregation());
        let values = self.train_and_predict(frame.hydric_stress(), horizon * per_period)?;
        let base_soil = frame.last_soil_moisture().unwrap_or(0.0);

        let points = self
            .projection
            .timestamps(frame, horizon)?
            .into_iter()
            .enumerate()
            .map(|(k, timestamp)| {
                let stress = values[(k + 1) * per_period - 1].clamp(0.0, 100.0);
                self.projection.point(
                    timestamp,
                    stress,
                    base_soil,
                    SOIL_FACTOR,
                    Some(ConfidenceBand::around(stress, BAND_HALF_WIDTH)),
                )
            })
            .collect();

        Ok(points)
    }
}

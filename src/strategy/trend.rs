// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Damped linear trend extrapolation, the last resort of the chain.

use super::{Forecaster, Projection};
use crate::config::EngineConfig;
use crate::error::ForecastError;
use crate::features::DerivedFrame;
use crate::forecast::{ConfidenceBand, ForecastPoint};

/// Samples used to estimate the slope.
const TREND_WINDOW: usize = 48;
/// Damping applied to the extrapolated slope.
const DAMPING: f64 = 0.5;
const SOIL_FACTOR: f64 = 0.3;
const BAND_HALF_WIDTH: f64 = 10.0;

/// Linear trend over the recent stress history.
#[derive(Debug, Clone)]
pub struct TrendStrategy {
    projection: Projection,
}

impl TrendStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            projection: Projection::new(config),
        }
    }
}

impl Forecaster for TrendStrategy {
    fn forecast(
        &self,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let stress = frame.hydric_stress();
        if stress.len() < 2 {
            return Err(ForecastError::InsufficientData {
                rows: stress.len(),
                required: 2,
            });
        }

        let recent = &stress[stress.len().saturating_sub(TREND_WINDOW)..];
        let (first, last) = (recent[0], recent[recent.len() - 1]);
        let slope = (last - first) / recent.len() as f64;
        let base_soil = frame.last_soil_moisture().unwrap_or(0.0);

        let points = self
            .projection
            .timestamps(frame, horizon)?
            .into_iter()
            .enumerate()
            .map(|(t, timestamp)| {
                let value = (last + slope * (t + 1) as f64 * DAMPING).clamp(0.0, 100.0);
                self.projection.point(
                    timestamp,
                    value,
                    base_soil,
                    SOIL_FACTOR,
                    Some(ConfidenceBand::around(value, BAND_HALF_WIDTH)),
                )
            })
            .collect();

        Ok(points)
    }
}

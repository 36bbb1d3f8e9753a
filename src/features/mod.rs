// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Feature engineering pipeline
//!
//! Turns an irregular [`RawSeries`] into a regular [`DerivedFrame`]:
//!
//! 1. resample to the configured frequency by bucket mean
//! 2. fill gaps (time interpolation, forward fill, backward fill)
//! 3. derive dew point, vapour-pressure deficit, soil moisture, hydric stress
//! 4. rolling means of stress and moisture, with the same fill re-applied
//! 5. irrigation need from the stress index

pub mod agronomy;
pub mod fill;
pub mod frame;
pub mod resample;

pub use frame::{DerivedFrame, DerivedRow};

use crate::config::{EngineConfig, Frequency, IrrigationConfig};
use crate::error::ForecastError;
use crate::reading::RawSeries;
use fill::{backward_fill, fill_gaps, forward_fill, rolling_mean};

/// Stateless transform from raw history to derived indicators.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    frequency: Frequency,
    rolling_window: usize,
    rolling_min_periods: usize,
    irrigation: IrrigationConfig,
}

impl FeaturePipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            frequency: config.sampling.resample,
            rolling_window: config.sampling.rolling_window,
            rolling_min_periods: config.sampling.rolling_min_periods,
            irrigation: config.irrigation.clone(),
        }
    }

    /// Build the derived frame for one series.
    pub fn prepare(&self, raw: &RawSeries) -> Result<DerivedFrame, ForecastError> {
        if raw.is_empty() {
            return Err(ForecastError::InsufficientData {
                rows: 0,
                required: 1,
            });
        }

        let mut grid = resample::resample(&raw.readings, self.frequency);
        let times = grid.times;

        require_filled(&times, &mut grid.temperature, "temperature")?;
        require_filled(&times, &mut grid.humidity_air, "humidity_air")?;
        require_filled(&times, &mut grid.humidity_soil, "humidity_soil")?;
        if let Some(ph) = grid.ph.as_mut() {
            fill_gaps(&times, ph);
        }
        if let Some(light) = grid.light.as_mut() {
            fill_gaps(&times, light);
        }

        let n = times.len();
        let mut dew_point = Vec::with_capacity(n);
        let mut vpd = Vec::with_capacity(n);
        let mut soil = Vec::with_capacity(n);
        let mut stress = Vec::with_capacity(n);

        for i in 0..n {
            let t = grid.temperature[i];
            let dp = agronomy::dew_point(t, grid.humidity_air[i]);
            let deficit = agronomy::vapor_pressure_deficit(t, dp);
            let moisture = agronomy::soil_moisture_pct(grid.humidity_soil[i]);
            dew_point.push(dp);
            vpd.push(deficit);
            soil.push(moisture);
            stress.push(agronomy::hydric_stress_index(moisture, t, deficit));
        }

        let min_periods = self.rolling_min_periods.min(n).max(1);
        let mut rolling_stress = rolling_mean(&stress, self.rolling_window, min_periods);
        let mut rolling_moisture = rolling_mean(&soil, self.rolling_window, min_periods);
        for col in [&mut rolling_stress, &mut rolling_moisture] {
            forward_fill(col);
            backward_fill(col);
        }

        let irrigation_need_mm = stress
            .iter()
            .map(|&s| agronomy::irrigation_need_mm(s, self.irrigation.threshold, self.irrigation.max_mm))
            .collect();

        let frame = DerivedFrame {
            frequency: self.frequency,
            times,
            temperature: grid.temperature,
            humidity_air: grid.humidity_air,
            humidity_soil: grid.humidity_soil,
            ph: grid.ph,
            light: grid.light,
            dew_point,
            vapor_pressure_deficit: vpd,
            soil_moisture_pct: soil,
            hydric_stress: stress,
            rolling_stress,
            rolling_moisture,
            irrigation_need_mm,
        };

        log::debug!(
            "prepared frame for {}: {} raw readings -> {} rows at {}",
            raw.sensor_id,
            raw.len(),
            frame.len(),
            self.frequency
        );

        if let Some(field) = frame.incomplete_column() {
            return Err(ForecastError::NonFinite { field });
        }

        Ok(frame)
    }
}

fn require_filled(
    times: &[i64],
    values: &mut [f64],
    field: &'static str,
) -> Result<(), ForecastError> {
    if fill_gaps(times, values) {
        Ok(())
    } else {
        Err(ForecastError::MissingField { field })
    }
}

// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Trend + Fourier seasonality regression on aggregated stress.
//!
//! Stress is averaged per aggregation period, then fitted by least squares
//! to an intercept, a linear trend and `fourier_order` sine/cosine pairs of
//! the configured period. Multiplicative mode fits `ln(1 + stress)` so that
//! the seasonal swing scales with the level.

use super::{Forecaster, Projection};
use crate::config::{EngineConfig, SeasonalConfig, SeasonalMode};
use crate::error::ForecastError;
use crate::features::DerivedFrame;
use crate::forecast::{ConfidenceBand, ForecastPoint};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

const SOIL_FACTOR: f64 = 0.3;
const FIXED_BAND: f64 = 10.0;

/// Fitted regression coefficients.
#[derive(Debug, Clone)]
pub struct SeasonalFit {
    coefficients: DVector<f64>,
    /// Residual standard error in fitted space.
    sigma: f64,
    /// Number of observations, used to scale the trend column.
    observations: usize,
    period: f64,
    order: usize,
    mode: SeasonalMode,
}

impl SeasonalFit {
    /// Fit the model to `values` (one per aggregation period).
    pub fn fit(values: &[f64], config: &SeasonalConfig) -> Result<Self, ForecastError> {
        let order = config.fourier_order;
        let params = 2 + 2 * order;
        let required = params + 2;
        if values.len() < required {
            return Err(ForecastError::ModelFit(format!(
                "{} periods available, {} required",
                values.len(),
                required
            )));
        }

        let m = values.len();
        let period = config.period as f64;
        let y = DVector::from_iterator(
            m,
            values.iter().map(|&v| to_model_space(v, config.mode)),
        );
        let design = DMatrix::from_fn(m, params, |row, col| {
            regressor(row as f64, col, m, period)
        });

        let svd = design.clone().svd(true, true);
        let max_sv = svd.singular_values.max();
        let eps = max_sv * 1e-9;
        if svd.rank(eps) < params {
            return Err(ForecastError::ModelFit("design matrix is rank deficient".into()));
        }
        let coefficients = svd
            .solve(&y, eps)
            .map_err(|e| ForecastError::ModelFit(e.to_string()))?;

        let residuals = &y - &design * &coefficients;
        let dof = (m - params) as f64;
        let sigma = (residuals.norm_squared() / dof).sqrt();

        if !sigma.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::ModelFit("non-finite coefficients".into()));
        }

        Ok(Self {
            coefficients,
            sigma,
            observations: m,
            period,
            order,
            mode: config.mode,
        })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Prediction at period index `t` (0 is the first fitted period), in
    /// model space.
    fn predict_raw(&self, t: f64) -> f64 {
        (0..2 + 2 * self.order)
            .map(|col| self.coefficients[col] * regressor(t, col, self.observations, self.period))
            .sum()
    }

    /// Point prediction and interval at period index `t`, on the stress scale.
    pub fn predict(&self, t: f64, z: f64) -> (f64, f64, f64) {
        let yhat = self.predict_raw(t);
        let margin = z * self.sigma;
        (
            from_model_space(yhat, self.mode),
            from_model_space(yhat - margin, self.mode),
            from_model_space(yhat + margin, self.mode),
        )
    }
}

/// Column `col` of the design row at period index `t`.
fn regressor(t: f64, col: usize, observations: usize, period: f64) -> f64 {
    match col {
        0 => 1.0,
        1 => t / observations as f64,
        _ => {
            let k = ((col - 2) / 2 + 1) as f64;
            let angle = 2.0 * PI * k * t / period;
            if (col - 2) % 2 == 0 {
                angle.sin()
            } else {
                angle.cos()
            }
        }
    }
}

fn to_model_space(stress: f64, mode: SeasonalMode) -> f64 {
    match mode {
        SeasonalMode::Additive => stress,
        SeasonalMode::Multiplicative => stress.max(0.0).ln_1p(),
    }
}

fn from_model_space(value: f64, mode: SeasonalMode) -> f64 {
    match mode {
        SeasonalMode::Additive => value,
        SeasonalMode::Multiplicative => value.exp_m1(),
    }
}

/// Standard normal quantile (Acklam's rational approximation).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Mean of `values` per aggregation bucket, in time order.
fn aggregate(times: &[i64], values: &[f64], bucket_seconds: i64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut current: Option<i64> = None;
    let (mut sum, mut count) = (0.0, 0usize);

    for (&t, &v) in times.iter().zip(values) {
        let bucket = t.div_euclid(bucket_seconds);
        if current.is_some_and(|c| c != bucket) {
            out.push(sum / count as f64);
            sum = 0.0;
            count = 0;
        }
        current = Some(bucket);
        sum += v;
        count += 1;
    }
    if count > 0 {
        out.push(sum / count as f64);
    }
    out
}

/// Seasonal regression strategy.
#[derive(Debug, Clone)]
pub struct SeasonalStrategy {
    config: SeasonalConfig,
    projection: Projection,
}

impl SeasonalStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.seasonal.clone(),
            projection: Projection::new(config),
        }
    }
}

impl Forecaster for SeasonalStrategy {
    fn forecast(
        &self,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let daily = aggregate(
            &frame.times,
            frame.hydric_stress(),
            self.projection.aggregation().seconds(),
        );
        let fit = SeasonalFit::fit(&daily, &self.config)?;
        let z = normal_quantile((1.0 + self.config.interval_width) / 2.0);
        log::debug!(
            "seasonal fit on {} periods, residual sigma {:.4}",
            daily.len(),
            fit.sigma()
        );

        let base_soil = frame.last_soil_moisture().unwrap_or(0.0);
        let last_index = (daily.len() - 1) as f64;
        let timestamps = self.projection.timestamps(frame, horizon)?;

        let mut points = Vec::with_capacity(horizon);
        for (k, timestamp) in timestamps.into_iter().enumerate() {
            let (yhat, lower, upper) = fit.predict(last_index + (k + 1) as f64, z);
            if !yhat.is_finite() || !lower.is_finite() || !upper.is_finite() {
                return Err(ForecastError::ModelFit("non-finite prediction".into()));
            }
            let stress = yhat.clamp(0.0, 100.0);
            let band = if self.config.uncertainty {
                ConfidenceBand::new(lower.clamp(0.0, 100.0), upper.clamp(0.0, 100.0))
            } else {
                ConfidenceBand::around(stress, FIXED_BAND)
            };
            points.push(
                self.projection
                    .point(timestamp, stress, base_soil, SOIL_FACTOR, Some(band)),
            );
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeaturePipeline;
    use crate::reading::{RawReading, RawSeries};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn additive() -> SeasonalConfig {
        SeasonalConfig {
            mode: SeasonalMode::Additive,
            ..SeasonalConfig::default()
        }
    }

    #[test]
    fn test_normal_quantile() {
        assert_relative_eq!(normal_quantile(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(normal_quantile(0.9), 1.281_551_6, epsilon = 1e-6);
        assert_relative_eq!(normal_quantile(0.975), 1.959_964, epsilon = 1e-6);
        assert_relative_eq!(normal_quantile(0.01), -2.326_348, epsilon = 1e-6);
    }

    #[test]
    fn test_recovers_exact_weekly_signal() {
        let signal = |t: f64| 30.0 + 0.4 * t + 5.0 * (2.0 * PI * t / 7.0).sin();
        let values: Vec<f64> = (0..28).map(|t| signal(t as f64)).collect();
        let fit = SeasonalFit::fit(&values, &additive()).unwrap();
        assert!(fit.sigma() < 1e-6);
        let (yhat, lower, upper) = fit.predict(30.0, 1.28);
        assert_relative_eq!(yhat, signal(30.0), epsilon = 1e-6);
        assert!(lower <= yhat && yhat <= upper);
    }

    #[test]
    fn test_multiplicative_stays_positive() {
        let values: Vec<f64> = (0..21)
            .map(|t| 5.0 * (1.0 + 0.3 * (2.0 * PI * t as f64 / 7.0).cos()))
            .collect();
        let fit = SeasonalFit::fit(&values, &SeasonalConfig::default()).unwrap();
        let (yhat, lower, _) = fit.predict(22.0, 1.28);
        assert!(yhat > 0.0);
        assert!(lower > -1.0);
    }

    #[test]
    fn test_too_few_periods() {
        let err = SeasonalFit::fit(&[10.0; 9], &SeasonalConfig::default()).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFit(_)));
    }

    #[test]
    fn test_degenerate_period_is_rank_deficient() {
        let config = SeasonalConfig {
            period: 2,
            fourier_order: 1,
            ..additive()
        };
        let values: Vec<f64> = (0..12).map(|t| t as f64).collect();
        assert!(matches!(
            SeasonalFit::fit(&values, &config),
            Err(ForecastError::ModelFit(_))
        ));
    }

    #[test]
    fn test_aggregate_by_bucket() {
        let times = [0, 3_600, 86_400, 90_000, 172_800];
        let values = [10.0, 20.0, 30.0, 50.0, 60.0];
        assert_eq!(aggregate(&times, &values, 86_400), vec![15.0, 40.0, 60.0]);
    }

    #[test]
    fn test_forecast_on_month_of_history() {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let readings = (0..30 * 24)
            .map(|i| {
                let day = (i / 24) as f64;
                let soil = 50.0 + 10.0 * (2.0 * PI * day / 7.0).sin() - 0.2 * day;
                RawReading::new(t0 + Duration::hours(i as i64), 24.0, 55.0, soil)
            })
            .collect();
        let config = EngineConfig::default();
        let frame = FeaturePipeline::new(&config)
            .prepare(&RawSeries::new("P1", readings))
            .unwrap();

        let points = SeasonalStrategy::new(&config).forecast(&frame, 7).unwrap();
        assert_eq!(points.len(), 7);
        for p in &points {
            assert!((0.0..=100.0).contains(&p.hydric_stress));
            assert!((5.0..=100.0).contains(&p.soil_moisture));
            assert!(p.irrigation_need_mm >= 0.0);
            let band = p.confidence.unwrap();
            assert!(band.lower <= p.hydric_stress && p.hydric_stress <= band.upper);
        }
    }
}

// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Forecast strategy chain
//!
//! Three strategies project the `hydric_stress` column of a [`DerivedFrame`]:
//!
//! | Strategy | Model | Falls back to |
//! |----------|-------|---------------|
//! | [`Strategy::Seasonal`] | trend + Fourier regression | `Trend` |
//! | [`Strategy::Sequence`] | LSTM regressor, trained per call | `Trend` |
//! | [`Strategy::Trend`] | damped linear extrapolation | (none) |
//!
//! The fallback table is fixed; [`StrategyChain`] walks it and records every
//! failure it steps over.

pub mod blend;
pub mod lstm;
pub mod seasonal;
pub mod sequence;
pub mod trend;

pub use blend::blend;
pub use seasonal::SeasonalStrategy;
pub use sequence::SequenceStrategy;
pub use trend::TrendStrategy;

use crate::config::{EngineConfig, Frequency};
use crate::error::ForecastError;
use crate::features::{agronomy, DerivedFrame};
use crate::forecast::{ConfidenceBand, ForecastPoint, ModelKind};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Lowest soil moisture a projection will report.
const SOIL_FLOOR: f64 = 5.0;

/// A forecasting strategy over a derived frame.
pub trait Forecaster {
    /// Project `horizon` aggregation periods past the end of `frame`.
    fn forecast(
        &self,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// The closed set of strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Seasonal,
    Sequence,
    Trend,
}

impl Strategy {
    /// Next strategy to try after this one fails.
    pub fn fallback(self) -> Option<Strategy> {
        match self {
            Self::Seasonal | Self::Sequence => Some(Self::Trend),
            Self::Trend => None,
        }
    }

    pub fn model_kind(self) -> ModelKind {
        match self {
            Self::Seasonal => ModelKind::Seasonal,
            Self::Sequence => ModelKind::Sequence,
            Self::Trend => ModelKind::Trend,
        }
    }
}

/// A strategy that failed during a chain run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub strategy: ModelKind,
    #[serde(serialize_with = "serialize_display")]
    pub error: ForecastError,
}

fn serialize_display<S: Serializer>(error: &ForecastError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Points produced by a chain run and the strategy that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub model: ModelKind,
    pub points: Vec<ForecastPoint>,
    /// Strategies that failed before `model` succeeded, in order.
    pub fallbacks: Vec<StrategyFailure>,
}

/// Shared rules for turning a projected stress value into a forecast point.
#[derive(Debug, Clone)]
pub struct Projection {
    aggregation: Frequency,
    threshold: f64,
    max_mm: f64,
}

impl Projection {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            aggregation: config.sampling.aggregation,
            threshold: config.irrigation.threshold,
            max_mm: config.irrigation.max_mm,
        }
    }

    pub fn aggregation(&self) -> Frequency {
        self.aggregation
    }

    /// `last + k·aggregation` for `k = 1..=horizon`.
    pub fn timestamps(
        &self,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<Vec<DateTime<Utc>>, ForecastError> {
        let last = frame
            .last_timestamp()
            .ok_or(ForecastError::InsufficientData {
                rows: 0,
                required: 1,
            })?;
        let step = self.aggregation.duration();
        let mut out = Vec::with_capacity(horizon);
        let mut current = last;
        for period in 1..=horizon {
            current = current
                .checked_add_signed(step)
                .ok_or(ForecastError::TimestampOverflow { period })?;
            out.push(current);
        }
        Ok(out)
    }

    /// Build a point from a projected stress value.
    ///
    /// Stress is clamped to [0, 100]; soil moisture is
    /// `base_soil − soil_factor·stress` clamped to [5, 100].
    pub fn point(
        &self,
        timestamp: DateTime<Utc>,
        stress: f64,
        base_soil: f64,
        soil_factor: f64,
        confidence: Option<ConfidenceBand>,
    ) -> ForecastPoint {
        let stress = stress.clamp(0.0, 100.0);
        ForecastPoint {
            timestamp,
            hydric_stress: stress,
            soil_moisture: (base_soil - soil_factor * stress).clamp(SOIL_FLOOR, 100.0),
            irrigation_need_mm: agronomy::irrigation_need_mm(stress, self.threshold, self.max_mm),
            confidence,
        }
    }
}

/// Runs strategies along the fallback table.
#[derive(Debug, Clone)]
pub struct StrategyChain {
    seasonal: SeasonalStrategy,
    sequence: SequenceStrategy,
    trend: TrendStrategy,
}

impl StrategyChain {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            seasonal: SeasonalStrategy::new(config),
            sequence: SequenceStrategy::new(config),
            trend: TrendStrategy::new(config),
        }
    }

    fn forecaster(&self, strategy: Strategy) -> &dyn Forecaster {
        match strategy {
            Strategy::Seasonal => &self.seasonal,
            Strategy::Sequence => &self.sequence,
            Strategy::Trend => &self.trend,
        }
    }

    /// Run one strategy, without fallback.
    pub fn run(
        &self,
        strategy: Strategy,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        self.forecaster(strategy).forecast(frame, horizon)
    }

    /// Run `strategy`, following fallback edges until one succeeds.
    ///
    /// Fails only when the last strategy in the chain fails.
    pub fn run_with_fallback(
        &self,
        strategy: Strategy,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<StrategyOutcome, ForecastError> {
        let mut fallbacks = Vec::new();
        let mut current = strategy;
        loop {
            match self.run(current, frame, horizon) {
                Ok(points) => {
                    return Ok(StrategyOutcome {
                        model: current.model_kind(),
                        points,
                        fallbacks,
                    })
                }
                Err(error) => match current.fallback() {
                    Some(next) => {
                        log::warn!(
                            "{} strategy failed ({}), falling back to {}",
                            current.model_kind(),
                            error,
                            next.model_kind()
                        );
                        fallbacks.push(StrategyFailure {
                            strategy: current.model_kind(),
                            error,
                        });
                        current = next;
                    }
                    None => return Err(error),
                },
            }
        }
    }

    /// Run whatever `requested` names.
    ///
    /// `Ensemble` runs both heavy strategies and blends them when both
    /// succeed; with one success that strategy is used alone, with none the
    /// trend strategy runs.
    pub fn forecast(
        &self,
        requested: ModelKind,
        frame: &DerivedFrame,
        horizon: usize,
    ) -> Result<StrategyOutcome, ForecastError> {
        match requested {
            ModelKind::Seasonal => self.run_with_fallback(Strategy::Seasonal, frame, horizon),
            ModelKind::Sequence => self.run_with_fallback(Strategy::Sequence, frame, horizon),
            ModelKind::Trend => self.run_with_fallback(Strategy::Trend, frame, horizon),
            ModelKind::Ensemble => self.ensemble(frame, horizon),
        }
    }

    fn ensemble(&self, frame: &DerivedFrame, horizon: usize) -> Result<StrategyOutcome, ForecastError> {
        let seasonal = self.run(Strategy::Seasonal, frame, horizon);
        let sequence = self.run(Strategy::Sequence, frame, horizon);

        let mut fallbacks = Vec::new();
        let mut record = |strategy: Strategy, error: ForecastError| {
            log::warn!("{} strategy failed in ensemble: {}", strategy.model_kind(), error);
            fallbacks.push(StrategyFailure {
                strategy: strategy.model_kind(),
                error,
            });
        };

        let (model, points) = match (seasonal, sequence) {
            (Ok(a), Ok(b)) => (ModelKind::Ensemble, blend(&a, &b)),
            (Ok(a), Err(e)) => {
                record(Strategy::Sequence, e);
                (ModelKind::Seasonal, a)
            }
            (Err(e), Ok(b)) => {
                record(Strategy::Seasonal, e);
                (ModelKind::Sequence, b)
            }
            (Err(e1), Err(e2)) => {
                record(Strategy::Seasonal, e1);
                record(Strategy::Sequence, e2);
                (ModelKind::Trend, self.run(Strategy::Trend, frame, horizon)?)
            }
        };

        Ok(StrategyOutcome {
            model,
            points,
            fallbacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeaturePipeline;
    use crate::reading::{RawReading, RawSeries};
    use chrono::{Duration, TimeZone};

    fn frame_with_rows(rows: usize) -> DerivedFrame {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let readings = (0..rows)
            .map(|i| {
                RawReading::new(
                    t0 + Duration::hours(i as i64),
                    22.0 + (i % 5) as f64,
                    60.0,
                    40.0 - (i % 7) as f64,
                )
            })
            .collect();
        FeaturePipeline::new(&EngineConfig::default())
            .prepare(&RawSeries::new("P1", readings))
            .unwrap()
    }

    #[test]
    fn test_timestamps_past_calendar_end() {
        let t0 = Utc.with_ymd_and_hms(262_143, 12, 29, 0, 0, 0).unwrap();
        let readings = (0..24)
            .map(|i| RawReading::new(t0 + Duration::hours(i), 22.0, 60.0, 40.0))
            .collect();
        let frame = FeaturePipeline::new(&EngineConfig::default())
            .prepare(&RawSeries::new("P1", readings))
            .unwrap();
        let projection = Projection::new(&EngineConfig::default());

        assert_eq!(projection.timestamps(&frame, 1).unwrap().len(), 1);
        assert!(matches!(
            projection.timestamps(&frame, 5),
            Err(ForecastError::TimestampOverflow { period: 3 })
        ));
    }

    #[test]
    fn test_fallback_table() {
        assert_eq!(Strategy::Seasonal.fallback(), Some(Strategy::Trend));
        assert_eq!(Strategy::Sequence.fallback(), Some(Strategy::Trend));
        assert_eq!(Strategy::Trend.fallback(), None);
    }

    #[test]
    fn test_sequence_falls_back_to_trend() {
        let chain = StrategyChain::new(&EngineConfig::default());
        let frame = frame_with_rows(5);

        assert!(matches!(
            chain.run(Strategy::Sequence, &frame, 3),
            Err(ForecastError::InsufficientHistory { .. })
        ));

        let outcome = chain.forecast(ModelKind::Sequence, &frame, 3).unwrap();
        assert_eq!(outcome.model, ModelKind::Trend);
        assert_eq!(outcome.points.len(), 3);
        assert_eq!(outcome.fallbacks.len(), 1);
        assert_eq!(outcome.fallbacks[0].strategy, ModelKind::Sequence);
    }

    #[test]
    fn test_seasonal_falls_back_on_short_history() {
        let chain = StrategyChain::new(&EngineConfig::default());
        let outcome = chain
            .forecast(ModelKind::Seasonal, &frame_with_rows(48), 2)
            .unwrap();
        assert_eq!(outcome.model, ModelKind::Trend);
        assert!(matches!(
            outcome.fallbacks[0].error,
            ForecastError::ModelFit(_)
        ));
    }

    #[test]
    fn test_ensemble_degrades_to_trend() {
        let chain = StrategyChain::new(&EngineConfig::default());
        let outcome = chain
            .forecast(ModelKind::Ensemble, &frame_with_rows(5), 2)
            .unwrap();
        assert_eq!(outcome.model, ModelKind::Trend);
        assert_eq!(outcome.fallbacks.len(), 2);
    }

    #[test]
    fn test_trend_failure_surfaces() {
        let chain = StrategyChain::new(&EngineConfig::default());
        let err = chain
            .forecast(ModelKind::Seasonal, &frame_with_rows(1), 2)
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                rows: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_failure_serializes_as_message() {
        let failure = StrategyFailure {
            strategy: ModelKind::Sequence,
            error: ForecastError::InsufficientHistory {
                available: 5,
                required: 26,
            },
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["strategy"], "sequence");
        assert!(json["error"].as_str().unwrap().contains("26"));
    }

    #[test]
    fn test_projection_point() {
        let projection = Projection::new(&EngineConfig::default());
        let t = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let p = projection.point(t, 120.0, 30.0, 0.3, None);
        assert_eq!(p.hydric_stress, 100.0);
        assert_eq!(p.soil_moisture, 5.0);
        assert_eq!(p.irrigation_need_mm, 25.0);
    }
}

// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Forecast orchestrator
//!
//! Clamps the horizon, loads history (falling back to the synthetic series),
//! runs the feature pipeline and the strategy chain, and packages the result.
//! The engine holds only immutable configuration, so one instance can serve
//! concurrent requests from several threads.

use crate::config::{EngineConfig, SelectionPolicy};
use crate::error::{ConfigError, Result};
use crate::features::{DerivedRow, FeaturePipeline};
use crate::forecast::{ForecastResult, ModelKind};
use crate::reading::{CurrentReadings, RawReading, RawSeries};
use crate::source::{SensorHistorySource, SyntheticGenerator};
use crate::strategy::{StrategyChain, StrategyFailure};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the history behind a forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrigin {
    /// The configured history source
    Source,
    /// The seeded fallback generator
    Synthetic,
}

/// A forecast with the context downstream consumers need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    #[serde(flatten)]
    pub result: ForecastResult,
    /// Latest raw readings, absent only when the history was empty.
    pub current: Option<CurrentReadings>,
    pub origin: HistoryOrigin,
    /// Strategies that failed before `result.model_name` succeeded.
    pub fallbacks: Vec<StrategyFailure>,
}

/// The forecasting engine.
pub struct ForecastEngine<S> {
    config: EngineConfig,
    source: S,
    pipeline: FeaturePipeline,
    chain: StrategyChain,
}

impl<S: SensorHistorySource> ForecastEngine<S> {
    /// Validate `config` and build an engine over `source`.
    pub fn new(config: EngineConfig, source: S) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pipeline: FeaturePipeline::new(&config),
            chain: StrategyChain::new(&config),
            config,
            source,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clamp a requested horizon to `[1, max_days]`.
    pub fn clamp_horizon(&self, horizon_days: i64) -> usize {
        horizon_days.clamp(1, i64::from(self.config.horizon.max_days)) as usize
    }

    /// Clamp a requested history window to `[min_days, window_days]`.
    pub fn clamp_history_days(&self, days: i64) -> u32 {
        let h = &self.config.history;
        days.clamp(i64::from(h.min_days), i64::from(h.window_days)) as u32
    }

    /// Fetch history, substituting the synthetic series when the source
    /// fails or has nothing.
    pub fn load_history(
        &self,
        sensor_id: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> (RawSeries, HistoryOrigin) {
        match self.source.fetch(sensor_id, window_days) {
            Ok(series) if !series.is_empty() => {
                log::info!(
                    "loaded {} readings for {} from {}",
                    series.len(),
                    sensor_id,
                    self.source.name()
                );
                return (series, HistoryOrigin::Source);
            }
            Ok(_) => log::info!(
                "{} has no readings for {}, using synthetic history",
                self.source.name(),
                sensor_id
            ),
            Err(e) => log::warn!(
                "{} fetch for {} failed ({}), using synthetic history",
                self.source.name(),
                sensor_id,
                e
            ),
        }

        let series = SyntheticGenerator::new(self.config.fallback.seed)
            .with_rows(self.config.fallback.rows)
            .ending_at(now)
            .generate(sensor_id);
        (series, HistoryOrigin::Synthetic)
    }

    /// Forecast `horizon_days` periods for `sensor_id`.
    ///
    /// `model_name` in the result names the strategy that actually ran,
    /// which may differ from `requested`.
    pub fn forecast(
        &self,
        sensor_id: &str,
        horizon_days: i64,
        requested: ModelKind,
    ) -> Result<ForecastResult> {
        Ok(self.forecast_report(sensor_id, horizon_days, requested)?.result)
    }

    /// Forecast plus current readings, history origin and fallbacks.
    pub fn forecast_report(
        &self,
        sensor_id: &str,
        horizon_days: i64,
        requested: ModelKind,
    ) -> Result<ForecastReport> {
        self.forecast_report_at(sensor_id, horizon_days, requested, Utc::now())
    }

    /// [`forecast_report`](Self::forecast_report) with an explicit clock.
    pub fn forecast_report_at(
        &self,
        sensor_id: &str,
        horizon_days: i64,
        requested: ModelKind,
        now: DateTime<Utc>,
    ) -> Result<ForecastReport> {
        let horizon = self.clamp_horizon(horizon_days);
        let (raw, origin) = self.load_history(sensor_id, self.config.history.window_days, now);
        let frame = self.pipeline.prepare(&raw)?;

        let model = match self.config.selection {
            SelectionPolicy::TrendOnly if requested != ModelKind::Trend => {
                log::info!(
                    "selection policy is trend_only, running trend instead of {}",
                    requested
                );
                ModelKind::Trend
            }
            _ => requested,
        };

        let outcome = self.chain.forecast(model, &frame, horizon)?;
        log::info!(
            "forecast for {}: {} points with {} (requested {})",
            sensor_id,
            outcome.points.len(),
            outcome.model,
            requested
        );

        Ok(ForecastReport {
            result: ForecastResult {
                sensor_id: sensor_id.to_string(),
                generated_at: now,
                model_name: outcome.model,
                points: outcome.points,
            },
            current: raw.current(),
            origin,
            fallbacks: outcome.fallbacks,
        })
    }

    /// Last `max_rows` raw readings over a clamped window.
    pub fn history(&self, sensor_id: &str, days: i64) -> Vec<RawReading> {
        let window = self.clamp_history_days(days);
        let (raw, _) = self.load_history(sensor_id, window, Utc::now());
        raw.tail(self.config.history.max_rows)
    }

    /// Last `max_rows` derived rows over a clamped window.
    pub fn derived_history(&self, sensor_id: &str, days: i64) -> Result<Vec<DerivedRow>> {
        let window = self.clamp_history_days(days);
        let (raw, _) = self.load_history(sensor_id, window, Utc::now());
        let frame = self.pipeline.prepare(&raw)?;
        Ok(frame.tail_rows(self.config.history.max_rows))
    }
}

// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.
//!
//! Every section has its own `Default` so a partial JSON document only needs
//! to carry the values it overrides. Call [`EngineConfig::validate`] once before
//! handing the configuration to an engine; it is never mutated afterwards.

use crate::error::ConfigError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECOND: i64 = 1;
const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const WEEK: i64 = 604_800;

/// Longest period a chrono `Duration` can hold in whole seconds.
const MAX_FREQUENCY_SECONDS: i64 = i64::MAX / 1_000;

/// A fixed sampling frequency such as `"1h"` or `"1D"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    seconds: i64,
}

impl Frequency {
    /// One hour.
    pub const HOURLY: Frequency = Frequency { seconds: HOUR };
    /// One day.
    pub const DAILY: Frequency = Frequency { seconds: DAY };

    /// Parse an offset string: optional positive count followed by a unit.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ConfigError::InvalidFrequency(s.to_string()))?;
        let (count, unit) = trimmed.split_at(split);

        let count: i64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| ConfigError::InvalidFrequency(s.to_string()))?
        };

        let unit_seconds = match unit {
            "s" | "S" => SECOND,
            "min" | "T" => MINUTE,
            "h" | "H" => HOUR,
            "D" | "d" => DAY,
            "W" | "w" => WEEK,
            _ => return Err(ConfigError::InvalidFrequency(s.to_string())),
        };

        count
            .checked_mul(unit_seconds)
            .filter(|secs| *secs > 0 && *secs <= MAX_FREQUENCY_SECONDS)
            .map(|seconds| Self { seconds })
            .ok_or_else(|| ConfigError::InvalidFrequency(s.to_string()))
    }

    /// Length of one period in seconds.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Length of one period as a chrono duration.
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// How many periods of `self` fit in one period of `coarser` (at least 1).
    pub fn steps_in(&self, coarser: Frequency) -> usize {
        ((coarser.seconds / self.seconds).max(1)) as usize
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = if self.seconds % WEEK == 0 {
            (self.seconds / WEEK, "W")
        } else if self.seconds % DAY == 0 {
            (self.seconds / DAY, "D")
        } else if self.seconds % HOUR == 0 {
            (self.seconds / HOUR, "h")
        } else if self.seconds % MINUTE == 0 {
            (self.seconds / MINUTE, "min")
        } else {
            (self.seconds, "s")
        };
        write!(f, "{}{}", n, unit)
    }
}

impl FromStr for Frequency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Frequency {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.to_string()
    }
}

/// Master configuration for the forecasting engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Forecast horizon bounds.
    pub horizon: HorizonConfig,
    /// History window bounds.
    pub history: HistoryConfig,
    /// Resampling and rolling-window settings.
    pub sampling: SamplingConfig,
    /// Irrigation need formula.
    pub irrigation: IrrigationConfig,
    /// Seasonal-decomposition strategy.
    pub seasonal: SeasonalConfig,
    /// Recurrent sequence strategy.
    pub sequence: SequenceConfig,
    /// Synthetic fallback series.
    pub fallback: FallbackConfig,
    /// History source access.
    pub source: SourceConfig,
    /// Which strategies the engine is allowed to run.
    pub selection: SelectionPolicy,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.horizon;
        check_range("horizon.max_days", h.max_days, 1, 30)?;
        check_range("horizon.default_days", h.default_days, 1, 14)?;
        if h.default_days > h.max_days {
            return Err(invalid("horizon.default_days", "exceeds horizon.max_days"));
        }

        let hist = &self.history;
        check_range("history.window_days", hist.window_days, 7, 180)?;
        check_range("history.min_days", hist.min_days, 5, 90)?;
        if hist.min_days > hist.window_days {
            return Err(invalid("history.min_days", "exceeds history.window_days"));
        }
        if hist.max_rows == 0 {
            return Err(invalid("history.max_rows", "must be at least 1"));
        }

        let s = &self.sampling;
        if s.aggregation.seconds() > WEEK {
            return Err(invalid("sampling.aggregation", "must not exceed one week"));
        }
        if s.resample > s.aggregation {
            return Err(invalid(
                "sampling.resample",
                "must not be coarser than sampling.aggregation",
            ));
        }
        if s.aggregation.seconds() % s.resample.seconds() != 0 {
            return Err(invalid(
                "sampling.resample",
                "must divide sampling.aggregation evenly",
            ));
        }
        if s.rolling_window == 0 {
            return Err(invalid("sampling.rolling_window", "must be at least 1"));
        }
        if s.rolling_min_periods == 0 || s.rolling_min_periods > s.rolling_window {
            return Err(invalid(
                "sampling.rolling_min_periods",
                "must be between 1 and sampling.rolling_window",
            ));
        }

        let irr = &self.irrigation;
        if !irr.threshold.is_finite() || irr.threshold < 0.0 || irr.threshold >= 100.0 {
            return Err(invalid("irrigation.threshold", "must be in [0, 100)"));
        }
        if !irr.max_mm.is_finite() || irr.max_mm < 0.0 {
            return Err(invalid("irrigation.max_mm", "must be finite and non-negative"));
        }

        let sea = &self.seasonal;
        if sea.period < 2 {
            return Err(invalid("seasonal.period", "must be at least 2"));
        }
        if sea.fourier_order == 0 {
            return Err(invalid("seasonal.fourier_order", "must be at least 1"));
        }
        if !(sea.interval_width > 0.0 && sea.interval_width < 1.0) {
            return Err(invalid("seasonal.interval_width", "must be in (0, 1)"));
        }

        let seq = &self.sequence;
        if seq.sequence_length == 0 {
            return Err(invalid("sequence.sequence_length", "must be at least 1"));
        }
        if seq.hidden_size == 0 {
            return Err(invalid("sequence.hidden_size", "must be at least 1"));
        }
        if seq.epochs == 0 {
            return Err(invalid("sequence.epochs", "must be at least 1"));
        }
        if seq.batch_size == 0 {
            return Err(invalid("sequence.batch_size", "must be at least 1"));
        }
        if !seq.learning_rate.is_finite() || seq.learning_rate <= 0.0 {
            return Err(invalid("sequence.learning_rate", "must be finite and positive"));
        }

        if self.source.timeout_ms == 0 {
            return Err(invalid("source.timeout_ms", "must be at least 1"));
        }
        if self.source.max_in_flight == 0 {
            return Err(invalid("source.max_in_flight", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} is outside [{}, {}]", value, min, max),
        });
    }
    Ok(())
}

/// Forecast horizon bounds, in aggregation periods (days by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    /// Horizon used when the caller does not ask for one.
    pub default_days: u32,
    /// Upper clamp for requested horizons.
    pub max_days: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            default_days: 5,
            max_days: 14,
        }
    }
}

/// History window bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Shortest window the history operations will serve.
    pub min_days: u32,
    /// Lookback window fetched for forecasting; also the longest history window.
    pub window_days: u32,
    /// Row cap for history operations.
    pub max_rows: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_days: 10,
            window_days: 45,
            max_rows: 500,
        }
    }
}

/// Resampling and rolling-window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Frame frequency.
    pub resample: Frequency,
    /// Forecast period.
    pub aggregation: Frequency,
    /// Rolling mean window, in frame samples.
    pub rolling_window: usize,
    /// Samples required before a rolling mean is emitted.
    pub rolling_min_periods: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            resample: Frequency::HOURLY,
            aggregation: Frequency::DAILY,
            rolling_window: 24,
            rolling_min_periods: 6,
        }
    }
}

/// Irrigation need formula parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    /// Stress level below which no irrigation is needed.
    pub threshold: f64,
    /// Irrigation need at stress 100, in millimetres.
    pub max_mm: f64,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            threshold: 55.0,
            max_mm: 25.0,
        }
    }
}

/// How seasonality combines with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalMode {
    /// Components add up.
    Additive,
    /// Components multiply (fitted in log space).
    Multiplicative,
}

/// Seasonal-decomposition strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    pub mode: SeasonalMode,
    /// Seasonal period, in aggregation periods.
    pub period: usize,
    /// Number of sine/cosine pairs.
    pub fourier_order: usize,
    /// Report the model's own interval instead of a fixed band.
    pub uncertainty: bool,
    /// Coverage of the uncertainty interval.
    pub interval_width: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            mode: SeasonalMode::Multiplicative,
            period: 7,
            fourier_order: 3,
            uncertainty: true,
            interval_width: 0.8,
        }
    }
}

/// Recurrent sequence strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Input window length, in frame samples.
    pub sequence_length: usize,
    pub hidden_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Seed for weight initialisation and window shuffling.
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            sequence_length: 24,
            hidden_size: 16,
            epochs: 35,
            learning_rate: 1e-3,
            batch_size: 32,
            seed: 42,
        }
    }
}

/// Synthetic fallback series settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub seed: u64,
    /// Hourly rows to synthesise.
    pub rows: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { seed: 42, rows: 200 }
    }
}

/// History source access settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Bound on a single fetch attempt.
    pub timeout_ms: u64,
    /// Retries after a transient failure.
    pub retries: u32,
    /// Initial delay between retries (doubles each attempt).
    pub retry_delay_ms: u64,
    /// Fetch workers allowed to run at once, counting attempts abandoned
    /// after a timeout that have not returned yet.
    pub max_in_flight: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retries: 2,
            retry_delay_ms: 200,
            max_in_flight: 4,
        }
    }
}

/// Which strategies the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Run the requested strategy, falling back along the chain.
    #[default]
    Requested,
    /// Always run the trend strategy regardless of the request.
    TrendOnly,
}

// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Forecast output types.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence interval around a forecast value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceBand {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Symmetric band of `half_width` around `center`, clamped to [0, 100].
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            lower: (center - half_width).clamp(0.0, 100.0),
            upper: (center + half_width).clamp(0.0, 100.0),
        }
    }

    /// Smallest band covering both.
    pub fn union(&self, other: &ConfidenceBand) -> Self {
        Self {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }
}

/// One forecasted period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    /// Stress index, 0-100.
    pub hydric_stress: f64,
    /// Soil moisture, 0-100 %.
    pub soil_moisture: f64,
    /// Irrigation need, mm (never negative).
    pub irrigation_need_mm: f64,
    pub confidence: Option<ConfidenceBand>,
}

/// Forecasting model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Trend + Fourier seasonality regression
    Seasonal,
    /// Recurrent sequence regression
    Sequence,
    /// Damped linear trend extrapolation
    Trend,
    /// Blend of seasonal and sequence
    Ensemble,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seasonal => "seasonal",
            Self::Sequence => "sequence",
            Self::Trend => "trend",
            Self::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seasonal" | "prophet" => Ok(Self::Seasonal),
            "sequence" | "lstm" => Ok(Self::Sequence),
            "trend" | "baseline" => Ok(Self::Trend),
            "ensemble" => Ok(Self::Ensemble),
            _ => Err(ConfigError::UnknownModel(s.to_string())),
        }
    }
}

/// A finished forecast. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub sensor_id: String,
    pub generated_at: DateTime<Utc>,
    /// The strategy that actually produced `points`.
    pub model_name: ModelKind,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// First forecasted period, if any.
    pub fn first(&self) -> Option<&ForecastPoint> {
        self.points.first()
    }
}

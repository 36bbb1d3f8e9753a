// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Point-wise combination of two forecasts.

use crate::forecast::ForecastPoint;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Average two forecasts period by period.
///
/// Values are the arithmetic mean rounded to two decimals; the confidence
/// band is the union of both bands. Timestamps come from `primary`. Extra
/// points in the longer input are dropped.
pub fn blend(primary: &[ForecastPoint], secondary: &[ForecastPoint]) -> Vec<ForecastPoint> {
    primary
        .iter()
        .zip(secondary)
        .map(|(a, b)| ForecastPoint {
            timestamp: a.timestamp,
            hydric_stress: round2((a.hydric_stress + b.hydric_stress) / 2.0),
            soil_moisture: round2((a.soil_moisture + b.soil_moisture) / 2.0),
            irrigation_need_mm: round2((a.irrigation_need_mm + b.irrigation_need_mm) / 2.0),
            confidence: match (a.confidence, b.confidence) {
                (Some(x), Some(y)) => Some(x.union(&y)),
                (x, y) => x.or(y),
            },
        })
        .collect()
}

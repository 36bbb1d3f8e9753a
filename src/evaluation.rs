// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Request payload for the downstream rule-evaluation service.

use crate::engine::ForecastReport;
use serde::{Deserialize, Serialize};

/// Inputs the agronomic rule engine evaluates.
///
/// Every measurement is optional and omitted from JSON when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluationInput {
    pub parcel_id: String,
    pub sensor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_air: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_soil: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
    /// Stress of the first forecast period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydric_stress: Option<f64>,
    /// Irrigation need of the first forecast period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irrigation_need_mm: Option<f64>,
}

impl RuleEvaluationInput {
    pub fn from_report(report: &ForecastReport, parcel_id: impl Into<String>) -> Self {
        let current = report.current.as_ref();
        let first = report.result.first();
        Self {
            parcel_id: parcel_id.into(),
            sensor_id: report.result.sensor_id.clone(),
            temperature: current.and_then(|c| c.temperature),
            humidity_air: current.and_then(|c| c.humidity_air),
            humidity_soil: current.and_then(|c| c.humidity_soil),
            ph: current.and_then(|c| c.ph),
            light: current.and_then(|c| c.light),
            hydric_stress: first.map(|p| p.hydric_stress),
            irrigation_need_mm: first.map(|p| p.irrigation_need_mm),
        }
    }
}

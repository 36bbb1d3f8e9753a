// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The derived indicator frame.

use crate::config::Frequency;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Regularly sampled table of resampled raw fields and derived indicators.
///
/// Built only by [`FeaturePipeline::prepare`](super::FeaturePipeline::prepare),
/// which guarantees that every column has the same length, holds no `NaN`,
/// and that `hydric_stress` and `soil_moisture_pct` lie in [0, 100].
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFrame {
    pub(crate) frequency: Frequency,
    pub(crate) times: Vec<i64>,
    pub(crate) temperature: Vec<f64>,
    pub(crate) humidity_air: Vec<f64>,
    pub(crate) humidity_soil: Vec<f64>,
    pub(crate) ph: Option<Vec<f64>>,
    pub(crate) light: Option<Vec<f64>>,
    pub(crate) dew_point: Vec<f64>,
    pub(crate) vapor_pressure_deficit: Vec<f64>,
    pub(crate) soil_moisture_pct: Vec<f64>,
    pub(crate) hydric_stress: Vec<f64>,
    pub(crate) rolling_stress: Vec<f64>,
    pub(crate) rolling_moisture: Vec<f64>,
    pub(crate) irrigation_need_mm: Vec<f64>,
}

/// One row of a [`DerivedFrame`], for serialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity_air: f64,
    pub humidity_soil: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
    pub dew_point: f64,
    pub vapor_pressure_deficit: f64,
    pub soil_moisture_pct: f64,
    pub hydric_stress: f64,
    pub rolling_stress: f64,
    pub rolling_moisture: f64,
    pub irrigation_need_mm: f64,
}

fn to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl DerivedFrame {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sampling frequency of the frame.
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.times.last().map(|&t| to_datetime(t))
    }

    pub fn temperature(&self) -> &[f64] {
        &self.temperature
    }

    pub fn humidity_air(&self) -> &[f64] {
        &self.humidity_air
    }

    pub fn humidity_soil(&self) -> &[f64] {
        &self.humidity_soil
    }

    pub fn ph(&self) -> Option<&[f64]> {
        self.ph.as_deref()
    }

    pub fn light(&self) -> Option<&[f64]> {
        self.light.as_deref()
    }

    pub fn dew_point(&self) -> &[f64] {
        &self.dew_point
    }

    pub fn vapor_pressure_deficit(&self) -> &[f64] {
        &self.vapor_pressure_deficit
    }

    pub fn soil_moisture_pct(&self) -> &[f64] {
        &self.soil_moisture_pct
    }

    pub fn hydric_stress(&self) -> &[f64] {
        &self.hydric_stress
    }

    pub fn rolling_stress(&self) -> &[f64] {
        &self.rolling_stress
    }

    pub fn rolling_moisture(&self) -> &[f64] {
        &self.rolling_moisture
    }

    pub fn irrigation_need_mm(&self) -> &[f64] {
        &self.irrigation_need_mm
    }

    /// Last soil moisture value, the base for projected moisture.
    pub fn last_soil_moisture(&self) -> Option<f64> {
        self.soil_moisture_pct.last().copied()
    }

    /// Row `i` as a standalone record.
    pub fn row(&self, i: usize) -> Option<DerivedRow> {
        if i >= self.len() {
            return None;
        }
        Some(DerivedRow {
            timestamp: to_datetime(self.times[i]),
            temperature: self.temperature[i],
            humidity_air: self.humidity_air[i],
            humidity_soil: self.humidity_soil[i],
            ph: self.ph.as_ref().map(|c| c[i]),
            light: self.light.as_ref().map(|c| c[i]),
            dew_point: self.dew_point[i],
            vapor_pressure_deficit: self.vapor_pressure_deficit[i],
            soil_moisture_pct: self.soil_moisture_pct[i],
            hydric_stress: self.hydric_stress[i],
            rolling_stress: self.rolling_stress[i],
            rolling_moisture: self.rolling_moisture[i],
            irrigation_need_mm: self.irrigation_need_mm[i],
        })
    }

    /// The last `n` rows in time order.
    pub fn tail_rows(&self, n: usize) -> Vec<DerivedRow> {
        let start = self.len().saturating_sub(n);
        (start..self.len()).filter_map(|i| self.row(i)).collect()
    }

    /// All rows in time order.
    pub fn rows(&self) -> Vec<DerivedRow> {
        self.tail_rows(self.len())
    }

    fn columns(&self) -> Vec<(&'static str, &[f64])> {
        let mut cols: Vec<(&'static str, &[f64])> = vec![
            ("temperature", &self.temperature[..]),
            ("humidity_air", &self.humidity_air[..]),
            ("humidity_soil", &self.humidity_soil[..]),
            ("dew_point", &self.dew_point[..]),
            ("vapor_pressure_deficit", &self.vapor_pressure_deficit[..]),
            ("soil_moisture_pct", &self.soil_moisture_pct[..]),
            ("hydric_stress", &self.hydric_stress[..]),
            ("rolling_stress", &self.rolling_stress[..]),
            ("rolling_moisture", &self.rolling_moisture[..]),
            ("irrigation_need_mm", &self.irrigation_need_mm[..]),
        ];
        if let Some(ph) = &self.ph {
            cols.push(("ph", &ph[..]));
        }
        if let Some(light) = &self.light {
            cols.push(("light", &light[..]));
        }
        cols
    }

    /// First column that is short or holds a non-finite value.
    pub fn incomplete_column(&self) -> Option<&'static str> {
        let n = self.len();
        self.columns()
            .into_iter()
            .find(|(_, c)| c.len() != n || c.iter().any(|v| !v.is_finite()))
            .map(|(name, _)| name)
    }
}

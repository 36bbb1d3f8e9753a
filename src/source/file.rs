// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV-backed history: one `<sensor_id>.csv` file per sensor in a directory.
//!
//! ```text
//! timestamp,temperature,humidity_air,humidity_soil,ph,light
//! 2025-06-01T00:00:00Z,21.4,63.0,44.8,6.52,512.3
//! 2025-06-01 01:00:00,21.1,64.2,44.6,,
//! ```
//!
//! Extra columns are ignored. Empty cells are missing values.

use super::{within_window, SensorHistorySource};
use crate::error::FetchError;
use crate::reading::{RawReading, RawSeries};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

/// Column order written by [`write_csv`].
pub const HEADER: [&str; 6] = [
    "timestamp",
    "temperature",
    "humidity_air",
    "humidity_soil",
    "ph",
    "light",
];

/// History read from a directory of per-sensor CSV files.
#[derive(Debug, Clone)]
pub struct CsvHistorySource {
    dir: PathBuf,
}

impl CsvHistorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding `sensor_id`'s history.
    pub fn path_for(&self, sensor_id: &str) -> Result<PathBuf, FetchError> {
        let valid = !sensor_id.is_empty()
            && !sensor_id.contains(['/', '\\'])
            && sensor_id != "."
            && sensor_id != "..";
        if !valid {
            return Err(FetchError::NotFound {
                sensor_id: sensor_id.to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.csv", sensor_id)))
    }
}

impl SensorHistorySource for CsvHistorySource {
    fn fetch(&self, sensor_id: &str, window_days: u32) -> Result<RawSeries, FetchError> {
        let path = self.path_for(sensor_id)?;
        if !path.is_file() {
            return Err(FetchError::NotFound {
                sensor_id: sensor_id.to_string(),
            });
        }
        let readings = read_csv(&path)?;
        Ok(RawSeries::new(sensor_id, within_window(readings, window_days)))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn csv_error(err: csv::Error) -> FetchError {
    if err.is_io_error() {
        return FetchError::Io(err.to_string());
    }
    FetchError::Malformed {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: err.to_string(),
    }
}

/// Parse an RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC) timestamp.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Read every reading from a history file.
pub fn read_csv(path: &Path) -> Result<Vec<RawReading>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let headers = reader.headers().map_err(csv_error)?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        column(name).ok_or_else(|| FetchError::Malformed {
            line: 1,
            reason: format!("missing column '{}'", name),
        })
    };
    let ts_col = required("timestamp")?;
    let temp_col = required("temperature")?;
    let air_col = required("humidity_air")?;
    let soil_col = required("humidity_soil")?;
    let ph_col = column("ph");
    let light_col = column("light");

    let mut readings = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let number = |idx: usize, name: &str| -> Result<Option<f64>, FetchError> {
            let raw = cell(idx);
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>().map(Some).map_err(|_| FetchError::Malformed {
                line,
                reason: format!("invalid {} '{}'", name, raw),
            })
        };

        let raw_ts = cell(ts_col);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| FetchError::Malformed {
            line,
            reason: format!("invalid timestamp '{}'", raw_ts),
        })?;

        readings.push(RawReading {
            timestamp,
            temperature: number(temp_col, "temperature")?.unwrap_or(f64::NAN),
            humidity_air: number(air_col, "humidity_air")?.unwrap_or(f64::NAN),
            humidity_soil: number(soil_col, "humidity_soil")?.unwrap_or(f64::NAN),
            ph: ph_col.map(|i| number(i, "ph")).transpose()?.flatten(),
            light: light_col.map(|i| number(i, "light")).transpose()?.flatten(),
        });
    }

    Ok(readings)
}

fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{:.6}", value)
    } else {
        String::new()
    }
}

/// Write a series in the format [`read_csv`] accepts.
pub fn write_csv(path: &Path, series: &RawSeries) -> Result<(), FetchError> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(HEADER).map_err(csv_error)?;

    for r in &series.readings {
        writer
            .write_record([
                r.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                format_value(r.temperature),
                format_value(r.humidity_air),
                format_value(r.humidity_soil),
                r.ph.map(format_value).unwrap_or_default(),
                r.light.map(format_value).unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }

    writer.flush()?;
    Ok(())
}

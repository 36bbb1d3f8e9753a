// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Hydrocast
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for Hydrocast operations
pub type Result<T> = std::result::Result<T, HydroError>;

/// Main error type for Hydrocast operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HydroError {
    /// History source error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Feature pipeline or forecasting error
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by a sensor history source.
///
/// These never reach the caller of a forecast: the orchestrator turns them
/// into the synthetic fallback path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Backend cannot be reached or refused the query
    #[error("Source unavailable: {reason}")]
    Unavailable { reason: String },

    /// The fetch did not complete within the configured bound
    #[error("Fetch timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The source holds nothing for this sensor
    #[error("No history for sensor {sensor_id}")]
    NotFound { sensor_id: String },

    /// A stored record could not be decoded
    #[error("Malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl FetchError {
    /// Whether retrying the same fetch could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors raised while preparing features or running a strategy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Not enough rows to build a frame or run the trend strategy
    #[error("Insufficient data: {rows} rows available, {required} required")]
    InsufficientData { rows: usize, required: usize },

    /// A required sensor field never carried a usable value
    #[error("Field '{field}' has no usable values")]
    MissingField { field: &'static str },

    /// A derived indicator came out NaN or infinite
    #[error("Derived column '{field}' contains non-finite values")]
    NonFinite { field: &'static str },

    /// Forecast timestamps fall outside the representable date range
    #[error("Forecast period {period} is past the representable date range")]
    TimestampOverflow { period: usize },

    /// Series too short for the sequence model's sliding windows
    #[error("Insufficient history: {available} samples, at least {required} required")]
    InsufficientHistory { available: usize, required: usize },

    /// Numerical failure inside a model (degenerate design, divergence)
    #[error("Model fit failed: {0}")]
    ModelFit(String),
}

/// Errors in engine configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Frequency string not understood
    #[error("Invalid frequency '{0}'")]
    InvalidFrequency(String),

    /// Value outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Model name not recognised
    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    /// Configuration document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

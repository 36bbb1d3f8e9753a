//! # Hydrocast - Hydric stress forecasting
//!
//! Turns irregular, noisy parcel sensor history into a multi-day projection of
//! plant hydric stress and irrigation need.
//!
//! ## Key Features
//!
//! - **Feature pipeline**: resampling, gap filling, dew point, VPD, stress index
//! - **Strategy chain**: seasonal regression, LSTM, damped trend, with fixed fallback edges
//! - **Graceful degradation**: synthetic history when the source fails, trend when models fail
//! - **Stateless requests**: models are trained per call, nothing is shared but configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use hydrocast::{EngineConfig, ForecastEngine, ModelKind, UnavailableSource};
//!
//! let mut config = EngineConfig::default();
//! config.fallback.rows = 48;
//!
//! // No backend: every request runs on the seeded synthetic series
//! let engine = ForecastEngine::new(config, UnavailableSource::new("offline")).unwrap();
//!
//! let result = engine.forecast("parcel-7", 5, ModelKind::Seasonal).unwrap();
//! assert_eq!(result.points.len(), 5);
//! for point in &result.points {
//!     assert!((0.0..=100.0).contains(&point.hydric_stress));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Engine configuration and frequencies
//! - [`reading`]: Raw sensor readings
//! - [`features`]: Feature engineering pipeline
//! - [`strategy`]: Forecast strategies and the fallback chain
//! - [`source`]: History sources and the synthetic generator
//! - [`engine`]: Forecast orchestrator
//! - [`evaluation`]: Payload for the rule-evaluation service

// Modules
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod forecast;
pub mod reading;
pub mod recovery;
pub mod source;
pub mod strategy;

// Re-exports for convenient access
pub use config::{EngineConfig, Frequency, SeasonalMode, SelectionPolicy};
pub use engine::{ForecastEngine, ForecastReport, HistoryOrigin};
pub use error::{ConfigError, FetchError, ForecastError, HydroError, Result};
pub use evaluation::RuleEvaluationInput;
pub use features::{DerivedFrame, DerivedRow, FeaturePipeline};
pub use forecast::{ConfidenceBand, ForecastPoint, ForecastResult, ModelKind};
pub use reading::{CurrentReadings, RawReading, RawSeries};
pub use recovery::RetryStrategy;
pub use source::{
    CsvHistorySource, GuardedSource, MemorySource, SensorHistorySource, SyntheticGenerator,
    UnavailableSource,
};
pub use strategy::{Forecaster, Strategy, StrategyChain, StrategyFailure, StrategyOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

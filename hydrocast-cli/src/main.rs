// Hydrocast CLI - Command-line front end for the forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Hydrocast CLI
//!
//! ## Usage
//!
//! ```bash
//! # Forecast from a directory of <sensor_id>.csv files
//! hydrocast --data-dir ./history forecast --sensor P-12 --horizon 7 --model ensemble
//!
//! # Same, with the payload for the rule-evaluation service
//! hydrocast --data-dir ./history forecast --sensor P-12 --parcel PARCEL-3
//!
//! # Write a synthetic history file
//! hydrocast generate --sensor P-12 --rows 480 --out ./history/P-12.csv
//! ```

use clap::{Parser, Subcommand};
use hydrocast::source::file::write_csv;
use hydrocast::{
    ConfigError, CsvHistorySource, EngineConfig, FetchError, ForecastEngine, ForecastReport,
    GuardedSource, HydroError, ModelKind, RuleEvaluationInput, SensorHistorySource,
    SyntheticGenerator, UnavailableSource,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Hydric stress forecasting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "HYDROCAST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory of <sensor_id>.csv history files
    #[arg(long, env = "HYDROCAST_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast hydric stress for a sensor
    Forecast {
        #[arg(long)]
        sensor: String,

        /// Periods to forecast (clamped to the configured maximum)
        #[arg(long)]
        horizon: Option<i64>,

        /// seasonal, sequence, ensemble or trend
        #[arg(long, default_value = "seasonal", value_parser = parse_model)]
        model: ModelKind,

        /// Also print the rule-evaluation payload for this parcel
        #[arg(long)]
        parcel: Option<String>,
    },

    /// Print recent history for a sensor
    History {
        #[arg(long)]
        sensor: String,

        /// Lookback in days (clamped to the configured bounds)
        #[arg(long)]
        days: Option<i64>,

        /// Print derived indicators instead of raw readings
        #[arg(long)]
        derived: bool,
    },

    /// Write a synthetic history file
    Generate {
        #[arg(long)]
        sensor: String,

        #[arg(long)]
        rows: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        out: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn parse_model(s: &str) -> Result<ModelKind, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Engine(#[from] HydroError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ForecastOutput<'a> {
    report: &'a ForecastReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    evaluation: Option<RuleEvaluationInput>,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(EngineConfig::from_json(&text)?)
        }
        None => {
            let config = EngineConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn build_source(
    data_dir: Option<&Path>,
    config: &EngineConfig,
) -> Box<dyn SensorHistorySource> {
    match data_dir {
        Some(dir) => {
            info!("Reading history from {}", dir.display());
            Box::new(GuardedSource::new(CsvHistorySource::new(dir), &config.source))
        }
        None => {
            info!("No data directory, using synthetic history");
            Box::new(UnavailableSource::new("no data directory configured"))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Config => print_json(&config),

        Command::Generate {
            sensor,
            rows,
            seed,
            out,
        } => {
            let series = SyntheticGenerator::new(seed.unwrap_or(config.fallback.seed))
                .with_rows(rows.unwrap_or(config.fallback.rows))
                .generate(&sensor);
            write_csv(&out, &series)?;
            info!("Wrote {} rows to {}", series.len(), out.display());
            Ok(())
        }

        Command::Forecast {
            sensor,
            horizon,
            model,
            parcel,
        } => {
            let horizon = horizon.unwrap_or(i64::from(config.horizon.default_days));
            let source = build_source(args.data_dir.as_deref(), &config);
            let engine = ForecastEngine::new(config, source)?;
            let report = engine.forecast_report(&sensor, horizon, model)?;
            let evaluation = parcel.map(|p| RuleEvaluationInput::from_report(&report, p));
            print_json(&ForecastOutput {
                report: &report,
                evaluation,
            })
        }

        Command::History {
            sensor,
            days,
            derived,
        } => {
            let days = days.unwrap_or(i64::from(config.history.window_days));
            let source = build_source(args.data_dir.as_deref(), &config);
            let engine = ForecastEngine::new(config, source)?;
            if derived {
                print_json(&engine.derived_history(&sensor, days)?)
            } else {
                print_json(&engine.history(&sensor, days))
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing (stderr, so stdout stays valid JSON)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Hydrocast v{}", hydrocast::VERSION);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_parse_forecast_args() {
        let args = Args::try_parse_from([
            "hydrocast",
            "--log-level",
            "debug",
            "forecast",
            "--sensor",
            "P-12",
            "--horizon",
            "7",
            "--model",
            "lstm",
        ])
        .unwrap();
        match args.command {
            Command::Forecast {
                sensor,
                horizon,
                model,
                parcel,
            } => {
                assert_eq!(sensor, "P-12");
                assert_eq!(horizon, Some(7));
                assert_eq!(model, ModelKind::Sequence);
                assert!(parcel.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_model() {
        assert!(Args::try_parse_from([
            "hydrocast", "forecast", "--sensor", "P1", "--model", "arima"
        ])
        .is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"horizon": {{"default_days": 3}}}}"#).unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.horizon.default_days, 3);
        assert_eq!(config.horizon.max_days, 14);
    }

    #[test]
    fn test_load_invalid_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"irrigation": {{"threshold": 120.0}}}}"#).unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_generate_then_forecast_from_csv() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("P-12.csv");

        run(Args::try_parse_from([
            "hydrocast",
            "generate",
            "--sensor",
            "P-12",
            "--rows",
            "72",
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap())
        .unwrap();
        assert!(out.is_file());

        let config = EngineConfig::default();
        let source = build_source(Some(dir.path()), &config);
        let engine = ForecastEngine::new(config, source).unwrap();
        let report = engine
            .forecast_report("P-12", 2, ModelKind::Trend)
            .unwrap();
        assert_eq!(report.origin, hydrocast::HistoryOrigin::Source);
        assert_eq!(report.result.points.len(), 2);
    }
}

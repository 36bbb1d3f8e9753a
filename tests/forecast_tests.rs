//! End-to-end forecasting tests
//!
//! Exercise the engine through its public API: synthetic fallback, strategy
//! fallback, horizon clamping and determinism.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hydrocast::source::synthetic;
use hydrocast::strategy::{blend, Forecaster, TrendStrategy};
use hydrocast::*;
use std::sync::Arc;
use std::thread;

// ============================================================================
// Helpers
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 6, 0, 0).unwrap()
}

fn offline_engine(rows: usize) -> ForecastEngine<UnavailableSource> {
    let mut config = EngineConfig::default();
    config.fallback.rows = rows;
    ForecastEngine::new(config, UnavailableSource::new("offline")).unwrap()
}

fn memory_engine(series: RawSeries) -> ForecastEngine<MemorySource> {
    ForecastEngine::new(EngineConfig::default(), MemorySource::new().with_series(series)).unwrap()
}

fn hourly(rows: usize, f: impl Fn(usize) -> RawReading) -> Vec<RawReading> {
    (0..rows).map(f).collect()
}

fn reading(i: usize, temperature: f64, humidity_air: f64, humidity_soil: f64) -> RawReading {
    let start = now() - Duration::hours(200);
    RawReading::new(
        start + Duration::hours(i as i64),
        temperature,
        humidity_air,
        humidity_soil,
    )
}

fn assert_point_ranges(points: &[ForecastPoint]) {
    for p in points {
        assert!((0.0..=100.0).contains(&p.hydric_stress), "stress {}", p.hydric_stress);
        assert!((0.0..=100.0).contains(&p.soil_moisture), "moisture {}", p.soil_moisture);
        assert!(p.irrigation_need_mm >= 0.0);
    }
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_forecast_48_synthetic_rows() {
    let engine = offline_engine(48);
    let report = engine
        .forecast_report_at("P1", 5, ModelKind::Seasonal, now())
        .unwrap();
    let points = &report.result.points;

    assert_eq!(report.origin, HistoryOrigin::Synthetic);
    assert_eq!(points.len(), 5);
    for pair in points.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::days(1));
    }
    assert_point_ranges(points);
}

#[test]
fn test_all_models_produce_valid_points() {
    let mut config = EngineConfig::default();
    config.fallback.rows = 96;
    config.sequence.sequence_length = 12;
    config.sequence.hidden_size = 4;
    config.sequence.epochs = 2;
    let engine = ForecastEngine::new(config, UnavailableSource::new("offline")).unwrap();

    for model in [
        ModelKind::Seasonal,
        ModelKind::Sequence,
        ModelKind::Trend,
        ModelKind::Ensemble,
    ] {
        let result = engine.forecast("P1", 3, model).unwrap();
        assert_eq!(result.points.len(), 3, "{}", model);
        assert_point_ranges(&result.points);
    }
}

#[test]
fn test_sequence_runs_when_history_allows() {
    let mut config = EngineConfig::default();
    config.fallback.rows = 80;
    config.sequence.sequence_length = 12;
    config.sequence.hidden_size = 4;
    config.sequence.epochs = 2;
    let engine = ForecastEngine::new(config, UnavailableSource::new("offline")).unwrap();

    let report = engine
        .forecast_report_at("P1", 2, ModelKind::Sequence, now())
        .unwrap();
    assert_eq!(report.result.model_name, ModelKind::Sequence);
    assert!(report.fallbacks.is_empty());
    for p in &report.result.points {
        let band = p.confidence.unwrap();
        assert!(band.upper - band.lower <= 10.0 + 1e-9);
    }
}

// ============================================================================
// Fallback chain
// ============================================================================

#[test]
fn test_sequence_with_five_rows_falls_back_to_trend() {
    let series = RawSeries::new("P1", hourly(5, |i| reading(i, 24.0, 55.0, 40.0)));
    let engine = memory_engine(series);

    let report = engine
        .forecast_report_at("P1", 3, ModelKind::Sequence, now())
        .unwrap();

    assert_eq!(report.origin, HistoryOrigin::Source);
    assert_eq!(report.result.model_name, ModelKind::Trend);
    assert_eq!(report.result.points.len(), 3);
    assert_eq!(report.fallbacks.len(), 1);
    assert_eq!(report.fallbacks[0].strategy, ModelKind::Sequence);
    assert!(matches!(
        report.fallbacks[0].error,
        ForecastError::InsufficientHistory { .. }
    ));
}

#[test]
fn test_single_row_history_is_an_error() {
    let series = RawSeries::new("P1", hourly(1, |i| reading(i, 24.0, 55.0, 40.0)));
    let err = memory_engine(series)
        .forecast("P1", 3, ModelKind::Trend)
        .unwrap_err();
    assert!(matches!(
        err,
        HydroError::Forecast(ForecastError::InsufficientData { rows: 1, required: 2 })
    ));
}

#[test]
fn test_unknown_sensor_uses_synthetic_history() {
    let series = RawSeries::new("P1", hourly(30, |i| reading(i, 24.0, 55.0, 40.0)));
    let report = memory_engine(series)
        .forecast_report_at("P2", 2, ModelKind::Trend, now())
        .unwrap();
    assert_eq!(report.origin, HistoryOrigin::Synthetic);
}

// ============================================================================
// Horizon clamping
// ============================================================================

#[test]
fn test_horizon_clamped_before_forecasting() {
    let engine = offline_engine(48);
    assert_eq!(engine.forecast("P1", 0, ModelKind::Trend).unwrap().points.len(), 1);
    assert_eq!(
        engine.forecast("P1", 999, ModelKind::Trend).unwrap().points.len(),
        14
    );
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_prepare_leaves_no_gaps() {
    let mut readings = Vec::new();
    for i in (0..120).step_by(7) {
        readings.push(reading(i, 18.0 + i as f64 * 0.1, 70.0 - i as f64 * 0.2, 90.0 - i as f64));
    }
    readings.push(reading(3, f64::NAN, 50.0, f64::NAN).with_ph(6.1));
    let frame = FeaturePipeline::new(&EngineConfig::default())
        .prepare(&RawSeries::new("P1", readings))
        .unwrap();

    assert_eq!(frame.incomplete_column(), None);
    assert_eq!(frame.len(), 120);
    assert!(frame.hydric_stress().iter().all(|s| (0.0..=100.0).contains(s)));
    assert!(frame.soil_moisture_pct().iter().all(|s| (0.0..=100.0).contains(s)));
    assert!(frame.ph().unwrap().iter().all(|v| *v == 6.1));
}

#[test]
fn test_constant_stress_gives_constant_trend() {
    let series = RawSeries::new("P1", hourly(60, |i| reading(i, 22.0, 65.0, 42.0)));
    let frame = FeaturePipeline::new(&EngineConfig::default())
        .prepare(&series)
        .unwrap();
    let level = frame.hydric_stress()[0];

    let points = TrendStrategy::new(&EngineConfig::default())
        .forecast(&frame, 7)
        .unwrap();
    for p in points {
        assert_relative_eq!(p.hydric_stress, level, epsilon = 1e-9);
    }
}

#[test]
fn test_irrigation_need_monotonic_in_stress() {
    let series = RawSeries::new(
        "P1",
        hourly(100, |i| reading(i, 20.0 + (i % 17) as f64, 40.0 + (i % 11) as f64, (i % 100) as f64)),
    );
    for &(threshold, max_mm) in &[(20.0, 10.0), (55.0, 25.0), (80.0, 60.0)] {
        let mut config = EngineConfig::default();
        config.irrigation.threshold = threshold;
        config.irrigation.max_mm = max_mm;
        let frame = FeaturePipeline::new(&config).prepare(&series).unwrap();

        let mut pairs: Vec<(f64, f64)> = frame
            .hydric_stress()
            .iter()
            .copied()
            .zip(frame.irrigation_need_mm().iter().copied())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in pairs.windows(2) {
            assert!(w[0].1 >= 0.0);
            assert!(w[1].1 >= w[0].1);
        }
    }
}

#[test]
fn test_blend_reference_values() {
    let ts = now();
    let seasonal = vec![ForecastPoint {
        timestamp: ts,
        hydric_stress: 40.0,
        soil_moisture: 60.0,
        irrigation_need_mm: 4.0,
        confidence: Some(ConfidenceBand::new(35.0, 45.0)),
    }];
    let sequence = vec![ForecastPoint {
        timestamp: ts,
        hydric_stress: 50.0,
        soil_moisture: 55.0,
        irrigation_need_mm: 6.0,
        confidence: Some(ConfidenceBand::new(40.0, 55.0)),
    }];

    let blended = blend(&seasonal, &sequence);
    assert_eq!(blended.len(), 1);
    assert_eq!(blended[0].hydric_stress, 45.0);
    assert_eq!(blended[0].soil_moisture, 57.5);
    assert_eq!(blended[0].irrigation_need_mm, 5.0);
    assert_eq!(blended[0].confidence, Some(ConfidenceBand::new(35.0, 55.0)));
}

#[test]
fn test_synthetic_generation_is_byte_identical() {
    let a = synthetic::generate("P1", 200, 42, now());
    let b = synthetic::generate("P1", 200, 42, now());
    assert_eq!(
        serde_json::to_vec(&a).unwrap(),
        serde_json::to_vec(&b).unwrap()
    );
}

#[test]
fn test_forecast_is_deterministic() {
    let engine = offline_engine(120);
    let a = engine
        .forecast_report_at("P1", 4, ModelKind::Trend, now())
        .unwrap();
    let b = engine
        .forecast_report_at("P1", 4, ModelKind::Trend, now())
        .unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ============================================================================
// Downstream payload
// ============================================================================

#[test]
fn test_rule_evaluation_payload() {
    let series = RawSeries::new(
        "S-9",
        hourly(48, |i| reading(i, 29.0, 35.0, 22.0).with_light(700.0)),
    );
    let report = memory_engine(series)
        .forecast_report_at("S-9", 3, ModelKind::Trend, now())
        .unwrap();
    let input = RuleEvaluationInput::from_report(&report, "PARCEL-4");

    assert_eq!(input.sensor_id, "S-9");
    assert_eq!(input.temperature, Some(29.0));
    assert_eq!(input.light, Some(700.0));
    assert_eq!(input.ph, None);
    assert_eq!(input.hydric_stress, Some(report.result.points[0].hydric_stress));

    let json = serde_json::to_value(&input).unwrap();
    assert!(json.get("ph").is_none());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_parallel_requests_share_engine() {
    let engine = Arc::new(offline_engine(72));
    let expected = engine
        .forecast_report_at("P0", 3, ModelKind::Trend, now())
        .unwrap()
        .result
        .points;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .forecast_report_at(&format!("P{}", i), 3, ModelKind::Trend, now())
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let report = handle.join().unwrap();
        // Same seed, same clock: every sensor gets the same synthetic series.
        assert_eq!(report.result.points, expected);
    }
}

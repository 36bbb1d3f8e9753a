// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Agronomic indicators derived from temperature and humidity.

/// Magnus coefficient a.
const MAGNUS_A: f64 = 17.27;
/// Magnus coefficient b, °C.
const MAGNUS_B: f64 = 237.7;
/// Tetens denominator offset, °C.
const TETENS_C: f64 = 237.3;
/// Saturation vapour pressure at 0 °C, kPa.
const SVP_0: f64 = 0.6108;

/// Stress index weights: soil deficit, heat, vapour-pressure deficit.
const W_SOIL: f64 = 0.6;
const W_HEAT: f64 = 0.25;
const W_VPD: f64 = 0.15;

/// Dew point (°C) from air temperature (°C) and relative humidity (%).
///
/// Humidity is clamped to [0.1, 100] before the logarithm.
pub fn dew_point(temperature: f64, humidity_air: f64) -> f64 {
    let rh = humidity_air.clamp(0.1, 100.0);
    let alpha = (MAGNUS_A * temperature) / (MAGNUS_B + temperature) + (rh / 100.0).ln();
    MAGNUS_B * alpha / (MAGNUS_A - alpha)
}

/// Saturation vapour pressure (kPa) at `temperature` °C.
pub fn saturation_vapor_pressure(temperature: f64) -> f64 {
    SVP_0 * (MAGNUS_A * temperature / (temperature + TETENS_C)).exp()
}

/// Vapour-pressure deficit (kPa), never negative.
pub fn vapor_pressure_deficit(temperature: f64, dew_point: f64) -> f64 {
    (saturation_vapor_pressure(temperature) - saturation_vapor_pressure(dew_point)).max(0.0)
}

/// Soil humidity as a percentage in [0, 100].
pub fn soil_moisture_pct(humidity_soil: f64) -> f64 {
    humidity_soil.clamp(0.0, 100.0)
}

/// Composite hydric stress index in [0, 100].
pub fn hydric_stress_index(soil_moisture_pct: f64, temperature: f64, vpd: f64) -> f64 {
    let soil_deficit = (100.0 - soil_moisture_pct).clamp(0.0, 100.0);
    let heat_penalty = (temperature - 25.0).clamp(0.0, 20.0);
    let vpd_penalty = (vpd * 15.0).clamp(0.0, 30.0);
    (W_SOIL * soil_deficit + W_HEAT * heat_penalty + W_VPD * vpd_penalty).clamp(0.0, 100.0)
}

/// Irrigation need (mm) for a stress level.
///
/// Zero up to `threshold`, rising linearly to `max_mm` at stress 100.
/// `threshold` must be below 100.
pub fn irrigation_need_mm(hydric_stress: f64, threshold: f64, max_mm: f64) -> f64 {
    (hydric_stress - threshold).max(0.0) / (100.0 - threshold) * max_mm
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dew_point_saturated_air() {
        // At 100% humidity the dew point is the air temperature.
        assert_relative_eq!(dew_point(20.0, 100.0), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dew_point_reference_value() {
        // 25 °C at 60% RH gives a dew point near 16.7 °C.
        let dp = dew_point(25.0, 60.0);
        assert!((dp - 16.69).abs() < 0.05, "dew point {}", dp);
    }

    #[test]
    fn test_dew_point_zero_humidity_is_finite() {
        assert!(dew_point(30.0, 0.0).is_finite());
        assert!(dew_point(30.0, -5.0).is_finite());
    }

    #[test]
    fn test_saturation_vapor_pressure() {
        assert_relative_eq!(saturation_vapor_pressure(0.0), 0.6108, epsilon = 1e-12);
        let svp = saturation_vapor_pressure(25.0);
        assert!((svp - 3.168).abs() < 0.01);
    }

    #[test]
    fn test_vpd_non_negative() {
        assert_eq!(vapor_pressure_deficit(20.0, 25.0), 0.0);
        assert!(vapor_pressure_deficit(30.0, 10.0) > 0.0);
    }

    #[test]
    fn test_hydric_stress_bounds() {
        assert_eq!(hydric_stress_index(100.0, 20.0, 0.0), 0.0);
        // Fully dry, hot and dry air: 0.6*100 + 0.25*20 + 0.15*30
        assert_relative_eq!(hydric_stress_index(0.0, 50.0, 10.0), 69.5, epsilon = 1e-9);
        let mid = hydric_stress_index(45.0, 30.0, 1.0);
        assert_relative_eq!(mid, 0.6 * 55.0 + 0.25 * 5.0 + 0.15 * 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_irrigation_need() {
        assert_eq!(irrigation_need_mm(40.0, 55.0, 25.0), 0.0);
        assert_eq!(irrigation_need_mm(55.0, 55.0, 25.0), 0.0);
        assert_relative_eq!(irrigation_need_mm(100.0, 55.0, 25.0), 25.0, epsilon = 1e-9);
        assert_relative_eq!(irrigation_need_mm(77.5, 55.0, 25.0), 12.5, epsilon = 1e-9);
    }

    #[test]
    fn test_irrigation_need_monotonic() {
        for &(threshold, max_mm) in &[(0.0, 10.0), (55.0, 25.0), (90.0, 40.0), (30.0, 0.0)] {
            let mut previous = 0.0;
            for step in 0..=200 {
                let stress = step as f64 * 0.5;
                let need = irrigation_need_mm(stress, threshold, max_mm);
                assert!(need >= 0.0);
                assert!(need >= previous);
                previous = need;
            }
        }
    }
}

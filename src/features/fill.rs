// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Gap filling and rolling aggregates over `NaN`-marked columns.

/// Time-weighted linear interpolation of interior gaps.
///
/// Only gaps with a known value on both sides are filled; leading and
/// trailing gaps are left for [`forward_fill`] and [`backward_fill`].
pub fn interpolate_time(times: &[i64], values: &mut [f64]) {
    debug_assert_eq!(times.len(), values.len());
    let mut last_known: Option<usize> = None;

    for i in 0..values.len() {
        if values[i].is_nan() {
            continue;
        }
        if let Some(k) = last_known {
            if i > k + 1 {
                let (t0, t1) = (times[k] as f64, times[i] as f64);
                let (v0, v1) = (values[k], values[i]);
                let span = t1 - t0;
                for j in (k + 1)..i {
                    let w = if span > 0.0 {
                        (times[j] as f64 - t0) / span
                    } else {
                        0.0
                    };
                    values[j] = v0 + (v1 - v0) * w;
                }
            }
        }
        last_known = Some(i);
    }
}

/// Carry the last known value forward over gaps.
pub fn forward_fill(values: &mut [f64]) {
    let mut last = f64::NAN;
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    }
}

/// Carry the next known value backward over gaps.
pub fn backward_fill(values: &mut [f64]) {
    let mut next = f64::NAN;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
}

/// Interpolate, then forward-fill, then backward-fill.
///
/// Returns `false` when the column had no known value at all.
pub fn fill_gaps(times: &[i64], values: &mut [f64]) -> bool {
    if values.iter().all(|v| v.is_nan()) {
        return false;
    }
    interpolate_time(times, values);
    forward_fill(values);
    backward_fill(values);
    true
}

/// Trailing rolling mean over `window` samples.
///
/// Positions with fewer than `min_periods` known samples in the window are
/// `NaN`.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut count = 0usize;

    for i in 0..values.len() {
        if !values[i].is_nan() {
            sum += values[i];
            count += 1;
        }
        if i >= window {
            let dropped = values[i - window];
            if !dropped.is_nan() {
                sum -= dropped;
                count -= 1;
            }
        }
        out.push(if count >= min_periods && count > 0 {
            sum / count as f64
        } else {
            f64::NAN
        });
    }

    out
}

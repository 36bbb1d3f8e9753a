// Hydrocast - Hydric stress forecasting engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Single-layer LSTM regressor with a linear head.
//!
//! Univariate input, one hidden layer, scalar output read from the last
//! hidden state. Gate pre-activations are `W · [x, h, 1]` with the four gates
//! stacked as input, forget, candidate, output. Training is mini-batch Adam
//! on mean squared error with full backpropagation through time.

use crate::config::SequenceConfig;
use crate::error::ForecastError;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;
const MAX_GRAD_NORM: f64 = 1.0;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Per-timestep activations kept for the backward pass.
struct StepCache {
    z: DVector<f64>,
    i: DVector<f64>,
    f: DVector<f64>,
    g: DVector<f64>,
    o: DVector<f64>,
    c_prev: DVector<f64>,
    tanh_c: DVector<f64>,
}

/// Gradient accumulator, same shapes as the parameters.
struct Gradients {
    w: DMatrix<f64>,
    head: DVector<f64>,
    bias: f64,
}

impl Gradients {
    fn zeros(hidden: usize) -> Self {
        Self {
            w: DMatrix::zeros(4 * hidden, hidden + 2),
            head: DVector::zeros(hidden),
            bias: 0.0,
        }
    }

    fn norm(&self) -> f64 {
        (self.w.norm_squared() + self.head.norm_squared() + self.bias * self.bias).sqrt()
    }

    fn scale(&mut self, factor: f64) {
        self.w *= factor;
        self.head *= factor;
        self.bias *= factor;
    }
}

/// Adam moment estimates for one parameter block.
struct AdamState {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl AdamState {
    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    fn step(&mut self, params: &mut [f64], grads: &[f64], lr: f64, t: i32) {
        let c1 = 1.0 - BETA1.powi(t);
        let c2 = 1.0 - BETA2.powi(t);
        for (k, (p, g)) in params.iter_mut().zip(grads).enumerate() {
            self.m[k] = BETA1 * self.m[k] + (1.0 - BETA1) * g;
            self.v[k] = BETA2 * self.v[k] + (1.0 - BETA2) * g * g;
            let m_hat = self.m[k] / c1;
            let v_hat = self.v[k] / c2;
            *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPS);
        }
    }
}

/// LSTM regressor. Trained from scratch on every call that owns one.
#[derive(Debug, Clone)]
pub struct LstmRegressor {
    hidden: usize,
    /// Gate weights, `4H × (H + 2)`: input column, recurrent block, bias.
    w: DMatrix<f64>,
    head: DVector<f64>,
    bias: f64,
}

impl LstmRegressor {
    /// Uniform initialisation in `±1/√H`, forget-gate bias set to 1.
    pub fn new(hidden: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (hidden as f64).sqrt();
        let mut w = DMatrix::from_fn(4 * hidden, hidden + 2, |_, _| rng.gen_range(-bound..bound));
        for row in hidden..2 * hidden {
            w[(row, hidden + 1)] = 1.0;
        }
        let head = DVector::from_fn(hidden, |_, _| rng.gen_range(-bound..bound));
        Self {
            hidden,
            w,
            head,
            bias: 0.0,
        }
    }

    fn forward(&self, window: &[f64]) -> (f64, DVector<f64>, Vec<StepCache>) {
        let h_size = self.hidden;
        let mut h: DVector<f64> = DVector::zeros(h_size);
        let mut c: DVector<f64> = DVector::zeros(h_size);
        let mut caches = Vec::with_capacity(window.len());

        for &x in window {
            let mut z: DVector<f64> = DVector::zeros(h_size + 2);
            z[0] = x;
            z.rows_mut(1, h_size).copy_from(&h);
            z[h_size + 1] = 1.0;

            let gates = &self.w * &z;
            let i = gates.rows(0, h_size).map(sigmoid);
            let f = gates.rows(h_size, h_size).map(sigmoid);
            let g = gates.rows(2 * h_size, h_size).map(f64::tanh);
            let o = gates.rows(3 * h_size, h_size).map(sigmoid);

            let c_prev = c;
            c = f.component_mul(&c_prev) + i.component_mul(&g);
            let tanh_c = c.map(f64::tanh);
            h = o.component_mul(&tanh_c);

            caches.push(StepCache {
                z,
                i,
                f,
                g,
                o,
                c_prev,
                tanh_c,
            });
        }

        let y = self.head.dot(&h) + self.bias;
        (y, h, caches)
    }

    /// Predict the value following `window`.
    pub fn predict(&self, window: &[f64]) -> f64 {
        self.forward(window).0
    }

    /// Accumulate parameter gradients given `dy = ∂L/∂y`.
    fn backward(&self, h_last: &DVector<f64>, caches: &[StepCache], dy: f64, grads: &mut Gradients) {
        let h_size = self.hidden;
        grads.head += h_last * dy;
        grads.bias += dy;

        let mut dh = &self.head * dy;
        let mut dc: DVector<f64> = DVector::zeros(h_size);

        for step in caches.iter().rev() {
            let d_o = dh.component_mul(&step.tanh_c);
            let one_minus_tc2 = step.tanh_c.map(|v| 1.0 - v * v);
            dc += dh.component_mul(&step.o).component_mul(&one_minus_tc2);

            let d_i = dc.component_mul(&step.g);
            let d_g = dc.component_mul(&step.i);
            let d_f = dc.component_mul(&step.c_prev);

            let mut da: DVector<f64> = DVector::zeros(4 * h_size);
            da.rows_mut(0, h_size)
                .copy_from(&d_i.component_mul(&step.i.map(|v| v * (1.0 - v))));
            da.rows_mut(h_size, h_size)
                .copy_from(&d_f.component_mul(&step.f.map(|v| v * (1.0 - v))));
            da.rows_mut(2 * h_size, h_size)
                .copy_from(&d_g.component_mul(&step.g.map(|v| 1.0 - v * v)));
            da.rows_mut(3 * h_size, h_size)
                .copy_from(&d_o.component_mul(&step.o.map(|v| v * (1.0 - v))));

            grads.w += &da * step.z.transpose();
            let dz = self.w.tr_mul(&da);
            dh = dz.rows(1, h_size).into_owned();
            dc = dc.component_mul(&step.f);
        }
    }

    /// Train on sliding windows of `series` (already scaled).
    ///
    /// Each window of `sequence_length` values predicts the value right
    /// after it. Returns the mean training loss of the last epoch.
    pub fn fit(
        &mut self,
        series: &[f64],
        config: &SequenceConfig,
        rng: &mut StdRng,
    ) -> Result<f64, ForecastError> {
        let len = config.sequence_length;
        let windows = series.len().saturating_sub(len);
        if windows == 0 {
            return Err(ForecastError::InsufficientHistory {
                available: series.len(),
                required: len + 2,
            });
        }

        let mut order: Vec<usize> = (0..windows).collect();
        let mut adam_w = AdamState::new(self.w.len());
        let mut adam_head = AdamState::new(self.hidden);
        let mut adam_bias = AdamState::new(1);
        let mut t = 0;
        let mut epoch_loss = 0.0;

        for epoch in 0..config.epochs {
            order.shuffle(rng);
            epoch_loss = 0.0;

            for batch in order.chunks(config.batch_size) {
                let mut grads = Gradients::zeros(self.hidden);
                let scale = 2.0 / batch.len() as f64;

                for &start in batch {
                    let target = series[start + len];
                    let (y, h_last, caches) = self.forward(&series[start..start + len]);
                    let err = y - target;
                    epoch_loss += err * err;
                    self.backward(&h_last, &caches, scale * err, &mut grads);
                }

                let norm = grads.norm();
                if !norm.is_finite() {
                    return Err(ForecastError::ModelFit("gradient diverged".into()));
                }
                if norm > MAX_GRAD_NORM {
                    grads.scale(MAX_GRAD_NORM / norm);
                }

                t += 1;
                adam_w.step(self.w.as_mut_slice(), grads.w.as_slice(), config.learning_rate, t);
                adam_head.step(
                    self.head.as_mut_slice(),
                    grads.head.as_slice(),
                    config.learning_rate,
                    t,
                );
                let mut bias = [self.bias];
                adam_bias.step(&mut bias, &[grads.bias], config.learning_rate, t);
                self.bias = bias[0];
            }

            epoch_loss /= windows as f64;
            log::debug!("lstm epoch {} loss {:.6}", epoch + 1, epoch_loss);
        }

        if !epoch_loss.is_finite() {
            return Err(ForecastError::ModelFit("training loss is not finite".into()));
        }
        Ok(epoch_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn small_config() -> SequenceConfig {
        SequenceConfig {
            sequence_length: 6,
            hidden_size: 6,
            epochs: 60,
            learning_rate: 0.01,
            batch_size: 8,
            seed: 7,
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let model = LstmRegressor::new(3, &mut rng);
        let window = [0.2, 0.5, 0.1, 0.7];
        let target = 0.4;

        let (y, h_last, caches) = model.forward(&window);
        let mut grads = Gradients::zeros(3);
        model.backward(&h_last, &caches, 2.0 * (y - target), &mut grads);

        let loss = |m: &LstmRegressor| {
            let e = m.predict(&window) - target;
            e * e
        };
        let eps = 1e-6;
        for &(r, c) in &[(0, 0), (4, 2), (7, 4), (11, 1)] {
            let mut plus = model.clone();
            plus.w[(r, c)] += eps;
            let mut minus = model.clone();
            minus.w[(r, c)] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!(
                (numeric - grads.w[(r, c)]).abs() < 1e-6,
                "w[{},{}]: numeric {} analytic {}",
                r,
                c,
                numeric,
                grads.w[(r, c)]
            );
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let series: Vec<f64> = (0..80)
            .map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin())
            .collect();
        let config = small_config();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut model = LstmRegressor::new(config.hidden_size, &mut rng);
        let before: f64 = (0..series.len() - 6)
            .map(|s| (model.predict(&series[s..s + 6]) - series[s + 6]).powi(2))
            .sum::<f64>()
            / (series.len() - 6) as f64;

        let after = model.fit(&series, &config, &mut rng).unwrap();
        assert!(after < before, "loss {} -> {}", before, after);
    }

    #[test]
    fn test_training_is_deterministic() {
        let series: Vec<f64> = (0..40).map(|i| (i % 9) as f64 / 9.0).collect();
        let config = SequenceConfig {
            epochs: 5,
            ..small_config()
        };
        let run = || {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut model = LstmRegressor::new(config.hidden_size, &mut rng);
            model.fit(&series, &config, &mut rng).unwrap();
            model.predict(&series[series.len() - 6..])
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_fit_without_windows() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut model = LstmRegressor::new(4, &mut rng);
        let err = model.fit(&[0.1; 6], &small_config(), &mut rng).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientHistory { .. }));
    }
}

// ============================================================
// Layer 5 — Likelihoods and Evaluation Objective
// ============================================================
// Per-example quantities, all returned as [batch, 1]:
//
//   Bernoulli   log p(x|y) = Σ_d x_d log p_d + (1-x_d) log(1-p_d)
//   Gaussian    log p(x|y) = -½ Σ_d (x_d - μ_d)²    (unit variance,
//                                                    constant dropped)
//   code        log q(z|x) = Σ_b z_b log q_b + (1-z_b) log(1-q_b)
//
// with p = μ = σ(decoder logits), probabilities clamped to
// [EPS, 1-EPS] before every log.
//
// `evaluate_batch` is the loss used for validation and test:
// K exact draws, channel noise, mean log-likelihood, plus the
// encoder weight penalty.

use anyhow::Result;
use burn::{prelude::*, tensor::activation::sigmoid};

use crate::data::source::Datasource;
use crate::domain::{error::NecstError, example::InputDomain};
use crate::ml::{
    channel::NoisyChannel,
    model::Necst,
    noise::NoiseSource,
    sampler::{hard_sample, EPS},
};

pub fn bernoulli_log_likelihood<B: Backend>(x: Tensor<B, 2>, logits: Tensor<B, 2>) -> Tensor<B, 2> {
    let p = sigmoid(logits).clamp(EPS, 1.0 - EPS);
    let on  = x.clone() * p.clone().log();
    let off = x.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log();
    (on + off).sum_dim(1)
}

pub fn gaussian_log_likelihood<B: Backend>(x: Tensor<B, 2>, logits: Tensor<B, 2>) -> Tensor<B, 2> {
    let diff = x - sigmoid(logits);
    diff.powf_scalar(2.0).sum_dim(1).mul_scalar(-0.5)
}

pub fn log_likelihood<B: Backend>(domain: InputDomain, x: Tensor<B, 2>, logits: Tensor<B, 2>) -> Tensor<B, 2> {
    match domain {
        InputDomain::Binary     => bernoulli_log_likelihood(x, logits),
        InputDomain::Continuous => gaussian_log_likelihood(x, logits),
    }
}

pub fn code_log_prob<B: Backend>(z: Tensor<B, 2>, q: Tensor<B, 2>) -> Tensor<B, 2> {
    let q = q.clamp(EPS, 1.0 - EPS);
    let on  = z.clone() * q.clone().log();
    let off = z.neg().add_scalar(1.0) * q.neg().add_scalar(1.0).log();
    (on + off).sum_dim(1)
}

/// `k` copies of `t` stacked along the batch axis, draw-major
pub fn repeat_draws<B: Backend>(t: Tensor<B, 2>, k: usize) -> Tensor<B, 2> {
    if k == 1 {
        return t;
    }
    Tensor::cat(vec![t; k], 0)
}

/// [K·N, 1] draw-major column → [N, K]
pub fn per_example<B: Backend>(column: Tensor<B, 2>, k: usize, n: usize) -> Tensor<B, 2> {
    column.reshape([k, n]).swap_dims(0, 1)
}

/// One estimator step: the tensor to differentiate plus host-side readings
pub struct Objective<B: Backend> {
    /// Scalar whose gradient is the estimator's gradient
    pub surrogate:      Tensor<B, 1>,
    /// Reported loss: -mean log-likelihood + regularization
    pub loss:           f64,
    pub log_likelihood: f64,
    pub regularization: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchEval {
    pub loss:           f64,
    pub log_likelihood: f64,
    pub examples:       usize,
}

/// Validation / test loss of one batch: `draws` exact samples per example
pub fn evaluate_batch<B: Backend>(
    model:     &Necst<B>,
    inputs:    Tensor<B, 2>,
    channel:   &NoisyChannel,
    draws:     usize,
    noise:     &mut NoiseSource,
    reg_param: f64,
) -> BatchEval {
    let [n, _] = inputs.dims();
    let k      = draws.max(1);
    let device = inputs.device();

    let q      = repeat_draws(model.encode(inputs.clone()), k);
    let [rows, bits] = q.dims();
    let u      = noise.uniform::<B>(rows, bits, &device);
    let z      = channel.corrupt(hard_sample(q, u), noise);
    let logits = model.decode(z);
    let ll     = log_likelihood(model.domain(), repeat_draws(inputs, k), logits);

    let mean_ll: f64 = ll.mean().into_scalar().elem::<f64>();
    let reg:     f64 = model.regularization(reg_param).into_scalar().elem::<f64>();

    BatchEval { loss: -mean_ll + reg, log_likelihood: mean_ll, examples: n }
}

/// Loss over a whole split, one pass in dataset order
pub fn evaluate_split<B: Backend>(
    model:     &Necst<B>,
    source:    &mut Datasource<B>,
    channel:   &NoisyChannel,
    draws:     usize,
    noise:     &mut NoiseSource,
    reg_param: f64,
) -> Result<BatchEval> {
    source.start_epoch(0);
    let mut evals = Vec::with_capacity(source.batches_per_epoch());
    while let Some(batch) = source.next_batch()? {
        evals.push(evaluate_batch(model, batch.inputs, channel, draws, noise, reg_param));
    }
    aggregate(&evals).ok_or_else(|| NecstError::DataExhausted { epoch: 0 }.into())
}

/// Example-weighted mean of batch evaluations
pub fn aggregate(evals: &[BatchEval]) -> Option<BatchEval> {
    let examples: usize = evals.iter().map(|e| e.examples).sum();
    if examples == 0 {
        return None;
    }
    let w = |f: fn(&BatchEval) -> f64| {
        evals.iter().map(|e| f(e) * e.examples as f64).sum::<f64>() / examples as f64
    };
    Some(BatchEval {
        loss:           w(|e| e.loss),
        log_likelihood: w(|e| e.log_likelihood),
        examples,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    fn tensor(values: Vec<f32>, rows: usize, cols: usize) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values, [rows, cols]), &Default::default())
    }

    fn column(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_bernoulli_ll_matches_hand_computation() {
        // logit 0 → p = 0.5 everywhere: ll = D · log 0.5
        let x  = tensor(vec![1.0, 0.0, 1.0], 1, 3);
        let ll = column(bernoulli_log_likelihood(x, tensor(vec![0.0; 3], 1, 3)));
        approx::assert_abs_diff_eq!(ll[0], 3.0 * 0.5f32.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_bernoulli_ll_is_finite_for_saturated_logits() {
        let x  = tensor(vec![1.0, 0.0], 1, 2);
        let ll = column(bernoulli_log_likelihood(x, tensor(vec![-1e4, 1e4], 1, 2)));
        assert!(ll[0].is_finite());
        assert!(ll[0] < -20.0);
    }

    #[test]
    fn test_gaussian_ll_peaks_at_mean() {
        let x       = tensor(vec![0.5, 0.5], 1, 2);
        let perfect = column(gaussian_log_likelihood(x.clone(), tensor(vec![0.0, 0.0], 1, 2)));
        let off     = column(gaussian_log_likelihood(x, tensor(vec![3.0, -3.0], 1, 2)));
        approx::assert_abs_diff_eq!(perfect[0], 0.0, epsilon = 1e-6);
        assert!(off[0] < 0.0);
    }

    #[test]
    fn test_code_log_prob_of_certain_code() {
        let z  = tensor(vec![1.0, 0.0], 1, 2);
        let lp = column(code_log_prob(z.clone(), tensor(vec![1.0, 0.0], 1, 2)));
        assert!(lp[0] > -1e-4);
        let lp = column(code_log_prob(z, tensor(vec![0.5, 0.5], 1, 2)));
        approx::assert_abs_diff_eq!(lp[0], 2.0 * 0.5f32.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_per_example_layout() {
        // draw-major [K·N, 1] with K = 2, N = 3
        let col = tensor(vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0], 6, 1);
        let m   = per_example(col, 2, 3);
        assert_eq!(m.dims(), [3, 2]);
        assert_eq!(column(m), vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0]);
    }

    #[test]
    fn test_aggregate_weights_by_examples() {
        let a = BatchEval { loss: 1.0, log_likelihood: -1.0, examples: 3 };
        let b = BatchEval { loss: 5.0, log_likelihood: -5.0, examples: 1 };
        let m = aggregate(&[a, b]).unwrap();
        approx::assert_abs_diff_eq!(m.loss, 2.0);
        assert_eq!(m.examples, 4);
        assert!(aggregate(&[]).is_none());
    }
}

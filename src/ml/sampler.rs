// ============================================================
// Layer 5 — Code Samplers
// ============================================================
// Turn encoder bit probabilities q ∈ (0,1) into codes.
//
//   Relaxed (Gumbel-sigmoid / Concrete, Maddison et al. 2017):
//       z = σ( (log q - log(1-q) + log u - log(1-u)) / τ )
//     differentiable in q, clamped into [EPS, 1-EPS] ⊂ (0,1)
//
//   Hard:
//       z = 1[u < q]   on a detached q
//     exact {0,1} draws, gradients come from the score function
//
//   MAP:
//       z = 1[q ≥ 0.5]   deterministic, used for analysis
//
// τ anneals per global step:  τ(t) = max(τ_min, τ_0 · exp(-r·t))

use burn::{prelude::*, tensor::activation::sigmoid};

/// Probabilities are clamped to [EPS, 1 - EPS] before any log
pub const EPS: f32 = 1e-6;

/// Relaxed Bernoulli sample at `temperature`; `uniform` has the shape of `q`.
/// At low temperature the sigmoid saturates in f32, so the result is clamped
/// back into [EPS, 1 - EPS] like every other probability.
pub fn relaxed_sample<B: Backend>(q: Tensor<B, 2>, uniform: Tensor<B, 2>, temperature: f64) -> Tensor<B, 2> {
    let q = q.clamp(EPS, 1.0 - EPS);
    let u = uniform.clamp(EPS, 1.0 - EPS);
    let logits   = q.clone().log() - q.neg().add_scalar(1.0).log();
    let logistic = u.clone().log() - u.neg().add_scalar(1.0).log();
    sigmoid((logits + logistic).div_scalar(temperature)).clamp(EPS, 1.0 - EPS)
}

/// Exact {0,1} draw; no gradient reaches `q` through the sample
pub fn hard_sample<B: Backend>(q: Tensor<B, 2>, uniform: Tensor<B, 2>) -> Tensor<B, 2> {
    uniform.lower(q.detach()).float()
}

/// Most likely code under q
pub fn map_code<B: Backend>(q: Tensor<B, 2>) -> Tensor<B, 2> {
    q.detach().greater_equal_elem(0.5).float()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSchedule {
    pub initial: f64,
    pub minimum: f64,
    pub rate:    f64,
}

impl TemperatureSchedule {
    pub fn new(initial: f64, minimum: f64, rate: f64) -> Self {
        Self { initial, minimum, rate }
    }

    pub fn at(&self, step: usize) -> f64 {
        (self.initial * (-self.rate * step as f64).exp()).max(self.minimum)
    }
}

// ============================================================
// Layer 5 — Gradient Estimators
// ============================================================
// Two ways to get gradients through the discrete code:
//
//   Pathwise (relaxed)   one Concrete sample per example,
//                        surrogate = -mean log p(x|z) + reg
//
//   VIMCO (score)        K exact samples per example,
//                        f_k = log p(x|z_k),  L = objective(f_1..f_K)
//                        surrogate = -mean_n[ Σ_k w_k·f_k
//                                             + Σ_k s_k·log q(z_k|x) ] + reg
//
// w_k = ∂L/∂f_k and the learning signals s_k are computed on the
// host and enter the graph as constants, so they scale gradients
// without being differentiated themselves. The surrogate's value
// is meaningless; the reported loss is always -mean L + reg.
//
// Learning signals use leave-one-out baselines (Mnih & Rezende 2016):
//
//   mean objective:        b_k = mean_{j≠k} f_j,    s_k = (f_k - b_k) / K
//   log-mean-exp:          b_k = L(f with f_k := mean_{j≠k} f_j)
//                          s_k = L(f) - b_k
//
// With K = 1 there is nothing to leave out and s = f.

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::domain::config::{NecstConfig, VimcoObjective};
use crate::ml::{
    channel::NoisyChannel,
    model::Necst,
    noise::NoiseSource,
    objective::{code_log_prob, log_likelihood, per_example, repeat_draws, Objective},
    sampler::{hard_sample, relaxed_sample, TemperatureSchedule},
};

pub trait GradientEstimator<B: Backend> {
    fn name(&self) -> &'static str;

    /// Build the differentiable surrogate for one batch at global `step`
    fn objective(
        &self,
        model:   &Necst<B>,
        inputs:  Tensor<B, 2>,
        channel: &NoisyChannel,
        noise:   &mut NoiseSource,
        step:    usize,
    ) -> Result<Objective<B>>;
}

pub fn build_estimator<B: Backend>(cfg: &NecstConfig) -> Box<dyn GradientEstimator<B>> {
    if cfg.uses_relaxation() {
        Box::new(PathwiseEstimator {
            schedule:  TemperatureSchedule::new(cfg.temperature, cfg.min_temperature, cfg.anneal_rate),
            reg_param: cfg.reg_param,
        })
    } else {
        Box::new(VimcoEstimator {
            samples:   cfg.vimco_samples.max(1),
            objective: cfg.vimco_objective,
            reg_param: cfg.reg_param,
        })
    }
}

// ─── Pathwise ────────────────────────────────────────────────────────────────

pub struct PathwiseEstimator {
    pub schedule:  TemperatureSchedule,
    pub reg_param: f64,
}

impl<B: Backend> GradientEstimator<B> for PathwiseEstimator {
    fn name(&self) -> &'static str { "relaxed" }

    fn objective(
        &self,
        model:   &Necst<B>,
        inputs:  Tensor<B, 2>,
        channel: &NoisyChannel,
        noise:   &mut NoiseSource,
        step:    usize,
    ) -> Result<Objective<B>> {
        let q          = model.encode(inputs.clone());
        let [n, bits]  = q.dims();
        let u          = noise.uniform::<B>(n, bits, &q.device());
        let z          = relaxed_sample(q, u, self.schedule.at(step));
        let received   = channel.corrupt(z, noise);
        let ll         = log_likelihood(model.domain(), inputs, model.decode(received)).mean();
        let reg        = model.regularization(self.reg_param);

        let mean_ll:   f64 = ll.clone().into_scalar().elem::<f64>();
        let reg_value: f64 = reg.clone().into_scalar().elem::<f64>();

        Ok(Objective {
            surrogate:      ll.neg() + reg,
            loss:           -mean_ll + reg_value,
            log_likelihood: mean_ll,
            regularization: reg_value,
        })
    }
}

// ─── VIMCO ───────────────────────────────────────────────────────────────────

pub struct VimcoEstimator {
    pub samples:   usize,
    pub objective: VimcoObjective,
    pub reg_param: f64,
}

impl<B: Backend> GradientEstimator<B> for VimcoEstimator {
    fn name(&self) -> &'static str { "vimco" }

    fn objective(
        &self,
        model:   &Necst<B>,
        inputs:  Tensor<B, 2>,
        channel: &NoisyChannel,
        noise:   &mut NoiseSource,
        _step:   usize,
    ) -> Result<Objective<B>> {
        let [n, _] = inputs.dims();
        let k      = self.samples;
        let device = inputs.device();

        let q            = repeat_draws(model.encode(inputs.clone()), k);
        let [rows, bits] = q.dims();
        let u            = noise.uniform::<B>(rows, bits, &device);
        let z            = hard_sample(q.clone(), u);
        let received     = channel.corrupt(z.clone(), noise);
        let logits       = model.decode(received);
        let ll           = per_example(log_likelihood(model.domain(), repeat_draws(inputs, k), logits), k, n);
        let log_q        = per_example(code_log_prob(z, q), k, n);

        let ll_host = ll
            .clone()
            .detach()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("reading log-likelihoods back from device: {e:?}"))?;

        let mut weights = Vec::with_capacity(n * k);
        let mut signals = Vec::with_capacity(n * k);
        let mut total   = 0.0f64;
        for row in ll_host.chunks(k) {
            let f: Vec<f64> = row.iter().map(|&v| v as f64).collect();
            total += objective_value(&f, self.objective);
            weights.extend(objective_weights(&f, self.objective).into_iter().map(|w| w as f32));
            signals.extend(learning_signals(&f, self.objective).into_iter().map(|s| s as f32));
        }
        let weights = Tensor::<B, 2>::from_data(TensorData::new(weights, [n, k]), &device);
        let signals = Tensor::<B, 2>::from_data(TensorData::new(signals, [n, k]), &device);

        let reg       = model.regularization(self.reg_param);
        let reg_value = reg.clone().into_scalar().elem::<f64>();
        let mean_ll   = total / n.max(1) as f64;

        let pathwise  = (weights * ll).sum_dim(1);
        let score     = (signals * log_q).sum_dim(1);
        let surrogate = (pathwise + score).mean().neg() + reg;

        Ok(Objective {
            surrogate,
            loss:           -mean_ll + reg_value,
            log_likelihood: mean_ll,
            regularization: reg_value,
        })
    }
}

// ─── Host-side multi-sample math ─────────────────────────────────────────────

pub fn log_mean_exp(values: &[f64]) -> f64 {
    let m = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        return m;
    }
    let s: f64 = values.iter().map(|v| (v - m).exp()).sum();
    m + (s / values.len() as f64).ln()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// L(f_1..f_K) for one example
pub fn objective_value(values: &[f64], objective: VimcoObjective) -> f64 {
    match objective {
        VimcoObjective::Mean       => mean(values),
        VimcoObjective::LogMeanExp => log_mean_exp(values),
    }
}

/// ∂L/∂f_k
pub fn objective_weights(values: &[f64], objective: VimcoObjective) -> Vec<f64> {
    let k = values.len();
    match objective {
        VimcoObjective::Mean => vec![1.0 / k as f64; k],
        VimcoObjective::LogMeanExp => {
            let m = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let e: Vec<f64> = values.iter().map(|v| (v - m).exp()).collect();
            let s: f64 = e.iter().sum();
            e.into_iter().map(|x| x / s).collect()
        }
    }
}

/// b_k for each sample; all zeros when K = 1
pub fn leave_one_out_baselines(values: &[f64], objective: VimcoObjective) -> Vec<f64> {
    let k = values.len();
    if k < 2 {
        return vec![0.0; k];
    }
    let total = values.iter().sum::<f64>();
    (0..k)
        .map(|i| {
            let others = (total - values[i]) / (k - 1) as f64;
            match objective {
                VimcoObjective::Mean => others,
                VimcoObjective::LogMeanExp => {
                    let mut replaced = values.to_vec();
                    replaced[i] = others;
                    log_mean_exp(&replaced)
                }
            }
        })
        .collect()
}

/// Per-sample coefficient of log q(z_k|x) in the surrogate
pub fn learning_signals(values: &[f64], objective: VimcoObjective) -> Vec<f64> {
    let k = values.len();
    if k < 2 {
        return values.to_vec();
    }
    let baselines = leave_one_out_baselines(values, objective);
    match objective {
        VimcoObjective::Mean => values
            .iter()
            .zip(&baselines)
            .map(|(f, b)| (f - b) / k as f64)
            .collect(),
        VimcoObjective::LogMeanExp => {
            let l = log_mean_exp(values);
            baselines.iter().map(|b| l - b).collect()
        }
    }
}

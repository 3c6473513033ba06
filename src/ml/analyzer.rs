// ============================================================
// Layer 5 — Analyzer
// ============================================================
// Post-training analysis of a trained model, on the inference
// backend (no autodiff). Codes are the MAP bits q ≥ 0.5 and pass
// through the channel at the analysis noise level (test_noise,
// falling back to the training noise).
//
//   test         loss over a split + reconstruction and bit errors
//   reconstruct  x → code → channel → decoder mean
//   markov_chain x₀ → x₁ → ... repeating reconstruct, recording
//                snapshots, the first fixed point and the first
//                revisited state
//   generate     uniformly random codes → decoder mean
//
// Binary outputs are binarised at 0.5 so chain states are exact
// bit vectors and cycles can be detected by equality.

use anyhow::{anyhow, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::TensorData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::{batcher::NecstBatcher, dataset::ExampleDataset, source::Datasource};
use crate::domain::{
    config::{ChannelKind, NecstConfig},
    error::NecstError,
    example::{Example, InputDomain},
};
use crate::infra::checkpoint::{CheckpointHandle, CheckpointManager};
use crate::ml::{
    channel::NoisyChannel,
    model::Necst,
    noise::{NoiseSource, NoiseStream},
    objective::evaluate_split,
    sampler::map_code,
};

/// Largest per-dimension change still counted as "unchanged" for continuous states
const CONTINUOUS_FIXED_POINT_TOL: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub examples:             usize,
    pub channel:              ChannelKind,
    pub noise:                f32,
    pub loss:                 f64,
    pub log_likelihood:       f64,
    /// Binary: fraction of wrong bits. Continuous: mean squared error
    pub reconstruction_error: f64,
    /// Fraction of code bits the channel flipped or erased
    pub bit_error_rate:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label:    Option<u32>,
    pub input:    Vec<f32>,
    pub code:     Vec<u8>,
    /// Code after the channel; -1 marks an erasure
    pub received: Vec<f32>,
    pub output:   Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub step:  usize,
    pub state: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTrace {
    pub steps:          usize,
    pub snapshots:      Vec<ChainSnapshot>,
    /// First step t with x_t == x_{t-1}
    pub fixed_point_at: Option<usize>,
    /// First revisit of an earlier binary state: (first seen, period)
    pub cycle:          Option<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSample {
    pub code:   Vec<u8>,
    pub output: Vec<f32>,
}

fn host<B: Backend>(t: Tensor<B, 2>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("reading tensor back from device: {e:?}"))
}

fn bits(values: &[f32]) -> Vec<u8> {
    values.iter().map(|&v| u8::from(v >= 0.5)).collect()
}

pub struct Analyzer<B: Backend> {
    model:      Necst<B>,
    channel:    NoisyChannel,
    batcher:    NecstBatcher<B>,
    device:     B::Device,
    seed:       u64,
    draws:      usize,
    batch_size: usize,
    reg_param:  f64,
}

impl<B: Backend> Analyzer<B> {
    pub fn new(model: Necst<B>, cfg: &NecstConfig, device: B::Device) -> Self {
        Self {
            model,
            channel:    NoisyChannel::new(cfg.channel, cfg.analysis_noise()),
            batcher:    NecstBatcher::new(device.clone()),
            device,
            seed:       cfg.seed,
            draws:      cfg.vimco_samples,
            batch_size: cfg.batch_size,
            reg_param:  cfg.reg_param,
        }
    }

    /// Rebuild the architecture stored with the checkpoint and load its weights
    pub fn from_checkpoint(
        checkpoints: &CheckpointManager,
        handle:      &CheckpointHandle,
        cfg:         &NecstConfig,
        device:      B::Device,
    ) -> Result<Self> {
        let model_cfg = checkpoints.load_model_config(handle)?;
        let model: Necst<B> = model_cfg.init(&device);
        let model = checkpoints.load_model::<B, _>(handle, model, &device)?;
        tracing::info!("Model loaded from {}", handle);
        Ok(Self::new(model, cfg, device))
    }

    /// Inputs must be exactly as wide as the model the checkpoint was trained with
    fn check_width<'a>(&self, examples: impl IntoIterator<Item = &'a Example>) -> Result<()> {
        let expected = self.model.input_dim();
        match examples.into_iter().enumerate().find(|(_, ex)| ex.dim() != expected) {
            Some((i, ex)) => Err(NecstError::config(format!(
                "example {i} has {} features but the checkpoint expects {expected}",
                ex.dim(),
            ))
            .into()),
            None => Ok(()),
        }
    }

    fn noise(&self) -> NoiseSource {
        NoiseSource::for_step(self.seed, 0, NoiseStream::Analysis)
    }

    fn binarize(&self, values: Vec<f32>) -> Vec<f32> {
        match self.model.domain() {
            InputDomain::Binary     => values.into_iter().map(|v| if v >= 0.5 { 1.0 } else { 0.0 }).collect(),
            InputDomain::Continuous => values,
        }
    }

    /// MAP code → channel → decoder mean, one row per example
    fn pass(&self, x: Tensor<B, 2>, noise: &mut NoiseSource) -> Result<(Vec<f32>, Vec<f32>, Vec<f32>)> {
        let code     = map_code(self.model.encode(x));
        let received = self.channel.corrupt(code.clone(), noise);
        let mean     = self.model.mean(self.model.decode(received.clone()));
        Ok((host(code)?, host(received)?, self.binarize(host(mean)?)))
    }

    pub fn reconstruct(&self, examples: &[Example]) -> Result<Vec<Reconstruction>> {
        self.check_width(examples)?;
        let n_bits    = self.model.n_bits();
        let mut noise = self.noise();
        let mut out   = Vec::with_capacity(examples.len());

        for chunk in examples.chunks(self.batch_size.max(1)) {
            let dim   = chunk.first().map(Example::dim).unwrap_or(0);
            let batch = self.batcher.batch(chunk.to_vec());
            let (code, received, mean) = self.pass(batch.inputs, &mut noise)?;
            for (i, ex) in chunk.iter().enumerate() {
                out.push(Reconstruction {
                    label:    ex.label,
                    input:    ex.features.clone(),
                    code:     bits(&code[i * n_bits..(i + 1) * n_bits]),
                    received: received[i * n_bits..(i + 1) * n_bits].to_vec(),
                    output:   mean[i * dim..(i + 1) * dim].to_vec(),
                });
            }
        }
        Ok(out)
    }

    pub fn test(&self, dataset: ExampleDataset) -> Result<TestReport> {
        self.check_width(dataset.examples())?;
        let examples = dataset.examples().to_vec();
        let mut source = Datasource::<B>::new(dataset, self.batch_size, false, self.seed, self.device.clone());
        let eval = evaluate_split(
            &self.model, &mut source, &self.channel, self.draws, &mut self.noise(), self.reg_param,
        )?;

        let recons = self.reconstruct(&examples)?;
        let (mut err_sum, mut err_count, mut flipped, mut total_bits) = (0.0f64, 0usize, 0usize, 0usize);
        for r in &recons {
            for (x, y) in r.input.iter().zip(&r.output) {
                err_sum += match self.model.domain() {
                    InputDomain::Binary     => f64::from(u8::from(x != y)),
                    InputDomain::Continuous => f64::from((x - y) * (x - y)),
                };
                err_count += 1;
            }
            flipped    += r.code.iter().zip(&r.received).filter(|&(&c, &y)| f32::from(c) != y).count();
            total_bits += r.code.len();
        }

        Ok(TestReport {
            examples:             eval.examples,
            channel:              self.channel.kind(),
            noise:                self.channel.noise(),
            loss:                 eval.loss,
            log_likelihood:       eval.log_likelihood,
            reconstruction_error: err_sum / err_count.max(1) as f64,
            bit_error_rate:       flipped as f64 / total_bits.max(1) as f64,
        })
    }

    /// Iterate x → decode(channel(encode(x))) from `start`
    pub fn markov_chain(&self, start: &Example, total_steps: usize, record_every: usize) -> Result<ChainTrace> {
        self.check_width([start])?;
        let dim       = start.dim();
        let binary    = self.model.domain() == InputDomain::Binary;
        let mut noise = self.noise();
        let mut state = self.binarize(start.features.clone());

        let mut snapshots      = vec![ChainSnapshot { step: 0, state: state.clone() }];
        let mut fixed_point_at = None;
        let mut cycle          = None;
        let mut seen: HashMap<Vec<u8>, usize> = HashMap::new();
        if binary {
            seen.insert(bits(&state), 0);
        }

        for step in 1..=total_steps {
            let x = Tensor::<B, 2>::from_data(TensorData::new(state.clone(), [1, dim]), &self.device);
            let (_, _, next) = self.pass(x, &mut noise)?;

            let unchanged = if binary {
                next == state
            } else {
                next.iter().zip(&state).all(|(a, b)| (a - b).abs() <= CONTINUOUS_FIXED_POINT_TOL)
            };
            if unchanged && fixed_point_at.is_none() {
                fixed_point_at = Some(step);
            }
            if binary && cycle.is_none() {
                let key = bits(&next);
                match seen.get(&key) {
                    Some(&first) => cycle = Some((first, step - first)),
                    None => {
                        seen.insert(key, step);
                    }
                }
            }

            state = next;
            if step % record_every.max(1) == 0 {
                snapshots.push(ChainSnapshot { step, state: state.clone() });
            }
        }

        tracing::info!(
            "Markov chain: {} steps, fixed point at {:?}, cycle {:?}",
            total_steps, fixed_point_at, cycle,
        );
        Ok(ChainTrace { steps: total_steps, snapshots, fixed_point_at, cycle })
    }

    /// Decode `count` codes drawn uniformly from {0,1}^n_bits
    pub fn generate(&self, count: usize) -> Result<Vec<GeneratedSample>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let n_bits    = self.model.n_bits();
        let dim       = self.model.input_dim();
        let mut noise = NoiseSource::for_step(self.seed, 1, NoiseStream::Analysis);

        let codes  = noise.uniform::<B>(count, n_bits, &self.device).lower_elem(0.5).float();
        let mean   = self.binarize(host(self.model.mean(self.model.decode(codes.clone())))?);
        let codes  = host(codes)?;

        Ok((0..count)
            .map(|i| GeneratedSample {
                code:   bits(&codes[i * n_bits..(i + 1) * n_bits]),
                output: mean[i * dim..(i + 1) * dim].to_vec(),
            })
            .collect())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Activation;
    use crate::ml::model::NecstModelConfig;
    use burn::{backend::NdArray, module::Param};

    type TestBackend = NdArray;

    const D: usize = 4;

    fn square(diag: f32, device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        let mut w = vec![0.0f32; D * D];
        for i in 0..D {
            w[i * D + i] = diag;
        }
        Tensor::from_data(TensorData::new(w, [D, D]), device)
    }

    /// Encoder copies bits into the code, decoder copies them back
    fn identity_model() -> Necst<TestBackend> {
        let device = Default::default();
        let mut model: Necst<TestBackend> =
            NecstModelConfig::new(D, D, vec![], vec![], Activation::Relu, true, InputDomain::Binary)
                .init(&device);
        model.encoder.head.weight = Param::from_tensor(square(10.0, &device));
        model.encoder.head.bias   = Some(Param::from_tensor(Tensor::full([D], -5.0, &device)));
        model.decoder.head.weight = Param::from_tensor(square(10.0, &device));
        model.decoder.head.bias   = Some(Param::from_tensor(Tensor::full([D], 0.5, &device)));
        model
    }

    fn analyzer(noise: f32, channel: ChannelKind) -> Analyzer<TestBackend> {
        let cfg = NecstConfig { noise, channel, is_binary: true, batch_size: 2, ..NecstConfig::default() };
        Analyzer::new(identity_model(), &cfg, Default::default())
    }

    fn examples() -> Vec<Example> {
        vec![
            Example::new(vec![1.0, 0.0, 1.0, 0.0]).with_label(3),
            Example::new(vec![0.0, 0.0, 1.0, 1.0]),
            Example::new(vec![1.0, 1.0, 1.0, 1.0]),
        ]
    }

    #[test]
    fn test_noiseless_reconstruction_is_exact() {
        let recons = analyzer(0.0, ChannelKind::Bsc).reconstruct(&examples()).unwrap();
        assert_eq!(recons.len(), 3);
        for (r, ex) in recons.iter().zip(examples()) {
            assert_eq!(r.output, ex.features);
            assert_eq!(r.received, ex.features);
        }
        assert_eq!(recons[0].code, vec![1, 0, 1, 0]);
        assert_eq!(recons[0].label, Some(3));
    }

    #[test]
    fn test_noiseless_chain_reaches_fixed_point_immediately() {
        let trace = analyzer(0.0, ChannelKind::Bsc)
            .markov_chain(&examples()[1], 100, 10)
            .unwrap();
        assert_eq!(trace.fixed_point_at, Some(1));
        assert_eq!(trace.cycle, Some((0, 1)));
        assert_eq!(trace.snapshots.len(), 11);
        assert!(trace.snapshots.iter().all(|s| s.state == examples()[1].features));
    }

    #[test]
    fn test_full_bsc_noise_flips_every_bit() {
        let report = analyzer(1.0, ChannelKind::Bsc)
            .test(ExampleDataset::new(examples()))
            .unwrap();
        assert_eq!(report.bit_error_rate, 1.0);
        assert_eq!(report.reconstruction_error, 1.0);
        assert_eq!(report.examples, 3);
    }

    #[test]
    fn test_noiseless_test_report() {
        let report = analyzer(0.0, ChannelKind::Bec)
            .test(ExampleDataset::new(examples()))
            .unwrap();
        assert_eq!(report.bit_error_rate, 0.0);
        assert_eq!(report.reconstruction_error, 0.0);
        assert!(report.loss.is_finite());
    }

    #[test]
    fn test_full_erasure_chain_settles_on_decoder_prior() {
        // every bit erased: the decoder sees zeros and outputs σ(0.5) → 1
        let trace = analyzer(1.0, ChannelKind::Bec)
            .markov_chain(&examples()[1], 5, 1)
            .unwrap();
        assert_eq!(trace.snapshots[1].state, vec![1.0; D]);
        assert_eq!(trace.fixed_point_at, Some(2));
    }

    #[test]
    fn test_width_mismatch_is_config_error() {
        let a       = analyzer(0.0, ChannelKind::Bsc);
        let narrow  = Example::new(vec![1.0, 0.0, 1.0]);
        let is_config = |err: anyhow::Error| {
            matches!(err.downcast_ref::<NecstError>(), Some(NecstError::Configuration(_)))
        };

        assert!(is_config(a.reconstruct(&[examples()[0].clone(), narrow.clone()]).unwrap_err()));
        assert!(is_config(a.markov_chain(&narrow, 3, 1).unwrap_err()));
        assert!(is_config(a.test(ExampleDataset::new(vec![narrow])).unwrap_err()));
    }

    #[test]
    fn test_generate_shapes() {
        let samples = analyzer(0.0, ChannelKind::Bsc).generate(5).unwrap();
        assert_eq!(samples.len(), 5);
        for s in &samples {
            assert_eq!(s.code.len(), D);
            // identity decoder: the output reproduces the code
            assert_eq!(s.output, s.code.iter().map(|&b| f32::from(b)).collect::<Vec<_>>());
        }
    }
}

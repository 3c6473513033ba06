// ============================================================
// Layer 5 — NECST Model (encoder + decoder MLPs)
// ============================================================
// Architecture:
//
//   x [batch, D]
//     → hidden Linear + activation, one per enc_arch width
//     → Linear head → σ → clamp      q [batch, n_bits]
//   (sample / channel happen outside the model)
//   received code [batch, n_bits]
//     → signed embedding (0→-1, 1→+1, erased→0)
//     → hidden Linear + activation, one per dec_arch width
//     → Linear head                  logits [batch, D]
//
// With `non_linear_act = false` the last encoder hidden layer
// stays linear, so the code logits are an affine map of the
// previous layer's features.
//
// The activation and likelihood flags are not parameters; they
// are carried as `Ignored` fields so the module derive leaves
// them out of the record.
//
// Reference: Choi et al. (2019) "Neural Joint Source-Channel Coding"

use burn::{
    module::Ignored,
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

use crate::domain::config::{Activation, NecstConfig};
use crate::domain::example::InputDomain;
use crate::ml::channel::decoder_input;
use crate::ml::sampler::EPS;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct NecstModelConfig {
    pub input_dim:      usize,
    pub n_bits:         usize,
    pub enc_arch:       Vec<usize>,
    pub dec_arch:       Vec<usize>,
    pub activation:     Activation,
    pub non_linear_act: bool,
    pub domain:         InputDomain,
}

impl NecstModelConfig {
    /// Architecture of a run, sized to the data it will see
    pub fn from_run(cfg: &NecstConfig, input_dim: usize, domain: InputDomain) -> Self {
        Self::new(
            input_dim,
            cfg.n_bits,
            cfg.enc_arch.clone(),
            cfg.dec_arch.clone(),
            cfg.activation,
            cfg.non_linear_act,
            domain,
        )
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Necst<B> {
        let (enc_hidden, enc_out) = stack(self.input_dim, &self.enc_arch, device);
        let (dec_hidden, dec_out) = stack(self.n_bits, &self.dec_arch, device);
        let encoder = Encoder {
            hidden:   enc_hidden,
            head:     LinearConfig::new(enc_out, self.n_bits).init(device),
            settings: Ignored(LayerSettings {
                activation:        self.activation,
                linear_last_layer: !self.non_linear_act,
            }),
        };
        let decoder = Decoder {
            hidden:   dec_hidden,
            head:     LinearConfig::new(dec_out, self.input_dim).init(device),
            settings: Ignored(LayerSettings {
                activation:        self.activation,
                linear_last_layer: false,
            }),
        };
        Necst { encoder, decoder, domain: Ignored(self.domain) }
    }
}

/// Hidden layers for the given widths, plus the width that feeds the head
fn stack<B: Backend>(input: usize, widths: &[usize], device: &B::Device) -> (Vec<Linear<B>>, usize) {
    let mut layers = Vec::with_capacity(widths.len());
    let mut prev   = input;
    for &w in widths {
        layers.push(LinearConfig::new(prev, w).init(device));
        prev = w;
    }
    (layers, prev)
}

pub fn activate<B: Backend, const D: usize>(act: Activation, x: Tensor<B, D>) -> Tensor<B, D> {
    match act {
        Activation::Sigmoid   => activation::sigmoid(x),
        Activation::Tanh      => activation::tanh(x),
        Activation::Softplus  => activation::softplus(x, 1.0),
        Activation::LeakyRelu => activation::leaky_relu(x, 0.2),
        Activation::Relu      => activation::relu(x),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSettings {
    pub activation:        Activation,
    pub linear_last_layer: bool,
}

fn run_hidden<B: Backend>(layers: &[Linear<B>], settings: LayerSettings, x: Tensor<B, 2>) -> Tensor<B, 2> {
    let last = layers.len().saturating_sub(1);
    layers.iter().enumerate().fold(x, |h, (i, layer)| {
        let h = layer.forward(h);
        if i == last && settings.linear_last_layer { h } else { activate(settings.activation, h) }
    })
}

fn squared_norm<B: Backend>(layer: &Linear<B>) -> Tensor<B, 1> {
    layer.weight.val().powf_scalar(2.0).sum()
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub hidden:   Vec<Linear<B>>,
    pub head:     Linear<B>,
    pub settings: Ignored<LayerSettings>,
}

impl<B: Backend> Encoder<B> {
    /// x: [batch, D] → bit probabilities q: [batch, n_bits]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = run_hidden(&self.hidden, self.settings.0, x);
        activation::sigmoid(self.head.forward(h)).clamp(EPS, 1.0 - EPS)
    }

    /// Σ ‖W‖² over every encoder weight matrix
    pub fn weight_norm(&self) -> Tensor<B, 1> {
        self.hidden
            .iter()
            .fold(squared_norm(&self.head), |acc, layer| acc + squared_norm(layer))
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub hidden:   Vec<Linear<B>>,
    pub head:     Linear<B>,
    pub settings: Ignored<LayerSettings>,
}

impl<B: Backend> Decoder<B> {
    /// received: [batch, n_bits] channel symbols → logits: [batch, D]
    pub fn forward(&self, received: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = run_hidden(&self.hidden, self.settings.0, decoder_input(received));
        self.head.forward(h)
    }
}

#[derive(Module, Debug)]
pub struct Necst<B: Backend> {
    pub encoder: Encoder<B>,
    pub decoder: Decoder<B>,
    pub domain:  Ignored<InputDomain>,
}

impl<B: Backend> Necst<B> {
    pub fn encode(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.encoder.forward(x)
    }

    pub fn decode(&self, received: Tensor<B, 2>) -> Tensor<B, 2> {
        self.decoder.forward(received)
    }

    /// Decoder mean in [0, 1] for the given logits
    pub fn mean(&self, logits: Tensor<B, 2>) -> Tensor<B, 2> {
        activation::sigmoid(logits)
    }

    /// 0.5 · reg_param · Σ‖W_enc‖², shape [1]
    pub fn regularization(&self, reg_param: f64) -> Tensor<B, 1> {
        self.encoder.weight_norm().mul_scalar(0.5 * reg_param)
    }

    pub fn domain(&self) -> InputDomain { self.domain.0 }

    pub fn n_bits(&self) -> usize {
        let [_, bits] = self.encoder.head.weight.val().dims();
        bits
    }

    pub fn input_dim(&self) -> usize {
        let [_, dim] = self.decoder.head.weight.val().dims();
        dim
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config(enc: Vec<usize>, dec: Vec<usize>) -> NecstModelConfig {
        NecstModelConfig::new(12, 5, enc, dec, Activation::Relu, true, InputDomain::Binary)
    }

    #[test]
    fn test_shapes_through_encoder_and_decoder() {
        let device = Default::default();
        let model: Necst<TestBackend> = config(vec![16], vec![8, 8]).init(&device);
        let x = Tensor::<TestBackend, 2>::ones([3, 12], &device);
        let q = model.encode(x);
        assert_eq!(q.dims(), [3, 5]);
        assert_eq!(model.decode(q).dims(), [3, 12]);
        assert_eq!(model.n_bits(), 5);
        assert_eq!(model.input_dim(), 12);
    }

    #[test]
    fn test_empty_architecture_is_single_linear_map() {
        let device = Default::default();
        let model: Necst<TestBackend> = config(vec![], vec![]).init(&device);
        assert!(model.encoder.hidden.is_empty());
        let x = Tensor::<TestBackend, 2>::zeros([2, 12], &device);
        assert_eq!(model.encode(x).dims(), [2, 5]);
    }

    #[test]
    fn test_probabilities_strictly_inside_unit_interval() {
        let device = Default::default();
        let model: Necst<TestBackend> = config(vec![4], vec![4]).init(&device);
        let x = Tensor::<TestBackend, 2>::ones([2, 12], &device).mul_scalar(1e4);
        let q = model.encode(x).into_data().to_vec::<f32>().unwrap();
        assert!(q.iter().all(|&p| p >= EPS && p <= 1.0 - EPS));
    }

    #[test]
    fn test_regularization_scales_with_reg_param() {
        let device = Default::default();
        let model: Necst<TestBackend> = config(vec![4], vec![4]).init(&device);
        let r1 = model.regularization(1.0).into_scalar();
        let r2 = model.regularization(2.0).into_scalar();
        assert!(r1 > 0.0);
        approx::assert_relative_eq!(r2, 2.0 * r1, max_relative = 1e-5);
        assert_eq!(model.regularization(0.0).into_scalar(), 0.0);
    }

    #[test]
    fn test_linear_last_layer_flag() {
        let device = Default::default();
        let cfg = NecstModelConfig { non_linear_act: false, ..config(vec![4, 4], vec![4]) };
        let model: Necst<TestBackend> = cfg.init(&device);
        assert!(model.encoder.settings.0.linear_last_layer);
        assert!(!model.decoder.settings.0.linear_last_layer);
    }
}

// ============================================================
// Layer 5 — Noisy Channel
// ============================================================
// Corrupts the transmitted code before the decoder sees it.
//
//   BSC(p):  c' = 1 - c   where u < p,   c' = c otherwise
//   BEC(p):  c' = ERASED  where u < p,   c' = c otherwise
//
// `u` is one U[0,1) draw per bit. The flip is written as a
// selection between `c` and `1 - c`, so gradients of a relaxed
// code flow through both branches. An erased bit carries no
// gradient at all.
//
// The decoder never sees the raw symbols: `decoder_input` maps
// them to a signed embedding (0 → -1, 1 → +1, erased → 0) so an
// erasure sits exactly between the two bit values.

use burn::prelude::*;

use crate::domain::config::ChannelKind;
use crate::ml::noise::NoiseSource;

/// Channel symbol for an erased bit
pub const ERASED: f32 = -1.0;

/// Anything below this is treated as an erasure by `decoder_input`
const ERASURE_THRESHOLD: f32 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisyChannel {
    kind:  ChannelKind,
    noise: f32,
}

impl NoisyChannel {
    pub fn new(kind: ChannelKind, noise: f32) -> Self {
        Self { kind, noise }
    }

    pub fn kind(&self) -> ChannelKind { self.kind }

    pub fn noise(&self) -> f32 { self.noise }

    /// Corrupt `code` ([batch, bits]) with fresh draws from `noise`
    pub fn corrupt<B: Backend>(&self, code: Tensor<B, 2>, noise: &mut NoiseSource) -> Tensor<B, 2> {
        if self.noise <= 0.0 {
            return code;
        }
        if self.noise >= 1.0 {
            return self.corrupt_all(code);
        }
        let [rows, cols] = code.dims();
        let uniform = noise.uniform::<B>(rows, cols, &code.device());
        self.apply(code, uniform)
    }

    /// Corrupt every position where `uniform < p`
    pub fn apply<B: Backend>(&self, code: Tensor<B, 2>, uniform: Tensor<B, 2>) -> Tensor<B, 2> {
        let hit = uniform.lower_elem(self.noise);
        match self.kind {
            ChannelKind::Bsc => {
                let flipped = code.clone().neg().add_scalar(1.0);
                code.mask_where(hit, flipped)
            }
            ChannelKind::Bec => code.mask_fill(hit, ERASED),
        }
    }

    fn corrupt_all<B: Backend>(&self, code: Tensor<B, 2>) -> Tensor<B, 2> {
        match self.kind {
            ChannelKind::Bsc => code.neg().add_scalar(1.0),
            ChannelKind::Bec => code.zeros_like().add_scalar(ERASED),
        }
    }
}

/// Signed decoder embedding: bit b → 2b - 1, erasure → 0
pub fn decoder_input<B: Backend>(received: Tensor<B, 2>) -> Tensor<B, 2> {
    let erased = received.clone().lower_elem(ERASURE_THRESHOLD);
    received.mul_scalar(2.0).sub_scalar(1.0).mask_fill(erased, 0.0)
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

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let code = tensor(vec![0.0, 1.0, 1.0, 0.0], 2, 2);
        for kind in [ChannelKind::Bsc, ChannelKind::Bec] {
            let out = NoisyChannel::new(kind, 0.0).corrupt(code.clone(), &mut NoiseSource::new(1));
            assert_eq!(values(out), vec![0.0, 1.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn test_full_noise_flips_or_erases_everything() {
        let code = tensor(vec![0.0, 1.0, 1.0, 0.0], 2, 2);
        let bsc = NoisyChannel::new(ChannelKind::Bsc, 1.0).corrupt(code.clone(), &mut NoiseSource::new(1));
        assert_eq!(values(bsc), vec![1.0, 0.0, 0.0, 1.0]);
        let bec = NoisyChannel::new(ChannelKind::Bec, 1.0).corrupt(code, &mut NoiseSource::new(1));
        assert_eq!(values(bec), vec![ERASED; 4]);
    }

    #[test]
    fn test_apply_hits_only_positions_below_rate() {
        let code    = tensor(vec![0.0, 1.0, 0.0, 1.0], 1, 4);
        let uniform = tensor(vec![0.05, 0.05, 0.9, 0.9], 1, 4);
        let bsc = NoisyChannel::new(ChannelKind::Bsc, 0.1).apply(code.clone(), uniform.clone());
        assert_eq!(values(bsc), vec![1.0, 0.0, 0.0, 1.0]);
        let bec = NoisyChannel::new(ChannelKind::Bec, 0.1).apply(code, uniform);
        assert_eq!(values(bec), vec![ERASED, ERASED, 0.0, 1.0]);
    }

    #[test]
    fn test_bsc_flip_rate_close_to_p() {
        let n    = 20_000;
        let code = tensor(vec![0.0; n], 1, n);
        let out  = NoisyChannel::new(ChannelKind::Bsc, 0.1).corrupt(code, &mut NoiseSource::new(9));
        let rate = values(out).iter().sum::<f32>() / n as f32;
        approx::assert_abs_diff_eq!(rate, 0.1, epsilon = 0.01);
    }

    #[test]
    fn test_decoder_input_embedding() {
        let received = tensor(vec![0.0, 1.0, ERASED], 1, 3);
        assert_eq!(values(decoder_input(received)), vec![-1.0, 1.0, 0.0]);
    }
}

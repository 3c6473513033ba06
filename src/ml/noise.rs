// ============================================================
// Layer 5 — Host Noise Source
// ============================================================
// All randomness inside a training step (code sampling, channel
// corruption) is drawn here on the host and uploaded as a tensor.
//
// Each step gets its own generator seeded from
// (run seed, global step, stream). A run resumed from a
// checkpoint therefore draws exactly the noise the uninterrupted
// run would have drawn, and validation noise never depends on how
// many training steps consumed randomness before it.

use burn::{prelude::*, tensor::TensorData};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Independent random streams derived from one run seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseStream {
    Train,
    Eval,
    Analysis,
}

impl NoiseStream {
    fn tag(self) -> u64 {
        match self {
            Self::Train    => 0x7472_6169_6e00_0001,
            Self::Eval     => 0x6576_616c_0000_0002,
            Self::Analysis => 0x616e_616c_7973_0003,
        }
    }
}

/// SplitMix64 finaliser, used to decorrelate neighbouring seeds
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Generator for one (step, stream) pair of a run
    pub fn for_step(seed: u64, step: usize, stream: NoiseStream) -> Self {
        Self::new(mix(mix(seed ^ stream.tag()) ^ step as u64))
    }

    /// `n` draws from U[0, 1)
    pub fn uniform_values(&mut self, n: usize) -> Vec<f32> {
        (0..n).map(|_| self.rng.gen::<f32>()).collect()
    }

    /// Tensor of shape `[rows, cols]` filled with U[0, 1) draws
    pub fn uniform<B: Backend>(&mut self, rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
        let values = self.uniform_values(rows * cols);
        Tensor::from_data(TensorData::new(values, [rows, cols]), device)
    }
}

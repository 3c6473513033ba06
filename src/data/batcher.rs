// ============================================================
// Layer 4 — Example Batcher
// ============================================================
// Implements burn's Batcher trait to stack a Vec<Example> into
// one input tensor.
//
//   Input:  Vec of N Examples, each with D features
//   Output: NecstBatch with inputs of shape [N, D]
//
// All features are flattened row-major into one Vec<f32> and
// handed to burn as TensorData with an explicit [N, D] shape.
// Labels stay on the examples; NECST is unsupervised and the
// batch carries inputs only.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::example::Example;

// ─── NecstBatch ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct NecstBatch<B: Backend> {
    /// Input vectors — shape: [batch_size, input_dim]
    pub inputs: Tensor<B, 2>,
}

// ─── NecstBatcher ────────────────────────────────────────────────────────────
/// Holds the target device so tensors land on the right CPU/GPU.
#[derive(Clone, Debug)]
pub struct NecstBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> NecstBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<Example, NecstBatch<B>> for NecstBatcher<B> {
    fn batch(&self, items: Vec<Example>) -> NecstBatch<B> {
        let batch_size = items.len();
        let input_dim  = items.first().map(Example::dim).unwrap_or(0);

        let flat: Vec<f32> = items
            .iter()
            .flat_map(|e| e.features.iter().copied())
            .collect();

        let inputs = Tensor::<B, 2>::from_data(
            TensorData::new(flat, [batch_size, input_dim]),
            &self.device,
        );

        NecstBatch { inputs }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shape_and_values() {
        let batcher = NecstBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            Example::new(vec![0.0, 1.0]),
            Example::new(vec![1.0, 1.0]),
            Example::new(vec![0.0, 0.0]),
        ]);
        assert_eq!(batch.inputs.dims(), [3, 2]);
        let values = batch.inputs.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_labels_do_not_affect_inputs() {
        let batcher = NecstBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            Example::new(vec![0.0, 1.0]).with_label(3),
            Example::new(vec![1.0, 0.0]),
        ]);
        assert_eq!(batch.inputs.dims(), [2, 2]);
        assert_eq!(batch.inputs.into_data().to_vec::<f32>().unwrap(), vec![0.0, 1.0, 1.0, 0.0]);
    }
}

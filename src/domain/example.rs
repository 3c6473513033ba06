// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// A single input vector as it comes out of a data source.
// Plain data, no tensors: the batcher in Layer 4 turns
// these into burn tensors.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// One datapoint: a flat feature vector plus an optional class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Flattened input, one value per input dimension
    pub features: Vec<f32>,

    /// Class label when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<u32>,
}

impl Example {
    pub fn new(features: Vec<f32>) -> Self {
        Self { features, label: None }
    }

    pub fn with_label(mut self, label: u32) -> Self {
        self.label = Some(label);
        self
    }

    /// Number of input dimensions
    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// True when every feature is exactly 0 or 1
    pub fn is_binary(&self) -> bool {
        self.features.iter().all(|&v| v == 0.0 || v == 1.0)
    }
}

/// Whether inputs are bit vectors or continuous values in [0, 1].
/// Decides the decoder's likelihood (Bernoulli vs Gaussian).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputDomain {
    Binary,
    Continuous,
}

impl InputDomain {
    pub fn from_flag(is_binary: bool) -> Self {
        if is_binary { Self::Binary } else { Self::Continuous }
    }
}

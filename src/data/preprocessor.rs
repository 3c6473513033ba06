// ============================================================
// Layer 4 — Feature Preprocessor
// ============================================================
// Brings raw feature vectors into the range the decoder models.
//
// Why?
//   The decoder's means are sigmoid outputs, so every target
//   must lie in [0, 1]. Binary runs (Bernoulli likelihood)
//   additionally need exact 0/1 targets.
//
// Steps (applied per feature, in order):
//   1. Replace non-finite values with 0
//   2. Clamp into [0, 1]
//   3. If binarising, threshold at 0.5
//
// Clamped and repaired values are counted and reported once
// as a warning instead of failing the run.

use crate::domain::example::Example;

/// Threshold used when a continuous feature is binarised
pub const BINARIZE_THRESHOLD: f32 = 0.5;

pub struct Preprocessor {
    binarize: bool,
}

/// What the preprocessor had to change
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessReport {
    pub non_finite: usize,
    pub clamped:    usize,
    pub binarized:  usize,
}

impl Preprocessor {
    /// `binarize = true` for runs that model inputs as Bernoulli
    pub fn new(binarize: bool) -> Self {
        Self { binarize }
    }

    /// Clean every example in place and return a summary of the repairs
    pub fn prepare(&self, examples: &mut [Example]) -> PreprocessReport {
        let mut report = PreprocessReport::default();

        for value in examples.iter_mut().flat_map(|e| e.features.iter_mut()) {
            if !value.is_finite() {
                *value = 0.0;
                report.non_finite += 1;
            }
            if !(0.0..=1.0).contains(value) {
                *value = value.clamp(0.0, 1.0);
                report.clamped += 1;
            }
            if self.binarize && *value != 0.0 && *value != 1.0 {
                *value = if *value >= BINARIZE_THRESHOLD { 1.0 } else { 0.0 };
                report.binarized += 1;
            }
        }

        if report.non_finite + report.clamped > 0 {
            tracing::warn!(
                "Preprocessor repaired {} non-finite and clamped {} out-of-range features",
                report.non_finite,
                report.clamped,
            );
        }
        if report.binarized > 0 {
            tracing::info!("Binarised {} continuous features at {}", report.binarized, BINARIZE_THRESHOLD);
        }
        report
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_into_unit_interval() {
        let mut ex = vec![Example::new(vec![-0.5, 0.3, 1.7])];
        let report = Preprocessor::new(false).prepare(&mut ex);
        assert_eq!(ex[0].features, vec![0.0, 0.3, 1.0]);
        assert_eq!(report.clamped, 2);
    }

    #[test]
    fn test_binarizes_at_half() {
        let mut ex = vec![Example::new(vec![0.49, 0.5, 0.9, 1.0])];
        let report = Preprocessor::new(true).prepare(&mut ex);
        assert_eq!(ex[0].features, vec![0.0, 1.0, 1.0, 1.0]);
        assert_eq!(report.binarized, 3);
    }

    #[test]
    fn test_repairs_nan() {
        let mut ex = vec![Example::new(vec![f32::NAN, 0.2])];
        let report = Preprocessor::new(false).prepare(&mut ex);
        assert_eq!(ex[0].features[0], 0.0);
        assert_eq!(report.non_finite, 1);
    }
}

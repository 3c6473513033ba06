// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Shuffles examples with a seeded RNG and cuts them into three
// sets:
//   - train: used for gradient steps
//   - valid: picks the "best" checkpoint
//   - test:  held out for post-training analysis
//
// The shuffle is seeded from the run seed so a resumed run sees
// exactly the same split as the run it continues.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// The three splits of a dataset
#[derive(Debug, Clone)]
pub struct Splits<T> {
    pub train: Vec<T>,
    pub valid: Vec<T>,
    pub test:  Vec<T>,
}

/// Fractions of the data routed to validation and test; the rest trains
#[derive(Debug, Clone, Copy)]
pub struct SplitFractions {
    pub valid: f64,
    pub test:  f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self { valid: 0.1, test: 0.1 }
    }
}

/// Shuffle `samples` with `seed` and split into train/valid/test.
///
/// Both held-out sets get at least one example whenever there are
/// three or more samples, so a tiny dataset still validates.
pub fn split_three<T>(mut samples: Vec<T>, fractions: SplitFractions, seed: u64) -> Splits<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let held  = |f: f64| -> usize {
        let n = ((total as f64) * f).round() as usize;
        if total >= 3 && f > 0.0 { n.max(1) } else { n }
    };
    let n_valid = held(fractions.valid).min(total);
    let n_test  = held(fractions.test).min(total - n_valid);

    // split_off(n) keeps [0..n) and returns [n..)
    let test  = samples.split_off(total - n_test);
    let valid = samples.split_off(total - n_test - n_valid);

    tracing::debug!(
        "Dataset split: {} train, {} valid, {} test",
        samples.len(),
        valid.len(),
        test.len(),
    );

    Splits { train: samples, valid, test }
}

// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The domain layer stays burn-free.
//
// What's in this layer:
//
//   backend.rs    — NdArray (default) or Wgpu backend, device choice
//   noise.rs      — Host RNG streams keyed by (seed, step)
//   channel.rs    — BSC / BEC corruption, decoder input embedding
//   sampler.rs    — Relaxed, hard and MAP codes; temperature schedule
//   model.rs      — Encoder and decoder MLPs
//   objective.rs  — Likelihoods, code log-probability, evaluation
//   estimator.rs  — Pathwise (relaxed) and VIMCO gradient estimators
//   trainer.rs    — Training loop with validation and checkpointing
//   analyzer.rs   — Test report, reconstructions, Markov chain,
//                   generation from a trained checkpoint
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Choi et al. (2019) Neural Joint Source-Channel Coding

pub mod backend;
pub mod noise;
pub mod channel;
pub mod sampler;

/// Encoder / decoder architecture
pub mod model;

pub mod objective;
pub mod estimator;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Post-training analysis of a checkpoint
pub mod analyzer;

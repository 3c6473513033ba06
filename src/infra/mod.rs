// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of a run:
//
//   layout.rs      — Run directories under logdir / outdir,
//                    config.json dump
//
//   checkpoint.rs  — Model + optimiser records via burn's
//                    NamedMpkGzFileRecorder, checkpoint
//                    metadata, latest/best pointers
//
//   metrics.rs     — Per-interval losses to CSV and JSON lines
//
//   run_log.rs     — log.txt, and recovery of the best
//                    checkpoint from it
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Run directory layout
pub mod layout;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Interval metrics logger
pub mod metrics;

/// Human-readable run log
pub mod run_log;

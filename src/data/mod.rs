// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between "where do examples come from" and
// "tensor batches for the training loop":
//
//   SyntheticSource / JsonFileSource   → Vec<Example>
//       │
//       ▼
//   Preprocessor      → clamp to [0, 1], binarise if requested
//       │
//       ▼
//   split_three       → seeded train / valid / test
//       │
//       ▼
//   ExampleDataset    → implements burn's Dataset trait
//       │
//       ▼
//   NecstBatcher      → stacks examples into [N, D] tensors
//       │
//       ▼
//   Datasource        → epoch-aware batch stream for the loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads examples from JSON files
pub mod loader;

/// Seeded binary vectors for the "random" datasource
pub mod synthetic;

/// Clamps and binarises raw features
pub mod preprocessor;

/// Implements burn's Dataset trait for examples
pub mod dataset;

/// Implements burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/valid/test split
pub mod splitter;

/// Epoch-aware batch stream with end-of-epoch signalling
pub mod source;

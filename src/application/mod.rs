// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal: train a model, or analyse a trained one.
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Loading, cleaning and splitting the configured data
pub mod prepare;

// The training workflow
pub mod train_use_case;

// The post-training analysis workflow
pub mod analyze_use_case;

// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer loads examples through `ExampleSource`
// without knowing whether they are generated in memory or read
// from a file:
//
//   - SyntheticSource  → seeded binary vectors ("random")
//   - JsonFileSource   → vectors serialised as JSON
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::example::Example;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce the full set of examples for a run.
pub trait ExampleSource {
    /// Short name used in logs and in the run directory layout
    fn name(&self) -> &str;

    /// Load every available example. Order must be deterministic so a
    /// seeded split is reproducible across runs.
    fn load_all(&self) -> Result<Vec<Example>>;
}

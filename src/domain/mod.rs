// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the concepts
// of a NECST run.
//
// Rules for this layer:
//   - NO burn framework types allowed here
//   - NO file I/O
//   - Only plain data, configuration, and the error taxonomy
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Immutable run configuration and its closed option sets
pub mod config;

// Typed error taxonomy raised through anyhow
pub mod error;

// A single input vector and its domain (binary / continuous)
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;

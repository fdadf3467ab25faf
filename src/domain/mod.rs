// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// This is where the early stopping rule lives, so it can be
// tested without building a single tensor.

// One student's interaction history + the feature layout
pub mod sequence;

// Epoch metrics, best score summary, early stopping state
pub mod metrics;

// Core abstractions (traits) that other layers implement
pub mod traits;

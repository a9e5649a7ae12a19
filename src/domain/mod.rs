// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with, independent of Burn and of file formats:
//
//   turn.rs   — one dialogue turn: context, input act, target
//   params.rs — framework-free snapshots of model parameters
//   traits.rs — the seams other layers implement
//
// Nothing in here touches tensors, devices or the disk.

/// A dialogue turn used for training and generation
pub mod turn;

/// Parameter dictionaries and assignment reports
pub mod params;

/// Core abstractions (traits) that other layers implement
pub mod traits;

// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal per command (train, generate, inspect).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// Sentence generation from a trained checkpoint
pub mod generate_use_case;

// Checkpoint listing
pub mod inspect_use_case;

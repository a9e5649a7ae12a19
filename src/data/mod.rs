// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From corpus files to tensor batches:
//
//   *.jsonl files
//       │
//       ▼
//   JsonlLoader       → DialogueTurn { context, input, target }
//       │
//       ▼
//   Preprocessor      → cleaned text
//       │
//       ▼
//   Tokenizer         → token ids (infra::tokenizer_store)
//       │
//       ▼
//   Seq2SeqSample     → padded encoder / decoder / target ids
//       │
//       ▼
//   split_train_val   → training and validation sets
//       │
//       ▼
//   Seq2SeqBatcher    → Int tensors for the model

/// Reads dialogue turns from *.jsonl files
pub mod loader;

/// Cleans text and splits it into vocabulary pieces
pub mod preprocessor;

/// Padded samples and Burn's Dataset implementation
pub mod dataset;

/// Stacks samples into tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;

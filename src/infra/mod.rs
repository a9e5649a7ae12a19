// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the checkpoint directory:
//
//   checkpoint.rs      — settings.json, params_epoch_N.json and
//                        latest_epoch.json; the on-disk side of
//                        ScopedModel's settings and parameters
//
//   tokenizer_store.rs — builds the word-level tokenizer from the
//                        corpus on the first run, reloads it after
//
//   metrics.rs         — one CSV row of losses/accuracy per epoch

/// Settings and parameter persistence
pub mod checkpoint;

/// Tokenizer training, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

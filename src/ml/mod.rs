// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here.
//
//   params.rs     — Scope and NamedParams: every module reports its
//                   weights under a slash-separated name and takes
//                   them back from a ParamDict
//
//   cell.rs       — RecurrentCell (basic / GRU / LSTM), CellState
//                   and the ResizableCell trait used to widen the
//                   decoder cell
//
//   encoder.rs    — embedding + cell unrolled over one sequence
//
//   attention.rs  — attention heads and the attention decoder
//
//   seq2seq.rs    — two encoders feeding one widened decoder
//
//   model.rs      — ScopedModel: settings and parameter get/set
//                   for a named model instance
//
//   trainer.rs    — Adam training loop with validation and
//                   per-epoch checkpoints
//
//   inferencer.rs — checkpoint loading and greedy generation
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Bahdanau et al. (2015) Neural Machine Translation
//            by Jointly Learning to Align and Translate

/// Scoped parameter naming and assignment
pub mod params;

/// Recurrent cells and their state
pub mod cell;

/// Embedding RNN encoder
pub mod encoder;

/// Attention decoder
pub mod attention;

/// Dual-encoder attention seq2seq network
pub mod seq2seq;

/// Scoped model wrapper and generator settings
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Greedy generation from a checkpoint
pub mod inferencer;

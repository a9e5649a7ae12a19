// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `generate` and `inspect` and
// their flags.

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::{cell::CellKind, model::GeneratorSettings};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the generator on *.jsonl dialogue turns
    Train(TrainArgs),

    /// Generate a sentence for a context and an input act
    Generate(GenerateArgs),

    /// List the settings and parameters stored in a checkpoint
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing *.jsonl files with context/input/target turns
    #[arg(long, default_value = "data/dialogues")]
    pub data_dir: String,

    /// Directory to save settings, tokenizer and parameters
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// JSON object of settings merged over the flags below
    #[arg(long)]
    pub settings: Option<String>,

    /// Share of turns held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Recurrent cell: basic, gru or lstm
    #[arg(long, default_value_t = CellKind::Lstm)]
    pub cell_type: CellKind,

    /// Units per encoder; the decoder cell gets twice as many
    #[arg(long, default_value_t = 128)]
    pub units: usize,

    /// Attention heads reading the encoder memory
    #[arg(long, default_value_t = 1)]
    pub num_heads: usize,

    /// Keep a separate output projection instead of projecting inside the decoder
    #[arg(long, default_value_t = false)]
    pub external_projection: bool,

    /// Upper bound on the vocabulary, special tokens included
    #[arg(long, default_value_t = 5000)]
    pub vocab_size: usize,

    /// Tokens kept from the context and from the input act
    #[arg(long, default_value_t = 20)]
    pub max_input_len: usize,

    /// Decoder steps, <go> included
    #[arg(long, default_value_t = 40)]
    pub max_output_len: usize,

    #[arg(long, default_value_t = 20)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Global gradient norm above which gradients are scaled down
    #[arg(long, default_value_t = 5.0)]
    pub max_grad_norm: f32,

    /// Chance per example of decoding from its own predictions in training
    #[arg(long, default_value_t = 0.0)]
    pub feed_previous_prob: f64,

    #[arg(long, default_value_t = 1206)]
    pub seed: u64,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            settings_file:  a.settings,
            val_fraction:   a.val_fraction,
            settings: GeneratorSettings {
                cell_type:           a.cell_type,
                units:               a.units,
                num_heads:           a.num_heads,
                external_projection: a.external_projection,
                vocab_size:          a.vocab_size,
                max_input_len:       a.max_input_len,
                max_output_len:      a.max_output_len,
                batch_size:          a.batch_size,
                epochs:              a.epochs,
                lr:                  a.lr,
                max_grad_norm:       a.max_grad_norm,
                feed_previous_prob:  a.feed_previous_prob,
                seed:                a.seed,
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What was said before
    #[arg(long, default_value = "")]
    pub context: String,

    /// Dialogue act to realise, e.g. "inform(food=chinese)"
    #[arg(long)]
    pub input: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

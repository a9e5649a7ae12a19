// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Merge settings overrides     (Layer 5 - ml)
//   Step 2: Load *.jsonl turns           (Layer 4 - data)
//   Step 3: Clean the text               (Layer 4 - data)
//   Step 4: Build tokenizer              (Layer 6 - infra)
//   Step 5: Create padded samples        (Layer 4 - data)
//   Step 6: Split train/validation       (Layer 4 - data)
//   Step 7: Save settings                (Layer 6 - infra)
//   Step 8: Run training loop            (Layer 5 - ml)

use anyhow::{Context, Result};
use serde_json::json;
use std::{fs, path::Path};
use tokenizers::Tokenizer;

use crate::data::{
    dataset::{Seq2SeqDataset, Seq2SeqSample},
    loader::JsonlLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{traits::TurnSource, turn::DialogueTurn};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::EpochMetrics,
    tokenizer_store::{encode_ids, TokenizerStore},
};
use crate::ml::{
    model::{GeneratorSettings, ScopedModel, Seq2SeqGenerator, DEFAULT_SCOPE_NAME},
    trainer::{run_training, TrainBackend},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Paths and split for one run, plus the model settings. The settings
// part is what ends up in settings.json.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub checkpoint_dir: String,
    /// JSON object merged into `settings` before anything else runs
    pub settings_file:  Option<String>,
    /// Share of the turns held out for validation
    pub val_fraction:   f64,
    pub settings:       GeneratorSettings,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/dialogues".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            settings_file:  None,
            val_fraction:   0.1,
            settings:       GeneratorSettings::default(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg    = &self.config;
        cfg.settings.validate()?;
        let device = burn::backend::wgpu::WgpuDevice::default();
        let mut generator = Seq2SeqGenerator::<TrainBackend>::new(
            DEFAULT_SCOPE_NAME,
            cfg.settings.clone(),
            device,
        );

        // ── Step 1: Settings file ─────────────────────────────────────────────
        if let Some(path) = &cfg.settings_file {
            tracing::info!("Merging settings from '{}'", path);
            generator.load_all_settings(&read_settings_file(Path::new(path))?)?;
        }

        // ── Step 2: Load turns ────────────────────────────────────────────────
        tracing::info!("Loading dialogue turns from '{}'", cfg.data_dir);
        let turns = JsonlLoader::new(&cfg.data_dir).load_all()?;
        tracing::info!("Loaded {} turns", turns.len());

        // ── Step 3: Clean ─────────────────────────────────────────────────────
        let preprocessor = Preprocessor::new();
        let turns: Vec<DialogueTurn> = turns
            .iter()
            .map(|t| DialogueTurn::new(
                preprocessor.clean(&t.context),
                preprocessor.clean(&t.input),
                preprocessor.clean(&t.target),
            ))
            .collect();

        // ── Step 4: Tokenizer ─────────────────────────────────────────────────
        // One vocabulary for both encoders and the decoder. The network is
        // sized by what the tokenizer actually holds.
        let texts: Vec<String> = turns
            .iter()
            .flat_map(|t| [t.context.clone(), t.input.clone(), t.target.clone()])
            .collect();
        let tokenizer = TokenizerStore::new(&cfg.checkpoint_dir)
            .load_or_build(&texts, generator.settings().vocab_size)?;
        let vocab_size = tokenizer.get_vocab_size(false);
        generator.load_all_settings(&json!({ "vocab_size": vocab_size }))?;

        // ── Step 5: Samples ───────────────────────────────────────────────────
        let samples = build_samples(&turns, &tokenizer, generator.settings())?;
        if samples.is_empty() {
            anyhow::bail!("No turn with a target found in '{}'", cfg.data_dir);
        }
        tracing::info!("Built {} training samples", samples.len());

        // ── Step 6: Split ─────────────────────────────────────────────────────
        let (train_samples, val_samples) =
            split_train_val(samples, 1.0 - cfg.val_fraction, generator.settings().seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );
        let train_dataset = Seq2SeqDataset::new(train_samples);
        let val_dataset   = Seq2SeqDataset::new(val_samples);

        // ── Step 7: Save settings for inference ───────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_settings(&generator.get_all_settings())?;

        // ── Step 8: Train ─────────────────────────────────────────────────────
        run_training(&mut generator, &train_dataset, &val_dataset, &ckpt_manager)
    }
}

/// Settings overrides as a JSON value, for `load_all_settings`.
pub fn read_settings_file(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read settings file '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Settings file '{}' is not valid JSON", path.display()))
}

/// Tokenise every turn that has a target into a padded sample.
pub fn build_samples(
    turns:     &[DialogueTurn],
    tokenizer: &Tokenizer,
    settings:  &GeneratorSettings,
) -> Result<Vec<Seq2SeqSample>> {
    let mut samples = Vec::with_capacity(turns.len());
    let mut skipped = 0usize;

    for turn in turns {
        if !turn.has_target() {
            skipped += 1;
            continue;
        }
        samples.push(Seq2SeqSample::from_ids(
            &encode_ids(tokenizer, &turn.context)?,
            &encode_ids(tokenizer, &turn.input)?,
            &encode_ids(tokenizer, &turn.target)?,
            settings.max_input_len,
            settings.max_output_len,
        ));
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} turns without a target", skipped);
    }
    Ok(samples)
}

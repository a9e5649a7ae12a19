// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds a Seq2SeqGenerator from a checkpoint and decodes greedily:
//
//   settings.json      → load_all_settings → build_network
//   params_epoch_N     → set_model_params
//   context + input    → encoder ids → forward(Static(true))
//   argmax per step    → ids up to the first <eos> → text

use anyhow::{Context, Result};
use burn::prelude::*;
use tokenizers::Tokenizer;

use crate::data::{
    batcher::Seq2SeqBatcher,
    dataset::{Seq2SeqSample, EOS_ID},
    preprocessor::Preprocessor,
};
use crate::domain::traits::Generator;
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::{decode_ids, encode_ids},
};
use crate::ml::model::{GeneratorSettings, ScopedModel, Seq2SeqGenerator, DEFAULT_SCOPE_NAME};
use crate::ml::seq2seq::FeedPrevious;

pub type InferBackend = burn::backend::Wgpu;

pub struct Inferencer<B: Backend = InferBackend> {
    generator:    Seq2SeqGenerator<B>,
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
}

impl Inferencer<InferBackend> {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, tokenizer: Tokenizer) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        Self::load(ckpt_manager, tokenizer, device)
    }
}

impl<B: Backend> Inferencer<B> {
    /// Restore settings and the newest parameters from `ckpt_manager`.
    pub fn load(ckpt_manager: &CheckpointManager, tokenizer: Tokenizer, device: B::Device) -> Result<Self> {
        let mut generator =
            Seq2SeqGenerator::new(DEFAULT_SCOPE_NAME, GeneratorSettings::default(), device);
        generator.load_all_settings(&ckpt_manager.load_settings()?)?;
        generator.build_network();

        let report = generator.set_model_params(&ckpt_manager.load_latest_params()?)?;
        tracing::info!("Model loaded from checkpoint ({} parameters)", report.assigned.len());

        Self::new(generator, tokenizer)
    }

    /// Wrap a generator that already has a network bound.
    pub fn new(generator: Seq2SeqGenerator<B>, tokenizer: Tokenizer) -> Result<Self> {
        if generator.network().is_none() {
            anyhow::bail!("generator '{}' has no network bound", generator.scope_name());
        }
        Ok(Self { generator, tokenizer, preprocessor: Preprocessor::new() })
    }

    /// Greedy decode: ids of the reply, cut before the first <eos>.
    pub fn generate_ids(&self, context_ids: &[u32], input_ids: &[u32]) -> Result<Vec<u32>> {
        let settings = self.generator.settings();
        let network  = self
            .generator
            .network()
            .context("Inferencer lost its network")?;

        let sample = Seq2SeqSample::for_generation(
            context_ids,
            input_ids,
            settings.max_input_len,
            settings.max_output_len,
        );
        let batch = Seq2SeqBatcher::<B>::new(self.generator.device().clone()).batch(&[sample])?;

        let output = network.forward(
            batch.encoder_inputs,
            batch.decoder_inputs,
            FeedPrevious::Static(true),
        )?;

        let mut reply = Vec::new();
        for step in output.outputs {
            let best = network
                .logits(step)
                .argmax(1)
                .into_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|e| anyhow::anyhow!("Cannot read decoder output: {e:?}"))?;

            let Some(&id) = best.first() else { break };
            let id = u32::try_from(id).context("negative token id")?;
            if id == EOS_ID {
                break;
            }
            reply.push(id);
        }

        tracing::debug!("Generated {} tokens", reply.len());
        Ok(reply)
    }
}

impl<B: Backend> Generator for Inferencer<B> {
    fn generate(&self, context: &str, input: &str) -> Result<String> {
        let context_ids = encode_ids(&self.tokenizer, &self.preprocessor.clean(context))?;
        let input_ids   = encode_ids(&self.tokenizer, &self.preprocessor.clean(input))?;

        let reply = self.generate_ids(&context_ids, &input_ids)?;
        decode_ids(&self.tokenizer, &reply)
    }
}

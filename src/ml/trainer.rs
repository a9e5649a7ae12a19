// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop for the dual-encoder generator, using Adam
// with gradient-norm clipping.
//
// Key Burn 0.20 points:
//   - Training runs on TrainBackend (Autodiff<Wgpu>)
//   - model.valid() drops autodiff, so validation batches are
//     built for B::InnerBackend
//   - The network lives inside the Seq2SeqGenerator between epochs;
//     it is bound back after every epoch so get_model_params() sees
//     the trained weights when the checkpoint is written, and once
//     more when training stops, failed or not
//
// Per batch:
//   feed_previous_prob == 0 → FeedPrevious::Static(false) (teacher forcing)
//   otherwise               → FeedPrevious::Conditional(per-example coin)
//
// Loss is token-level cross entropy averaged over the non-<pad>
// targets only.

use anyhow::{bail, Context, Result};
use burn::{
    data::dataset::Dataset,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{activation, backend::AutodiffBackend, TensorData},
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::data::{
    batcher::{Seq2SeqBatch, Seq2SeqBatcher},
    dataset::{Seq2SeqDataset, Seq2SeqSample, PAD_ID},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{ScopedModel, Seq2SeqGenerator};
use crate::ml::seq2seq::{DualEncoderSeq2Seq, FeedPrevious, Seq2SeqOutput};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub fn run_training(
    generator:     &mut Seq2SeqGenerator<TrainBackend>,
    train_dataset: &Seq2SeqDataset,
    val_dataset:   &Seq2SeqDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<Vec<EpochMetrics>> {
    tracing::info!("Using WGPU device: {:?}", generator.device());
    train_loop(generator, train_dataset, val_dataset, ckpt_manager)
}

pub fn train_loop<B: AutodiffBackend>(
    generator:     &mut Seq2SeqGenerator<B>,
    train_dataset: &Seq2SeqDataset,
    val_dataset:   &Seq2SeqDataset,
    ckpt_manager:  &CheckpointManager,
) -> Result<Vec<EpochMetrics>> {
    let settings = generator.get_all_settings();
    settings.validate()?;
    let metrics = MetricsLogger::new(ckpt_manager.dir())?;

    // ── Model ─────────────────────────────────────────────────────────────────
    let mut model = match generator.take_network() {
        Some(network) => network,
        None          => generator.build_network().clone(),
    };
    tracing::info!(
        "Model ready: {} cell, units={}, heads={}, vocab={}",
        settings.cell_type, settings.units, settings.num_heads, settings.vocab_size,
    );

    // The network goes back into the generator even when an epoch fails
    let result = run_epochs(generator, &mut model, train_dataset, val_dataset, ckpt_manager, &metrics);
    generator.bind(model);

    let history = result?;
    tracing::info!("Training complete!");
    Ok(history)
}

fn run_epochs<B: AutodiffBackend>(
    generator:     &mut Seq2SeqGenerator<B>,
    model:         &mut DualEncoderSeq2Seq<B>,
    train_dataset: &Seq2SeqDataset,
    val_dataset:   &Seq2SeqDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
) -> Result<Vec<EpochMetrics>> {
    let settings = generator.get_all_settings();
    let device   = generator.device().clone();

    // ── Adam with global-norm clipping ────────────────────────────────────────
    let mut optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(settings.max_grad_norm)))
        .init();

    let train_batcher = Seq2SeqBatcher::<B>::new(device.clone());
    let val_batcher   = Seq2SeqBatcher::<B::InnerBackend>::new(device.clone());
    let batch_size    = settings.batch_size;

    let mut rng     = StdRng::seed_from_u64(settings.seed);
    let mut order: Vec<usize> = (0..train_dataset.len()).collect();
    let mut history = Vec::with_capacity(settings.epochs);
    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        order.shuffle(&mut rng);
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for chunk in order.chunks(batch_size) {
            let items: Vec<Seq2SeqSample> =
                chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            let batch = train_batcher.batch(&items)?;

            let feed_previous = sample_feed_previous::<B>(
                &mut rng,
                settings.feed_previous_prob,
                batch.batch_size(),
                &device,
            );
            let output = model.forward(
                batch.encoder_inputs.clone(),
                batch.decoder_inputs.clone(),
                feed_previous,
            )?;
            let loss = sequence_loss(step_logits(model, &output)?, batch.targets);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &*model);
            *model = optim.step(settings.lr, model.clone(), grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut correct       = 0usize;
        let mut total_tokens  = 0usize;

        let val_order: Vec<usize> = (0..val_dataset.len()).collect();
        for chunk in val_order.chunks(batch_size) {
            let items: Vec<Seq2SeqSample> =
                chunk.iter().filter_map(|&i| val_dataset.get(i)).collect();
            let batch = val_batcher.batch(&items)?;
            let stats = evaluate_batch(&model_valid, batch)?;
            val_loss_sum += stats.loss;
            val_batches  += 1;
            correct      += stats.correct;
            total_tokens += stats.tokens;
        }

        let avg_val_loss = if val_batches  > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let token_acc    = if total_tokens > 0 { correct as f64 / total_tokens as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | token_acc={:.1}%",
            epoch, settings.epochs, avg_train_loss, avg_val_loss, token_acc * 100.0,
        );

        // ── Bind and checkpoint ───────────────────────────────────────────────
        generator.bind(model.clone());
        let params = generator.get_model_params()?;
        ckpt_manager.save_params(&params, epoch)?;

        let row = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, token_acc);
        if row.is_improvement(best_val_loss) {
            best_val_loss = row.val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val_loss, epoch);
        }
        metrics.log(&row)?;
        history.push(row);
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    Ok(history)
}

/// Draw the decoding mode for one batch.
fn sample_feed_previous<B: Backend>(
    rng:         &mut StdRng,
    probability: f64,
    batch_size:  usize,
    device:      &B::Device,
) -> FeedPrevious<B> {
    if probability <= 0.0 {
        return FeedPrevious::Static(false);
    }
    if probability >= 1.0 {
        return FeedPrevious::Static(true);
    }

    let coins: Vec<i64> = (0..batch_size)
        .map(|_| i64::from(rng.gen_bool(probability)))
        .collect();
    let coins = Tensor::<B, 1, Int>::from_data(TensorData::new(coins, [batch_size]), device);
    FeedPrevious::Conditional(coins.equal_elem(1))
}

/// Per-step symbol scores stacked to `[batch, steps, symbols]`.
pub fn step_logits<B: Backend>(
    model:  &DualEncoderSeq2Seq<B>,
    output: &Seq2SeqOutput<B>,
) -> Result<Tensor<B, 3>> {
    if output.outputs.is_empty() {
        bail!("decoder produced no steps");
    }
    let logits: Vec<Tensor<B, 2>> = output
        .outputs
        .iter()
        .map(|step| model.logits(step.clone()))
        .collect();
    Ok(Tensor::stack(logits, 1))
}

/// Mean cross entropy over the non-padding target tokens; zero when
/// every target is padding.
pub fn sequence_loss<B: Backend>(logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch, steps, symbols] = logits.dims();
    let n = batch * steps;

    let log_probs = activation::log_softmax(logits.reshape([n, symbols]), 1);
    let targets   = targets.reshape([n, 1]);
    let picked    = log_probs.gather(1, targets.clone()).reshape([n]);

    let real  = targets.reshape([n]).equal_elem(PAD_ID as i64).bool_not().float();
    let count = real.clone().sum().clamp_min(1.0);
    (picked * real).sum().neg() / count
}

struct BatchStats {
    loss:    f64,
    correct: usize,
    tokens:  usize,
}

/// Teacher-forced loss, plus token accuracy of greedy decoding.
fn evaluate_batch<B: Backend>(model: &DualEncoderSeq2Seq<B>, batch: Seq2SeqBatch<B>) -> Result<BatchStats> {
    let forced = model.forward(
        batch.encoder_inputs.clone(),
        batch.decoder_inputs.clone(),
        FeedPrevious::Static(false),
    )?;
    let loss: f64 = sequence_loss(step_logits(model, &forced)?, batch.targets.clone())
        .into_scalar()
        .elem::<f64>();

    let greedy = model.forward(batch.encoder_inputs, batch.decoder_inputs, FeedPrevious::Static(true))?;
    let [rows, steps] = batch.targets.dims();
    let predicted = step_logits(model, &greedy)?.argmax(2).reshape([rows, steps]);

    let real = batch.targets.clone().equal_elem(PAD_ID as i64).bool_not();
    let hits = predicted.equal(batch.targets).int() * real.clone().int();

    let correct = hits.sum().into_scalar().elem::<i64>();
    let tokens  = real.int().sum().into_scalar().elem::<i64>();

    Ok(BatchStats {
        loss,
        correct: usize::try_from(correct).context("negative hit count")?,
        tokens:  usize::try_from(tokens).context("negative token count")?,
    })
}

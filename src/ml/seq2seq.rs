// ============================================================
// Layer 5 — Dual-Encoder Attention Seq2Seq
// ============================================================
// Two encoders, one widened attention decoder:
//
//   encoder_inputs [batch, 2L]
//     ├─ [.., 0..L]   context ──▶ context_rnn ──┐  outputs  L × [batch, H]
//     └─ [.., L..2L]  input   ──▶ input_rnn   ──┤  states   final CellState
//                                               ▼
//            per step concat  → L × [batch, 2H]  ──reshape/cat──▶ memory [batch, L, 2H]
//            final states     → CellState of width 2H
//                                               ▼
//     decoder (cell widened ×2, attention over memory) ──▶ outputs, states
//
// Encoder inputs must be pre-concatenated: context first, then the
// input act, both halves of the same length.

use anyhow::{bail, Result};
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::domain::params::{AssignReport, ParamDict};
use crate::ml::attention::{AttentionDecoder, AttentionDecoderConfig};
use crate::ml::cell::{blend, CellState, RecurrentCellConfig, ResizableCell};
use crate::ml::encoder::{EmbeddingEncoder, EmbeddingEncoderConfig};
use crate::ml::params::{NamedParams, Scope};

/// Name of the network's own scope below the model instance scope.
pub const NETWORK_SCOPE: &str = "embedding_attention_seq2seq_context";

#[derive(Config, Debug)]
pub struct DualEncoderSeq2SeqConfig {
    /// Cell used by both encoders; the decoder gets a twice-as-wide copy
    pub cell:                RecurrentCellConfig,
    pub num_encoder_symbols: usize,
    pub num_decoder_symbols: usize,
    #[config(default = 1)]
    pub num_heads:           usize,
    /// Keep a separate output projection instead of wrapping the decoder cell
    #[config(default = false)]
    pub external_projection: bool,
}

impl DualEncoderSeq2SeqConfig {
    pub fn decoder_cell(&self) -> RecurrentCellConfig {
        self.cell.widened(2)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DualEncoderSeq2Seq<B> {
        let encoder = EmbeddingEncoderConfig::new(self.cell.clone(), self.num_encoder_symbols);
        let decoder_cell = self.decoder_cell();
        let attn_size    = 2 * self.cell.units;

        let decoder = AttentionDecoderConfig::new(
            decoder_cell.clone(),
            self.num_decoder_symbols,
            attn_size,
        )
        .with_num_heads(self.num_heads)
        .with_project_cell_output(!self.external_projection)
        .init(device);

        let output_projection = self.external_projection.then(|| {
            LinearConfig::new(decoder_cell.units, self.num_decoder_symbols).init(device)
        });

        DualEncoderSeq2Seq {
            context_rnn: encoder.init(device),
            input_rnn:   encoder.init(device),
            decoder,
            output_projection,
        }
    }
}

#[derive(Module, Debug)]
pub struct DualEncoderSeq2Seq<B: Backend> {
    pub context_rnn:       EmbeddingEncoder<B>,
    pub input_rnn:         EmbeddingEncoder<B>,
    pub decoder:           AttentionDecoder<B>,
    pub output_projection: Option<Linear<B>>,
}

/// How the decoder picks its inputs after the first step.
#[derive(Debug, Clone)]
pub enum FeedPrevious<B: Backend> {
    /// Same choice for every example
    Static(bool),
    /// Per-example (length = batch) or global (length 1) choice, resolved
    /// inside the computation: both decodings run on shared weights and
    /// the flag selects which one each row returns.
    Conditional(Tensor<B, 1, Bool>),
}

#[derive(Debug, Clone)]
pub struct Seq2SeqOutput<B: Backend> {
    pub outputs: Vec<Tensor<B, 2>>,
    pub states:  Vec<CellState<B>>,
}

impl<B: Backend> DualEncoderSeq2Seq<B> {
    pub fn forward(
        &self,
        encoder_inputs: Tensor<B, 2, Int>,
        decoder_inputs: Tensor<B, 2, Int>,
        feed_previous:  FeedPrevious<B>,
    ) -> Result<Seq2SeqOutput<B>> {
        let (memory, state) = self.encode(encoder_inputs)?;

        match feed_previous {
            FeedPrevious::Static(flag) => Ok(self.decode(decoder_inputs, state, memory, flag)),
            FeedPrevious::Conditional(condition) => {
                let [batch, _] = decoder_inputs.dims();
                let [n] = condition.dims();
                if n != 1 && n != batch {
                    bail!("feed-previous condition has {n} entries for a batch of {batch}");
                }

                let fed = self.decode(decoder_inputs.clone(), state.clone(), memory.clone(), true);
                let forced = self.decode(decoder_inputs, state, memory, false);
                let mask = condition.float().reshape([n, 1]);

                let outputs = fed
                    .outputs
                    .into_iter()
                    .zip(forced.outputs)
                    .map(|(a, b)| blend(&mask, a, b))
                    .collect();
                let states = fed
                    .states
                    .into_iter()
                    .zip(forced.states)
                    .map(|(a, b)| CellState::select(&mask, a, b))
                    .collect();
                Ok(Seq2SeqOutput { outputs, states })
            }
        }
    }

    /// Split, encode and join: returns the attention memory
    /// `[batch, L, 2H]` and the joined final state.
    pub fn encode(&self, encoder_inputs: Tensor<B, 2, Int>) -> Result<(Tensor<B, 3>, CellState<B>)> {
        let [batch, len] = encoder_inputs.dims();
        if len == 0 || len % 2 != 0 {
            bail!("encoder inputs must hold two halves of equal length, got {len} steps");
        }
        let half = len / 2;

        let context = encoder_inputs.clone().slice([0..batch, 0..half]);
        let content = encoder_inputs.slice([0..batch, half..len]);

        let context = self.context_rnn.forward(context);
        let content = self.input_rnn.forward(content);

        let state = match (context.final_state(), content.final_state()) {
            (Some(c), Some(e)) => CellState::concat(c.clone(), e.clone()),
            _ => bail!("encoders produced no state"),
        };

        let width = 2 * self.context_rnn.cell.output_size();
        let top_states: Vec<Tensor<B, 3>> = context
            .outputs
            .into_iter()
            .zip(content.outputs)
            .map(|(c, e)| Tensor::cat(vec![c, e], 1).reshape([batch, 1, width]))
            .collect();
        let memory = Tensor::cat(top_states, 1);

        Ok((memory, state))
    }

    fn decode(
        &self,
        decoder_inputs: Tensor<B, 2, Int>,
        state:          CellState<B>,
        memory:         Tensor<B, 3>,
        feed_previous:  bool,
    ) -> Seq2SeqOutput<B> {
        let decoded = self.decoder.forward(
            decoder_inputs,
            state,
            memory,
            feed_previous,
            self.output_projection.as_ref(),
        );
        Seq2SeqOutput { outputs: decoded.outputs, states: decoded.states }
    }

    /// Symbol scores for one decoder output
    pub fn logits(&self, output: Tensor<B, 2>) -> Tensor<B, 2> {
        match &self.output_projection {
            Some(projection) => projection.forward(output),
            None             => output,
        }
    }
}

impl<B: Backend> NamedParams<B> for DualEncoderSeq2Seq<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        self.context_rnn.visit_params(&scope.child("context_rnn"), out)?;
        self.input_rnn.visit_params(&scope.child("input_rnn"), out)?;
        self.decoder.visit_params(&scope.child("decoder"), out)?;
        self.output_projection
            .visit_params(&scope.child("output_projection"), out)
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.context_rnn = self.context_rnn.assign_params(&scope.child("context_rnn"), vals, report)?;
        self.input_rnn   = self.input_rnn.assign_params(&scope.child("input_rnn"), vals, report)?;
        self.decoder     = self.decoder.assign_params(&scope.child("decoder"), vals, report)?;
        self.output_projection = self
            .output_projection
            .assign_params(&scope.child("output_projection"), vals, report)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::cell::CellKind;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn ids(values: Vec<i64>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn flags(values: Vec<i64>) -> Tensor<TestBackend, 1, Bool> {
        let n = values.len();
        Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(values, [n]), &Default::default())
            .equal_elem(1)
    }

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn close(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    fn model(kind: CellKind, external: bool) -> DualEncoderSeq2Seq<TestBackend> {
        DualEncoderSeq2SeqConfig::new(RecurrentCellConfig::new(kind, 4), 12, 10)
            .with_external_projection(external)
            .init(&Default::default())
    }

    #[test]
    fn test_memory_and_state_are_twice_as_wide() {
        let net = model(CellKind::Lstm, false);
        let (memory, state) = net.encode(ids((0..12).collect(), [2, 6])).unwrap();

        assert_eq!(memory.dims(), [2, 3, 8]);
        assert_eq!(state.hidden.dims(), [2, 8]);
        assert_eq!(state.memory.map(|m| m.dims()), Some([2, 8]));
    }

    #[test]
    fn test_odd_or_empty_encoder_input_is_rejected() {
        let net = model(CellKind::Gru, false);
        assert!(net.encode(ids(vec![1, 2, 3], [1, 3])).is_err());

        let empty = Tensor::<TestBackend, 2, Int>::zeros([1, 0], &Default::default());
        assert!(net.encode(empty).is_err());
    }

    #[test]
    fn test_forward_returns_logits_per_step() {
        let net = model(CellKind::Gru, false);
        let out = net
            .forward(ids(vec![1; 8], [2, 4]), ids(vec![2; 10], [2, 5]), FeedPrevious::Static(false))
            .unwrap();

        assert_eq!(out.outputs.len(), 5);
        assert_eq!(Tensor::stack::<3>(out.outputs.clone(), 1).dims(), [2, 5, 10]);
        assert_eq!(out.states[4].hidden.dims(), [2, 8]);
    }

    #[test]
    fn test_external_projection_keeps_hidden_width() {
        let net = model(CellKind::Basic, true);
        let out = net
            .forward(ids(vec![3; 4], [1, 4]), ids(vec![2, 0, 0], [1, 3]), FeedPrevious::Static(true))
            .unwrap();

        assert_eq!(out.outputs[0].dims(), [1, 8]);
        assert_eq!(net.logits(out.outputs[0].clone()).dims(), [1, 10]);
    }

    #[test]
    fn test_first_step_does_not_depend_on_feed_previous() {
        let net = model(CellKind::Gru, false);
        let enc = ids(vec![1, 2, 3, 4], [1, 4]);
        let dec = ids(vec![2, 7, 8], [1, 3]);

        let fed    = net.forward(enc.clone(), dec.clone(), FeedPrevious::Static(true)).unwrap();
        let forced = net.forward(enc, dec, FeedPrevious::Static(false)).unwrap();
        assert!(close(&values(fed.outputs[0].clone()), &values(forced.outputs[0].clone())));
    }

    #[test]
    fn test_conditional_selects_per_example() {
        let net = model(CellKind::Lstm, false);
        let enc = ids(vec![1, 2, 3, 4, 5, 6, 7, 8], [2, 4]);
        let dec = ids(vec![2, 5, 6, 2, 5, 6], [2, 3]);

        let fed    = net.forward(enc.clone(), dec.clone(), FeedPrevious::Static(true)).unwrap();
        let forced = net.forward(enc.clone(), dec.clone(), FeedPrevious::Static(false)).unwrap();
        let mixed  = net.forward(enc, dec, FeedPrevious::Conditional(flags(vec![1, 0]))).unwrap();

        let row = |t: &Tensor<TestBackend, 2>, r: usize| values(t.clone().slice([r..r + 1, 0..10]));
        for step in 0..3 {
            assert!(close(&row(&mixed.outputs[step], 0), &row(&fed.outputs[step], 0)));
            assert!(close(&row(&mixed.outputs[step], 1), &row(&forced.outputs[step], 1)));
        }
    }

    #[test]
    fn test_global_condition_broadcasts() {
        let net = model(CellKind::Gru, false);
        let enc = ids(vec![1, 2, 3, 4, 1, 2, 3, 4], [2, 4]);
        let dec = ids(vec![2, 3, 2, 3], [2, 2]);

        let fed   = net.forward(enc.clone(), dec.clone(), FeedPrevious::Static(true)).unwrap();
        let mixed = net.forward(enc, dec, FeedPrevious::Conditional(flags(vec![1]))).unwrap();
        assert!(close(&values(mixed.outputs[1].clone()), &values(fed.outputs[1].clone())));
    }

    #[test]
    fn test_condition_length_must_match_batch() {
        let net = model(CellKind::Gru, false);
        let result = net.forward(
            ids(vec![1; 12], [3, 4]),
            ids(vec![2; 6], [3, 2]),
            FeedPrevious::Conditional(flags(vec![1, 0])),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_param_names_separate_the_two_encoders() {
        let net = model(CellKind::Gru, true);
        let mut out = ParamDict::new();
        net.visit_params(&Scope::new("g"), &mut out).unwrap();

        assert!(out.contains_key("g/context_rnn/embedding/weight"));
        assert!(out.contains_key("g/input_rnn/embedding/weight"));
        assert!(out.contains_key("g/decoder/attention/head_0/score/weight"));
        assert!(out.contains_key("g/output_projection/weight"));
        assert!(!out.contains_key("g/decoder/cell_projection/weight"));
        // Independently initialised weights
        assert_ne!(
            out["g/context_rnn/embedding/weight"].values,
            out["g/input_rnn/embedding/weight"].values
        );
        // Decoder cell consumes the doubled width
        assert_eq!(out["g/decoder/cell/hidden_gates/weight"].shape, vec![8, 24]);
    }
}

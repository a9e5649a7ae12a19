// ============================================================
// Layer 5 — Attention Decoder
// ============================================================
// Embedding + recurrent cell + additive (Bahdanau) attention over
// the encoder memory, one step at a time:
//
//   inp    = embed(decoder_input[i])                 (or embed(argmax(prev)) when feeding previous)
//   x      = input_mix([inp, attn_1 .. attn_H])
//   out, s = cell(x, s)          out = cell_projection(out) when the cell is wrapped
//   attn_h = Σ_t softmax_t(v_h · tanh(K_h·m_t + Q_h·flatten(s))) · m_t
//   y      = output_mix([out, attn_1 .. attn_H])     prev = y
//
// Attention vectors start at zero; the first step therefore reads
// nothing from the memory.
//
// Reference: Bahdanau et al. (2015) Neural Machine Translation by
//            Jointly Learning to Align and Translate

use anyhow::Result;
use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

use crate::domain::params::{AssignReport, ParamDict};
use crate::ml::cell::{CellState, RecurrentCell, RecurrentCellConfig};
use crate::ml::params::{NamedParams, Scope};

// ─── AttentionHead ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct AttentionHeadConfig {
    /// Width of one memory slot
    pub attn_size:  usize,
    /// Width of the flattened decoder state used as query
    pub query_size: usize,
}

impl AttentionHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionHead<B> {
        AttentionHead {
            keys:  LinearConfig::new(self.attn_size, self.attn_size)
                .with_bias(false)
                .init(device),
            query: LinearConfig::new(self.query_size, self.attn_size).init(device),
            score: LinearConfig::new(self.attn_size, 1)
                .with_bias(false)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct AttentionHead<B: Backend> {
    pub keys:  Linear<B>,
    pub query: Linear<B>,
    pub score: Linear<B>,
}

impl<B: Backend> AttentionHead<B> {
    /// Key projection of the memory; computed once per sequence.
    pub fn features(&self, memory: Tensor<B, 3>) -> Tensor<B, 3> {
        self.keys.forward(memory)
    }

    /// Attention distribution over memory slots, `[batch, len]`.
    pub fn weights(&self, features: &Tensor<B, 3>, query: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, len, size] = features.dims();
        let projected = self.query.forward(query).reshape([batch, 1, size]);
        let scores = self
            .score
            .forward(activation::tanh(features.clone() + projected))
            .reshape([batch, len]);
        activation::softmax(scores, 1)
    }

    /// Context vector `[batch, attn_size]` for the given query.
    pub fn read(
        &self,
        memory:   &Tensor<B, 3>,
        features: &Tensor<B, 3>,
        query:    Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [batch, len, size] = memory.dims();
        let weights = self.weights(features, query).reshape([batch, len, 1]);
        (weights * memory.clone()).sum_dim(1).reshape([batch, size])
    }
}

impl<B: Backend> NamedParams<B> for AttentionHead<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        self.keys.visit_params(&scope.child("keys"), out)?;
        self.query.visit_params(&scope.child("query"), out)?;
        self.score.visit_params(&scope.child("score"), out)
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.keys  = self.keys.assign_params(&scope.child("keys"), vals, report)?;
        self.query = self.query.assign_params(&scope.child("query"), vals, report)?;
        self.score = self.score.assign_params(&scope.child("score"), vals, report)?;
        Ok(self)
    }
}

// ─── AttentionDecoder ─────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct AttentionDecoderConfig {
    /// Decoder cell, already sized for the concatenated encoder state
    pub cell:        RecurrentCellConfig,
    pub num_symbols: usize,
    /// Width of one attention memory slot
    pub attn_size:   usize,
    #[config(default = 1)]
    pub num_heads:   usize,
    /// Wrap the cell with a projection to `num_symbols`; outputs are then logits
    #[config(default = true)]
    pub project_cell_output: bool,
}

impl AttentionDecoderConfig {
    /// Width of each decoder output
    pub fn output_size(&self) -> usize {
        if self.project_cell_output { self.num_symbols } else { self.cell.units }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionDecoder<B> {
        let emb_dim     = self.cell.d_input();
        let read_width  = self.num_heads * self.attn_size;
        let output_size = self.output_size();

        let heads = (0..self.num_heads)
            .map(|_| {
                AttentionHeadConfig::new(self.attn_size, self.cell.state_width()).init(device)
            })
            .collect();

        AttentionDecoder {
            embedding:       EmbeddingConfig::new(self.num_symbols, emb_dim).init(device),
            input_mix:       LinearConfig::new(emb_dim + read_width, self.cell.d_input())
                .init(device),
            cell:            self.cell.init(device),
            cell_projection: self
                .project_cell_output
                .then(|| LinearConfig::new(self.cell.units, self.num_symbols).init(device)),
            heads,
            output_mix:      LinearConfig::new(output_size + read_width, output_size)
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct AttentionDecoder<B: Backend> {
    pub embedding:       Embedding<B>,
    pub input_mix:       Linear<B>,
    pub cell:            RecurrentCell<B>,
    pub cell_projection: Option<Linear<B>>,
    pub heads:           Vec<AttentionHead<B>>,
    pub output_mix:      Linear<B>,
}

/// One output and one state per decoder step.
#[derive(Debug, Clone)]
pub struct DecoderOutput<B: Backend> {
    pub outputs: Vec<Tensor<B, 2>>,
    pub states:  Vec<CellState<B>>,
}

impl<B: Backend> AttentionDecoder<B> {
    /// Unroll over `decoder_inputs` `[batch, steps]`.
    ///
    /// With `feed_previous`, only the first column of `decoder_inputs` is
    /// read; every later input is the argmax of the previous output, passed
    /// through `output_projection` first when one is given.
    pub fn forward(
        &self,
        decoder_inputs:    Tensor<B, 2, Int>,
        initial_state:     CellState<B>,
        memory:            Tensor<B, 3>,
        feed_previous:     bool,
        output_projection: Option<&Linear<B>>,
    ) -> DecoderOutput<B> {
        let [batch, steps]       = decoder_inputs.dims();
        let [_, _, attn_size]    = memory.dims();
        let device               = memory.device();
        let emb_dim              = self.cell.output_size();
        let embedded             = self.embedding.forward(decoder_inputs); // [batch, steps, emb]

        let features: Vec<Tensor<B, 3>> = self
            .heads
            .iter()
            .map(|head| head.features(memory.clone()))
            .collect();

        let mut attns: Vec<Tensor<B, 2>> = self
            .heads
            .iter()
            .map(|_| Tensor::zeros([batch, attn_size], &device))
            .collect();

        let mut state   = initial_state;
        let mut prev: Option<Tensor<B, 2>> = None;
        let mut outputs = Vec::with_capacity(steps);
        let mut states  = Vec::with_capacity(steps);

        for i in 0..steps {
            let inp = match (&prev, feed_previous) {
                (Some(prev), true) => self.embed_previous(prev.clone(), output_projection),
                _ => embedded
                    .clone()
                    .slice([0..batch, i..i + 1, 0..emb_dim])
                    .reshape([batch, emb_dim]),
            };

            let mut mixed = Vec::with_capacity(1 + attns.len());
            mixed.push(inp);
            mixed.extend(attns.iter().cloned());
            let x = self.input_mix.forward(Tensor::cat(mixed, 1));

            let (cell_output, next) = self.cell.step(x, state);
            let cell_output = match &self.cell_projection {
                Some(projection) => projection.forward(cell_output),
                None             => cell_output,
            };

            let query = next.flatten();
            attns = self
                .heads
                .iter()
                .zip(&features)
                .map(|(head, keys)| head.read(&memory, keys, query.clone()))
                .collect();

            let mut joined = Vec::with_capacity(1 + attns.len());
            joined.push(cell_output);
            joined.extend(attns.iter().cloned());
            let output = self.output_mix.forward(Tensor::cat(joined, 1));

            if feed_previous {
                prev = Some(output.clone());
            }
            outputs.push(output);
            states.push(next.clone());
            state = next;
        }

        DecoderOutput { outputs, states }
    }

    /// Greedy symbol from the previous output, embedded as the next input.
    fn embed_previous(
        &self,
        prev:              Tensor<B, 2>,
        output_projection: Option<&Linear<B>>,
    ) -> Tensor<B, 2> {
        let [batch, _] = prev.dims();
        let logits = match output_projection {
            Some(projection) => projection.forward(prev),
            None             => prev,
        };
        let symbols = logits.argmax(1).reshape([batch, 1]);
        self.embedding
            .forward(symbols)
            .reshape([batch, self.cell.output_size()])
    }
}

impl<B: Backend> NamedParams<B> for AttentionDecoder<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        self.embedding.visit_params(&scope.child("embedding"), out)?;
        self.input_mix.visit_params(&scope.child("input_mix"), out)?;
        self.cell.visit_params(&scope.child("cell"), out)?;
        self.cell_projection.visit_params(&scope.child("cell_projection"), out)?;
        let attention = scope.child("attention");
        for (i, head) in self.heads.iter().enumerate() {
            head.visit_params(&attention.child(&format!("head_{i}")), out)?;
        }
        self.output_mix.visit_params(&scope.child("output_mix"), out)
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.embedding = self.embedding.assign_params(&scope.child("embedding"), vals, report)?;
        self.input_mix = self.input_mix.assign_params(&scope.child("input_mix"), vals, report)?;
        self.cell      = self.cell.assign_params(&scope.child("cell"), vals, report)?;
        self.cell_projection = self
            .cell_projection
            .assign_params(&scope.child("cell_projection"), vals, report)?;

        let attention = scope.child("attention");
        self.heads = self
            .heads
            .into_iter()
            .enumerate()
            .map(|(i, head)| head.assign_params(&attention.child(&format!("head_{i}")), vals, report))
            .collect::<Result<Vec<_>>>()?;

        self.output_mix = self.output_mix.assign_params(&scope.child("output_mix"), vals, report)?;
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

    #[test]
    fn test_attention_weights_are_a_distribution() {
        let device = Default::default();
        let head: AttentionHead<TestBackend> = AttentionHeadConfig::new(4, 6).init(&device);

        let memory   = Tensor::<TestBackend, 3>::random(
            [2, 5, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let features = head.features(memory.clone());
        let query    = Tensor::<TestBackend, 2>::ones([2, 6], &device);

        let weights = head.weights(&features, query.clone());
        assert_eq!(weights.dims(), [2, 5]);
        let sums: Vec<f32> = weights
            .sum_dim(1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }

        assert_eq!(head.read(&memory, &features, query).dims(), [2, 4]);
    }

    #[test]
    fn test_wrapped_decoder_emits_logits() {
        let device = Default::default();
        let cfg = AttentionDecoderConfig::new(RecurrentCellConfig::new(CellKind::Gru, 8), 11, 8)
            .with_num_heads(2);
        let decoder: AttentionDecoder<TestBackend> = cfg.init(&device);

        let memory = Tensor::<TestBackend, 3>::zeros([3, 4, 8], &device);
        let state  = decoder.cell.zero_state(3, &device);
        let out = decoder.forward(ids(vec![2; 9], [3, 3]), state, memory, false, None);

        assert_eq!(out.outputs.len(), 3);
        assert_eq!(out.states.len(), 3);
        assert_eq!(out.outputs[0].dims(), [3, 11]);
        assert_eq!(decoder.heads.len(), 2);
    }

    #[test]
    fn test_unwrapped_decoder_emits_cell_width() {
        let device = Default::default();
        let cfg = AttentionDecoderConfig::new(RecurrentCellConfig::new(CellKind::Lstm, 6), 9, 6)
            .with_project_cell_output(false);
        assert_eq!(cfg.output_size(), 6);

        let decoder: AttentionDecoder<TestBackend> = cfg.init(&device);
        let projection = LinearConfig::new(6, 9).init::<TestBackend>(&device);

        let memory = Tensor::<TestBackend, 3>::zeros([1, 2, 6], &device);
        let state  = decoder.cell.zero_state(1, &device);
        let out = decoder.forward(ids(vec![2, 0, 0, 0], [1, 4]), state, memory, true, Some(&projection));

        assert_eq!(out.outputs[3].dims(), [1, 6]);
        assert!(out.states[3].memory.is_some());
    }

    #[test]
    fn test_feed_previous_ignores_later_inputs() {
        let device = Default::default();
        let decoder: AttentionDecoder<TestBackend> =
            AttentionDecoderConfig::new(RecurrentCellConfig::new(CellKind::Gru, 4), 7, 4)
                .init(&device);
        let memory = Tensor::<TestBackend, 3>::ones([1, 3, 4], &device);

        let run = |inputs: Vec<i64>| {
            let state = decoder.cell.zero_state(1, &device);
            decoder.forward(ids(inputs, [1, 3]), state, memory.clone(), true, None)
        };
        let a = run(vec![2, 5, 6]);
        let b = run(vec![2, 1, 3]);

        let last = |o: &DecoderOutput<TestBackend>| -> Vec<f32> {
            o.outputs[2].clone().into_data().convert::<f32>().to_vec::<f32>().unwrap()
        };
        assert_eq!(last(&a), last(&b));
    }
}

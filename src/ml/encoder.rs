// ============================================================
// Layer 5 — Embedding Encoder
// ============================================================
// Token ids → embedding → recurrent cell, unrolled over time.
//
//   ids [batch, len]  ──embedding──▶  [batch, len, units]
//                      ──cell × len──▶ outputs: len × [batch, units]
//                                      states:  len × CellState
//
// The seq2seq model owns two of these (context and input), each
// with its own weights.

use anyhow::Result;
use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};

use crate::domain::params::{AssignReport, ParamDict};
use crate::ml::cell::{CellState, RecurrentCell, RecurrentCellConfig};
use crate::ml::params::{NamedParams, Scope};

#[derive(Config, Debug)]
pub struct EmbeddingEncoderConfig {
    pub cell:        RecurrentCellConfig,
    pub num_symbols: usize,
}

impl EmbeddingEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingEncoder<B> {
        EmbeddingEncoder {
            embedding: EmbeddingConfig::new(self.num_symbols, self.cell.d_input()).init(device),
            cell:      self.cell.init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct EmbeddingEncoder<B: Backend> {
    pub embedding: Embedding<B>,
    pub cell:      RecurrentCell<B>,
}

/// Per-step outputs and states of one unrolled encoder.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    pub outputs: Vec<Tensor<B, 2>>,
    pub states:  Vec<CellState<B>>,
}

impl<B: Backend> EncoderOutput<B> {
    pub fn final_state(&self) -> Option<&CellState<B>> {
        self.states.last()
    }
}

impl<B: Backend> EmbeddingEncoder<B> {
    /// Run over `ids` `[batch, len]` starting from a zero state.
    pub fn forward(&self, ids: Tensor<B, 2, Int>) -> EncoderOutput<B> {
        let [batch, len] = ids.dims();
        let device   = ids.device();
        let units    = self.cell.output_size();
        let embedded = self.embedding.forward(ids); // [batch, len, units]

        let mut state   = self.cell.zero_state(batch, &device);
        let mut outputs = Vec::with_capacity(len);
        let mut states  = Vec::with_capacity(len);

        for t in 0..len {
            let x = embedded
                .clone()
                .slice([0..batch, t..t + 1, 0..units])
                .reshape([batch, units]);
            let (output, next) = self.cell.step(x, state);
            outputs.push(output);
            states.push(next.clone());
            state = next;
        }

        EncoderOutput { outputs, states }
    }
}

impl<B: Backend> NamedParams<B> for EmbeddingEncoder<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        self.embedding.visit_params(&scope.child("embedding"), out)?;
        self.cell.visit_params(&scope.child("cell"), out)
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.embedding = self.embedding.assign_params(&scope.child("embedding"), vals, report)?;
        self.cell      = self.cell.assign_params(&scope.child("cell"), vals, report)?;
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

    #[test]
    fn test_one_output_and_state_per_step() {
        let device = Default::default();
        let encoder: EmbeddingEncoder<TestBackend> =
            EmbeddingEncoderConfig::new(RecurrentCellConfig::new(CellKind::Gru, 8), 20)
                .init(&device);

        let ids = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1i64, 2, 3, 4, 5, 6], [2, 3]),
            &device,
        );
        let encoded = encoder.forward(ids);

        assert_eq!(encoded.outputs.len(), 3);
        assert_eq!(encoded.outputs[2].dims(), [2, 8]);
        assert_eq!(encoded.final_state().map(|s| s.hidden.dims()[0]), Some(2));
    }
}

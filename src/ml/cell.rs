// ============================================================
// Layer 5 — Recurrent Cells
// ============================================================
// One cell module covers the three classic variants. All gates
// of a variant are computed by a single pair of projections and
// then sliced apart:
//
//   gx = W · x + b        [batch, gates * units]
//   gh = U · h            [batch, gates * units]
//
//   Basic: h' = tanh(gx + gh)
//   GRU:   r = σ(gx_r + gh_r), z = σ(gx_z + gh_z)
//          n = tanh(W_n · x + b_n + r ⊙ (U_n · h))
//          h' = (1 - z) ⊙ n + z ⊙ h
//
// The GRU applies the reset gate after the recurrent projection
// (the cuDNN / "reset_after" form), not to h before it as in
// Cho et al.; weights from a reset-before GRU do not carry over.
//   LSTM:  c' = σ(f + 1) ⊙ c + σ(i) ⊙ tanh(g)
//          h' = σ(o) ⊙ tanh(c')
//
// A cell's input width equals its unit count; encoders embed
// straight into that width and the decoder projects into it.
//
// Reference: Cho et al. (2014) GRU
//            Hochreiter & Schmidhuber (1997) LSTM

use std::{fmt, str::FromStr};

use anyhow::{bail, Result};
use burn::{
    module::Ignored,
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};
use serde::{Deserialize, Serialize};

use crate::domain::params::{AssignReport, ParamDict};
use crate::ml::params::{NamedParams, Scope};

/// Added to the LSTM forget gate so fresh cells start by remembering
const FORGET_BIAS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Basic,
    Gru,
    Lstm,
}

impl CellKind {
    /// Number of gate blocks computed per step
    pub fn gates(self) -> usize {
        match self {
            CellKind::Basic => 1,
            CellKind::Gru   => 3,
            CellKind::Lstm  => 4,
        }
    }

    /// Whether the state carries a separate memory vector
    pub fn has_memory(self) -> bool {
        matches!(self, CellKind::Lstm)
    }
}

impl FromStr for CellKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" | "rnn" => Ok(CellKind::Basic),
            "gru"           => Ok(CellKind::Gru),
            "lstm"          => Ok(CellKind::Lstm),
            other           => bail!("unknown cell type '{other}' (expected basic, gru or lstm)"),
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Basic => "basic",
            CellKind::Gru   => "gru",
            CellKind::Lstm  => "lstm",
        };
        f.write_str(name)
    }
}

// ─── ResizableCell ────────────────────────────────────────────────────────────
/// Cell descriptions that can produce a variant of themselves with a
/// different width. The decoder is built from `widened(2)` of the
/// encoder cell so it can consume the two concatenated encoder states.
pub trait ResizableCell: Sized {
    fn units(&self) -> usize;

    fn resized(&self, units: usize) -> Self;

    fn widened(&self, factor: usize) -> Self {
        self.resized(self.units() * factor)
    }
}

#[derive(Config, Debug)]
pub struct RecurrentCellConfig {
    pub kind:  CellKind,
    pub units: usize,
}

impl ResizableCell for RecurrentCellConfig {
    fn units(&self) -> usize {
        self.units
    }

    fn resized(&self, units: usize) -> Self {
        Self { kind: self.kind, units }
    }
}

impl RecurrentCellConfig {
    /// Width of the vectors fed into the cell
    pub fn d_input(&self) -> usize {
        self.units
    }

    /// Width of `CellState::flatten`
    pub fn state_width(&self) -> usize {
        if self.kind.has_memory() { 2 * self.units } else { self.units }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> RecurrentCell<B> {
        let gate_width = self.kind.gates() * self.units;
        RecurrentCell {
            input_gates:  LinearConfig::new(self.d_input(), gate_width).init(device),
            hidden_gates: LinearConfig::new(self.units, gate_width)
                .with_bias(false)
                .init(device),
            kind:  Ignored(self.kind),
            units: self.units,
        }
    }
}

// ─── CellState ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CellState<B: Backend> {
    /// h — also the cell's output
    pub hidden: Tensor<B, 2>,
    /// c — LSTM only
    pub memory: Option<Tensor<B, 2>>,
}

impl<B: Backend> CellState<B> {
    pub fn new(hidden: Tensor<B, 2>, memory: Option<Tensor<B, 2>>) -> Self {
        Self { hidden, memory }
    }

    /// Feature-wise concatenation, component by component.
    pub fn concat(first: Self, second: Self) -> Self {
        let hidden = Tensor::cat(vec![first.hidden, second.hidden], 1);
        let memory = match (first.memory, second.memory) {
            (Some(a), Some(b)) => Some(Tensor::cat(vec![a, b], 1)),
            _                  => None,
        };
        Self { hidden, memory }
    }

    /// The state as one vector `[memory, hidden]`; used as attention query.
    pub fn flatten(&self) -> Tensor<B, 2> {
        match &self.memory {
            Some(memory) => Tensor::cat(vec![memory.clone(), self.hidden.clone()], 1),
            None         => self.hidden.clone(),
        }
    }

    /// Row-wise choice between two states; `mask` is `[n, 1]` of 0/1.
    pub fn select(mask: &Tensor<B, 2>, if_true: Self, if_false: Self) -> Self {
        let hidden = blend(mask, if_true.hidden, if_false.hidden);
        let memory = match (if_true.memory, if_false.memory) {
            (Some(a), Some(b)) => Some(blend(mask, a, b)),
            _                  => None,
        };
        Self { hidden, memory }
    }
}

/// `mask ⊙ a + (1 - mask) ⊙ b`, broadcasting a `[n, 1]` mask over features.
pub fn blend<B: Backend>(mask: &Tensor<B, 2>, a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
    let inverse = mask.clone().mul_scalar(-1.0).add_scalar(1.0);
    a * mask.clone() + b * inverse
}

// ─── RecurrentCell ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct RecurrentCell<B: Backend> {
    pub input_gates:  Linear<B>,
    pub hidden_gates: Linear<B>,
    pub kind:         Ignored<CellKind>,
    pub units:        usize,
}

impl<B: Backend> RecurrentCell<B> {
    pub fn kind(&self) -> CellKind {
        self.kind.0
    }

    pub fn output_size(&self) -> usize {
        self.units
    }

    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> CellState<B> {
        let hidden = Tensor::zeros([batch_size, self.units], device);
        let memory = self
            .kind()
            .has_memory()
            .then(|| Tensor::zeros([batch_size, self.units], device));
        CellState::new(hidden, memory)
    }

    /// One time step: input `[batch, units]` → (output `[batch, units]`, new state)
    pub fn step(&self, input: Tensor<B, 2>, state: CellState<B>) -> (Tensor<B, 2>, CellState<B>) {
        let gx = self.input_gates.forward(input);
        let gh = self.hidden_gates.forward(state.hidden.clone());

        match self.kind() {
            CellKind::Basic => {
                let hidden = activation::tanh(gx + gh);
                (hidden.clone(), CellState::new(hidden, None))
            }
            CellKind::Gru => {
                let reset  = activation::sigmoid(self.gate(&gx, 0) + self.gate(&gh, 0));
                let update = activation::sigmoid(self.gate(&gx, 1) + self.gate(&gh, 1));
                let candidate = activation::tanh(self.gate(&gx, 2) + reset * self.gate(&gh, 2));
                // h' = n + z ⊙ (h - n)
                let hidden = candidate.clone() + update * (state.hidden - candidate);
                (hidden.clone(), CellState::new(hidden, None))
            }
            CellKind::Lstm => {
                let memory = state
                    .memory
                    .unwrap_or_else(|| Tensor::zeros_like(&state.hidden));
                let input_gate  = activation::sigmoid(self.gate(&gx, 0) + self.gate(&gh, 0));
                let forget_gate = activation::sigmoid(
                    (self.gate(&gx, 1) + self.gate(&gh, 1)).add_scalar(FORGET_BIAS),
                );
                let candidate   = activation::tanh(self.gate(&gx, 2) + self.gate(&gh, 2));
                let output_gate = activation::sigmoid(self.gate(&gx, 3) + self.gate(&gh, 3));

                let memory = forget_gate * memory + input_gate * candidate;
                let hidden = output_gate * activation::tanh(memory.clone());
                (hidden.clone(), CellState::new(hidden, Some(memory)))
            }
        }
    }

    /// Gate block `k` out of a fused `[batch, gates * units]` projection
    fn gate(&self, fused: &Tensor<B, 2>, k: usize) -> Tensor<B, 2> {
        let [batch, _] = fused.dims();
        fused
            .clone()
            .slice([0..batch, k * self.units..(k + 1) * self.units])
    }
}

impl<B: Backend> NamedParams<B> for RecurrentCell<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        self.input_gates.visit_params(&scope.child("input_gates"), out)?;
        self.hidden_gates.visit_params(&scope.child("hidden_gates"), out)
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.input_gates = self
            .input_gates
            .assign_params(&scope.child("input_gates"), vals, report)?;
        self.hidden_gates = self
            .hidden_gates
            .assign_params(&scope.child("hidden_gates"), vals, report)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_widened_doubles_units_and_keeps_kind() {
        let cfg  = RecurrentCellConfig::new(CellKind::Lstm, 16);
        let wide = cfg.widened(2);
        assert_eq!(wide.units, 32);
        assert_eq!(wide.kind, CellKind::Lstm);
        assert_eq!(wide.d_input(), 32);
        assert_eq!(wide.state_width(), 64);
    }

    #[test]
    fn test_cell_kind_parses_case_insensitively() {
        assert_eq!("GRU".parse::<CellKind>().unwrap(), CellKind::Gru);
        assert_eq!("rnn".parse::<CellKind>().unwrap(), CellKind::Basic);
        assert!("transformer".parse::<CellKind>().is_err());
        assert_eq!(CellKind::Lstm.to_string(), "lstm");
    }

    #[test]
    fn test_step_shapes_for_every_kind() {
        let device = Default::default();
        for kind in [CellKind::Basic, CellKind::Gru, CellKind::Lstm] {
            let cell: RecurrentCell<TestBackend> =
                RecurrentCellConfig::new(kind, 6).init(&device);
            let state = cell.zero_state(3, &device);
            let input = Tensor::<TestBackend, 2>::ones([3, 6], &device);

            let (output, state) = cell.step(input, state);
            assert_eq!(output.dims(), [3, 6]);
            assert_eq!(state.hidden.dims(), [3, 6]);
            assert_eq!(state.memory.is_some(), kind.has_memory());
        }
    }

    #[test]
    fn test_gru_resets_after_the_recurrent_projection() {
        use burn::module::Param;
        use burn::tensor::TensorData;

        let device = Default::default();
        let mut cell: RecurrentCell<TestBackend> =
            RecurrentCellConfig::new(CellKind::Gru, 2).init(&device);
        // Gate columns: r0 r1 | z0 z1 | n0 n1
        // r = (0.5, 1), z = 0, and n0 only reads h1
        cell.input_gates.weight = Param::from_tensor(Tensor::zeros([2, 6], &device));
        cell.input_gates.bias = Some(Param::from_tensor(Tensor::from_data(
            TensorData::new(vec![0.0f32, 100.0, -100.0, -100.0, 0.0, 0.0], [6]),
            &device,
        )));
        cell.hidden_gates.weight = Param::from_tensor(Tensor::from_data(
            TensorData::new(
                vec![0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                [2, 6],
            ),
            &device,
        ));

        let input = Tensor::<TestBackend, 2>::zeros([1, 2], &device);
        let state = CellState::new(Tensor::ones([1, 2], &device), None);
        let (output, _) = cell.step(input, state);
        let output: Vec<f32> = output.into_data().to_vec().unwrap();

        // tanh(r0 · (U_n h)_0) = tanh(0.5); resetting h first would give tanh(1)
        assert!((output[0] - 0.5f32.tanh()).abs() < 1e-5, "n0 = {}", output[0]);
    }

    #[test]
    fn test_outputs_stay_bounded() {
        // Every variant squashes through tanh, so |h| <= 1
        let device = Default::default();
        let cell: RecurrentCell<TestBackend> =
            RecurrentCellConfig::new(CellKind::Gru, 4).init(&device);
        let input = Tensor::<TestBackend, 2>::ones([2, 4], &device).mul_scalar(50.0);
        let (output, _) = cell.step(input, cell.zero_state(2, &device));

        let max = output.abs().max().into_scalar().elem::<f32>();
        assert!(max <= 1.0 + 1e-5);
    }

    #[test]
    fn test_concat_and_flatten_widths() {
        let device = Default::default();
        let cell: RecurrentCell<TestBackend> =
            RecurrentCellConfig::new(CellKind::Lstm, 5).init(&device);
        let joined = CellState::concat(cell.zero_state(2, &device), cell.zero_state(2, &device));

        assert_eq!(joined.hidden.dims(), [2, 10]);
        assert_eq!(joined.memory.as_ref().map(|m| m.dims()), Some([2, 10]));
        assert_eq!(joined.flatten().dims(), [2, 20]);
    }

    #[test]
    fn test_blend_picks_rows_by_mask() {
        let device = Default::default();
        let a    = Tensor::<TestBackend, 2>::ones([2, 3], &device);
        let b    = Tensor::<TestBackend, 2>::zeros([2, 3], &device);
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0], [0.0]], &device);

        let mixed: Vec<f32> = blend(&mask, a, b)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(mixed, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_named_params_cover_both_projections() {
        let device = Default::default();
        let cell: RecurrentCell<TestBackend> =
            RecurrentCellConfig::new(CellKind::Gru, 4).init(&device);

        let mut out = ParamDict::new();
        cell.visit_params(&Scope::new("enc").child("cell"), &mut out).unwrap();

        let names: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "enc/cell/hidden_gates/weight",
                "enc/cell/input_gates/bias",
                "enc/cell/input_gates/weight",
            ]
        );
        assert_eq!(out["enc/cell/input_gates/weight"].shape, vec![4, 12]);
    }
}

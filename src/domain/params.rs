// ============================================================
// Layer 3 — Parameter Snapshots
// ============================================================
// A ParamDict is what a trained model looks like once it has
// been pulled out of the tensor runtime: a map from the fully
// qualified parameter name to a flat row-major array.
//
// Example entry:
//   "generator/embedding_attention_seq2seq_context/context_rnn/embedding/weight"
//       → ParamArray { shape: [120, 64], values: [... 7680 floats ...] }
//
// The map is ordered (BTreeMap) so that saved checkpoints are
// stable across runs and diff cleanly.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Name → value snapshot of a model's trainable tensors.
pub type ParamDict = BTreeMap<String, ParamArray>;

/// One tensor's value, detached from any device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamArray {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

impl ParamArray {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    /// Number of elements the shape describes
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// True when the value buffer actually fills the shape
    pub fn is_consistent(&self) -> bool {
        self.numel() == self.values.len()
    }
}

/// Outcome of pushing a ParamDict into a live network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignReport {
    /// Parameters whose value was replaced
    pub assigned:  Vec<String>,

    /// In-scope parameters with no entry in the dictionary (kept as they were)
    pub untouched: Vec<String>,

    /// Dictionary keys that matched no parameter
    pub ignored:   Vec<String>,
}

impl AssignReport {
    /// Fill `ignored` with every key of `vals` that was not assigned.
    pub fn collect_ignored(&mut self, vals: &ParamDict) {
        let assigned: BTreeSet<&str> = self.assigned.iter().map(String::as_str).collect();
        self.ignored = vals
            .keys()
            .filter(|k| !assigned.contains(k.as_str()))
            .cloned()
            .collect();
    }

    /// Every in-scope parameter was assigned and no key was left over
    pub fn is_exact(&self) -> bool {
        self.untouched.is_empty() && self.ignored.is_empty()
    }
}

// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Lists what a checkpoint directory holds without building a
// network: the saved settings and every stored parameter with
// its shape.

use anyhow::Result;

use crate::infra::checkpoint::CheckpointManager;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSummary {
    pub name:  String,
    pub shape: Vec<usize>,
    pub numel: usize,
}

pub struct CheckpointSummary {
    pub epoch:    usize,
    pub settings: serde_json::Value,
    pub params:   Vec<ParamSummary>,
}

impl CheckpointSummary {
    pub fn total_values(&self) -> usize {
        self.params.iter().map(|p| p.numel).sum()
    }
}

pub struct InspectUseCase {
    ckpt: CheckpointManager,
}

impl InspectUseCase {
    pub fn new(checkpoint_dir: &str) -> Result<Self> {
        Ok(Self { ckpt: CheckpointManager::new(checkpoint_dir)? })
    }

    pub fn summarize(&self) -> Result<CheckpointSummary> {
        let epoch    = self.ckpt.latest_epoch()?;
        let settings = self.ckpt.load_settings()?;
        let params   = self
            .ckpt
            .load_params(epoch)?
            .into_iter()
            .map(|(name, array)| ParamSummary {
                numel: array.numel(),
                shape: array.shape,
                name,
            })
            .collect();

        Ok(CheckpointSummary { epoch, settings, params })
    }
}

// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists what ScopedModel produces:
//
//   checkpoints/
//     settings.json        ← get_all_settings()
//     params_epoch_1.json  ← get_model_params() after epoch 1
//     params_epoch_2.json
//     ...
//     latest_epoch.json    ← number of the newest params file
//
// Loading mirrors it: settings go through load_all_settings(),
// parameters through set_model_params(). Names inside the params
// file are the full scoped names, so a checkpoint only loads into
// a model with the same scope name.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};

use crate::domain::params::ParamDict;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory when missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write the model settings (everything but the weights).
    pub fn save_settings<S: Serialize>(&self, settings: &S) -> Result<()> {
        let path = self.dir.join("settings.json");
        fs::write(&path, serde_json::to_string_pretty(settings)?)
            .with_context(|| format!("Cannot write settings to '{}'", path.display()))?;
        tracing::debug!("Saved settings to '{}'", path.display());
        Ok(())
    }

    /// Settings as a raw JSON value, ready for `load_all_settings`.
    pub fn load_settings(&self) -> Result<serde_json::Value> {
        self.read_json("settings.json")
    }

    /// Write the parameters after `epoch` and point latest_epoch.json at them.
    pub fn save_params(&self, params: &ParamDict, epoch: usize) -> Result<()> {
        let path = self.params_path(epoch);
        fs::write(&path, serde_json::to_string(params)?)
            .with_context(|| format!("Failed to save parameters to '{}'", path.display()))?;

        let latest = self.dir.join("latest_epoch.json");
        fs::write(&latest, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved {} parameters for epoch {}", params.len(), epoch);
        Ok(())
    }

    /// Parameters of the newest saved epoch.
    pub fn load_latest_params(&self) -> Result<ParamDict> {
        let epoch = self.latest_epoch()?;
        tracing::info!("Loading parameters from epoch {}", epoch);
        self.load_params(epoch)
    }

    pub fn load_params(&self, epoch: usize) -> Result<ParamDict> {
        self.read_json(&format!("params_epoch_{epoch}.json"))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_json::<usize>("latest_epoch.json")
            .with_context(|| "No saved epoch found. Have you run 'train' first?")
    }

    fn params_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("params_epoch_{epoch}.json"))
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Cannot parse '{}'", path.display()))
    }
}

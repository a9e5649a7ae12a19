// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to checkpoints/metrics.csv:
//
//   epoch,train_loss,val_loss,token_acc
//   1,4.812300,4.377100,0.104000
//   2,3.901200,3.655800,0.187000
//
// token_acc is the share of non-padding target tokens that greedy
// decoding (feeding back its own predictions) gets right.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean cross entropy over training batches (teacher forcing)
    pub train_loss: f64,
    /// Mean cross entropy over validation batches (teacher forcing)
    pub val_loss:   f64,
    /// Greedy-decoding token accuracy on the validation set, in [0, 1]
    pub token_acc:  f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, token_acc: f64) -> Self {
        Self { epoch, train_loss, val_loss, token_acc }
    }

    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open (or start) metrics.csv in `dir`; the header is written once.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,val_loss,token_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.token_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch, m.train_loss, m.val_loss,
        );
        Ok(())
    }
}

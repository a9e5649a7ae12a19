// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads dialogue turns from JSON-lines files. Every *.jsonl file
// in the directory contributes one turn per non-blank line:
//
//   {"context": "any chinese places?", "input": "inform(name=golden_wok,food=chinese)",
//    "target": "golden wok serves chinese food"}
//
// Files are read in name order so the corpus order (and with a
// fixed seed, the train/validation split) is reproducible.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::traits::TurnSource;
use crate::domain::turn::DialogueTurn;

pub struct JsonlLoader {
    dir: PathBuf,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TurnSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<DialogueTurn>> {
        if !self.dir.exists() {
            tracing::warn!(
                "Data directory '{}' does not exist, returning empty corpus",
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("jsonl"))
            .collect();
        files.sort();

        let mut turns = Vec::new();
        for path in &files {
            let loaded = load_jsonl(path)?;
            tracing::debug!("Loaded {} turns from '{}'", loaded.len(), path.display());
            turns.extend(loaded);
        }

        tracing::info!("Read {} turns from {} files", turns.len(), files.len());
        Ok(turns)
    }
}

/// Parse one JSON-lines file; errors name the offending line.
pub fn load_jsonl(path: &Path) -> Result<Vec<DialogueTurn>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<DialogueTurn>(line)
                .with_context(|| format!("{}:{}: malformed turn", path.display(), i + 1))
        })
        .collect()
}

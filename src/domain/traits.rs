// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits, never to the
// concrete loaders or models behind them:
//
//   TurnSource  — JsonlLoader reads turns from *.jsonl files
//   Generator   — Inferencer realises an input act as text

use anyhow::Result;
use crate::domain::turn::DialogueTurn;

// ─── TurnSource ───────────────────────────────────────────────────────────────
/// Any component that can produce dialogue turns for training.
pub trait TurnSource {
    fn load_all(&self) -> Result<Vec<DialogueTurn>>;
}

// ─── Generator ────────────────────────────────────────────────────────────────
/// Any component that turns a (context, input act) pair into a sentence.
pub trait Generator {
    fn generate(&self, context: &str, input: &str) -> Result<String>;
}

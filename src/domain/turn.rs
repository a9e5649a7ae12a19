// ============================================================
// Layer 3 — DialogueTurn Domain Type
// ============================================================
// One training example for the context-aware generator:
//
//   context: what the user said before       ("is there a chinese place")
//   input:   the dialogue act to realise      ("inform name=golden_wok food=chinese")
//   target:  the surface sentence to produce  ("golden wok serves chinese food")
//
// The context and input are fed to separate encoders; the
// target is what the decoder learns to generate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Preceding utterance the answer should stay coherent with
    #[serde(default)]
    pub context: String,

    /// Linearised dialogue act
    pub input: String,

    /// Reference realisation; empty when only generating
    #[serde(default)]
    pub target: String,
}

impl DialogueTurn {
    pub fn new(
        context: impl Into<String>,
        input:   impl Into<String>,
        target:  impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            input:   input.into(),
            target:  target.into(),
        }
    }

    pub fn has_target(&self) -> bool {
        !self.target.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_context_defaults_to_empty() {
        let turn: DialogueTurn =
            serde_json::from_str(r#"{"input": "hello()", "target": "hi"}"#).unwrap();
        assert_eq!(turn.context, "");
        assert!(turn.has_target());
    }

    #[test]
    fn test_blank_target_is_not_a_target() {
        let turn = DialogueTurn::new("", "bye()", "   ");
        assert!(!turn.has_target());
    }
}

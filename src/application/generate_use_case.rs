// ============================================================
// Layer 2 — Generate Use Case
// ============================================================
// Loads the tokenizer and the newest checkpoint once, then turns
// (context, input act) pairs into sentences.

use anyhow::Result;

use crate::domain::traits::Generator;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::inferencer::Inferencer;

pub struct GenerateUseCase {
    generator: Box<dyn Generator>,
}

impl GenerateUseCase {
    pub fn new(checkpoint_dir: &str) -> Result<Self> {
        let tokenizer  = TokenizerStore::new(checkpoint_dir).load()?;
        let ckpt       = CheckpointManager::new(checkpoint_dir)?;
        let inferencer = Inferencer::from_checkpoint(&ckpt, tokenizer)?;
        Ok(Self::with_generator(Box::new(inferencer)))
    }

    pub fn with_generator(generator: Box<dyn Generator>) -> Self {
        Self { generator }
    }

    pub fn reply(&self, context: &str, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            anyhow::bail!("The input act must not be empty");
        }
        let reply = self.generator.generate(context, input)?;
        tracing::debug!("'{}' + '{}' → '{}'", context, input, reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Generator for Echo {
        fn generate(&self, context: &str, input: &str) -> Result<String> {
            Ok(format!("{context}|{input}"))
        }
    }

    #[test]
    fn test_reply_delegates_to_generator() {
        let use_case = GenerateUseCase::with_generator(Box::new(Echo));
        assert_eq!(use_case.reply("hi", "greet()").unwrap(), "hi|greet()");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let use_case = GenerateUseCase::with_generator(Box::new(Echo));
        assert!(use_case.reply("hi", "  ").is_err());
    }

    #[test]
    fn test_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GenerateUseCase::new(&dir.path().display().to_string()).is_err());
    }
}

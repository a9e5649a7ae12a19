// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads the word-level tokenizer shared by both
// encoders and the decoder.
//
// The vocabulary is counted with Preprocessor::split_words, which
// runs the same Lowercase normalizer and Whitespace pre-tokenizer
// as the saved tokenizer, and written straight into a HuggingFace
// tokenizer.json:
//
//   <pad> 0   <unk> 1   <go> 2   <eos> 3   then words by frequency
//
// Reference: HuggingFace tokenizers — WordLevel model

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf};
use tokenizers::Tokenizer;

use crate::data::dataset::{EOS_ID, GO_ID, PAD_ID, UNK_ID};
use crate::data::preprocessor::Preprocessor;

pub const SPECIAL_TOKENS: [(&str, u32); 4] = [
    ("<pad>", PAD_ID),
    ("<unk>", UNK_ID),
    ("<go>",  GO_ID),
    ("<eos>", EOS_ID),
];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load an existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Count words, keep the `vocab_size - 4` most frequent, write
    /// tokenizer.json and load it back.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let prep = Preprocessor::new();
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in prep.split_words(text)? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }
        for (token, _) in SPECIAL_TOKENS {
            freq.remove(token);
        }

        // Most frequent first, ties alphabetically so builds are reproducible
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (i, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(SPECIAL_TOKENS.len() + i));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .map(|(token, id)| {
                serde_json::json!({
                    "id": id, "content": token, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "<unk>"
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!(
            "Tokenizer built with {} entries, saved to '{}'",
            SPECIAL_TOKENS.len() + words.len(),
            path.display()
        );

        self.load()
    }
}

/// Token ids of `text`, without special tokens.
pub fn encode_ids(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let encoding = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
    Ok(encoding.get_ids().to_vec())
}

/// Text for `ids`, special tokens dropped.
pub fn decode_ids(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    tokenizer
        .decode(ids, true)
        .map_err(|e| anyhow::anyhow!("Decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "inform(food=chinese)".to_string(),
            "golden wok serves chinese food".to_string(),
        ]
    }

    #[test]
    fn test_specials_come_first() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).build_and_save(&corpus(), 100).unwrap();

        assert_eq!(tok.token_to_id("<pad>"), Some(PAD_ID));
        assert_eq!(tok.token_to_id("<eos>"), Some(EOS_ID));
        // "chinese" and "food" occur twice, so they get the first word ids
        assert_eq!(tok.token_to_id("chinese"), Some(4));
        assert_eq!(tok.token_to_id("food"), Some(5));
    }

    #[test]
    fn test_encode_matches_vocabulary_split() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).build_and_save(&corpus(), 100).unwrap();

        let ids = encode_ids(&tok, "Inform(food=Chinese)").unwrap();
        assert_eq!(ids.len(), 6);
        assert!(!ids.contains(&UNK_ID));
        assert_eq!(encode_ids(&tok, "pizza").unwrap(), vec![UNK_ID]);
    }

    #[test]
    fn test_accented_words_are_in_vocabulary() {
        let dir  = tempfile::tempdir().unwrap();
        let text = vec!["cafe\u{0301} open".to_string()];
        let tok  = TokenizerStore::new(dir.path()).build_and_save(&text, 100).unwrap();

        let ids = encode_ids(&tok, "Cafe\u{0301} open").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&UNK_ID));
    }

    #[test]
    fn test_vocab_size_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).build_and_save(&corpus(), 6).unwrap();
        assert_eq!(tok.get_vocab_size(false), 6);
    }

    #[test]
    fn test_load_or_build_reuses_saved_file() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        store.build_and_save(&corpus(), 100).unwrap();

        // Different texts, but the saved vocabulary wins
        let tok = store.load_or_build(&["zebra".to_string()], 100).unwrap();
        assert!(tok.token_to_id("zebra").is_none());
        assert_eq!(decode_ids(&tok, &[GO_ID, 4, 5, EOS_ID]).unwrap(), "chinese food");
    }
}

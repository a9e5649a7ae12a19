// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises one utterance or dialogue act before tokenisation.
//
// Corpus lines come from annotation tools and spreadsheets and
// carry the usual debris: tabs, non-breaking spaces, zero-width
// spaces, stray line breaks. Each field is a single line, so
// cleaning is:
//
//   1. Map every whitespace variant and control character to ' '
//   2. Collapse runs of spaces
//   3. Trim both ends
//
// `split_words` runs the tokenizer's own Lowercase normalizer and
// Whitespace pre-tokenizer, so the vocabulary is counted over
// exactly the pieces the tokenizer will later look up:
//
//   "inform(food=Chinese)" → ["inform", "(", "food", "=", "chinese", ")"]

use anyhow::{anyhow, Result};
use tokenizers::{
    normalizers::Lowercase, pre_tokenizers::whitespace::Whitespace, Normalizer,
    OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer,
};

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_whitespace() || c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Lowercased word / punctuation pieces, as the tokenizer sees them.
    pub fn split_words(&self, text: &str) -> Result<Vec<String>> {
        let mut pre = PreTokenizedString::from(text);
        pre.normalize(|n| Lowercase.normalize(n))
            .map_err(|e| anyhow!("Cannot normalise '{text}': {e}"))?;
        Whitespace::default()
            .pre_tokenize(&mut pre)
            .map_err(|e| anyhow!("Cannot split '{text}': {e}"))?;

        Ok(pre
            .get_splits(OffsetReferential::Original, OffsetType::Byte)
            .into_iter()
            .map(|(piece, _, _)| piece.to_string())
            .collect())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_and_trims_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  there is   a\tplace  "), "there is a place");
    }

    #[test]
    fn test_line_breaks_become_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("first\r\nsecond"), "first second");
    }

    #[test]
    fn test_invisible_characters_removed() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("a\u{200B}b\u{00A0}c\x01d"), "a b c d");
    }

    #[test]
    fn test_split_words_separates_punctuation() {
        let p = Preprocessor::new();
        assert_eq!(
            p.split_words("inform(food=Chinese)").unwrap(),
            vec!["inform", "(", "food", "=", "chinese", ")"]
        );
        assert_eq!(p.split_words("it's 5pm...").unwrap(), vec!["it", "'", "s", "5pm", "..."]);
        assert!(p.split_words("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_words_keeps_combining_marks_in_the_word() {
        let p = Preprocessor::new();
        assert_eq!(
            p.split_words("Cafe\u{0301} open").unwrap(),
            vec!["cafe\u{0301}", "open"]
        );
    }
}

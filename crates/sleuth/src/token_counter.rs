use std::path::Path;

use anyhow::{anyhow, Result};
use tiktoken_rs::CoreBPE;
use tokenizers::tokenizer::Tokenizer;

use crate::models::message::Message;
use crate::providers::configs::OPENAI_MODEL;
use crate::providers::utils::messages_to_openai_spec;

enum Encoder {
    /// HuggingFace `tokenizer.json` supplied by the user
    HuggingFace(Tokenizer),
    /// BPE ranks of an OpenAI model
    Bpe(CoreBPE),
    /// Four characters per token
    Estimate,
}

/// Counts tokens the way the model in use does. Uses the model's BPE encoding by
/// default, or a HuggingFace tokenizer file when one is configured.
pub struct TokenCounter {
    encoder: Encoder,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::for_model(OPENAI_MODEL)
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the encoding for `model`. Models the encoding table does not know use
    /// `cl100k_base`.
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model).or_else(|e| {
            tracing::debug!(model, error = %e, "unknown model, counting with cl100k_base");
            tiktoken_rs::cl100k_base()
        });
        match bpe {
            Ok(bpe) => Self {
                encoder: Encoder::Bpe(bpe),
            },
            Err(e) => {
                tracing::warn!(model, error = %e, "no tokenizer available, estimating token counts");
                Self::estimating()
            }
        }
    }

    /// Load a `tokenizer.json` matching the model in use
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {}", path.display(), e))?;
        Ok(Self {
            encoder: Encoder::HuggingFace(tokenizer),
        })
    }

    pub fn estimating() -> Self {
        Self {
            encoder: Encoder::Estimate,
        }
    }

    pub fn is_estimating(&self) -> bool {
        matches!(self.encoder, Encoder::Estimate)
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        match &self.encoder {
            Encoder::HuggingFace(tokenizer) => match tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    tracing::warn!(error = %e, "tokenizer failed, estimating instead");
                    estimate_tokens(text)
                }
            },
            Encoder::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Encoder::Estimate => estimate_tokens(text),
        }
    }

    /// Token count of the conversation as it would be serialized on the wire
    pub fn count_chat_tokens(&self, messages: &[Message]) -> usize {
        let serialized = serde_json::Value::Array(messages_to_openai_spec(messages)).to_string();
        self.count_tokens(&serialized)
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate() {
        let counter = TokenCounter::estimating();
        assert!(counter.is_estimating());
        assert_eq!(counter.count_tokens(""), 0);
        assert_eq!(counter.count_tokens("abcd"), 1);
        assert_eq!(counter.count_tokens("abcde"), 2);
    }

    #[test]
    fn test_chat_tokens_grow_with_conversation() {
        let counter = TokenCounter::new();
        let short = vec![Message::user().with_text("Hi")];
        let long = vec![
            Message::user().with_text("Hi"),
            Message::assistant().with_text("a ".repeat(400)),
        ];
        assert!(counter.count_chat_tokens(&long) > counter.count_chat_tokens(&short) + 350);
    }

    #[test]
    fn test_default_counts_with_model_encoding() {
        let counter = TokenCounter::default();
        assert!(!counter.is_estimating());

        // Short words are one token each, far more than a characters/4 guess
        let text = "a ".repeat(1000);
        let count = counter.count_tokens(&text);
        assert!(count >= 900, "counted {}", count);
        assert!(count > TokenCounter::estimating().count_tokens(&text) * 3 / 2);
    }

    #[test]
    fn test_unknown_model_uses_fallback_encoding() {
        let counter = TokenCounter::for_model("some-local-model");
        assert!(!counter.is_estimating());
        assert_eq!(
            counter.count_tokens("hello world"),
            TokenCounter::for_model("gpt-4").count_tokens("hello world")
        );
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let result = TokenCounter::from_file("does/not/exist/tokenizer.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_tokenizer_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [],
                "normalizer": null,
                "pre_tokenizer": {{"type": "Whitespace"}},
                "post_processor": null,
                "decoder": null,
                "model": {{
                    "type": "WordLevel",
                    "vocab": {{"hello": 0, "world": 1, "[UNK]": 2}},
                    "unk_token": "[UNK]"
                }}
            }}"#
        )
        .unwrap();

        let counter = TokenCounter::from_file(file.path()).unwrap();
        assert!(!counter.is_estimating());
        assert_eq!(counter.count_tokens("hello world again"), 3);
    }
}

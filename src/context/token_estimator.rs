//! Token counting using tiktoken

use super::models::Message;
use crate::error::{ChatError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use tracing::{debug, warn};

/// Model whose encoding is used when the requested model is unrecognized
pub const FALLBACK_MODEL: &str = "gpt-3.5-turbo";

/// Token counting strategy.
///
/// Implementations must be deterministic for identical `(text, model)` pairs
/// and must never fail the caller.
pub trait TokenEstimator: Send + Sync {
    /// Count the tokens in `text` as seen by `model`
    fn count(&self, text: &str, model: &str) -> usize;

    /// Sum of token counts over message contents
    fn count_messages(&self, messages: &[Message], model: &str) -> usize {
        messages.iter().map(|m| self.count(&m.content, model)).sum()
    }
}

/// Tiktoken-based estimator that resolves the BPE per model name and caches it
pub struct TiktokenEstimator {
    fallback: Arc<CoreBPE>,
    encodings: Mutex<HashMap<String, Arc<CoreBPE>>>,
}

impl TiktokenEstimator {
    /// Create a new estimator; loads the fallback (cl100k_base) encoding eagerly
    pub fn new() -> Result<Self> {
        let fallback = cl100k_base()
            .map_err(|e| ChatError::Configuration(format!("Failed to load tokenizer: {}", e)))?;
        Ok(Self {
            fallback: Arc::new(fallback),
            encodings: Mutex::new(HashMap::new()),
        })
    }

    fn encoding_for(&self, model: &str) -> Arc<CoreBPE> {
        let mut encodings = match self.encodings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(bpe) = encodings.get(model) {
            return Arc::clone(bpe);
        }

        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => {
                debug!(model, "Loaded tokenizer encoding");
                Arc::new(bpe)
            }
            Err(_) => {
                warn!(
                    model,
                    fallback = FALLBACK_MODEL,
                    "Model not found, using fallback encoding"
                );
                Arc::clone(&self.fallback)
            }
        };

        encodings.insert(model.to_string(), Arc::clone(&bpe));
        bpe
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn count(&self, text: &str, model: &str) -> usize {
        self.encoding_for(model).encode_with_special_tokens(text).len()
    }
}

/// Word-based token estimator (approximation, model-independent)
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn count(&self, text: &str, _model: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}

//! Token counting
//!
//! [`TiktokenCounter`] resolves a BPE encoding in two explicit steps: the
//! model's own encoding, else the `cl100k_base` default. Counting never fails;
//! if no encoding can be built it degrades to [`HeuristicTokenCounter`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Estimates the token cost of text for a given model.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in `text` as `model` would tokenize it
    fn count(&self, model: &str, text: &str) -> usize;
}

/// Character-ratio estimate: `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    chars_per_token: usize,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, _model: &str, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Outcome of resolving a model's encoding
#[derive(Clone)]
pub enum EncodingResolution {
    /// The model has its own encoding
    ModelSpecific(Arc<CoreBPE>),
    /// The model is unknown; the default encoding is used instead
    Fallback(Arc<CoreBPE>),
    /// No encoding could be built; counts are heuristic
    Unavailable,
}

impl EncodingResolution {
    fn bpe(&self) -> Option<&CoreBPE> {
        match self {
            EncodingResolution::ModelSpecific(bpe) | EncodingResolution::Fallback(bpe) => {
                Some(bpe.as_ref())
            }
            EncodingResolution::Unavailable => None,
        }
    }

    /// Whether the default encoding stood in for the model's own
    pub fn is_fallback(&self) -> bool {
        matches!(self, EncodingResolution::Fallback(_))
    }
}

impl std::fmt::Debug for EncodingResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EncodingResolution::ModelSpecific(_) => "ModelSpecific",
            EncodingResolution::Fallback(_) => "Fallback",
            EncodingResolution::Unavailable => "Unavailable",
        };
        f.write_str(label)
    }
}

/// BPE token counter backed by `tiktoken-rs`, caching one resolution per model.
pub struct TiktokenCounter {
    resolved: Mutex<HashMap<String, EncodingResolution>>,
    default_encoding: Mutex<Option<EncodingResolution>>,
    heuristic: HeuristicTokenCounter,
}

impl TiktokenCounter {
    pub fn new() -> Self {
        Self {
            resolved: Mutex::new(HashMap::new()),
            default_encoding: Mutex::new(None),
            heuristic: HeuristicTokenCounter::default(),
        }
    }

    /// Resolve the encoding for `model`, trying the model-specific encoding first.
    pub fn resolve(&self, model: &str) -> EncodingResolution {
        if let Some(hit) = self.lock_resolved().get(model) {
            return hit.clone();
        }

        let resolution = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => EncodingResolution::ModelSpecific(Arc::new(bpe)),
            Err(e) => {
                debug!(model = %model, error = %e, "No model-specific encoding, using cl100k_base");
                self.default_resolution()
            }
        };

        self.lock_resolved()
            .insert(model.to_string(), resolution.clone());
        resolution
    }

    fn default_resolution(&self) -> EncodingResolution {
        let mut slot = self
            .default_encoding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        slot.get_or_insert_with(|| match tiktoken_rs::cl100k_base() {
            Ok(bpe) => EncodingResolution::Fallback(Arc::new(bpe)),
            Err(e) => {
                warn!(error = %e, "Default encoding unavailable, token counts are estimates");
                EncodingResolution::Unavailable
            }
        })
        .clone()
    }

    fn lock_resolved(&self) -> std::sync::MutexGuard<'_, HashMap<String, EncodingResolution>> {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TiktokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, model: &str, text: &str) -> usize {
        let resolution = self.resolve(model);
        match resolution.bpe() {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => self.heuristic.count(model, text),
        }
    }
}

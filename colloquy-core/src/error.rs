//! Error types for Colloquy operations

/// Result type for Colloquy operations
pub type Result<T> = std::result::Result<T, ColloquyError>;

/// Error types for conversation management
#[derive(Debug, thiserror::Error)]
pub enum ColloquyError {
    /// Persona name not present in the registry
    #[error("Unknown persona: {name}. Available personas are: {}", available.join(", "))]
    UnknownPersona {
        name: String,
        available: Vec<&'static str>,
    },

    /// Rejected input (empty custom persona, out-of-range setting)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persisted history could not be read or parsed
    #[error("Failed to read conversation history '{id}': {reason}")]
    StorageRead { id: String, reason: String },

    /// Persisted history could not be written
    #[error("Failed to save conversation history '{id}': {reason}")]
    StorageWrite { id: String, reason: String },

    /// Remote completion call failed
    #[error("Completion error: {0}")]
    Completion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ColloquyError {
    /// Whether the store stays usable after this error.
    ///
    /// Only configuration problems prevent a session from continuing.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ColloquyError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_persona_lists_names() {
        let err = ColloquyError::UnknownPersona {
            name: "pirate".to_string(),
            available: vec!["sassy_assistant", "custom"],
        };
        let message = err.to_string();
        assert!(message.contains("pirate"));
        assert!(message.contains("sassy_assistant, custom"));
    }

    #[test]
    fn test_recoverable() {
        assert!(ColloquyError::Completion("timeout".into()).is_recoverable());
        assert!(!ColloquyError::Configuration("no key".into()).is_recoverable());
    }
}

//! # Colloquy - Persisted, Token-Budgeted Conversations
//!
//! Colloquy manages a multi-turn conversation with a remote chat-completion
//! endpoint:
//! - Ordered message history with a single leading system message
//! - Selectable personas (system prompts), including one custom slot
//! - Model-aware token counting and oldest-first eviction under a budget
//! - JSON persistence that survives restarts and tolerates corrupt files
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use colloquy_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ColloquyConfig::load()?;
//!     let client = Arc::new(OpenAiClient::from_config(&config.llm)?);
//!
//!     let (mut store, _) = ConversationStore::builder()
//!         .config(&config)
//!         .client(client)
//!         .storage(JsonFileStorage::timestamped(&config.storage.history_dir))
//!         .open()?;
//!
//!     store.set_persona("friendly_assistant")?;
//!     let reply = store.send_message("Hello!", SendOptions::new()).await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod persona;
pub mod tokens;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ColloquyConfig, LlmConfig, SessionConfig, StorageConfig};
    pub use crate::conversation::{
        ConversationHistory, ConversationStore, ConversationStoreBuilder, HistoryStorage,
        InMemoryStorage, JsonFileStorage, LoadOutcome, SendOptions, SessionSettings, StoreState,
    };
    pub use crate::error::{ColloquyError, Result};
    pub use crate::llm::{
        CompletionClient, CompletionRequest, CompletionResponse, Message, MessageRole,
        OpenAiClient,
    };
    pub use crate::persona::{Persona, PersonaRegistry};
    pub use crate::tokens::{HeuristicTokenCounter, TiktokenCounter, TokenCounter};
}

//! Conversation Management
//!
//! Multi-turn conversation handling with a token budget, personas, and persistence.
//!
//! # Features
//!
//! - Single system message, always first, tracking the active persona
//! - Oldest-first eviction of turns once the history exceeds its token budget
//! - JSON file persistence keyed by a history identifier
//!
//! # Example
//!
//! ```rust,ignore
//! use colloquy_core::conversation::{ConversationStore, JsonFileStorage, SendOptions};
//!
//! let (mut store, _) = ConversationStore::builder()
//!     .client(client)
//!     .storage(JsonFileStorage::new(".", "support-chat"))
//!     .open()?;
//!
//! store.set_persona("angry_assistant")?;
//! let reply = store.send_message("hello", SendOptions::new()).await?;
//! ```

mod history;
mod storage;
mod store;

pub use history::ConversationHistory;
pub use storage::{HistoryStorage, InMemoryStorage, JsonFileStorage, default_history_id};
pub use store::{
    ConversationStore, ConversationStoreBuilder, LoadOutcome, SendOptions, SessionSettings,
    StoreState,
};

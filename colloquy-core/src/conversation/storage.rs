//! History persistence
//!
//! Histories are stored as a JSON array of `{role, content}` objects under a
//! history identifier.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{ColloquyError, Result};
use crate::llm::Message;

/// Durable storage for one conversation history
pub trait HistoryStorage: Send + Sync {
    /// History identifier this storage reads and writes
    fn id(&self) -> &str;

    /// Read the persisted messages. `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<Message>>>;

    /// Overwrite the persisted messages
    fn save(&self, messages: &[Message]) -> Result<()>;
}

/// History identifier derived from a timestamp, e.g. `2024-05-01-13-45-10_conversation_history`
pub fn default_history_id(now: DateTime<Local>) -> String {
    format!("{}_conversation_history", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// One pretty-printed JSON file per history, at `<dir>/<id>`
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
    id: String,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            id: id.into(),
        }
    }

    /// Storage in `dir` named after the current local time
    pub fn timestamped(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, default_history_id(Local::now()))
    }

    /// Path of the history file
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.id)
    }

    fn read_error(&self, reason: impl ToString) -> ColloquyError {
        ColloquyError::StorageRead {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> ColloquyError {
        ColloquyError::StorageWrite {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_atomically(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_file_name(format!(".{}.tmp", self.id));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })
    }
}

impl HistoryStorage for JsonFileStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self) -> Result<Option<Vec<Message>>> {
        let path = self.path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.read_error(e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| self.read_error(e))
    }

    fn save(&self, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string_pretty(messages).map_err(|e| self.write_error(e))?;
        self.write_atomically(&self.path(), json.as_bytes())
            .map_err(|e| self.write_error(e))
    }
}

/// Process-local storage, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    id: String,
    messages: Mutex<Option<Vec<Message>>>,
    fail_writes: AtomicBool,
    save_count: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Start with previously saved messages
    pub fn with_messages(id: impl Into<String>, messages: Vec<Message>) -> Self {
        let storage = Self::new(id);
        *storage.lock() = Some(messages);
        storage
    }

    /// Make every subsequent `save` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Currently stored messages
    pub fn snapshot(&self) -> Option<Vec<Message>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<Message>>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HistoryStorage for InMemoryStorage {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self) -> Result<Option<Vec<Message>>> {
        Ok(self.snapshot())
    }

    fn save(&self, messages: &[Message]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ColloquyError::StorageWrite {
                id: self.id.clone(),
                reason: "writes disabled".to_string(),
            });
        }
        *self.lock() = Some(messages.to_vec());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

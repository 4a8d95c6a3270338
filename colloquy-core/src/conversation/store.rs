//! Conversation Store
//!
//! Owns the message history for one session: persona selection, token-budget
//! eviction, persistence, and the exchange with the completion client.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{ColloquyConfig, validate_positive, validate_temperature};
use crate::error::{ColloquyError, Result};
use crate::llm::{CompletionClient, CompletionRequest, Message};
use crate::persona::{Persona, PersonaRegistry};
use crate::tokens::TokenCounter;

use super::history::ConversationHistory;
use super::storage::HistoryStorage;

/// Store lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// History has not been loaded yet
    Uninitialized,
    /// Ready for the next request
    Idle,
    /// A completion request is in flight
    AwaitingCompletion,
}

/// How `load_history` produced the in-memory history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Persisted history was read back
    Restored,
    /// Nothing was persisted; started from the system message
    Initialized,
    /// Persisted history was unreadable; started from the system message
    Recovered,
}

/// Model and sampling settings applied to requests that do not override them
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: usize,
    pub token_budget: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings::from(&ColloquyConfig::default())
    }
}

impl From<&ColloquyConfig> for SessionSettings {
    fn from(config: &ColloquyConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.session.temperature,
            max_output_tokens: config.session.max_output_tokens,
            token_budget: config.session.token_budget,
        }
    }
}

/// Per-request overrides for `send_message`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SendOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<usize>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}

/// A persisted, token-budgeted conversation with one completion endpoint.
///
/// One store owns one history identifier. Exchanges are sequential: `send_message`
/// takes `&mut self`, so a second request cannot start while one is in flight.
pub struct ConversationStore {
    client: Arc<dyn CompletionClient>,
    counter: Arc<dyn TokenCounter>,
    storage: Box<dyn HistoryStorage>,
    settings: SessionSettings,
    personas: PersonaRegistry,
    persona: Persona,
    history: ConversationHistory,
    state: StoreState,
}

impl ConversationStore {
    /// Start building a store
    pub fn builder() -> ConversationStoreBuilder {
        ConversationStoreBuilder::new()
    }

    /// Current lifecycle state
    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Current history, system message first
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Active persona
    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Prompt of the active persona
    pub fn system_prompt(&self) -> &str {
        self.personas.prompt(self.persona)
    }

    /// Request defaults
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Identifier the history is persisted under
    pub fn history_id(&self) -> &str {
        self.storage.id()
    }

    /// Read persisted history, falling back to a fresh history on absence or corruption.
    ///
    /// Never fails: unreadable storage is logged and replaced by `[system]`.
    pub fn load_history(&mut self) -> LoadOutcome {
        let outcome = match self.storage.load() {
            Ok(Some(messages)) => {
                self.history = ConversationHistory::from_messages(messages);
                self.adopt_restored_persona();
                LoadOutcome::Restored
            }
            Ok(None) => {
                self.reset_history();
                LoadOutcome::Initialized
            }
            Err(e) => {
                warn!(
                    history_id = %self.storage.id(),
                    error = %e,
                    "Error reading the conversation history, starting with an empty history"
                );
                self.reset_history();
                LoadOutcome::Recovered
            }
        };

        self.state = StoreState::Idle;
        info!(
            history_id = %self.storage.id(),
            messages = self.history.len(),
            outcome = ?outcome,
            "Conversation history loaded"
        );
        outcome
    }

    /// Make the active persona agree with a restored history.
    ///
    /// A leading system message selects the persona it carries (a built-in
    /// prompt, else the custom slot). Without one, the active persona's prompt
    /// is inserted at index 0.
    fn adopt_restored_persona(&mut self) {
        let adopted = self
            .history
            .system_message()
            .and_then(|m| self.personas.adopt(&m.content));

        match adopted {
            Some(persona) => {
                self.persona = persona;
                debug!(persona = %persona, "Persona restored from history");
            }
            None => self.sync_system_message(),
        }
    }

    /// Persist the full history, overwriting earlier content.
    ///
    /// Failures are logged and returned; in-memory state is left untouched either way.
    pub fn save_history(&self) -> Result<()> {
        self.storage
            .save(self.history.messages())
            .inspect_err(|e| {
                warn!(history_id = %self.storage.id(), error = %e, "Failed to save conversation history");
            })
    }

    /// Activate a persona by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPersona` (listing valid names) if `name` is not registered.
    pub fn set_persona(&mut self, name: &str) -> Result<()> {
        let persona = name.parse::<Persona>()?;
        self.activate(persona);
        Ok(())
    }

    /// Store `text` in the custom slot and activate it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty text; persona and history are unchanged.
    pub fn set_custom_persona(&mut self, text: &str) -> Result<()> {
        self.personas.set_custom(text)?;
        self.set_persona(Persona::Custom.name())
    }

    fn activate(&mut self, persona: Persona) {
        self.persona = persona;
        self.sync_system_message();
        info!(persona = %persona, "Persona activated");
    }

    /// Make index 0 the system message carrying the active persona prompt.
    pub fn sync_system_message(&mut self) {
        let prompt = self.personas.prompt(self.persona).to_string();
        self.history.sync_system_message(&prompt);
    }

    /// Reset to the system message alone, then persist.
    pub fn clear_history(&mut self) {
        self.reset_history();
        info!(history_id = %self.storage.id(), "Conversation history cleared");
        let _ = self.save_history();
    }

    fn reset_history(&mut self) {
        self.history = ConversationHistory::with_system(self.personas.prompt(self.persona));
    }

    /// Token estimate for `text` under the configured model
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(&self.settings.model, text)
    }

    /// Sum of token counts over every message's content
    pub fn total_tokens_used(&self) -> usize {
        self.history
            .total_tokens(self.counter.as_ref(), &self.settings.model)
    }

    /// Evict the oldest non-system entries until the history fits the budget.
    ///
    /// Stops early when only the system message remains. Returns the number of
    /// entries removed.
    pub fn enforce_token_budget(&mut self) -> usize {
        let budget = self.settings.token_budget;
        let mut evicted = 0;

        loop {
            let total = self.total_tokens_used();
            if total <= budget {
                break;
            }
            match self.history.evict_oldest_turn() {
                Some(message) => {
                    evicted += 1;
                    debug!(
                        role = %message.role,
                        total_tokens = total,
                        budget,
                        "Evicted oldest turn over token budget"
                    );
                }
                None => {
                    debug!(total_tokens = total, budget, "System message alone exceeds token budget");
                    break;
                }
            }
        }

        evicted
    }

    /// Send a user message and return the assistant's reply.
    ///
    /// The user turn is appended and the budget enforced before the request.
    /// On success the reply is appended and the history persisted.
    ///
    /// # Errors
    ///
    /// Returns `Completion` if the client fails. The user turn stays in the
    /// history, no assistant turn is added, and nothing is persisted.
    pub async fn send_message(&mut self, prompt: &str, options: SendOptions) -> Result<String> {
        if self.state == StoreState::Uninitialized {
            self.load_history();
        }

        let request = self.prepare_request(prompt, options);

        let result = {
            let _in_flight = InFlight::begin(&mut self.state);
            self.client.complete(&request).await
        };

        match result {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Completion usage"
                    );
                }
                self.history.push(Message::assistant(response.content.clone()));
                let _ = self.save_history();
                Ok(response.content)
            }
            Err(e) => {
                error!(history_id = %self.storage.id(), error = %e, "An error occurred generating a response");
                Err(match e {
                    err @ ColloquyError::Completion(_) => err,
                    other => ColloquyError::Completion(other.to_string()),
                })
            }
        }
    }

    fn prepare_request(&mut self, prompt: &str, options: SendOptions) -> CompletionRequest {
        self.history.push(Message::user(prompt));
        self.enforce_token_budget();

        CompletionRequest {
            model: self.settings.model.clone(),
            temperature: options.temperature.unwrap_or(self.settings.temperature),
            max_tokens: options
                .max_output_tokens
                .unwrap_or(self.settings.max_output_tokens),
            messages: self.history.messages().to_vec(),
        }
    }

    /// Set the default sampling temperature.
    ///
    /// # Errors
    ///
    /// Returns `Validation` outside `[0.0, 2.0]`.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        validate_temperature(temperature)?;
        self.settings.temperature = temperature;
        Ok(())
    }

    /// Set the token budget. Takes effect on the next `send_message`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for zero.
    pub fn set_token_budget(&mut self, budget: usize) -> Result<()> {
        validate_positive("token_budget", budget)?;
        self.settings.token_budget = budget;
        Ok(())
    }

    /// Set the default maximum reply length.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for zero.
    pub fn set_max_output_tokens(&mut self, tokens: usize) -> Result<()> {
        validate_positive("max_output_tokens", tokens)?;
        self.settings.max_output_tokens = tokens;
        Ok(())
    }

    /// Switch the model used for requests and token counting
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.settings.model = model.into();
    }
}

/// Marks the store as awaiting a completion until dropped, including when the
/// `send_message` future is cancelled.
struct InFlight<'a>(&'a mut StoreState);

impl<'a> InFlight<'a> {
    fn begin(state: &'a mut StoreState) -> Self {
        *state = StoreState::AwaitingCompletion;
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0 = StoreState::Idle;
    }
}

/// Builder for [`ConversationStore`]
pub struct ConversationStoreBuilder {
    client: Option<Arc<dyn CompletionClient>>,
    counter: Option<Arc<dyn TokenCounter>>,
    storage: Option<Box<dyn HistoryStorage>>,
    settings: SessionSettings,
    persona: Persona,
}

impl ConversationStoreBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            counter: None,
            storage: None,
            settings: SessionSettings::default(),
            persona: Persona::SassyAssistant,
        }
    }

    /// Seed settings and the starting persona from configuration
    pub fn config(mut self, config: &ColloquyConfig) -> Self {
        self.settings = SessionSettings::from(config);
        self.persona = config.session.persona;
        self
    }

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn storage(mut self, storage: impl HistoryStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    /// Build the store without touching storage; call `load_history` next.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the client or storage is missing, or
    /// `Validation` if the settings are out of range.
    pub fn build(self) -> Result<ConversationStore> {
        let client = self
            .client
            .ok_or_else(|| ColloquyError::Configuration("completion client is required".into()))?;
        let storage = self
            .storage
            .ok_or_else(|| ColloquyError::Configuration("history storage is required".into()))?;
        let counter = self
            .counter
            .unwrap_or_else(|| Arc::new(crate::tokens::TiktokenCounter::new()));

        validate_temperature(self.settings.temperature)?;
        validate_positive("token_budget", self.settings.token_budget)?;
        validate_positive("max_output_tokens", self.settings.max_output_tokens)?;

        Ok(ConversationStore {
            client,
            counter,
            storage,
            settings: self.settings,
            personas: PersonaRegistry::new(),
            persona: self.persona,
            history: ConversationHistory::new(),
            state: StoreState::Uninitialized,
        })
    }

    /// Build the store and load its history
    pub fn open(self) -> Result<(ConversationStore, LoadOutcome)> {
        let mut store = self.build()?;
        let outcome = store.load_history();
        Ok((store, outcome))
    }
}

impl Default for ConversationStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

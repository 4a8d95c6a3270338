//! Persona presets
//!
//! A persona is a named system prompt that shapes the assistant's tone. The
//! built-in prompts are fixed; the `custom` slot holds a user-supplied prompt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ColloquyError, Result};

/// Placeholder held by the custom slot until the user provides a prompt
pub const CUSTOM_PLACEHOLDER: &str = "Enter custom message";

/// Selectable persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    SassyAssistant,
    AngryAssistant,
    ThoughtfulAssistant,
    FriendlyAssistant,
    FunnyAssistant,
    Custom,
}

impl Persona {
    /// Every persona, in display order
    pub const ALL: [Persona; 6] = [
        Persona::SassyAssistant,
        Persona::AngryAssistant,
        Persona::ThoughtfulAssistant,
        Persona::FriendlyAssistant,
        Persona::FunnyAssistant,
        Persona::Custom,
    ];

    /// Registry name of the persona
    pub fn name(self) -> &'static str {
        match self {
            Persona::SassyAssistant => "sassy_assistant",
            Persona::AngryAssistant => "angry_assistant",
            Persona::ThoughtfulAssistant => "thoughtful_assistant",
            Persona::FriendlyAssistant => "friendly_assistant",
            Persona::FunnyAssistant => "funny_assistant",
            Persona::Custom => "custom",
        }
    }

    /// Names of every persona
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.name()).collect()
    }

    fn builtin_prompt(self) -> Option<&'static str> {
        match self {
            Persona::SassyAssistant => {
                Some("You are a sassy assistant who is fed up with answering questions.")
            }
            Persona::AngryAssistant => Some(
                "You are an angry assistant. You give unfriendly ansers and yell your response in all caps.",
            ),
            Persona::ThoughtfulAssistant => Some(
                "You are a thoughtful assistant, always ready to dig deeper. You ask clarifying questions to ensure understanding and approach problems with a step-by-step methodology.",
            ),
            Persona::FriendlyAssistant => {
                Some("You are a friendly assistant who is enjoying answering questions.")
            }
            Persona::FunnyAssistant => {
                Some("You are a helpful and funny assistant wrapping every response in a joke.")
            }
            Persona::Custom => None,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Persona {
    type Err = ColloquyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ColloquyError::UnknownPersona {
                name: s.to_string(),
                available: Self::names(),
            })
    }
}

/// Persona prompts, with one user-overridable slot
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    custom: String,
}

impl PersonaRegistry {
    /// Create a registry with the custom slot holding its placeholder
    pub fn new() -> Self {
        Self {
            custom: CUSTOM_PLACEHOLDER.to_string(),
        }
    }

    /// System prompt for a persona
    pub fn prompt(&self, persona: Persona) -> &str {
        persona.builtin_prompt().unwrap_or(self.custom.as_str())
    }

    /// Persona whose prompt is `prompt`.
    ///
    /// Built-in prompts map back to their persona; any other text is stored in
    /// the custom slot and `Custom` is returned. `None` for empty text.
    pub fn adopt(&mut self, prompt: &str) -> Option<Persona> {
        let builtin = Persona::ALL
            .into_iter()
            .find(|p| p.builtin_prompt() == Some(prompt));
        if builtin.is_some() {
            return builtin;
        }
        self.set_custom(prompt).ok().map(|()| Persona::Custom)
    }

    /// Replace the custom prompt.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `text` is empty or whitespace; the slot is left unchanged.
    pub fn set_custom(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ColloquyError::Validation(
                "Custom message can not be empty!".to_string(),
            ));
        }
        self.custom = text;
        Ok(())
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for persona in Persona::ALL {
            assert_eq!(persona.name().parse::<Persona>().unwrap(), persona);
        }
    }

    #[test]
    fn test_unknown_persona() {
        let err = "pirate_assistant".parse::<Persona>().unwrap_err();
        match err {
            ColloquyError::UnknownPersona { name, available } => {
                assert_eq!(name, "pirate_assistant");
                assert_eq!(available.len(), 6);
                assert!(available.contains(&"angry_assistant"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builtin_prompts() {
        let registry = PersonaRegistry::new();
        assert!(registry.prompt(Persona::AngryAssistant).starts_with("You are an angry"));
        assert_eq!(registry.prompt(Persona::Custom), CUSTOM_PLACEHOLDER);
    }

    #[test]
    fn test_set_custom() {
        let mut registry = PersonaRegistry::new();
        registry.set_custom("You are a pirate.").unwrap();
        assert_eq!(registry.prompt(Persona::Custom), "You are a pirate.");
    }

    #[test]
    fn test_adopt_prompt() {
        let mut registry = PersonaRegistry::new();
        let angry = registry.prompt(Persona::AngryAssistant).to_string();

        assert_eq!(registry.adopt(&angry), Some(Persona::AngryAssistant));
        assert_eq!(registry.prompt(Persona::Custom), CUSTOM_PLACEHOLDER);

        assert_eq!(registry.adopt("You are a pirate."), Some(Persona::Custom));
        assert_eq!(registry.prompt(Persona::Custom), "You are a pirate.");

        assert_eq!(registry.adopt(""), None);
        assert_eq!(registry.prompt(Persona::Custom), "You are a pirate.");
    }

    #[test]
    fn test_set_custom_rejects_empty() {
        let mut registry = PersonaRegistry::new();
        registry.set_custom("You are a pirate.").unwrap();

        assert!(matches!(registry.set_custom(""), Err(ColloquyError::Validation(_))));
        assert!(matches!(registry.set_custom("   "), Err(ColloquyError::Validation(_))));
        assert_eq!(registry.prompt(Persona::Custom), "You are a pirate.");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Persona::ThoughtfulAssistant).unwrap();
        assert_eq!(json, "\"thoughtful_assistant\"");
    }
}

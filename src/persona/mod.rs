//! Persona registry: named system prompts with one mutable custom slot

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const DEFAULT_PROMPT: &str = "You are a helpful assistant.";
const SASSY_PROMPT: &str = "You are a sassy assistant that is fed up with answering questions.";
const ANGRY_PROMPT: &str = "You are an angry assistant that likes yelling in all caps.";
const THOUGHTFUL_PROMPT: &str = "You are a thoughtful assistant, always ready to dig deeper. \
You ask clarifying questions to ensure understanding and approach problems with a step-by-step methodology.";
const CUSTOM_PLACEHOLDER: &str = "Enter your custom system message here.";

/// Persona key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Default,
    #[serde(alias = "sassy_assistant")]
    Sassy,
    #[serde(alias = "angry_assistant")]
    Angry,
    #[serde(alias = "thoughtful_assistant")]
    Thoughtful,
    Custom,
}

impl Persona {
    pub const ALL: [Persona; 5] = [
        Persona::Default,
        Persona::Sassy,
        Persona::Angry,
        Persona::Thoughtful,
        Persona::Custom,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Persona::Default => "default",
            Persona::Sassy => "sassy",
            Persona::Angry => "angry",
            Persona::Thoughtful => "thoughtful",
            Persona::Custom => "custom",
        }
    }

    fn available() -> String {
        Persona::ALL
            .iter()
            .map(Persona::key)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Persona {
    type Err = ChatError;

    /// Keys match exactly, the same rule serde applies to config values
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Persona::Default),
            "sassy" | "sassy_assistant" => Ok(Persona::Sassy),
            "angry" | "angry_assistant" => Ok(Persona::Angry),
            "thoughtful" | "thoughtful_assistant" => Ok(Persona::Thoughtful),
            "custom" => Ok(Persona::Custom),
            _ => Err(ChatError::UnknownPersona {
                key: s.to_string(),
                available: Persona::available(),
            }),
        }
    }
}

/// Mapping from persona to system prompt text
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    custom: String,
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self {
            custom: CUSTOM_PLACEHOLDER.to_string(),
        }
    }
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// System prompt for a persona
    pub fn prompt(&self, persona: Persona) -> &str {
        match persona {
            Persona::Default => DEFAULT_PROMPT,
            Persona::Sassy => SASSY_PROMPT,
            Persona::Angry => ANGRY_PROMPT,
            Persona::Thoughtful => THOUGHTFUL_PROMPT,
            Persona::Custom => &self.custom,
        }
    }

    /// Look up a persona by its string key
    pub fn get(&self, key: &str) -> Result<(Persona, &str)> {
        let persona: Persona = key.parse()?;
        Ok((persona, self.prompt(persona)))
    }

    /// Replace the custom persona text
    pub fn set_custom(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage("Custom message"));
        }
        debug!(len = text.len(), "Custom persona updated");
        self.custom = text.to_string();
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        Persona::ALL.iter().map(Persona::key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_key_and_alias() {
        let registry = PersonaRegistry::new();
        let (persona, prompt) = registry.get("sassy").unwrap();
        assert_eq!(persona, Persona::Sassy);
        assert_eq!(prompt, SASSY_PROMPT);

        let (alias, _) = registry.get("thoughtful_assistant").unwrap();
        assert_eq!(alias, Persona::Thoughtful);
    }

    #[test]
    fn test_unknown_key_lists_available() {
        let registry = PersonaRegistry::new();
        let err = registry.get("pirate").unwrap_err();
        match err {
            ChatError::UnknownPersona { key, available } => {
                assert_eq!(key, "pirate");
                assert!(available.contains("thoughtful"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let registry = PersonaRegistry::new();
        assert!(matches!(registry.get("SASSY"), Err(ChatError::UnknownPersona { .. })));
        assert!(matches!(registry.get(" sassy "), Err(ChatError::UnknownPersona { .. })));

        let from_serde: std::result::Result<Persona, _> = serde_json::from_str("\"SASSY\"");
        assert!(from_serde.is_err());
        let from_serde: Persona = serde_json::from_str("\"angry_assistant\"").unwrap();
        assert_eq!(from_serde, "angry_assistant".parse::<Persona>().unwrap());
    }

    #[test]
    fn test_set_custom() {
        let mut registry = PersonaRegistry::new();
        assert_eq!(registry.prompt(Persona::Custom), CUSTOM_PLACEHOLDER);

        registry.set_custom("You speak only in haiku.").unwrap();
        assert_eq!(registry.prompt(Persona::Custom), "You speak only in haiku.");
    }

    #[test]
    fn test_blank_custom_is_rejected_without_change() {
        let mut registry = PersonaRegistry::new();
        registry.set_custom("Be brief.").unwrap();

        assert!(matches!(registry.set_custom(""), Err(ChatError::EmptyMessage(_))));
        assert!(matches!(registry.set_custom("   \n"), Err(ChatError::EmptyMessage(_))));
        assert_eq!(registry.prompt(Persona::Custom), "Be brief.");
    }

    #[test]
    fn test_keys() {
        let registry = PersonaRegistry::new();
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(keys, vec!["default", "sassy", "angry", "thoughtful", "custom"]);
    }
}

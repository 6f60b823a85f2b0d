use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persona
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity, behavior and voice of a character or call agent.
///
/// Loaded from `[personas.<id>]` tables in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Behavior descriptors (e.g. "friendly", "concise").
    #[serde(default)]
    pub behavior_tags: BTreeSet<String>,
    /// Opening line the persona uses when a conversation starts.
    #[serde(default)]
    pub greeting: String,
    /// BCP-47 language code the persona must answer in.
    #[serde(default = "d_language_code")]
    pub language_code: String,
    /// Prebuilt voice name understood by the backend (e.g. "Zephyr").
    /// Not validated locally.
    pub voice_id: String,
}

fn d_language_code() -> String {
    "en".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation history
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One prior message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub text: String,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input to a single turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_message: String,
    /// Ordered oldest → newest.
    pub history: Vec<HistoryEntry>,
    pub persona: Persona,
}

impl TurnRequest {
    pub fn new(user_message: impl Into<String>, persona: Persona) -> Self {
        Self {
            user_message: user_message.into(),
            history: Vec::new(),
            persona,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_deserializes_with_defaults() {
        let toml_str = r#"
            display_name = "Emma"
            voice_id = "Zephyr"
        "#;
        let p: Persona = toml::from_str(toml_str).unwrap();
        assert_eq!(p.display_name, "Emma");
        assert_eq!(p.language_code, "en");
        assert!(p.behavior_tags.is_empty());
        assert!(p.greeting.is_empty());
    }

    #[test]
    fn behavior_tags_are_deduplicated_and_ordered() {
        let toml_str = r#"
            display_name = "Abebe"
            voice_id = "Puck"
            behavior_tags = ["warm", "concise", "warm"]
        "#;
        let p: Persona = toml::from_str(toml_str).unwrap();
        let tags: Vec<&str> = p.behavior_tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["concise", "warm"]);
    }

    #[test]
    fn sender_serializes_lowercase() {
        let json = serde_json::to_string(&HistoryEntry::agent("hi")).unwrap();
        assert_eq!(json, r#"{"sender":"agent","text":"hi"}"#);
    }
}

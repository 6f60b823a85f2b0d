//! Prompt construction for a single persona turn.
//!
//! The live backend receives one user turn per session, so everything the
//! model needs (who it is, how it behaves, which language it must answer
//! in, and what has been said so far) is folded into that one string.

use ta_domain::language::language_name;
use ta_domain::persona::{Sender, TurnRequest};

/// Build the full prompt for `request`.
///
/// Sections, in order: identity, behavior (omitted when there are no
/// tags), greeting (omitted when empty), the language constraint, the
/// conversation so far (empty for a new conversation), and the new user
/// message followed by the persona's reply cue.
pub fn build_prompt(request: &TurnRequest) -> String {
    let persona = &request.persona;
    let name = persona.display_name.trim();
    let mut out = String::new();

    // ── Identity ─────────────────────────────────────────────────────
    out.push_str(&format!("You are {name}.\n"));
    let description = persona.description.trim();
    if !description.is_empty() {
        out.push_str(description);
        out.push('\n');
    }

    if !persona.behavior_tags.is_empty() {
        let tags: Vec<&str> = persona.behavior_tags.iter().map(String::as_str).collect();
        out.push_str(&format!("Personality and behavior: {}.\n", tags.join(", ")));
    }

    let greeting = persona.greeting.trim();
    if !greeting.is_empty() {
        out.push_str(&format!("Your usual greeting is: \"{greeting}\"\n"));
    }

    // ── Language constraint ──────────────────────────────────────────
    out.push('\n');
    out.push_str(&language_rule(&persona.language_code));
    out.push_str("\nStay in character and keep replies natural for a spoken conversation.\n");

    // ── History ──────────────────────────────────────────────────────
    out.push_str("\nConversation so far:\n");
    for entry in &request.history {
        let speaker = match entry.sender {
            Sender::User => "User",
            Sender::Agent => name,
        };
        out.push_str(&format!("{speaker}: {}\n", entry.text.trim()));
    }

    // ── New message ──────────────────────────────────────────────────
    out.push_str(&format!("\nUser: {}\n{name}:", request.user_message.trim()));
    out
}

fn language_rule(code: &str) -> String {
    let code = code.trim();
    let (label, language) = match language_name(code) {
        Some(language) => (format!("{language} ({code})"), language.to_string()),
        None => (code.to_string(), code.to_string()),
    };
    format!(
        "IMPORTANT: Respond only in {label}. \
         If you cannot respond in {language}, say so in {language}."
    )
}

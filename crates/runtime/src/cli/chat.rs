//! `talkagent chat`: interactive conversation with one persona.
//!
//! Keeps the conversation history in memory and sends it with every
//! turn.  Failed turns show the fallback reply, which is also recorded so
//! the persona sees the same transcript the user did.

use ta_domain::config::Config;
use ta_domain::persona::{HistoryEntry, Persona, Sender, TurnRequest};
use ta_domain::stream::Completion;

use super::{build_orchestrator, find_persona, FALLBACK_REPLY};
use crate::runtime::TurnOrchestrator;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory transcript of one chat.
#[derive(Debug, Clone)]
pub struct Conversation {
    persona: Persona,
    history: Vec<HistoryEntry>,
}

impl Conversation {
    /// Start a conversation; the persona's greeting, if any, is the first
    /// agent entry.
    pub fn start(persona: Persona) -> Self {
        let mut history = Vec::new();
        let greeting = persona.greeting.trim();
        if !greeting.is_empty() {
            history.push(HistoryEntry::agent(greeting));
        }
        Self { persona, history }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Run one exchange and record both sides.  Returns the reply shown to
    /// the user (the fallback on failure).
    pub async fn exchange(&mut self, orchestrator: &TurnOrchestrator, message: &str) -> String {
        let request =
            TurnRequest::new(message, self.persona.clone()).with_history(self.history.clone());

        let reply = match orchestrator.run_turn(&request).await {
            Ok(result) => {
                if result.completion == Completion::ClosedEarly {
                    tracing::debug!("reply closed early, keeping partial text");
                }
                result.text
            }
            Err(e) => {
                eprintln!("\x1B[31merror: {e}\x1B[0m");
                FALLBACK_REPLY.to_string()
            }
        };

        self.history.push(HistoryEntry::user(message));
        self.history.push(HistoryEntry::agent(reply.clone()));
        reply
    }

    /// Drop everything after the greeting.
    pub fn reset(&mut self) {
        *self = Self::start(self.persona.clone());
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run the interactive chat REPL.
pub async fn chat(config: &Config, persona_id: &str) -> anyhow::Result<()> {
    let persona = find_persona(config, persona_id)?.clone();
    let orchestrator = build_orchestrator(config)?;
    let mut conversation = Conversation::start(persona);

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".talkagent")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    // Banner goes to stderr so stdout only carries the conversation.
    eprintln!(
        "Talking to {} ({})  |  Type /help for commands, Ctrl+D to exit",
        conversation.persona().display_name,
        ta_domain::language::display_language(&conversation.persona().language_code),
    );
    eprintln!();
    if let Some(greeting) = conversation.history().first() {
        print_reply(&conversation.persona().display_name, &greeting.text);
    }

    let prompt = "you> ";
    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(trimmed, &mut conversation) {
                        break;
                    }
                    continue;
                }

                let reply = conversation.exchange(&orchestrator, trimmed).await;
                print_reply(&conversation.persona().display_name, &reply);
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

fn print_reply(name: &str, text: &str) {
    println!("{name}> {text}");
    println!();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command.  Returns `true` if the REPL should exit.
fn handle_slash_command(input: &str, conversation: &mut Conversation) -> bool {
    let cmd = input.split_whitespace().next().unwrap_or(input);

    match cmd {
        "/exit" | "/quit" => return true,

        "/history" => {
            let name = &conversation.persona().display_name;
            for entry in conversation.history() {
                let speaker = match entry.sender {
                    Sender::User => "you",
                    Sender::Agent => name.as_str(),
                };
                eprintln!("{speaker}> {}", entry.text);
            }
        }

        "/reset" => {
            conversation.reset();
            eprintln!("Conversation reset.");
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /history         Show the conversation so far");
            eprintln!("  /reset           Forget everything after the greeting");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }

    false
}

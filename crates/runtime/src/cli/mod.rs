pub mod chat;
pub mod config;
pub mod run;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use ta_domain::config::{BackendKind, Config};
use ta_domain::persona::Persona;
use ta_providers::{GeminiLiveBackend, LiveBackend};

use crate::runtime::{TurnOrchestrator, TurnSettings};

/// Reply shown to the user whenever a turn fails.
pub const FALLBACK_REPLY: &str = "I'm sorry, I encountered an error. Please try again.";

/// talkagent: talk to a persona over a live generative-AI session.
#[derive(Debug, Parser)]
#[command(name = "talkagent", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a single message to a persona and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Persona id from config.toml.
        #[arg(long)]
        persona: String,
        /// Write the spoken reply to this WAV file.
        #[arg(long)]
        audio_out: Option<std::path::PathBuf>,
        /// Output a JSON summary instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Interactive conversation with a persona.
    Chat {
        /// Persona id from config.toml.
        #[arg(long)]
        persona: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// List configured personas.
    Personas,
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Shared helpers ────────────────────────────────────────────────────

/// Load the configuration from the path specified by `TA_CONFIG` (or
/// `config.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.  A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("TA_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

/// Look up a persona by id, listing the known ids on a miss.
pub fn find_persona<'a>(config: &'a Config, id: &str) -> anyhow::Result<&'a Persona> {
    config.personas.get(id).ok_or_else(|| {
        let known: Vec<&str> = config.personas.keys().map(String::as_str).collect();
        if known.is_empty() {
            anyhow::anyhow!("unknown persona '{id}': no personas are configured")
        } else {
            anyhow::anyhow!("unknown persona '{id}' (known: {})", known.join(", "))
        }
    })
}

/// Build an orchestrator wired to the configured live backend.  Refuses
/// configs with hard validation errors before resolving any credentials.
pub fn build_orchestrator(config: &Config) -> anyhow::Result<TurnOrchestrator> {
    config.ensure_valid()?;
    let backend: Arc<dyn LiveBackend> = match config.backend.kind {
        BackendKind::GeminiLive => Arc::new(GeminiLiveBackend::from_config(&config.backend)?),
    };
    tracing::debug!(backend = backend.backend_id(), "backend ready");
    Ok(TurnOrchestrator::new(backend, TurnSettings::from_config(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_from(path.to_str().unwrap()).unwrap();
        assert!(config.personas.is_empty());
        assert_eq!(config.turn.timeout_ms, 30_000);
    }

    #[test]
    fn persona_lookup_lists_known_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[personas.emma]
display_name = "Emma"
voice_id = "Zephyr"
"#,
        )
        .unwrap();
        let config = load_config_from(path.to_str().unwrap()).unwrap();
        assert_eq!(find_persona(&config, "emma").unwrap().display_name, "Emma");
        let err = find_persona(&config, "bob").unwrap_err().to_string();
        assert!(err.contains("known: emma"), "{err}");
    }

    #[test]
    fn unparsable_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[turn]\ntimeout_ms = \"soon\"\n").unwrap();
        let err = load_config_from(path.to_str().unwrap()).unwrap_err().to_string();
        assert!(err.starts_with("parsing "), "{err}");
    }

    #[test]
    fn invalid_config_is_refused_before_key_lookup() {
        let mut config = Config::default();
        config.backend.model.clear();
        // Would fail with an auth error if the key were looked up first.
        config.backend.auth.env = "TA_TEST_UNSET_KEY_4242".into();
        let err = build_orchestrator(&config).err().expect("invalid config");
        let err = err.to_string();
        assert!(err.starts_with("config: "), "{err}");
        assert!(err.contains("backend.model"), "{err}");
    }

    #[test]
    fn valid_config_builds_configured_backend() {
        let mut config = Config::default();
        config.backend.model = "gemini-test".into();
        config.backend.auth.mode = ta_domain::config::AuthMode::Inline;
        config.backend.auth.key = Some("test-key".into());
        let orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.settings().model, "gemini-test");
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::parse_from([
            "talkagent", "run", "Hello", "--persona", "emma", "--audio-out", "out.wav", "--json",
        ]);
        match cli.command {
            Command::Run { message, persona, audio_out, json } => {
                assert_eq!(message, "Hello");
                assert_eq!(persona, "emma");
                assert_eq!(audio_out.unwrap().to_str(), Some("out.wav"));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

mod backend;
mod observability;
mod turn;

pub use backend::*;
pub use observability::*;
pub use turn::*;

use crate::error::{Error, Result};
use crate::language::language_name;
use crate::persona::Persona;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Persona definitions (key = persona id).
    #[serde(default)]
    pub personas: BTreeMap<String, Persona>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.backend.base_url.is_empty() {
            errors.push(ConfigError::error(
                "backend.base_url",
                "base_url must not be empty",
            ));
        } else if !self.backend.base_url.starts_with("ws://")
            && !self.backend.base_url.starts_with("wss://")
        {
            errors.push(ConfigError::error(
                "backend.base_url",
                "base_url must use the ws:// or wss:// scheme",
            ));
        }

        if self.backend.model.is_empty() {
            errors.push(ConfigError::error("backend.model", "model must not be empty"));
        }

        if self.backend.response_modalities.is_empty() {
            errors.push(ConfigError::error(
                "backend.response_modalities",
                "at least one response modality is required",
            ));
        }

        if self.backend.connect_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "backend.connect_timeout_ms",
                "connect timeout must be greater than 0",
            ));
        }

        let auth = &self.backend.auth;
        match auth.mode {
            AuthMode::Env if auth.env.trim().is_empty() => {
                errors.push(ConfigError::error(
                    "backend.auth.env",
                    "auth mode \"env\" needs an environment variable name",
                ));
            }
            AuthMode::Env => {}
            AuthMode::Keychain => {
                if auth.service.is_none() || auth.account.is_none() {
                    errors.push(ConfigError::error(
                        "backend.auth",
                        "auth mode \"keychain\" needs both service and account",
                    ));
                }
            }
            AuthMode::Inline => {
                if auth.key.is_none() {
                    errors.push(ConfigError::error(
                        "backend.auth.key",
                        "auth mode \"inline\" needs a key",
                    ));
                } else {
                    errors.push(ConfigError::warning(
                        "backend.auth.key",
                        "API key is stored in plaintext; prefer mode \"env\" or \"keychain\"",
                    ));
                }
            }
        }

        if self.turn.timeout_ms == 0 {
            errors.push(ConfigError::warning(
                "turn.timeout_ms",
                "turn timeout disabled; a silent backend will hang the turn",
            ));
        }

        let obs = &self.observability;
        if !is_log_level(&obs.log_level) {
            errors.push(ConfigError::error(
                "observability.log_level",
                format!("unknown log level \"{}\"", obs.log_level),
            ));
        }
        if let Some(level) = obs.turn_log_level.as_deref().filter(|l| !is_log_level(l)) {
            errors.push(ConfigError::error(
                "observability.turn_log_level",
                format!("unknown log level \"{level}\""),
            ));
        }
        if let Some(otlp) = &obs.otlp {
            if !(0.0..=1.0).contains(&otlp.sample_rate) {
                errors.push(ConfigError::error(
                    "observability.otlp.sample_rate",
                    "sample_rate must be between 0.0 and 1.0",
                ));
            }
        }

        if self.personas.is_empty() {
            errors.push(ConfigError::warning("personas", "no personas configured"));
        }

        for (id, persona) in &self.personas {
            let field = |name: &str| format!("personas.{id}.{name}");

            if persona.display_name.trim().is_empty() {
                errors.push(ConfigError::error(
                    field("display_name"),
                    "display_name must not be empty",
                ));
            }

            if persona.voice_id.trim().is_empty() {
                errors.push(ConfigError::error(
                    field("voice_id"),
                    "voice_id must not be empty",
                ));
            } else if !KNOWN_VOICES.contains(&persona.voice_id.as_str()) {
                errors.push(ConfigError::warning(
                    field("voice_id"),
                    format!(
                        "\"{}\" is not a known prebuilt voice; the backend may reject it",
                        persona.voice_id
                    ),
                ));
            }

            if persona.language_code.trim().is_empty() {
                errors.push(ConfigError::error(
                    field("language_code"),
                    "language_code must not be empty",
                ));
            } else if language_name(&persona.language_code).is_none() {
                errors.push(ConfigError::warning(
                    field("language_code"),
                    format!(
                        "unrecognized language code \"{}\"; the prompt will use it verbatim",
                        persona.language_code
                    ),
                ));
            }
        }

        errors
    }

    /// Fail with [`Error::Config`] listing every hard error; warnings pass.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }

    /// Whether [`validate`](Self::validate) reported any hard errors.
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}

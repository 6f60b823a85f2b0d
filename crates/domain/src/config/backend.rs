use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Live backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Prebuilt voice names accepted by Gemini Live at the time of writing.
/// Used for config warnings only; the backend has the final say.
pub const KNOWN_VOICES: &[&str] = &[
    "Achernar", "Achird", "Algenib", "Algieba", "Alnilam", "Aoede", "Autonoe",
    "Callirrhoe", "Charon", "Despina", "Enceladus", "Erinome", "Fenrir", "Gacrux",
    "Iapetus", "Kore", "Laomedeia", "Leda", "Orus", "Puck", "Pulcherrima",
    "Rasalgethi", "Sadachbia", "Sadaltager", "Schedar", "Sulafat", "Umbriel",
    "Vindemiatrix", "Zephyr", "Zubenelgenubi",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// WebSocket origin, without path (e.g. `wss://generativelanguage.googleapis.com`).
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Modalities requested for the reply.
    #[serde(default = "d_modalities")]
    pub response_modalities: Vec<Modality>,
    #[serde(default)]
    pub media_resolution: MediaResolution,
    /// Ask the backend for a text transcription of spoken replies.
    #[serde(default)]
    pub output_transcription: bool,
    /// Bound on WebSocket connect + setup handshake (milliseconds).
    #[serde(default = "d_10000u")]
    pub connect_timeout_ms: u64,
    /// Sample rate of the PCM audio the backend emits.
    #[serde(default = "d_24000")]
    pub output_sample_rate: u32,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::GeminiLive,
            base_url: d_base_url(),
            model: d_model(),
            response_modalities: d_modalities(),
            media_resolution: MediaResolution::Medium,
            output_transcription: false,
            connect_timeout_ms: 10_000,
            output_sample_rate: 24_000,
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    GeminiLive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

impl Modality {
    /// Wire name used in the Gemini setup message.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Audio => "AUDIO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaResolution {
    Low,
    #[default]
    Medium,
    High,
}

impl MediaResolution {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Low => "MEDIA_RESOLUTION_LOW",
            Self::Medium => "MEDIA_RESOLUTION_MEDIUM",
            Self::High => "MEDIA_RESOLUTION_HIGH",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the API key comes from.  Exactly one source is consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Env var holding the key (`mode = "env"`).
    #[serde(default = "d_auth_env")]
    pub env: String,
    /// Plaintext key (`mode = "inline"`).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (`mode = "keychain"`), e.g. "talkagent".
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (`mode = "keychain"`), e.g. "gemini-api-key".
    #[serde(default)]
    pub account: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Env,
            env: d_auth_env(),
            key: None,
            service: None,
            account: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Env,
    /// OS keychain, with a `{SERVICE}_{ACCOUNT}` env var for headless hosts.
    Keychain,
    Inline,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "wss://generativelanguage.googleapis.com".into()
}
fn d_model() -> String {
    "gemini-2.0-flash-live-001".into()
}
fn d_modalities() -> Vec<Modality> {
    vec![Modality::Audio]
}
fn d_10000u() -> u64 {
    10_000
}
fn d_24000() -> u32 {
    24_000
}
fn d_auth_env() -> String {
    "GEMINI_API_KEY".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_requests_audio_at_medium_resolution() {
        let cfg = BackendConfig::default();
        assert_eq!(cfg.response_modalities, vec![Modality::Audio]);
        assert_eq!(cfg.media_resolution, MediaResolution::Medium);
        assert_eq!(cfg.auth.mode, AuthMode::Env);
        assert_eq!(cfg.auth.env, "GEMINI_API_KEY");
    }

    #[test]
    fn empty_table_uses_defaults() {
        let cfg: BackendConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.kind, BackendKind::GeminiLive);
        assert_eq!(cfg.model, "gemini-2.0-flash-live-001");
        assert_eq!(cfg.connect_timeout_ms, 10_000);
        assert_eq!(cfg.output_sample_rate, 24_000);
    }

    #[test]
    fn modalities_and_resolution_parse() {
        let toml_str = r#"
            response_modalities = ["text", "audio"]
            media_resolution = "high"
        "#;
        let cfg: BackendConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.response_modalities, vec![Modality::Text, Modality::Audio]);
        assert_eq!(cfg.media_resolution.as_wire(), "MEDIA_RESOLUTION_HIGH");
    }

    #[test]
    fn auth_config_deserializes_keychain_fields() {
        let json = r#"{
            "mode": "keychain",
            "service": "talkagent",
            "account": "gemini-api-key"
        }"#;
        let auth: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(auth.mode, AuthMode::Keychain);
        assert_eq!(auth.service.as_deref(), Some("talkagent"));
        assert_eq!(auth.account.as_deref(), Some("gemini-api-key"));
        assert_eq!(auth.env, "GEMINI_API_KEY");
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let err = toml::from_str::<AuthConfig>(r#"mode = "query_param""#).unwrap_err();
        assert!(err.to_string().contains("query_param"), "{err}");
    }

    #[test]
    fn known_voices_include_defaults() {
        assert!(KNOWN_VOICES.contains(&"Zephyr"));
        assert!(KNOWN_VOICES.contains(&"Puck"));
    }
}

use serde::{Deserialize, Serialize};

/// Log target of the turn orchestrator; its span carries `turn_id`.
pub const TURN_LOG_TARGET: &str = "ta_runtime::runtime::turn";

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging and trace export
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stderr logging for turn-running commands, plus optional OTLP export.
///
/// `RUST_LOG` overrides [`filter_directives`](Self::filter_directives)
/// when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Level for everything not covered by `turn_log_level`.
    #[serde(default = "d_log_level")]
    pub log_level: String,

    /// Level for turn lifecycle events (`info` shows one line per settled
    /// turn with its outcome and timing).
    #[serde(default)]
    pub turn_log_level: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Export turn spans over OTLP/gRPC.  Absent means no exporter.
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpConfig {
    /// gRPC endpoint, e.g. `http://localhost:4317`.
    pub endpoint: String,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// Fraction of turns traced, decided per trace id.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: d_log_level(),
            turn_log_level: None,
            log_format: LogFormat::Compact,
            otlp: None,
        }
    }
}

impl ObservabilityConfig {
    /// `EnvFilter` directives, e.g. `warn,ta_runtime::runtime::turn=info`.
    pub fn filter_directives(&self) -> String {
        match &self.turn_log_level {
            Some(level) => format!("{},{TURN_LOG_TARGET}={level}", self.log_level),
            None => self.log_level.clone(),
        }
    }
}

/// Whether `level` names a log level (`off` included).
pub fn is_log_level(level: &str) -> bool {
    LEVELS.iter().any(|l| l.eq_ignore_ascii_case(level))
}

fn d_log_level() -> String {
    "warn".into()
}

fn d_service_name() -> String {
    "talkagent".into()
}

fn d_sample_rate() -> f64 {
    1.0
}

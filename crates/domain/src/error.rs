/// Shared error type used across all TalkAgent crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket: {0}")]
    WebSocket(String),

    /// The live session could not be opened at all.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend signaled an error before the turn completed.
    #[error("backend session error: {0}")]
    BackendSession(String),

    /// No terminal signal arrived within the turn bound.
    #[error("backend timed out after {after_ms}ms")]
    BackendTimeout { after_ms: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("audio: {0}")]
    Audio(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

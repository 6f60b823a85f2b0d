use serde::Serialize;

/// One incremental piece of a streamed reply, pushed by a live backend
/// while a turn is in flight (provider-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// A span of reply text.
    Text { text: String },

    /// A chunk of raw audio (PCM as delivered by the backend).
    Audio {
        #[serde(skip)]
        data: Vec<u8>,
    },

    /// The backend declared the turn finished.
    TurnComplete,

    /// The backend reported an error mid-turn.
    Error { message: String },

    /// The session closed, with or without a reason.
    SessionClosed { reason: String },
}

impl StreamFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn audio(data: impl Into<Vec<u8>>) -> Self {
        Self::Audio { data: data.into() }
    }

    /// Whether this fragment ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TurnComplete | Self::Error { .. } | Self::SessionClosed { .. }
        )
    }
}

/// How a successful turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// An explicit completion signal arrived.
    Completed,
    /// The session closed before any completion or error signal; the
    /// result holds whatever had been accumulated.
    ClosedEarly,
}

/// The combined reply for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    /// Every text fragment received before completion, in arrival order.
    pub text: String,
    /// Byte concatenation of every audio fragment, or `None` when the
    /// backend sent text only.
    pub audio: Option<Vec<u8>>,
    pub completion: Completion,
}

impl TurnResult {
    pub fn audio_len(&self) -> usize {
        self.audio.as_ref().map_or(0, Vec::len)
    }
}

/// Lifecycle of a single turn.
///
/// `Completed`, `Failed` and `ClosedEarly` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Opening,
    AwaitingFragments,
    Completed,
    Failed,
    ClosedEarly,
}

use ta_domain::config::{MediaResolution, Modality};
use ta_domain::error::Result;
use ta_domain::stream::StreamFragment;
use tokio::sync::mpsc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-session configuration passed at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSessionConfig {
    /// Modalities the backend should answer with.
    pub response_modalities: Vec<Modality>,
    pub media_resolution: MediaResolution,
    /// Prebuilt voice selector (e.g. "Zephyr").
    pub voice_name: String,
    /// Ask for a text transcription of spoken output.
    pub output_transcription: bool,
}

/// The content of one new user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTurn {
    pub text: String,
}

impl ClientTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Receiving half of a session's fragment channel.
pub type FragmentReceiver = mpsc::UnboundedReceiver<StreamFragment>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Callbacks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Push-style callback handle a backend uses to report what happens on
/// its session.
///
/// Every callback is a non-blocking send into an unbounded channel, so it
/// is safe to invoke from a reader task or a synchronous context.  Once the
/// consumer has settled the turn and dropped the receiver, callbacks become
/// no-ops and return `false`.
#[derive(Debug, Clone)]
pub struct SessionCallbacks {
    tx: mpsc::UnboundedSender<StreamFragment>,
}

impl SessionCallbacks {
    /// Create a callback handle and the receiver it feeds.
    pub fn channel() -> (Self, FragmentReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A fragment arrived.  Returns whether it was delivered.
    pub fn on_message(&self, fragment: StreamFragment) -> bool {
        self.tx.send(fragment).is_ok()
    }

    /// The session reported an error.
    pub fn on_error(&self, message: impl Into<String>) -> bool {
        self.on_message(StreamFragment::Error {
            message: message.into(),
        })
    }

    /// The session closed.
    pub fn on_close(&self, reason: impl Into<String>) -> bool {
        self.on_message(StreamFragment::SessionClosed {
            reason: reason.into(),
        })
    }

    /// Whether the consumer has stopped listening.
    pub fn is_settled(&self) -> bool {
        self.tx.is_closed()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core backend traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A bidirectional streaming generative-AI backend.
///
/// Implementations translate between our fragment model and a provider's
/// wire protocol.  A backend is constructed explicitly and injected into
/// whatever drives turns, so tests can substitute a scripted fake.
#[async_trait::async_trait]
pub trait LiveBackend: Send + Sync {
    /// Open a session.  Everything the session emits afterwards is
    /// reported through `callbacks`.
    ///
    /// Fails with [`Error::BackendUnavailable`](ta_domain::error::Error::BackendUnavailable)
    /// when the session cannot be established.
    async fn connect(
        &self,
        model: &str,
        config: &LiveSessionConfig,
        callbacks: SessionCallbacks,
    ) -> Result<Box<dyn LiveSession>>;

    /// A unique identifier for this backend instance.
    fn backend_id(&self) -> &str;
}

/// An open session, exclusively owned by one turn.
#[async_trait::async_trait]
pub trait LiveSession: Send {
    /// Send a complete user turn.
    async fn send_content(&mut self, turn: ClientTurn) -> Result<()>;

    /// Close the session.  Calling it more than once is harmless.
    async fn close(&mut self) -> Result<()>;
}

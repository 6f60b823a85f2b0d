//! Turn orchestration: drives exactly one request/response cycle against
//! a live backend and folds the fragments it pushes into one
//! [`TurnResult`].
//!
//! Entry point: [`TurnOrchestrator::run_turn`].
//!
//! The backend reports through [`SessionCallbacks`]; the orchestrator
//! consumes the matching receiver in a single loop.  The first terminal
//! fragment settles the turn and the receiver is dropped, so anything the
//! backend pushes afterwards is discarded by the channel itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use ta_domain::config::{Config, MediaResolution, Modality};
use ta_domain::error::{Error, Result};
use ta_domain::persona::{Persona, TurnRequest};
use ta_domain::stream::{Completion, StreamFragment, TurnResult, TurnState};
use ta_providers::{ClientTurn, FragmentReceiver, LiveBackend, LiveSessionConfig, SessionCallbacks};

use super::prompt::build_prompt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-orchestrator session settings.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub response_modalities: Vec<Modality>,
    pub media_resolution: MediaResolution,
    pub output_transcription: bool,
    /// Bound on waiting for a terminal fragment.  `None` waits forever.
    pub timeout: Option<Duration>,
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.backend.model.clone(),
            response_modalities: config.backend.response_modalities.clone(),
            media_resolution: config.backend.media_resolution,
            output_transcription: config.backend.output_transcription,
            timeout: config.turn.timeout(),
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Accumulator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct TurnAccumulator {
    text: String,
    audio: Option<Vec<u8>>,
}

impl TurnAccumulator {
    /// Apply one fragment.  Returns `Some` once the turn has settled.
    fn apply(&mut self, fragment: StreamFragment) -> Option<Result<Completion>> {
        match fragment {
            StreamFragment::Text { text } => {
                self.text.push_str(&text);
                None
            }
            StreamFragment::Audio { data } => {
                // Audio stays `None` until a non-empty chunk arrives.
                if !data.is_empty() {
                    self.audio.get_or_insert_with(Vec::new).extend_from_slice(&data);
                }
                None
            }
            StreamFragment::TurnComplete => Some(Ok(Completion::Completed)),
            StreamFragment::Error { message } => Some(Err(Error::BackendSession(message))),
            StreamFragment::SessionClosed { reason } => {
                tracing::debug!(%reason, "session closed before completion, keeping partial reply");
                Some(Ok(Completion::ClosedEarly))
            }
        }
    }

    fn finish(self, completion: Completion) -> TurnResult {
        TurnResult {
            text: self.text,
            audio: self.audio,
            completion,
        }
    }
}

/// Consume fragments in arrival order until the turn settles.
async fn accumulate(fragments: &mut FragmentReceiver) -> Result<TurnResult> {
    let mut acc = TurnAccumulator::default();
    while let Some(fragment) = fragments.recv().await {
        if let Some(settled) = acc.apply(fragment) {
            return settled.map(|completion| acc.finish(completion));
        }
    }
    // Every callback handle is gone without a terminal signal.
    Ok(acc.finish(Completion::ClosedEarly))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnOrchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Runs persona turns against an injected live backend.
///
/// Holds no per-turn state; share it behind an `Arc` across callers.
pub struct TurnOrchestrator {
    backend: Arc<dyn LiveBackend>,
    settings: TurnSettings,
}

impl TurnOrchestrator {
    pub fn new(backend: Arc<dyn LiveBackend>, settings: TurnSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Run one turn: build the prompt, open a session, send the prompt,
    /// collect fragments until the turn settles, close the session.
    ///
    /// The session is always closed before this returns, whatever the
    /// outcome.  A session that closes without a completion signal yields
    /// a successful, possibly partial, result marked
    /// [`Completion::ClosedEarly`].
    pub async fn run_turn(&self, request: &TurnRequest) -> Result<TurnResult> {
        if request.user_message.trim().is_empty() {
            return Err(Error::InvalidRequest("user message must not be empty".into()));
        }

        let turn_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "turn",
            %turn_id,
            persona = %request.persona.display_name,
            voice = %request.persona.voice_id,
            model = %self.settings.model,
            backend = %self.backend.backend_id(),
        );
        self.run_turn_inner(request).instrument(span).await
    }

    async fn run_turn_inner(&self, request: &TurnRequest) -> Result<TurnResult> {
        let started = Instant::now();
        let prompt = build_prompt(request);
        let session_config = self.session_config(&request.persona);
        let (callbacks, mut fragments) = SessionCallbacks::channel();

        tracing::debug!(state = ?TurnState::Opening, prompt_len = prompt.len(), "opening session");
        let mut session = match self
            .backend
            .connect(&self.settings.model, &session_config, callbacks)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                let err = match e {
                    Error::BackendUnavailable(_) => e,
                    other => Error::BackendUnavailable(other.to_string()),
                };
                tracing::warn!(state = ?TurnState::Failed, error = %err, "session could not be opened");
                return Err(err);
            }
        };

        let outcome = match session.send_content(ClientTurn::user_text(prompt)).await {
            Ok(()) => {
                tracing::debug!(state = ?TurnState::AwaitingFragments, "prompt sent");
                self.await_settlement(&mut fragments).await
            }
            Err(e) => Err(Error::BackendSession(format!("failed to send turn: {e}"))),
        };

        // Stop listening before cleanup.
        drop(fragments);
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "session close failed during cleanup");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(result) => {
                let state = match result.completion {
                    Completion::Completed => TurnState::Completed,
                    Completion::ClosedEarly => TurnState::ClosedEarly,
                };
                tracing::info!(
                    state = ?state,
                    text_len = result.text.len(),
                    audio_bytes = result.audio_len(),
                    elapsed_ms,
                    "turn settled"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(state = ?TurnState::Failed, error = %e, elapsed_ms, "turn failed");
                Err(e)
            }
        }
    }

    async fn await_settlement(&self, fragments: &mut FragmentReceiver) -> Result<TurnResult> {
        match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, accumulate(fragments))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::BackendTimeout {
                        after_ms: limit.as_millis() as u64,
                    })
                }),
            None => accumulate(fragments).await,
        }
    }

    fn session_config(&self, persona: &Persona) -> LiveSessionConfig {
        LiveSessionConfig {
            response_modalities: self.settings.response_modalities.clone(),
            media_resolution: self.settings.media_resolution,
            voice_name: persona.voice_id.clone(),
            output_transcription: self.settings.output_transcription,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

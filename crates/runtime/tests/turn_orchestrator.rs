//! Integration tests for the turn orchestrator against a scripted backend.
//!
//! The fake backend records every connect, prompt and close, and plays a
//! fixed list of fragments through the session callbacks once the prompt
//! has been sent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ta_domain::config::{MediaResolution, Modality};
use ta_domain::error::{Error, Result};
use ta_domain::persona::{HistoryEntry, Persona, TurnRequest};
use ta_domain::stream::{Completion, StreamFragment};
use ta_providers::{ClientTurn, LiveBackend, LiveSession, LiveSessionConfig, SessionCallbacks};
use ta_runtime::runtime::{TurnOrchestrator, TurnSettings};

// ── Scripted backend ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Play the script after `send_content`.
    Play,
    /// `connect` fails.
    RefuseConnect,
    /// `connect` fails with a non-availability error.
    AuthFailure,
    /// `send_content` fails.
    FailSend,
    /// Accept the prompt and never say anything.
    Silent,
    /// Drop the callback handle after the script.
    HangUp,
    /// Play the script, then fail on `close`.
    FailClose,
}

#[derive(Default)]
struct Recorder {
    connects: AtomicUsize,
    closes: AtomicUsize,
    prompt: Mutex<Option<String>>,
    session_config: Mutex<Option<LiveSessionConfig>>,
    /// Whether a fragment pushed during `close` was still delivered.
    delivered_after_settle: AtomicBool,
}

struct ScriptedBackend {
    mode: Mode,
    script: Vec<StreamFragment>,
    seen: Arc<Recorder>,
}

impl ScriptedBackend {
    fn new(mode: Mode, script: Vec<StreamFragment>) -> (Arc<Self>, Arc<Recorder>) {
        let seen = Arc::new(Recorder::default());
        let backend = Arc::new(Self {
            mode,
            script,
            seen: seen.clone(),
        });
        (backend, seen)
    }
}

#[async_trait::async_trait]
impl LiveBackend for ScriptedBackend {
    async fn connect(
        &self,
        _model: &str,
        config: &LiveSessionConfig,
        callbacks: SessionCallbacks,
    ) -> Result<Box<dyn LiveSession>> {
        self.seen.connects.fetch_add(1, Ordering::SeqCst);
        *self.seen.session_config.lock().unwrap() = Some(config.clone());
        match self.mode {
            Mode::RefuseConnect => Err(Error::BackendUnavailable("connection refused".into())),
            Mode::AuthFailure => Err(Error::Auth("bad key".into())),
            _ => Ok(Box::new(ScriptedSession {
                mode: self.mode,
                script: self.script.clone(),
                callbacks: Some(callbacks),
                seen: self.seen.clone(),
            })),
        }
    }

    fn backend_id(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSession {
    mode: Mode,
    script: Vec<StreamFragment>,
    callbacks: Option<SessionCallbacks>,
    seen: Arc<Recorder>,
}

#[async_trait::async_trait]
impl LiveSession for ScriptedSession {
    async fn send_content(&mut self, turn: ClientTurn) -> Result<()> {
        *self.seen.prompt.lock().unwrap() = Some(turn.text);
        match self.mode {
            Mode::FailSend => return Err(Error::WebSocket("broken pipe".into())),
            Mode::Silent => return Ok(()),
            _ => {}
        }
        if let Some(cb) = &self.callbacks {
            for fragment in self.script.drain(..) {
                cb.on_message(fragment);
            }
        }
        if self.mode == Mode::HangUp {
            self.callbacks = None;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.seen.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(cb) = &self.callbacks {
            let delivered = cb.on_message(StreamFragment::text("late"));
            self.seen
                .delivered_after_settle
                .store(delivered, Ordering::SeqCst);
        }
        if self.mode == Mode::FailClose {
            return Err(Error::WebSocket("close handshake failed".into()));
        }
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────

fn emma() -> Persona {
    Persona {
        display_name: "Emma".into(),
        description: String::new(),
        behavior_tags: Default::default(),
        greeting: String::new(),
        language_code: "en".into(),
        voice_id: "Zephyr".into(),
    }
}

fn settings(timeout: Option<Duration>) -> TurnSettings {
    TurnSettings {
        model: "gemini-test".into(),
        response_modalities: vec![Modality::Audio],
        media_resolution: MediaResolution::Medium,
        output_transcription: false,
        timeout,
    }
}

fn orchestrator(backend: Arc<ScriptedBackend>) -> TurnOrchestrator {
    TurnOrchestrator::new(backend, settings(Some(Duration::from_secs(30))))
}

fn hello() -> TurnRequest {
    TurnRequest::new("Hello", emma())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Successful turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn text_only_reply() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::Play,
        vec![StreamFragment::text("Hi there!"), StreamFragment::TurnComplete],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "Hi there!");
    assert_eq!(result.audio, None);
    assert_eq!(result.completion, Completion::Completed);
    assert_eq!(seen.connects.load(Ordering::SeqCst), 1);
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn audio_chunks_are_concatenated() {
    let (backend, _seen) = ScriptedBackend::new(
        Mode::Play,
        vec![
            StreamFragment::text("Hi there!"),
            StreamFragment::audio(vec![1, 2, 3]),
            StreamFragment::audio(vec![4, 5]),
            StreamFragment::TurnComplete,
        ],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "Hi there!");
    assert_eq!(result.audio, Some(vec![1, 2, 3, 4, 5]));
}

#[tokio::test]
async fn empty_audio_chunk_is_not_audio() {
    let (backend, _seen) = ScriptedBackend::new(
        Mode::Play,
        vec![
            StreamFragment::text("Hi"),
            StreamFragment::audio(Vec::<u8>::new()),
            StreamFragment::TurnComplete,
        ],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "Hi");
    assert_eq!(result.audio, None);
}

#[tokio::test]
async fn interleaved_text_and_audio_keep_their_own_order() {
    let (backend, _seen) = ScriptedBackend::new(
        Mode::Play,
        vec![
            StreamFragment::text("one "),
            StreamFragment::audio(vec![0xA1]),
            StreamFragment::text("two "),
            StreamFragment::audio(vec![0xA2, 0xA2]),
            StreamFragment::text("three"),
            StreamFragment::TurnComplete,
        ],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "one two three");
    assert_eq!(result.audio, Some(vec![0xA1, 0xA2, 0xA2]));
}

#[tokio::test]
async fn fragments_after_completion_are_ignored() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::Play,
        vec![
            StreamFragment::text("final"),
            StreamFragment::TurnComplete,
            StreamFragment::text(" extra"),
            StreamFragment::audio(vec![9]),
            StreamFragment::Error {
                message: "racing error".into(),
            },
        ],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "final");
    assert_eq!(result.audio, None);
    assert_eq!(result.completion, Completion::Completed);
    // Nothing is listening once the turn has settled.
    assert!(!seen.delivered_after_settle.load(Ordering::SeqCst));
}

#[tokio::test]
async fn close_without_fragments_is_an_empty_success() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::Play,
        vec![StreamFragment::SessionClosed {
            reason: "closed without reason".into(),
        }],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "");
    assert_eq!(result.audio, None);
    assert_eq!(result.completion, Completion::ClosedEarly);
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn close_mid_reply_keeps_partial_text() {
    let (backend, _seen) = ScriptedBackend::new(
        Mode::Play,
        vec![
            StreamFragment::text("Half a sen"),
            StreamFragment::audio(vec![7, 7]),
            StreamFragment::SessionClosed {
                reason: "quota exceeded (code 1008)".into(),
            },
        ],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "Half a sen");
    assert_eq!(result.audio, Some(vec![7, 7]));
    assert_eq!(result.completion, Completion::ClosedEarly);
}

#[tokio::test]
async fn backend_hanging_up_counts_as_closed_early() {
    let (backend, seen) = ScriptedBackend::new(Mode::HangUp, vec![StreamFragment::text("bye")]);
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "bye");
    assert_eq!(result.completion, Completion::ClosedEarly);
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn error_signal_rejects_and_closes_once() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::Play,
        vec![StreamFragment::Error {
            message: "quota exceeded".into(),
        }],
    );
    let err = orchestrator(backend).run_turn(&hello()).await.unwrap_err();

    match err {
        Error::BackendSession(msg) => assert_eq!(msg, "quota exceeded"),
        other => panic!("expected BackendSession, got {other:?}"),
    }
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_close_keeps_completed_reply() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::FailClose,
        vec![StreamFragment::text("ok"), StreamFragment::TurnComplete],
    );
    let result = orchestrator(backend).run_turn(&hello()).await.unwrap();

    assert_eq!(result.text, "ok");
    assert_eq!(result.completion, Completion::Completed);
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_close_keeps_session_error() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::FailClose,
        vec![StreamFragment::Error {
            message: "quota exceeded".into(),
        }],
    );
    let err = orchestrator(backend).run_turn(&hello()).await.unwrap_err();

    assert!(matches!(err, Error::BackendSession(ref m) if m == "quota exceeded"));
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_after_partial_reply_discards_it() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::Play,
        vec![
            StreamFragment::text("partial"),
            StreamFragment::Error {
                message: "internal".into(),
            },
        ],
    );
    let err = orchestrator(backend).run_turn(&hello()).await.unwrap_err();

    assert!(matches!(err, Error::BackendSession(ref m) if m == "internal"));
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_backend_times_out_and_closes() {
    let (backend, seen) = ScriptedBackend::new(Mode::Silent, Vec::new());
    let orch = orchestrator(backend);

    let started = tokio::time::Instant::now();
    let err = orch.run_turn(&hello()).await.unwrap_err();

    assert!(matches!(err, Error::BackendTimeout { after_ms: 30_000 }));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_timeout_keeps_waiting() {
    let (backend, seen) = ScriptedBackend::new(Mode::Silent, Vec::new());
    let orch = TurnOrchestrator::new(backend, settings(None));
    let request = hello();

    let turn = orch.run_turn(&request);
    let waited = tokio::time::timeout(Duration::from_secs(3600), turn).await;

    assert!(waited.is_err(), "turn should still be pending");
    assert_eq!(seen.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_connect_is_unavailable_without_close() {
    let (backend, seen) = ScriptedBackend::new(Mode::RefuseConnect, Vec::new());
    let err = orchestrator(backend).run_turn(&hello()).await.unwrap_err();

    assert!(matches!(err, Error::BackendUnavailable(ref m) if m == "connection refused"));
    assert_eq!(seen.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn other_connect_failures_become_unavailable() {
    let (backend, _seen) = ScriptedBackend::new(Mode::AuthFailure, Vec::new());
    let err = orchestrator(backend).run_turn(&hello()).await.unwrap_err();

    assert!(matches!(err, Error::BackendUnavailable(ref m) if m.contains("bad key")));
}

#[tokio::test]
async fn failed_send_is_a_session_error_and_closes() {
    let (backend, seen) = ScriptedBackend::new(Mode::FailSend, Vec::new());
    let err = orchestrator(backend).run_turn(&hello()).await.unwrap_err();

    assert!(matches!(err, Error::BackendSession(ref m) if m.contains("broken pipe")));
    assert_eq!(seen.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_message_is_rejected_before_connecting() {
    let (backend, seen) = ScriptedBackend::new(Mode::Play, Vec::new());
    let err = orchestrator(backend)
        .run_turn(&TurnRequest::new("   \n", emma()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(seen.connects.load(Ordering::SeqCst), 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// What reaches the backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn prompt_and_voice_reach_the_backend() {
    let (backend, seen) = ScriptedBackend::new(Mode::Play, vec![StreamFragment::TurnComplete]);
    let mut persona = emma();
    persona.language_code = "am".into();
    persona.voice_id = "Puck".into();
    let request = TurnRequest::new("ሰላም", persona)
        .with_history(vec![HistoryEntry::user("Hi"), HistoryEntry::agent("Hello!")]);

    orchestrator(backend).run_turn(&request).await.unwrap();

    let prompt = seen.prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.starts_with("You are Emma."));
    assert!(prompt.contains("Respond only in Amharic (am)."));
    assert!(prompt.contains("User: Hi\nEmma: Hello!\n"));
    assert!(prompt.ends_with("User: ሰላም\nEmma:"));

    let config = seen.session_config.lock().unwrap().clone().unwrap();
    assert_eq!(config.voice_name, "Puck");
    assert_eq!(config.response_modalities, vec![Modality::Audio]);
}

#[tokio::test]
async fn orchestrator_is_shareable_across_tasks() {
    let (backend, seen) = ScriptedBackend::new(
        Mode::Play,
        vec![StreamFragment::text("ok"), StreamFragment::TurnComplete],
    );
    let orch = Arc::new(orchestrator(backend));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_turn(&hello()).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().text, "ok");
    }
    assert_eq!(seen.connects.load(Ordering::SeqCst), 4);
    assert_eq!(seen.closes.load(Ordering::SeqCst), 4);
}

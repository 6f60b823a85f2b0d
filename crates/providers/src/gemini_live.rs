//! Google Gemini Live adapter.
//!
//! Implements the `BidiGenerateContent` WebSocket API.  A session is one
//! WebSocket connection: the client sends `setup`, waits for
//! `setupComplete`, then sends `clientContent` turns while a reader task
//! turns `serverContent` frames into [`StreamFragment`]s.
//! Auth is via an API key passed as a query parameter (`key={api_key}`).

use std::time::Duration;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::Instrument;

use crate::traits::{ClientTurn, LiveBackend, LiveSession, LiveSessionConfig, SessionCallbacks};
use crate::util::{from_ws, redact_url_key, resolve_api_key};
use ta_domain::config::{BackendConfig, Modality};
use ta_domain::error::{Error, Result};
use ta_domain::stream::StreamFragment;

const BIDI_PATH: &str =
    "/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A live backend adapter for the Gemini Live API.
pub struct GeminiLiveBackend {
    id: String,
    base_url: String,
    api_key: String,
    connect_timeout: Duration,
}

impl GeminiLiveBackend {
    /// Create a backend from the deserialized backend config.  The API key
    /// is resolved eagerly.
    pub fn from_config(cfg: &BackendConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        Ok(Self::new(
            &cfg.base_url,
            api_key,
            Duration::from_millis(cfg.connect_timeout_ms),
        ))
    }

    pub fn new(base_url: &str, api_key: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            id: "gemini_live".into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            connect_timeout,
        }
    }

    fn endpoint_url(&self) -> String {
        format!("{}{}?key={}", self.base_url, BIDI_PATH, self.api_key)
    }

    /// Connect, send `setup`, and wait for `setupComplete`.
    async fn handshake(&self, url: &str, setup: &Value) -> Result<WsStream> {
        let (mut ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(from_ws)?;

        ws.send(Message::Text(serde_json::to_string(setup)?))
            .await
            .map_err(from_ws)?;

        loop {
            match ws.next().await {
                Some(Ok(Message::Close(frame))) => {
                    return Err(Error::WebSocket(format!(
                        "closed during setup: {}",
                        close_reason(frame.as_ref())
                    )));
                }
                Some(Ok(msg)) => {
                    let Some(text) = frame_text(&msg) else { continue };
                    let frame = parse_server_frame(text?, false)?;
                    if let Some(StreamFragment::Error { message }) = frame
                        .fragments
                        .into_iter()
                        .find(|f| matches!(f, StreamFragment::Error { .. }))
                    {
                        return Err(Error::WebSocket(format!("setup rejected: {message}")));
                    }
                    if frame.setup_complete {
                        return Ok(ws);
                    }
                }
                Some(Err(e)) => return Err(from_ws(e)),
                None => {
                    return Err(Error::WebSocket(
                        "connection closed before setupComplete".into(),
                    ))
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client message builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_setup(model: &str, config: &LiveSessionConfig) -> Value {
    let model = if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    };

    let modalities: Vec<&str> = config
        .response_modalities
        .iter()
        .map(|m| m.as_wire())
        .collect();

    let mut gen_config = serde_json::json!({
        "responseModalities": modalities,
        "mediaResolution": config.media_resolution.as_wire(),
    });
    if config.response_modalities.contains(&Modality::Audio) {
        gen_config["speechConfig"] = serde_json::json!({
            "voiceConfig": {
                "prebuiltVoiceConfig": { "voiceName": config.voice_name }
            }
        });
    }

    let mut setup = serde_json::json!({
        "model": model,
        "generationConfig": gen_config,
    });
    if config.output_transcription {
        setup["outputAudioTranscription"] = serde_json::json!({});
    }

    serde_json::json!({ "setup": setup })
}

fn build_client_content(turn: &ClientTurn) -> Value {
    serde_json::json!({
        "clientContent": {
            "turns": [{
                "role": "user",
                "parts": [{ "text": turn.text }],
            }],
            "turnComplete": true,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server frame parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a single server frame carried.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ServerFrame {
    pub setup_complete: bool,
    pub fragments: Vec<StreamFragment>,
}

/// Parse one JSON server message.  Fragments are returned in the order
/// they appear in the frame; `turnComplete` always comes last.
pub(crate) fn parse_server_frame(data: &str, transcription: bool) -> Result<ServerFrame> {
    let v: Value = serde_json::from_str(data)?;
    let mut frame = ServerFrame {
        setup_complete: v.get("setupComplete").is_some(),
        ..Default::default()
    };

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        frame.fragments.push(StreamFragment::Error { message });
    }

    if let Some(content) = v.get("serverContent") {
        if let Some(parts) = content.pointer("/modelTurn/parts").and_then(|p| p.as_array()) {
            for part in parts {
                // Native-audio models interleave reasoning parts; they are
                // not part of the reply.
                if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
                    continue;
                }
                if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                    if !text.is_empty() {
                        frame.fragments.push(StreamFragment::text(text));
                    }
                }
                if let Some(inline) = part.get("inlineData") {
                    let mime = inline
                        .get("mimeType")
                        .and_then(|m| m.as_str())
                        .unwrap_or("audio/pcm");
                    if !mime.starts_with("audio/") {
                        tracing::debug!(mime, "ignoring non-audio inline data");
                        continue;
                    }
                    let encoded = inline.get("data").and_then(|d| d.as_str()).unwrap_or("");
                    let data = BASE64_STANDARD
                        .decode(encoded)
                        .map_err(|e| Error::Other(format!("invalid base64 audio: {e}")))?;
                    if !data.is_empty() {
                        frame.fragments.push(StreamFragment::audio(data));
                    }
                }
            }
        }

        if transcription {
            if let Some(text) = content
                .pointer("/outputTranscription/text")
                .and_then(|t| t.as_str())
            {
                if !text.is_empty() {
                    frame.fragments.push(StreamFragment::text(text));
                }
            }
        }

        if content.get("interrupted").and_then(|i| i.as_bool()) == Some(true) {
            tracing::debug!("backend reported generation interrupted");
        }

        if content.get("turnComplete").and_then(|t| t.as_bool()) == Some(true) {
            frame.fragments.push(StreamFragment::TurnComplete);
        }
    }

    if let Some(go_away) = v.get("goAway") {
        tracing::warn!(
            time_left = %go_away.get("timeLeft").and_then(|t| t.as_str()).unwrap_or("unknown"),
            "backend announced session shutdown"
        );
    }

    if let Some(usage) = v.get("usageMetadata") {
        tracing::debug!(
            total_tokens = usage.get("totalTokenCount").and_then(|t| t.as_u64()).unwrap_or(0),
            "usage reported"
        );
    }

    Ok(frame)
}

/// JSON payload of a data frame.  Gemini sends JSON in binary frames, so
/// those must be valid UTF-8 too.
fn frame_text(msg: &Message) -> Option<Result<&str>> {
    match msg {
        Message::Text(t) => Some(Ok(t.as_str())),
        Message::Binary(b) => Some(
            std::str::from_utf8(b)
                .map_err(|e| Error::Other(format!("binary frame is not UTF-8: {e}"))),
        ),
        _ => None,
    }
}

fn close_reason(frame: Option<&CloseFrame<'_>>) -> String {
    match frame {
        Some(f) if f.reason.is_empty() => format!("code {}", u16::from(f.code)),
        Some(f) => format!("{} (code {})", f.reason, u16::from(f.code)),
        None => "closed without reason".into(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reader task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    callbacks: SessionCallbacks,
    transcription: bool,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(frame)) => {
                callbacks.on_close(close_reason(frame.as_ref()));
                return;
            }
            Ok(msg) => {
                let Some(text) = frame_text(&msg) else { continue };
                match text.and_then(|t| parse_server_frame(t, transcription)) {
                    Ok(frame) => {
                        for fragment in frame.fragments {
                            let terminal = fragment.is_terminal();
                            callbacks.on_message(fragment);
                            if terminal {
                                tracing::debug!("terminal fragment forwarded, reader exiting");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        callbacks.on_error(format!("malformed server message: {e}"));
                        return;
                    }
                }
            }
            Err(e) => {
                callbacks.on_error(e.to_string());
                return;
            }
        }

        if callbacks.is_settled() {
            tracing::debug!("turn settled, reader exiting");
            return;
        }
    }

    callbacks.on_close("stream ended");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct GeminiLiveSession {
    sink: SplitSink<WsStream, Message>,
    reader: Option<JoinHandle<()>>,
    closed: bool,
}

#[async_trait::async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send_content(&mut self, turn: ClientTurn) -> Result<()> {
        if self.closed {
            return Err(Error::WebSocket("session already closed".into()));
        }
        let json = serde_json::to_string(&build_client_content(&turn))?;
        self.sink.send(Message::Text(json)).await.map_err(from_ws)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // A peer that already hung up is not a close failure.
        let result = match self.sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::BrokenPipe
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(from_ws(e)),
        };

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        result
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LiveBackend for GeminiLiveBackend {
    async fn connect(
        &self,
        model: &str,
        config: &LiveSessionConfig,
        callbacks: SessionCallbacks,
    ) -> Result<Box<dyn LiveSession>> {
        let url = self.endpoint_url();
        let setup = build_setup(model, config);

        tracing::debug!(
            backend = %self.id,
            url = %redact_url_key(&url),
            model,
            voice = %config.voice_name,
            "opening live session"
        );

        let ws = match tokio::time::timeout(self.connect_timeout, self.handshake(&url, &setup))
            .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => return Err(Error::BackendUnavailable(e.to_string())),
            Err(_) => {
                return Err(Error::BackendUnavailable(format!(
                    "setup not completed within {}ms",
                    self.connect_timeout.as_millis()
                )))
            }
        };

        let (sink, stream) = ws.split();
        let reader = tokio::spawn(
            read_loop(stream, callbacks, config.output_transcription)
                .instrument(tracing::Span::current()),
        );

        Ok(Box::new(GeminiLiveSession {
            sink,
            reader: Some(reader),
            closed: false,
        }))
    }

    fn backend_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

//! WebSocket voice transport.
//!
//! Opening a session is a two-step handshake:
//!
//! ```text
//! POST {api_base_url}/call   (Bearer public key)
//!   { assistantId, transport: { provider, audioFormat } }
//!   ◀── { transport: { websocketCallUrl } }
//! GET  websocketCallUrl      (WebSocket upgrade)
//! ```
//!
//! Once the socket is up the session runs on its own task:
//!
//! * microphone frames → mono s16le → binary frames to the agent;
//! * binary frames from the agent → [`AudioPlayback`];
//! * text frames are JSON control messages (`error`, `status-update`,
//!   `user-interrupted`);
//! * the handle's `stop()` sends `{"type":"end-call"}` and closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::audio::{decode_s16le, downmix_to_mono, encode_s16le, AudioPlayback, MicrophoneLease};
use crate::config::{AudioConfig, VoiceConfig};

use super::classify::RawFault;
use super::client::{EventSink, SessionHandle, SessionRequest, VoiceTransport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TRANSPORT_PROVIDER: &str = "vapi.websocket";

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Failures while opening a session.  Converted to [`RawFault`] at the
/// transport boundary; only `classify` interprets them further.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected session request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("provider reply did not include a websocket url")]
    MissingUrl,

    #[error("websocket connect failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("session handshake timed out after {0} s")]
    Timeout(u64),
}

impl From<TransportError> for RawFault {
    fn from(err: TransportError) -> Self {
        let name = match &err {
            TransportError::Http(_) => "HttpError",
            TransportError::Rejected { .. } => "SessionRejected",
            TransportError::MissingUrl => "MalformedReply",
            TransportError::WebSocket(_) => "WebSocketError",
            TransportError::Timeout(_) => "TimeoutError",
        };
        RawFault::named(name, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCall<'a> {
    assistant_id: &'a str,
    transport: TransportSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransportSpec {
    provider: &'static str,
    audio_format: AudioFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioFormat {
    format: &'static str,
    container: &'static str,
    sample_rate: u32,
}

#[derive(Debug, Deserialize)]
struct CreateCallReply {
    transport: Option<ReplyTransport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyTransport {
    websocket_call_url: Option<String>,
}

fn create_call_body(assistant_id: &str, sample_rate: u32) -> CreateCall<'_> {
    CreateCall {
        assistant_id,
        transport: TransportSpec {
            provider: TRANSPORT_PROVIDER,
            audio_format: AudioFormat {
                format: "pcm_s16le",
                container: "raw",
                sample_rate,
            },
        },
    }
}

fn websocket_url(reply: CreateCallReply) -> Result<String, TransportError> {
    reply
        .transport
        .and_then(|t| t.websocket_call_url)
        .filter(|url| !url.is_empty())
        .ok_or(TransportError::MissingUrl)
}

// ---------------------------------------------------------------------------
// Control messages
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Control {
    Continue,
    Interrupted,
    Ended,
    Failed(RawFault),
}

fn parse_control(text: &str) -> Control {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        log::debug!("transport: ignoring non-JSON text frame ({} bytes)", text.len());
        return Control::Continue;
    };

    match value.get("type").and_then(|t| t.as_str()).unwrap_or("") {
        "error" => {
            let name = value
                .pointer("/error/name")
                .or_else(|| value.get("name"))
                .and_then(|n| n.as_str());
            Control::Failed(RawFault {
                name: name.map(str::to_string),
                detail: text.to_string(),
            })
        }
        "status-update" if value.get("status").and_then(|s| s.as_str()) == Some("ended") => Control::Ended,
        "user-interrupted" => Control::Interrupted,
        _ => Control::Continue,
    }
}

// ---------------------------------------------------------------------------
// WebSocketTransport
// ---------------------------------------------------------------------------

/// [`VoiceTransport`] that talks to the provider over HTTP + WebSocket.
///
/// All connection details come from [`VoiceConfig`]; nothing is hardcoded.
pub struct WebSocketTransport {
    http: reqwest::Client,
    api_base_url: String,
    connect_timeout_secs: u64,
    playback: bool,
}

impl WebSocketTransport {
    pub fn from_config(voice: &VoiceConfig, audio: &AudioConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(voice.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_base_url: voice.api_base_url.trim_end_matches('/').to_string(),
            connect_timeout_secs: voice.connect_timeout_secs,
            playback: audio.playback,
        }
    }

    async fn create_call(&self, request: &SessionRequest, sample_rate: u32) -> Result<String, TransportError> {
        let url = format!("{}/call", self.api_base_url);
        let body = create_call_body(&request.assistant_id, sample_rate);

        let mut req = self.http.post(&url).json(&body);
        if !request.public_key.is_empty() {
            req = req.bearer_auth(&request.public_key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        websocket_url(response.json().await?)
    }

    async fn open_socket(&self, request: &SessionRequest, sample_rate: u32) -> Result<WsStream, TransportError> {
        let url = self.create_call(request, sample_rate).await?;
        log::debug!("transport: connecting websocket");
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(ws)
    }
}

async fn open_playback(sample_rate: u32) -> Option<AudioPlayback> {
    match tokio::task::spawn_blocking(move || AudioPlayback::open(sample_rate)).await {
        Ok(Ok(playback)) => Some(playback),
        Ok(Err(e)) => {
            log::warn!("transport: agent playback unavailable: {e}");
            None
        }
        Err(e) => {
            log::warn!("transport: playback thread failed: {e}");
            None
        }
    }
}

#[async_trait]
impl VoiceTransport for WebSocketTransport {
    async fn connect(
        &self,
        request: SessionRequest,
        mut microphone: MicrophoneLease,
        sink: EventSink,
    ) -> Result<Box<dyn SessionHandle>, RawFault> {
        let sample_rate = microphone.sample_rate();

        let ws = tokio::time::timeout(
            Duration::from_secs(self.connect_timeout_secs),
            self.open_socket(&request, sample_rate),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.connect_timeout_secs))??;

        let playback = if self.playback {
            open_playback(sample_rate).await
        } else {
            None
        };

        let stale = microphone.discard_pending();
        if stale > 0 {
            log::debug!("transport: dropped {stale} buffers captured during the handshake");
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        log::info!("transport: {} connected", sink.session());
        sink.started();
        tokio::spawn(run_session(ws, microphone, playback, sink, stop_rx));

        Ok(Box::new(WebSocketSession { stop: Some(stop_tx) }))
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

struct WebSocketSession {
    stop: Option<oneshot::Sender<()>>,
}

impl SessionHandle for WebSocketSession {
    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

enum Outcome {
    Stopped,
    Ended,
    Failed(RawFault),
}

async fn run_session(
    ws: WsStream,
    mut microphone: MicrophoneLease,
    playback: Option<AudioPlayback>,
    sink: EventSink,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let (mut write, mut read) = ws.split();
    let channels = microphone.channels();

    let outcome = loop {
        tokio::select! {
            // Explicit stop, or the handle was dropped.
            _ = &mut stop_rx => {
                let end_call = serde_json::json!({ "type": "end-call" }).to_string();
                let _ = write.send(Message::Text(end_call.into())).await;
                let _ = write.send(Message::Close(None)).await;
                break Outcome::Stopped;
            }

            chunk = microphone.next_chunk() => match chunk {
                Some(chunk) => {
                    let mono = downmix_to_mono(&chunk.samples, channels);
                    if let Err(e) = write.send(Message::Binary(encode_s16le(&mono).into())).await {
                        break Outcome::Failed(RawFault::named("WebSocketError", e.to_string()));
                    }
                }
                None => {
                    break Outcome::Failed(RawFault::named(
                        "NotReadableError",
                        "microphone stopped delivering audio",
                    ));
                }
            },

            frame = read.next() => match frame {
                Some(Ok(Message::Binary(bytes))) => {
                    if let Some(playback) = &playback {
                        playback.push(&decode_s16le(&bytes));
                    }
                }
                Some(Ok(Message::Text(text))) => match parse_control(&text) {
                    Control::Continue => {}
                    Control::Interrupted => {
                        if let Some(playback) = &playback {
                            playback.clear();
                        }
                    }
                    Control::Ended => break Outcome::Ended,
                    Control::Failed(fault) => break Outcome::Failed(fault),
                },
                Some(Ok(Message::Close(_))) | None => break Outcome::Ended,
                Some(Ok(_)) => {}
                Some(Err(e)) => break Outcome::Failed(RawFault::named("WebSocketError", e.to_string())),
            },
        }
    };

    match outcome {
        Outcome::Stopped => log::info!("transport: {} stopped locally", sink.session()),
        Outcome::Ended => {
            log::info!("transport: {} ended by provider", sink.session());
            sink.ended();
        }
        Outcome::Failed(fault) => {
            log::warn!("transport: {} failed: {fault}", sink.session());
            sink.error(fault);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

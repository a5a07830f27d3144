//! Synthesis session protocol state machine.
//!
//! One `generate()` call drives the whole session: credential exchange,
//! WebSocket connect, strictly sequential handshake (configure → acknowledge
//! → trigger → stream → done), fragment routing into the assembler, a single
//! wall-clock deadline armed at connection open, and cooperative
//! cancellation. Every terminal transition closes the connection and drops
//! all session-local buffers; no retry happens anywhere in this crate.

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        handshake::client::generate_key,
        http::Request,
        http::header::{AUTHORIZATION, USER_AGENT},
        protocol::Message,
    },
};
use tracing::{debug, info, warn};

use super::messages::{ConversationItemCreate, ResponseCreate, ServerEvent, SessionUpdate};
use crate::config::{GenerationRequest, SessionConfig, TransportMode};
use crate::core::audio::{AudioAssembler, SynthesisResult};
use crate::core::credentials::{CredentialBroker, SessionCredential, TokenSource};
use crate::core::style;
use crate::errors::{SessionResult, SynthesisError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fixed system preamble prepended to every set of delivery instructions.
/// Forbids greetings and commentary and requires a verbatim read.
const DELIVERY_PREAMBLE: &str = "You are a voiceover artist. Read the script below exactly as \
written, from the first word to the last. Do not greet the listener, do not introduce yourself, \
do not add commentary, and do not skip or rephrase anything.";

/// Protocol state of a synthesis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CredentialPending,
    Connecting,
    AwaitingSessionAck,
    AwaitingResponse,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Cloneable handle that cancels an in-flight generation.
///
/// Cancellation is cooperative and immediate at the transport layer: the
/// session closes its connection without waiting for a terminal event.
/// Calling `cancel()` twice, or cancelling an already-terminal session, is a
/// no-op.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Realtime speech-synthesis session client.
///
/// One in-flight generation per instance, enforced by `&mut self`. Each
/// `generate()` call owns its own credential, connection, and assembler;
/// nothing is shared across calls or instances.
pub struct SynthesisSession {
    config: SessionConfig,
    state: SessionState,
    cancel_tx: watch::Sender<bool>,
}

impl SynthesisSession {
    pub fn new(config: SessionConfig) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            config,
            state: SessionState::Idle,
            cancel_tx,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for cancelling the in-flight generation, valid until the
    /// result settles.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Run one full synthesis session using the production credential
    /// broker.
    pub async fn generate(
        &mut self,
        request: &GenerationRequest,
    ) -> SessionResult<SynthesisResult> {
        let broker = CredentialBroker::new(&self.config);
        self.generate_with_source(request, &broker).await
    }

    /// Run one full synthesis session with a caller-supplied credential
    /// source.
    pub async fn generate_with_source(
        &mut self,
        request: &GenerationRequest,
        tokens: &dyn TokenSource,
    ) -> SessionResult<SynthesisResult> {
        request.validate()?;

        // A retry re-invokes generate(); a cancel aimed at the previous
        // attempt must not kill this one.
        self.cancel_tx.send_replace(false);

        let result = self.run(request, tokens).await;
        self.state = match &result {
            Ok(_) => SessionState::Completed,
            Err(SynthesisError::Cancelled) => SessionState::Cancelled,
            Err(_) => SessionState::Failed,
        };
        match &result {
            Ok(output) => info!(
                audio_bytes = output.audio.len(),
                transcript_chars = output.transcript.len(),
                "synthesis session completed"
            ),
            Err(SynthesisError::Cancelled) => info!("synthesis session cancelled"),
            Err(e) => warn!(error = %e, "synthesis session failed"),
        }
        result
    }

    async fn run(
        &mut self,
        request: &GenerationRequest,
        tokens: &dyn TokenSource,
    ) -> SessionResult<SynthesisResult> {
        let mut cancel_rx = self.cancel_tx.subscribe();

        self.state = SessionState::CredentialPending;
        let credential = tokio::select! {
            credential = tokens.exchange(&request.api_key) => credential?,
            _ = cancelled(&mut cancel_rx) => return Err(SynthesisError::Cancelled),
        };

        self.state = SessionState::Connecting;
        let ws_request = build_ws_request(&self.config, &credential)?;
        let (mut ws, response) = tokio::select! {
            connection = connect_async(ws_request) => connection.map_err(|e| {
                SynthesisError::ConnectionFailed(format!("websocket connect failed: {e}"))
            })?,
            _ = cancelled(&mut cancel_rx) => return Err(SynthesisError::Cancelled),
        };
        debug!(status = ?response.status(), "realtime connection established");

        // Credential and buffers die with this call; the deadline is armed
        // from connection open.
        let deadline = Instant::now() + self.config.session_timeout;
        let outcome = self
            .drive(&mut ws, request, deadline, &mut cancel_rx)
            .await;

        // Connection is closed on entry to every terminal state. Late
        // events on the wire are discarded along with the stream.
        let _ = ws.close(None).await;
        outcome
    }

    /// Event loop: sequential handshake, then delta routing until a
    /// terminal event, the deadline, or cancellation.
    async fn drive(
        &mut self,
        ws: &mut WsStream,
        request: &GenerationRequest,
        deadline: Instant,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> SessionResult<SynthesisResult> {
        let instructions = build_instructions(&request.script);
        send_json(ws, &SessionUpdate::new(request.voice, instructions)).await?;
        self.state = SessionState::AwaitingSessionAck;

        let mut assembler = AudioAssembler::new();
        loop {
            let message = tokio::select! {
                _ = cancelled(cancel_rx) => return Err(SynthesisError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => return Err(SynthesisError::Timeout),
                message = ws.next() => message,
            };

            let message = match message {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    return Err(SynthesisError::ConnectionFailed(format!(
                        "websocket error: {e}"
                    )));
                }
                None => {
                    return Err(SynthesisError::ConnectionFailed(
                        "connection closed before a terminal event".to_string(),
                    ));
                }
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    return Err(SynthesisError::ConnectionFailed(format!(
                        "server closed the connection: {frame:?}"
                    )));
                }
                // Pings are answered by tungstenite itself.
                _ => continue,
            };

            let event: ServerEvent = match serde_json::from_str(&text) {
                Ok(event) => event,
                Err(e) => {
                    debug!(error = %e, "ignoring unparseable server event");
                    continue;
                }
            };

            match event {
                ServerEvent::SessionCreated => {
                    debug!("session created");
                }
                ServerEvent::SessionUpdated => {
                    if self.state == SessionState::AwaitingSessionAck {
                        send_json(ws, &ConversationItemCreate::trigger()).await?;
                        send_json(ws, &ResponseCreate::audio_and_text()).await?;
                        self.state = SessionState::AwaitingResponse;
                        debug!("session acknowledged, generation triggered");
                    }
                }
                ServerEvent::AudioDelta { delta } => {
                    self.state = SessionState::Streaming;
                    assembler.push_audio(&delta);
                }
                ServerEvent::TranscriptDelta { delta } => {
                    self.state = SessionState::Streaming;
                    assembler.push_transcript(&delta);
                }
                ServerEvent::ResponseDone => {
                    debug!("terminal event received");
                    return assembler.finalize(request.sample_rate_hz);
                }
                ServerEvent::Error { error } => {
                    return Err(SynthesisError::ProtocolError(error.message));
                }
                ServerEvent::Unknown => {
                    debug!("ignoring unhandled server event");
                }
            }
        }
    }
}

/// Delivery instructions: fixed preamble plus the annotation-processed
/// script.
fn build_instructions(script: &str) -> String {
    format!("{DELIVERY_PREAMBLE}\n\nScript:\n{}", style::process(script))
}

/// Build the WebSocket upgrade request, attaching the session credential
/// per the configured transport.
fn build_ws_request(
    config: &SessionConfig,
    credential: &SessionCredential,
) -> SessionResult<Request<()>> {
    let mut url = config.realtime_url.clone();
    url.query_pairs_mut().append_pair("model", &config.model);
    if config.transport == TransportMode::Relayed {
        url.query_pairs_mut().append_pair("token", &credential.token);
    }

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(SynthesisError::ConnectionFailed(format!(
                "realtime URL has no host: {}",
                config.realtime_url
            )));
        }
    };

    let mut builder = Request::builder()
        .method("GET")
        .uri(url.as_str())
        .header("Host", host)
        .header("Upgrade", "websocket")
        .header("Connection", "upgrade")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Version", "13")
        .header(USER_AGENT, "narrate/0.1")
        .header("OpenAI-Beta", "realtime=v1");

    if config.transport == TransportMode::Direct {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", credential.token));
    }

    builder
        .body(())
        .map_err(|e| SynthesisError::ConnectionFailed(format!("failed to build request: {e}")))
}

async fn send_json<T: Serialize>(ws: &mut WsStream, payload: &T) -> SessionResult<()> {
    let text = serde_json::to_string(payload).map_err(|e| {
        SynthesisError::ProtocolError(format!("failed to encode client event: {e}"))
    })?;
    ws.send(Message::Text(text)).await.map_err(|e| {
        SynthesisError::ConnectionFailed(format!("failed to send client event: {e}"))
    })
}

/// Resolves once cancellation has been requested; pends forever otherwise.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceId;

    #[test]
    fn test_new_session_is_idle() {
        let session = SynthesisSession::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.state().is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let session = SynthesisSession::new(SessionConfig::default());
        let handle = session.cancel_handle();
        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_empty_script_rejected_before_network() {
        let mut session = SynthesisSession::new(SessionConfig::default());
        let request = GenerationRequest::new("sk-test", "", VoiceId::Alloy);

        struct NeverCalled;
        #[async_trait::async_trait]
        impl TokenSource for NeverCalled {
            async fn exchange(&self, _api_key: &str) -> SessionResult<SessionCredential> {
                panic!("credential exchange must not run for an invalid request");
            }
        }

        let result = session.generate_with_source(&request, &NeverCalled).await;
        assert!(matches!(
            result.unwrap_err(),
            SynthesisError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_instructions_carry_preamble_and_processed_script() {
        let instructions = build_instructions("Hi [excited]there[/excited]");
        assert!(instructions.starts_with(DELIVERY_PREAMBLE));
        assert!(instructions.contains("(speak with excitement and energy) there"));
        assert!(!instructions.contains("[excited]"));
    }

    #[test]
    fn test_direct_transport_uses_bearer_header() {
        let config = SessionConfig::default();
        let credential = SessionCredential {
            token: "ek_test".to_string(),
            expires_at_epoch: 0,
        };
        let request = build_ws_request(&config, &credential).unwrap();

        let auth = request.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer ek_test");
        assert!(!request.uri().to_string().contains("token=ek_test"));
    }

    #[test]
    fn test_relayed_transport_embeds_token_in_uri() {
        let config = SessionConfig {
            transport: TransportMode::Relayed,
            ..SessionConfig::default()
        };
        let credential = SessionCredential {
            token: "ek_test".to_string(),
            expires_at_epoch: 0,
        };
        let request = build_ws_request(&config, &credential).unwrap();

        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert!(request.uri().to_string().contains("token=ek_test"));
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{SessionResult, SynthesisError};

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Voice identifiers supported by the realtime synthesis provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceId {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl VoiceId {
    /// Wire name of the voice as the provider expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceId::Alloy => "alloy",
            VoiceId::Ash => "ash",
            VoiceId::Ballad => "ballad",
            VoiceId::Coral => "coral",
            VoiceId::Echo => "echo",
            VoiceId::Sage => "sage",
            VoiceId::Shimmer => "shimmer",
            VoiceId::Verse => "verse",
        }
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        VoiceId::Alloy
    }
}

/// A single voiceover generation request.
///
/// The long-lived API key is read once per call and exchanged for a
/// short-lived session credential; it is never cached by this crate.
#[derive(Clone)]
pub struct GenerationRequest {
    /// Long-lived provider API key.
    pub api_key: String,
    /// Script text, may contain bracket-style delivery annotations.
    pub script: String,
    /// Voice to narrate with.
    pub voice: VoiceId,
    /// Output sample rate in Hz.
    pub sample_rate_hz: u32,
}

impl GenerationRequest {
    pub fn new(api_key: impl Into<String>, script: impl Into<String>, voice: VoiceId) -> Self {
        Self {
            api_key: api_key.into(),
            script: script.into(),
            voice,
            sample_rate_hz: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Validate the request before any network activity.
    pub(crate) fn validate(&self) -> SessionResult<()> {
        if self.script.trim().is_empty() {
            return Err(SynthesisError::InvalidRequest(
                "script must not be empty".to_string(),
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err(SynthesisError::InvalidRequest(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("api_key", &"<redacted>")
            .field("script", &self.script)
            .field("voice", &self.voice)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .finish()
    }
}

/// How the short-lived credential is presented when opening the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Bearer authorization header on the WebSocket upgrade request.
    Direct,
    /// Token embedded in the connection URI as a query parameter, for
    /// transports that cannot set connection-level headers.
    Relayed,
}

/// Configuration for a synthesis session.
///
/// Defaults point at the provider's production endpoints; tests and relays
/// override the URLs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the realtime synthesis API.
    pub realtime_url: Url,
    /// HTTP endpoint of the short-lived credential exchange.
    pub sessions_url: Url,
    /// Provider model identifier.
    pub model: String,
    /// How the session credential is attached to the stream.
    pub transport: TransportMode,
    /// Wall-clock deadline for the whole session, armed at connection open.
    pub session_timeout: Duration,
    /// Deadline for the one-shot credential exchange round trip.
    pub exchange_timeout: Duration,
    /// Requested credential lifetime in seconds. Minutes-scale: enough for
    /// one synthesis call, observed provider-side.
    pub credential_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            realtime_url: Url::parse("wss://api.openai.com/v1/realtime")
                .expect("static URL is valid"),
            sessions_url: Url::parse("https://api.openai.com/v1/realtime/sessions")
                .expect("static URL is valid"),
            model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            transport: TransportMode::Direct,
            session_timeout: Duration::from_secs(60),
            exchange_timeout: Duration::from_secs(30),
            credential_ttl_secs: 300,
        }
    }
}

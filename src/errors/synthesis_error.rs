//! Error taxonomy for the synthesis session client.
//!
//! Every non-success outcome of a generation call is exactly one of these
//! tags plus an optional human-readable detail string. Callers can match on
//! the tag to present a tailored message (check billing vs. check
//! permissions) without string-matching error text; raw transport or parser
//! errors never escape unclassified.

/// Classified failure of a credential exchange or synthesis session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    /// Upstream reports the long-lived API key is unauthorized.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Upstream reports a billing failure for this key.
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// Upstream reports the realtime/voice capability is not enabled.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Upstream reports throttling.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network/transport failure or malformed response from the credential
    /// endpoint.
    #[error("credential service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Credential exchange succeeded but supplied no usable token.
    #[error("credential response contained no usable token")]
    MissingCredential,

    /// The streaming connection could not be opened or dropped mid-session.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The wall-clock session deadline expired with no terminal event.
    #[error("session timed out before a terminal event was received")]
    Timeout,

    /// The provider reported a protocol error event, or sent a payload the
    /// client could not make sense of.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The session reached its terminal event without a single audio
    /// fragment. The script was likely empty, unsupported, or rejected
    /// silently upstream.
    #[error("no audio received")]
    EmptyAudio,

    /// The caller cancelled the session before it completed.
    #[error("session cancelled")]
    Cancelled,

    /// The request failed local validation before any network activity.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for session and broker operations.
pub type SessionResult<T> = Result<T, SynthesisError>;

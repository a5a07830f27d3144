//! Wire message types for the realtime synthesis protocol.
//!
//! Outgoing messages (client to server):
//! - [`SessionUpdate`]: voice, delivery instructions, audio formats, turn
//!   detection disabled
//! - [`ConversationItemCreate`]: synthetic trigger utterance
//! - [`ResponseCreate`]: start generation with audio + text modalities
//!
//! Incoming messages are the [`ServerEvent`] enum; the provider emits many
//! bookkeeping event types this client does not consume, which all land in
//! [`ServerEvent::Unknown`].

use serde::{Deserialize, Serialize};

use crate::config::VoiceId;

/// `session.update`: configure the session before triggering generation.
#[derive(Debug, Serialize)]
pub struct SessionUpdate {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session: SessionSettings,
}

#[derive(Debug, Serialize)]
pub struct SessionSettings {
    pub modalities: [&'static str; 2],
    pub voice: &'static str,
    pub instructions: String,
    pub input_audio_format: &'static str,
    pub output_audio_format: &'static str,
    /// Always `null`: this is one-shot narration, not dialogue, so the
    /// provider's conversational turn-taking must be suppressed.
    pub turn_detection: Option<serde_json::Value>,
}

impl SessionUpdate {
    pub fn new(voice: VoiceId, instructions: String) -> Self {
        Self {
            kind: "session.update",
            session: SessionSettings {
                modalities: ["audio", "text"],
                voice: voice.as_str(),
                instructions,
                input_audio_format: "pcm16",
                output_audio_format: "pcm16",
                turn_detection: None,
            },
        }
    }
}

/// `conversation.item.create`: synthetic user turn that asks for the read.
#[derive(Debug, Serialize)]
pub struct ConversationItemCreate {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub item: ConversationItem,
}

#[derive(Debug, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub content: [ContentPart; 1],
}

#[derive(Debug, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'static str,
}

impl ConversationItemCreate {
    pub fn trigger() -> Self {
        Self {
            kind: "conversation.item.create",
            item: ConversationItem {
                kind: "message",
                role: "user",
                content: [ContentPart {
                    kind: "input_text",
                    text: "Please read the script now.",
                }],
            },
        }
    }
}

/// `response.create`: start generating the response.
#[derive(Debug, Serialize)]
pub struct ResponseCreate {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub response: ResponseSettings,
}

#[derive(Debug, Serialize)]
pub struct ResponseSettings {
    pub modalities: [&'static str; 2],
}

impl ResponseCreate {
    pub fn audio_and_text() -> Self {
        Self {
            kind: "response.create",
            response: ResponseSettings {
                modalities: ["audio", "text"],
            },
        }
    }
}

/// Inbound events the session reacts to.
///
/// The provider has emitted audio deltas under two names across API
/// revisions; both are accepted.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta { delta: String },
    #[serde(
        rename = "response.audio_transcript.delta",
        alias = "response.output_audio_transcript.delta"
    )]
    TranscriptDelta { delta: String },
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "error")]
    Error { error: ErrorDetail },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
}

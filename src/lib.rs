//! Realtime speech-synthesis session client.
//!
//! Takes a text script, exchanges a long-lived API key for a short-lived
//! session credential, drives a streaming synthesis session over WebSocket,
//! and returns the narrated audio as a playable WAV container plus its
//! transcript.
//!
//! ```rust,no_run
//! use narrate::{GenerationRequest, SessionConfig, SynthesisSession, VoiceId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), narrate::SynthesisError> {
//!     let mut session = SynthesisSession::new(SessionConfig::default());
//!     let request = GenerationRequest::new(
//!         "sk-...",
//!         "Hi [excited]there[/excited]",
//!         VoiceId::Coral,
//!     );
//!
//!     let result = session.generate(&request).await?;
//!     std::fs::write("voiceover.wav", &result.audio).ok();
//!     println!("transcript: {}", result.transcript);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod errors;

// Re-export commonly used items for convenience
pub use crate::config::{
    DEFAULT_SAMPLE_RATE, GenerationRequest, SessionConfig, TransportMode, VoiceId,
};
pub use crate::core::audio::{AudioAssembler, SynthesisResult, wav_container};
pub use crate::core::credentials::{CredentialBroker, SessionCredential, TokenSource};
pub use crate::core::session::{CancelHandle, SessionState, SynthesisSession};
pub use crate::core::style;
pub use crate::errors::{SessionResult, SynthesisError};

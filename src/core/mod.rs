pub mod audio;
pub mod credentials;
pub mod session;
pub mod style;

pub use audio::{AudioAssembler, SynthesisResult, WAV_HEADER_LEN, wav_container};
pub use credentials::{CredentialBroker, SessionCredential, TokenSource};
pub use session::{CancelHandle, SessionState, SynthesisSession};

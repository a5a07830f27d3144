mod client;
pub mod messages;

pub use client::{CancelHandle, SessionState, SynthesisSession};

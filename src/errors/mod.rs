pub mod synthesis_error;

pub use synthesis_error::{SessionResult, SynthesisError};

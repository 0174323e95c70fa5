//! Error types for the live translation session.

use thiserror::Error;

/// Errors raised by the session pipeline.
///
/// Teardown paths never propagate these: `stop()` swallows and logs anything
/// that fails while releasing resources.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone or audio output acquisition failed. Fatal to session start.
    #[error("audio device error: {0}")]
    Device(String),

    /// Remote live session failed to open or died mid-session.
    #[error("live session transport error: {0}")]
    Transport(String),

    /// Inbound audio payload was not valid base64. Recoverable per-chunk.
    #[error("audio payload decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// History or preference persistence failed. Recovered with defaults.
    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

//! Gemini Live bidirectional session: types and websocket transport.

pub mod types;
pub mod websocket;

pub use types::{LiveVoice, MediaFrame, ServerEvent, SessionSetup};
pub use websocket::LiveSocket;

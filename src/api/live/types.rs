//! Types for the Gemini Live bidirectional session.

use serde::{Deserialize, Serialize};

/// Native-audio model used for the live interpreter session.
pub const LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// MIME tag for outgoing microphone frames.
pub const INPUT_MIME: &str = "audio/pcm;rate=16000";

/// Prebuilt voices supported by the live API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveVoice {
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
    Leda,
    Orus,
    Zephyr,
}

impl LiveVoice {
    pub const ALL: [LiveVoice; 8] = [
        LiveVoice::Puck,
        LiveVoice::Charon,
        LiveVoice::Kore,
        LiveVoice::Fenrir,
        LiveVoice::Aoede,
        LiveVoice::Leda,
        LiveVoice::Orus,
        LiveVoice::Zephyr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LiveVoice::Puck => "Puck",
            LiveVoice::Charon => "Charon",
            LiveVoice::Kore => "Kore",
            LiveVoice::Fenrir => "Fenrir",
            LiveVoice::Aoede => "Aoede",
            LiveVoice::Leda => "Leda",
            LiveVoice::Orus => "Orus",
            LiveVoice::Zephyr => "Zephyr",
        }
    }

    pub fn from_name(name: &str) -> Option<LiveVoice> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(name))
    }
}

/// Fixed session configuration sent in the setup message.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub instruction: String,
    pub voice: LiveVoice,
}

impl SessionSetup {
    pub fn interpreter(voice: LiveVoice) -> Self {
        Self {
            instruction: "You are a simultaneous interpreter for a professor/student \
                          dialogue between Thai and Chinese. When you hear Thai, speak \
                          the Mandarin Chinese translation. When you hear Chinese, speak \
                          the Thai translation. Translate faithfully and add nothing."
                .to_string(),
            voice,
        }
    }
}

/// One microphone frame bound for the transport: base64 PCM plus its MIME tag.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    pub data: String,
    pub mime_type: &'static str,
}

/// Inbound events from the live session, one tagged variant per signal.
/// Audio stays base64-encoded here so a malformed payload can be skipped
/// per-chunk instead of failing the whole parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    AudioChunk(String),
    InputTranscript(String),
    OutputTranscript(String),
    TurnComplete,
    Interrupted,
    Error(String),
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_names_round_trip() {
        for voice in LiveVoice::ALL {
            assert_eq!(LiveVoice::from_name(voice.as_str()), Some(voice));
        }
        assert_eq!(LiveVoice::from_name("aoede"), Some(LiveVoice::Aoede));
        assert_eq!(LiveVoice::from_name("nobody"), None);
    }
}

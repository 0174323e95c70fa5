//! WebSocket plumbing for the Gemini Live bidirectional session.

use std::net::TcpStream;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, warn};
use native_tls::TlsStream;
use tungstenite::{Message, WebSocket};

use super::types::{MediaFrame, ServerEvent, SessionSetup, LIVE_MODEL};
use crate::error::{SessionError, SessionResult};

const SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a TLS WebSocket connection to the live API.
fn connect_socket(api_key: &str) -> Result<WebSocket<TlsStream<TcpStream>>> {
    let ws_url = format!(
        "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key={}",
        api_key
    );

    let url = url::Url::parse(&ws_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("No host in URL"))?;
    let port = 443;

    use std::net::ToSocketAddrs;
    let addr = format!("{}:{}", host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve hostname: {}", host))?;

    let tcp_stream = TcpStream::connect_timeout(&addr, Duration::from_secs(10))?;
    tcp_stream.set_read_timeout(Some(Duration::from_secs(30)))?;
    tcp_stream.set_write_timeout(Some(Duration::from_secs(30)))?;
    tcp_stream.set_nodelay(true)?;

    let connector = native_tls::TlsConnector::new()?;
    let tls_stream = connector.connect(host, tcp_stream)?;

    let (socket, _response) = tungstenite::client::client(&ws_url, tls_stream)?;

    Ok(socket)
}

/// Short read timeout so the session loop can poll without blocking.
fn set_socket_nonblocking(socket: &mut WebSocket<TlsStream<TcpStream>>) -> Result<()> {
    let stream = socket.get_mut();
    let tcp_stream = stream.get_mut();
    tcp_stream.set_read_timeout(Some(Duration::from_millis(50)))?;
    Ok(())
}

/// Build the setup message: audio-only responses with the requested voice,
/// transcription enabled in both directions.
fn setup_message(setup: &SessionSetup) -> String {
    serde_json::json!({
        "setup": {
            "model": format!("models/{}", LIVE_MODEL),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": {
                            "voiceName": setup.voice.as_str()
                        }
                    }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": setup.instruction }]
            },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {}
        }
    })
    .to_string()
}

fn media_message(frame: &MediaFrame) -> String {
    serde_json::json!({
        "realtimeInput": {
            "mediaChunks": [{
                "data": frame.data,
                "mimeType": frame.mime_type
            }]
        }
    })
    .to_string()
}

/// Check if the message acknowledges our setup.
pub fn is_setup_complete(msg: &str) -> bool {
    msg.contains("setupComplete")
}

/// Extract an error message, if the payload carries one.
pub fn parse_error(msg: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(msg) {
        if let Some(error) = json.get("error") {
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                return Some(message.to_string());
            }
            return Some(error.to_string());
        }
    }
    None
}

/// Parse one inbound message into ordered session events.
///
/// A single message may carry several signals; interruption is emitted first
/// so playback stops before any new fragments land, and turn completion last
/// so fragments in the same message are accumulated before the flush.
pub fn parse_server_events(msg: &str) -> Vec<ServerEvent> {
    if let Some(error) = parse_error(msg) {
        return vec![ServerEvent::Error(error)];
    }

    let json = match serde_json::from_str::<serde_json::Value>(msg) {
        Ok(json) => json,
        Err(_) => return Vec::new(),
    };

    let Some(server_content) = json.get("serverContent") else {
        return Vec::new();
    };

    let mut events = Vec::new();

    if server_content
        .get("interrupted")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        events.push(ServerEvent::Interrupted);
    }

    if let Some(parts) = server_content
        .get("modelTurn")
        .and_then(|t| t.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            if let Some(inline) = part.get("inlineData") {
                let is_audio = inline
                    .get("mimeType")
                    .and_then(|m| m.as_str())
                    .map(|m| m.starts_with("audio/pcm"))
                    .unwrap_or(true);
                if let Some(data) = inline.get("data").and_then(|d| d.as_str()) {
                    if is_audio && !data.is_empty() {
                        events.push(ServerEvent::AudioChunk(data.to_string()));
                    }
                }
            }
        }
    }

    // Leading spaces in fragments are word separators; only drop pure whitespace.
    if let Some(text) = server_content
        .get("inputTranscription")
        .and_then(|t| t.get("text"))
        .and_then(|t| t.as_str())
    {
        if !text.chars().all(char::is_whitespace) {
            events.push(ServerEvent::InputTranscript(text.to_string()));
        }
    }

    if let Some(text) = server_content
        .get("outputTranscription")
        .and_then(|t| t.get("text"))
        .and_then(|t| t.as_str())
    {
        if !text.chars().all(char::is_whitespace) {
            events.push(ServerEvent::OutputTranscript(text.to_string()));
        }
    }

    if server_content
        .get("turnComplete")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        events.push(ServerEvent::TurnComplete);
    }

    events
}

/// Owned handle to one live session: send frames, poll events, close.
pub struct LiveSocket {
    inner: WebSocket<TlsStream<TcpStream>>,
}

impl LiveSocket {
    /// Connect, send the setup message, and wait for the acknowledgment.
    /// Returns a non-blocking socket ready for the session loop.
    pub fn connect(api_key: &str, setup: &SessionSetup) -> SessionResult<Self> {
        let mut socket = connect_socket(api_key)
            .map_err(|e| SessionError::Transport(format!("connect: {}", e)))?;

        socket
            .write(Message::Text(setup_message(setup).into()))
            .and_then(|_| socket.flush())
            .map_err(|e| SessionError::Transport(format!("setup send: {}", e)))?;

        let setup_start = Instant::now();
        loop {
            match socket.read() {
                Ok(Message::Text(msg)) => {
                    if is_setup_complete(msg.as_str()) {
                        break;
                    }
                    if let Some(error) = parse_error(msg.as_str()) {
                        return Err(SessionError::Transport(error));
                    }
                }
                Ok(Message::Binary(data)) => {
                    if let Ok(text) = String::from_utf8(data.to_vec()) {
                        if is_setup_complete(&text) {
                            break;
                        }
                        if let Some(error) = parse_error(&text) {
                            return Err(SessionError::Transport(error));
                        }
                    }
                }
                Ok(Message::Close(frame)) => {
                    let detail = frame
                        .map(|f| format!("code={}, reason={}", f.code, f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(SessionError::Transport(format!(
                        "closed during setup: {}",
                        detail
                    )));
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if setup_start.elapsed() > SETUP_TIMEOUT {
                        return Err(SessionError::Transport("setup timeout".to_string()));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(SessionError::Transport(format!("setup read: {}", e)));
                }
            }
        }

        set_socket_nonblocking(&mut socket)
            .map_err(|e| SessionError::Transport(format!("socket mode: {}", e)))?;
        debug!("[LIVE] session established");

        Ok(Self { inner: socket })
    }

    /// Fire-and-forget send of one encoded microphone frame.
    pub fn send_frame(&mut self, frame: &MediaFrame) -> SessionResult<()> {
        self.inner
            .write(Message::Text(media_message(frame).into()))
            .and_then(|_| self.inner.flush())
            .map_err(|e| SessionError::Transport(format!("frame send: {}", e)))
    }

    /// Non-blocking poll for inbound events, in arrival order.
    pub fn poll(&mut self) -> Vec<ServerEvent> {
        match self.inner.read() {
            Ok(Message::Text(msg)) => parse_server_events(msg.as_str()),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => parse_server_events(&text),
                Err(_) => Vec::new(),
            },
            Ok(Message::Close(_)) => vec![ServerEvent::Closed],
            Ok(_) => Vec::new(),
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Vec::new()
            }
            Err(e) => {
                warn!("[LIVE] read error: {}", e);
                vec![ServerEvent::Error(e.to_string())]
            }
        }
    }

    /// Best-effort close; errors are ignored because teardown must complete.
    pub fn close(&mut self) {
        let _ = self.inner.close(None);
    }
}

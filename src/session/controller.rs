//! Live session controller: owns the remote session for its lifetime and
//! wires capture, playback, and transcript accumulation together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::api::live::{LiveSocket, ServerEvent, SessionSetup};
use crate::audio::capture::CapturePipeline;
use crate::audio::playback::{OutputDevice, PlaybackScheduler, PLAYBACK_SAMPLE_RATE};
use crate::error::SessionError;
use crate::history::HistoryStore;
use crate::session::turn::TurnAccumulator;

/// Controller lifecycle. Error is terminal for the session and clears on the
/// next start.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Connecting,
    Listening,
    Error(String),
}

impl SessionState {
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Listening => "listening",
            SessionState::Error(_) => "error",
        }
    }
}

/// What the dispatch loop should do after an event.
#[derive(Debug, PartialEq)]
pub enum EventOutcome {
    Continue,
    Stop(Option<String>),
}

/// Event dispatch and turn finalization for one open session.
///
/// Lives entirely on the session worker thread; the shared history store is
/// the only handle that crosses threads.
pub struct SessionEngine {
    scheduler: PlaybackScheduler,
    turn: TurnAccumulator,
    history: Arc<Mutex<HistoryStore>>,
    finished: bool,
}

impl SessionEngine {
    pub fn new(scheduler: PlaybackScheduler, history: Arc<Mutex<HistoryStore>>) -> Self {
        Self {
            scheduler,
            turn: TurnAccumulator::new(),
            history,
            finished: false,
        }
    }

    /// Process one inbound event. Events arrive in transport order and run to
    /// completion, so accumulator and in-flight mutation are race-free here.
    pub fn handle_event(&mut self, event: ServerEvent) -> EventOutcome {
        match event {
            ServerEvent::AudioChunk(data) => {
                // A malformed chunk costs us that chunk, not the session.
                match self.scheduler.enqueue(&data) {
                    Ok(Some(scheduled)) => {
                        debug!(
                            "[SESSION] audio scheduled {:.3}s..{:.3}s",
                            scheduled.start, scheduled.end
                        );
                    }
                    Ok(None) => {}
                    Err(e) => warn!("[SESSION] dropping audio chunk: {}", e),
                }
                EventOutcome::Continue
            }
            ServerEvent::InputTranscript(fragment) => {
                self.turn.push_source(&fragment);
                EventOutcome::Continue
            }
            ServerEvent::OutputTranscript(fragment) => {
                self.turn.push_translated(&fragment);
                EventOutcome::Continue
            }
            ServerEvent::TurnComplete => {
                self.flush_turn();
                EventOutcome::Continue
            }
            ServerEvent::Interrupted => {
                self.scheduler.interrupt();
                EventOutcome::Continue
            }
            ServerEvent::Error(msg) => EventOutcome::Stop(Some(msg)),
            ServerEvent::Closed => EventOutcome::Stop(None),
        }
    }

    fn flush_turn(&mut self) {
        if let Some(entry) = self.turn.flush() {
            info!(
                "[SESSION] turn complete ({}): {} -> {}",
                entry.source_language, entry.source_text, entry.translated_text
            );
            if let Ok(mut history) = self.history.lock() {
                history.push(entry);
            }
        }
    }

    /// Final teardown: flush a partially-spoken turn so it is not lost, then
    /// release playback. Idempotent.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.flush_turn();
        self.scheduler.shutdown();
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }
}

/// Holds at most one live session per recording lifecycle.
pub struct SessionController {
    api_key: String,
    setup: SessionSetup,
    history: Arc<Mutex<HistoryStore>>,
    state: Arc<Mutex<SessionState>>,
    stop_flag: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(api_key: String, setup: SessionSetup, history: Arc<Mutex<HistoryStore>>) -> Self {
        Self {
            api_key,
            setup,
            history,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    /// Open the session. No-op if one is already connecting or listening.
    pub fn start(&self) {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SessionState::Idle | SessionState::Error(_) => {}
                _ => {
                    warn!("[SESSION] already running, ignoring start");
                    return;
                }
            }
            *state = SessionState::Connecting;
        }

        self.stop_flag.store(false, Ordering::SeqCst);

        let api_key = self.api_key.clone();
        let setup = self.setup.clone();
        let history = self.history.clone();
        let state = self.state.clone();
        let stop_flag = self.stop_flag.clone();

        let handle = std::thread::spawn(move || {
            run_session(api_key, setup, history, state, stop_flag);
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Stop the session and wait for teardown. Safe to call repeatedly and
    /// from any state.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One session from connect to teardown. Everything device- and socket-bound
/// is created and used on this thread; errors surface through the shared
/// state and the session returns to idle.
fn run_session(
    api_key: String,
    setup: SessionSetup,
    history: Arc<Mutex<HistoryStore>>,
    state: Arc<Mutex<SessionState>>,
    stop_flag: Arc<AtomicBool>,
) {
    let mut failure: Option<String> = None;

    match open_session(&api_key, &setup, history) {
        Ok((mut capture, mut socket, mut engine, frames)) => {
            *state.lock().unwrap() = SessionState::Listening;
            info!("[SESSION] listening");

            // Frames captured during the handshake predate the open session.
            while frames.try_recv().is_ok() {}

            'session: while !stop_flag.load(Ordering::SeqCst) {
                while let Ok(frame) = frames.try_recv() {
                    if let Err(e) = socket.send_frame(&frame) {
                        failure = Some(surface_transport(&e));
                        break 'session;
                    }
                }

                for event in socket.poll() {
                    match engine.handle_event(event) {
                        EventOutcome::Continue => {}
                        EventOutcome::Stop(err) => {
                            failure = err.map(|msg| {
                                error!("[SESSION] remote error: {}", msg);
                                "The live session ended unexpectedly.".to_string()
                            });
                            break 'session;
                        }
                    }
                }

                std::thread::sleep(Duration::from_millis(10));
            }

            // Teardown is best-effort and must always complete.
            capture.stop();
            engine.finish();
            socket.close();
        }
        Err(e) => {
            failure = Some(match &e {
                SessionError::Device(_) => format!("{}", e),
                _ => surface_transport(&e),
            });
        }
    }

    *state.lock().unwrap() = match failure {
        Some(msg) => SessionState::Error(msg),
        None => SessionState::Idle,
    };
}

/// Acquire microphone and output clocks, then open the remote session.
/// Device acquisition failures are reported before transport ones.
fn open_session(
    api_key: &str,
    setup: &SessionSetup,
    history: Arc<Mutex<HistoryStore>>,
) -> Result<
    (
        CapturePipeline,
        LiveSocket,
        SessionEngine,
        mpsc::Receiver<crate::api::live::MediaFrame>,
    ),
    SessionError,
> {
    let (output, clock) = OutputDevice::open(PLAYBACK_SAMPLE_RATE)?;
    let scheduler = PlaybackScheduler::new(Box::new(clock), Box::new(output));

    let (frame_tx, frame_rx) = mpsc::channel();
    let capture = CapturePipeline::start(frame_tx)?;

    let socket = LiveSocket::connect(api_key, setup)?;
    let engine = SessionEngine::new(scheduler, history);

    Ok((capture, socket, engine, frame_rx))
}

/// Transport failures reach the user as a generic message; the raw detail
/// only goes to the log.
fn surface_transport(e: &SessionError) -> String {
    error!("[SESSION] {}", e);
    "Could not reach the live translation service.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec;
    use crate::audio::playback::{AudioClock, PlaybackSink};
    use crate::history::SpeakerRole;

    struct ZeroClock;

    impl AudioClock for ZeroClock {
        fn now(&self) -> f64 {
            0.0
        }
    }

    struct NullSink;

    impl PlaybackSink for NullSink {
        fn submit(&mut self, _samples: &[f32]) {}
        fn clear(&mut self) {}
        fn close(&mut self) {}
    }

    fn test_engine(name: &str) -> SessionEngine {
        let path = std::env::temp_dir().join(format!(
            "lecture-live-translator-engine-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let history = Arc::new(Mutex::new(HistoryStore::load(path)));
        let scheduler = PlaybackScheduler::new(Box::new(ZeroClock), Box::new(NullSink));
        SessionEngine::new(scheduler, history)
    }

    fn audio_chunk() -> ServerEvent {
        ServerEvent::AudioChunk(codec::encode(&[0u8; 960]))
    }

    #[test]
    fn turn_complete_flushes_tagged_entry() {
        let mut engine = test_engine("flush-thai");
        engine.handle_event(ServerEvent::InputTranscript("สวัสดี".to_string()));
        engine.handle_event(ServerEvent::OutputTranscript("你好".to_string()));
        engine.handle_event(ServerEvent::TurnComplete);

        let history = engine.history.lock().unwrap();
        assert_eq!(history.len(), 1);
        let entry = &history.entries()[0];
        assert_eq!(entry.source_language, "Thai");
        assert_eq!(entry.role, SpeakerRole::Professor);
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn chinese_source_is_tagged_chinese() {
        let mut engine = test_engine("flush-chinese");
        engine.handle_event(ServerEvent::InputTranscript("你好吗".to_string()));
        engine.handle_event(ServerEvent::OutputTranscript("สบายดีไหม".to_string()));
        engine.handle_event(ServerEvent::TurnComplete);

        let history = engine.history.lock().unwrap();
        assert_eq!(history.entries()[0].source_language, "Chinese");
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn empty_turn_complete_stores_nothing() {
        let mut engine = test_engine("flush-empty");
        engine.handle_event(ServerEvent::TurnComplete);
        let history = engine.history.lock().unwrap();
        assert!(history.is_empty());
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn malformed_audio_chunk_does_not_stop_the_session() {
        let mut engine = test_engine("bad-chunk");
        let outcome = engine.handle_event(ServerEvent::AudioChunk("@@bad@@".to_string()));
        assert_eq!(outcome, EventOutcome::Continue);

        // Later events still land.
        engine.handle_event(audio_chunk());
        engine.handle_event(ServerEvent::InputTranscript("ครับ".to_string()));
        engine.handle_event(ServerEvent::TurnComplete);
        let history = engine.history.lock().unwrap();
        assert_eq!(history.len(), 1);
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn interruption_hard_stops_playback() {
        let mut engine = test_engine("interrupt");
        engine.handle_event(audio_chunk());
        engine.handle_event(audio_chunk());
        assert_eq!(engine.scheduler().in_flight_count(), 2);

        engine.handle_event(ServerEvent::Interrupted);
        assert_eq!(engine.scheduler().in_flight_count(), 0);
        assert_eq!(engine.scheduler().next_start(), 0.0);
        let history = engine.history.lock().unwrap();
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn finish_flushes_pending_turn_exactly_once() {
        let mut engine = test_engine("finish-twice");
        engine.handle_event(ServerEvent::InputTranscript("ขอบคุณ".to_string()));

        engine.finish();
        engine.finish();

        let history = engine.history.lock().unwrap();
        assert_eq!(history.len(), 1, "partial turn flushed once, not twice");
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn remote_error_and_close_stop_the_loop() {
        let mut engine = test_engine("stop-events");
        assert_eq!(
            engine.handle_event(ServerEvent::Error("boom".to_string())),
            EventOutcome::Stop(Some("boom".to_string()))
        );
        assert_eq!(
            engine.handle_event(ServerEvent::Closed),
            EventOutcome::Stop(None)
        );
        let history = engine.history.lock().unwrap();
        let _ = std::fs::remove_file(history.path());
    }

    #[test]
    fn controller_stop_is_idempotent_without_start() {
        let history = Arc::new(Mutex::new(HistoryStore::load(
            std::env::temp_dir().join(format!(
                "lecture-live-translator-ctrl-{}.json",
                std::process::id()
            )),
        )));
        let controller = SessionController::new(
            String::new(),
            SessionSetup::interpreter(crate::api::live::LiveVoice::Aoede),
            history,
        );
        assert_eq!(controller.state(), SessionState::Idle);
        controller.stop();
        controller.stop();
        assert_eq!(controller.state(), SessionState::Idle);
    }
}

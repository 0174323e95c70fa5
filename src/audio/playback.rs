//! Playback scheduling for streamed translation audio.
//!
//! Chunks arrive at irregular intervals and vary in duration; the scheduler
//! lines them up back-to-back against an output clock so playback is gapless,
//! and can hard-stop everything when the server signals an interruption.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, warn};

use crate::audio::codec;
use crate::error::{SessionError, SessionResult};

/// Sample rate of audio synthesized by the live model.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// A monotonic clock tracking the playback position of the output device.
pub trait AudioClock {
    /// Seconds of audio the output has rendered so far.
    fn now(&self) -> f64;
}

/// Destination for scheduled samples.
pub trait PlaybackSink {
    /// Append samples to the playback queue.
    fn submit(&mut self, samples: &[f32]);
    /// Drop everything queued but not yet rendered.
    fn clear(&mut self);
    /// Release the underlying output resource.
    fn close(&mut self);
}

/// Timing assigned to one enqueued chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub start: f64,
    pub end: f64,
}

struct InFlight {
    end: f64,
}

/// Schedules decoded chunks back-to-back on the output clock.
pub struct PlaybackScheduler {
    clock: Box<dyn AudioClock>,
    sink: Box<dyn PlaybackSink>,
    next_start: f64,
    in_flight: HashMap<u64, InFlight>,
    next_handle: u64,
}

impl PlaybackScheduler {
    pub fn new(clock: Box<dyn AudioClock>, sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            clock,
            sink,
            next_start: 0.0,
            in_flight: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Decode a base64 chunk and schedule it directly after whatever is
    /// already queued. Chunks arriving late (queue drained) start at the
    /// clock's current time instead of in the past.
    pub fn enqueue(&mut self, chunk: &str) -> SessionResult<Option<Scheduled>> {
        let bytes = codec::decode(chunk)?;
        let buffer = codec::decode_audio_data(&bytes, PLAYBACK_SAMPLE_RATE, 1);
        if buffer.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        self.in_flight.retain(|_, chunk| chunk.end > now);

        let start = self.next_start.max(now);
        let end = start + buffer.duration();

        self.sink.submit(&buffer.samples);
        self.in_flight.insert(self.next_handle, InFlight { end });
        self.next_handle += 1;
        self.next_start = end;

        debug!(
            "[PLAYBACK] scheduled {:.3}s at t={:.3} ({} in flight)",
            buffer.duration(),
            start,
            self.in_flight.len()
        );
        Ok(Some(Scheduled { start, end }))
    }

    /// Hard-stop all in-flight audio and rewind the schedule.
    /// Safe to call repeatedly or with nothing playing.
    pub fn interrupt(&mut self) {
        if !self.in_flight.is_empty() {
            debug!("[PLAYBACK] interrupt: dropping {} chunks", self.in_flight.len());
        }
        self.sink.clear();
        self.in_flight.clear();
        self.next_start = 0.0;
    }

    /// Interrupt plus release of the output device.
    pub fn shutdown(&mut self) {
        self.interrupt();
        self.sink.close();
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Clock backed by the output callback's consumed-sample counter.
#[derive(Clone)]
pub struct SampleClock {
    consumed: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.consumed.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }
}

/// Default output device wrapped as a playback sink.
///
/// The cpal callback drains a shared mono sample queue, duplicating each
/// sample across both channels, and advances the consumed counter that backs
/// `SampleClock`. Many devices reject mono configs, hence the stereo layout.
pub struct OutputDevice {
    stream: Option<cpal::Stream>,
    queue: Arc<Mutex<VecDeque<f32>>>,
}

impl OutputDevice {
    /// Open the default output device at the given rate.
    /// Returns the sink plus the clock tracking its playback position.
    pub fn open(sample_rate: u32) -> SessionResult<(Self, SampleClock)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SessionError::Device("no audio output device found".to_string()))?;

        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let consumed = Arc::new(AtomicU64::new(0));

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err| warn!("[PLAYBACK] output stream error: {}", err);

        // Try f32 first, fall back to i16 for devices that reject it.
        let queue_f32 = queue.clone();
        let consumed_f32 = consumed.clone();
        let stream = match device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut buf = queue_f32.lock().unwrap();
                for frame in data.chunks_mut(2) {
                    let sample = buf.pop_front().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
                consumed_f32.fetch_add((data.len() / 2) as u64, Ordering::Relaxed);
            },
            err_fn,
            None,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                debug!("[PLAYBACK] f32 output rejected ({}), trying i16", e);
                let queue_i16 = queue.clone();
                let consumed_i16 = consumed.clone();
                device
                    .build_output_stream(
                        &config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            let mut buf = queue_i16.lock().unwrap();
                            for frame in data.chunks_mut(2) {
                                let sample = buf.pop_front().unwrap_or(0.0);
                                let sample = (sample * 32767.0) as i16;
                                for out in frame.iter_mut() {
                                    *out = sample;
                                }
                            }
                            consumed_i16.fetch_add((data.len() / 2) as u64, Ordering::Relaxed);
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e2| {
                        SessionError::Device(format!("failed to open output stream: {}", e2))
                    })?
            }
        };

        stream
            .play()
            .map_err(|e| SessionError::Device(format!("failed to start output stream: {}", e)))?;

        let clock = SampleClock {
            consumed,
            sample_rate,
        };
        Ok((
            Self {
                stream: Some(stream),
                queue,
            },
            clock,
        ))
    }
}

impl PlaybackSink for OutputDevice {
    fn submit(&mut self, samples: &[f32]) {
        if let Ok(mut buf) = self.queue.lock() {
            buf.extend(samples.iter().copied());
        }
    }

    fn clear(&mut self) {
        if let Ok(mut buf) = self.queue.lock() {
            buf.clear();
        }
    }

    fn close(&mut self) {
        self.clear();
        self.stream.take();
    }
}

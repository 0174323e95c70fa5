//! Microphone capture: fixed-size encoded frames streamed to the session.

use std::sync::mpsc::Sender;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::warn;

use crate::api::live::types::{MediaFrame, INPUT_MIME};
use crate::audio::codec;
use crate::error::{SessionError, SessionResult};

/// Sample rate expected by the live model's audio input.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Samples per outgoing frame.
pub const FRAME_SAMPLES: usize = 4096;

/// Accumulates mono 16 kHz samples and emits encoded frames of exactly
/// [`FRAME_SAMPLES`] samples. Frames are fire-and-forget; a send failure
/// means the session worker is gone and the frame is dropped.
pub struct FrameAssembler {
    pending: Vec<f32>,
    sink: Sender<MediaFrame>,
}

impl FrameAssembler {
    pub fn new(sink: Sender<MediaFrame>) -> Self {
        Self {
            pending: Vec::with_capacity(FRAME_SAMPLES * 2),
            sink,
        }
    }

    pub fn push(&mut self, mono: &[f32]) {
        self.pending.extend_from_slice(mono);
        while self.pending.len() >= FRAME_SAMPLES {
            let frame: Vec<f32> = self.pending.drain(..FRAME_SAMPLES).collect();
            let mut bytes = Vec::with_capacity(FRAME_SAMPLES * 2);
            for sample in frame {
                // `as` saturates at the i16 range, so a sample at exactly
                // ±1.0 pins to the nearest representable value instead of
                // wrapping around.
                let value = (sample * 32768.0) as i16;
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            let _ = self.sink.send(MediaFrame {
                data: codec::encode(&bytes),
                mime_type: INPUT_MIME,
            });
        }
    }
}

/// Downmix interleaved device samples to mono and linearly resample to the
/// capture rate.
pub fn downmix_resample(data: &[f32], channels: usize, device_rate: u32) -> Vec<f32> {
    let mono: Vec<f32> = data
        .chunks(channels.max(1))
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    if device_rate == CAPTURE_SAMPLE_RATE || mono.is_empty() {
        return mono;
    }

    let ratio = CAPTURE_SAMPLE_RATE as f64 / device_rate as f64;
    let new_len = (mono.len() as f64 * ratio) as usize;
    (0..new_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let next = (idx + 1).min(mono.len() - 1);
            let frac = src_pos - idx as f64;
            mono[idx] as f64 * (1.0 - frac) + mono[next] as f64 * frac
        })
        .map(|s| s as f32)
        .collect()
}

/// Owns the live microphone stream for one session.
pub struct CapturePipeline {
    stream: Option<cpal::Stream>,
}

impl CapturePipeline {
    /// Open the default input device and start streaming encoded frames into
    /// `sink`. Runs until [`CapturePipeline::stop`] or drop.
    pub fn start(sink: Sender<MediaFrame>) -> SessionResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| SessionError::Device("no microphone available".to_string()))?;
        let config = device
            .default_input_config()
            .map_err(|e| SessionError::Device(format!("microphone config: {}", e)))?;

        let device_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let err_fn = |err| warn!("[CAPTURE] input stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let mut assembler = FrameAssembler::new(sink);
                device
                    .build_input_stream(
                        &config.into(),
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            assembler.push(&downmix_resample(data, channels, device_rate));
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| SessionError::Device(format!("microphone stream: {}", e)))?
            }
            cpal::SampleFormat::I16 => {
                let mut assembler = FrameAssembler::new(sink);
                device
                    .build_input_stream(
                        &config.into(),
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let floats: Vec<f32> =
                                data.iter().map(|&s| s as f32 / 32768.0).collect();
                            assembler.push(&downmix_resample(&floats, channels, device_rate));
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| SessionError::Device(format!("microphone stream: {}", e)))?
            }
            other => {
                return Err(SessionError::Device(format!(
                    "unsupported microphone sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| SessionError::Device(format!("microphone start: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Stop and release the microphone stream. Safe to call twice.
    pub fn stop(&mut self) {
        self.stream.take();
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn emits_frame_once_enough_samples_accumulate() {
        let (tx, rx) = mpsc::channel();
        let mut assembler = FrameAssembler::new(tx);

        assembler.push(&vec![0.25; FRAME_SAMPLES - 1]);
        assert!(rx.try_recv().is_err(), "no frame below the threshold");

        assembler.push(&[0.25, 0.25]);
        let frame = rx.try_recv().expect("one full frame");
        assert_eq!(frame.mime_type, INPUT_MIME);

        let bytes = codec::decode(&frame.data).unwrap();
        assert_eq!(bytes.len(), FRAME_SAMPLES * 2);
        let first = i16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(first, (0.25f32 * 32768.0) as i16);

        // One leftover sample stays pending.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn multiple_frames_from_one_burst() {
        let (tx, rx) = mpsc::channel();
        let mut assembler = FrameAssembler::new(tx);
        assembler.push(&vec![0.0; FRAME_SAMPLES * 3]);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix_resample(&stereo, 2, CAPTURE_SAMPLE_RATE);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn resample_halves_sample_count_at_double_rate() {
        let input = vec![0.5; 3200];
        let out = downmix_resample(&input, 1, CAPTURE_SAMPLE_RATE * 2);
        assert_eq!(out.len(), 1600);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut assembler = FrameAssembler::new(tx);
        assembler.push(&vec![0.0; FRAME_SAMPLES * 2]);
    }
}

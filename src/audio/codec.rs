//! PCM codec: base64 transport encoding and raw 16-bit PCM interpretation.

use base64::{engine::general_purpose, Engine as _};

use crate::error::SessionResult;

/// A decoded chunk of audio ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Normalized samples in [-1.0, 1.0], interleaved if multi-channel.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    /// Playback duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Encode raw bytes for the websocket transport.
pub fn encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode a transport string back into raw bytes.
/// Malformed input is an error for the caller to handle, not a panic.
pub fn decode(data: &str) -> SessionResult<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(data)?)
}

/// Interpret raw little-endian 16-bit PCM and normalize to f32.
///
/// Trailing bytes that do not fill a whole sample are truncated.
pub fn decode_audio_data(bytes: &[u8], sample_rate: u32, channels: u16) -> PcmBuffer {
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    PcmBuffer {
        samples,
        sample_rate,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let original: Vec<u8> = (0..=255).collect();
        let encoded = encode(&original);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trip_empty_buffer() {
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert!(decode("not!!valid@@base64").is_err());
    }

    #[test]
    fn pcm_samples_are_normalized() {
        // i16::MIN, 0, i16::MAX as little-endian pairs
        let bytes = [0x00, 0x80, 0x00, 0x00, 0xff, 0x7f];
        let buf = decode_audio_data(&bytes, 24000, 1);
        assert_eq!(buf.samples.len(), 3);
        assert_eq!(buf.samples[0], -1.0);
        assert_eq!(buf.samples[1], 0.0);
        assert!(buf.samples[2] < 1.0 && buf.samples[2] > 0.999);
    }

    #[test]
    fn odd_trailing_byte_is_truncated() {
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x7f];
        let buf = decode_audio_data(&bytes, 24000, 1);
        assert_eq!(buf.samples.len(), 2);
    }

    #[test]
    fn duration_uses_rate_and_channels() {
        let bytes = vec![0u8; 48000 * 2];
        let buf = decode_audio_data(&bytes, 24000, 1);
        assert!((buf.duration() - 2.0).abs() < 1e-9);

        let stereo = decode_audio_data(&bytes, 24000, 2);
        assert!((stereo.duration() - 1.0).abs() < 1e-9);
    }
}

//! Audio pipeline: PCM codec, microphone capture, and playback scheduling.

pub mod capture;
pub mod codec;
pub mod playback;

//! Audio capture, playback and the clip type shared with the ASR gates

mod capture;
mod clip;
mod playback;

pub use capture::AudioCapture;
pub use clip::{AudioClip, AudioFormat};
pub use playback::AudioPlayback;

/// Sample rate for capture (16kHz for speech recognition)
pub const SAMPLE_RATE: u32 = 16000;

//! Captured audio clip: mono PCM samples plus the encoded file bytes

use std::io::Cursor;
use std::path::Path;

use crate::{Error, Result};

/// On-disk container format of a clip, derived from the file extension.
/// Anything unrecognized is treated as WAV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// RIFF WAVE
    #[default]
    Wav,
    /// Headerless PCM
    Pcm,
    /// AMR narrowband
    Amr,
    /// MPEG-4 audio
    M4a,
}

impl AudioFormat {
    /// Wire tag expected by the recognition services
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Pcm => "pcm",
            Self::Amr => "amr",
            Self::M4a => "m4a",
        }
    }

    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("pcm") => Self::Pcm,
            Some("amr") => Self::Amr,
            Some("m4a") => Self::M4a,
            _ => Self::Wav,
        }
    }
}

/// A captured audio clip
///
/// Holds the parsed stream attributes the gates check, plus the encoded
/// file bytes that get base64'd or uploaded. Read-only after creation.
#[derive(Debug, Clone)]
pub struct AudioClip {
    format: AudioFormat,
    channels: u16,
    sample_width_bytes: u16,
    frame_rate: u32,
    frame_count: u32,
    bytes: Vec<u8>,
}

impl AudioClip {
    /// Encode mono 16-bit samples into a WAV clip
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn from_samples(samples: &[i16], frame_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: frame_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| Error::Audio(e.to_string()))?;
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }
            writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
        }

        #[allow(clippy::cast_possible_truncation)]
        let frame_count = samples.len() as u32;

        Ok(Self {
            format: AudioFormat::Wav,
            channels: 1,
            sample_width_bytes: 2,
            frame_rate,
            frame_count,
            bytes: cursor.into_inner(),
        })
    }

    /// Parse a WAV byte buffer
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is not a readable WAV stream
    pub fn from_wav_bytes(bytes: Vec<u8>) -> Result<Self> {
        let reader = hound::WavReader::new(Cursor::new(&bytes))
            .map_err(|e| Error::Audio(e.to_string()))?;
        let spec = reader.spec();
        let frame_count = reader.duration();

        Ok(Self {
            format: AudioFormat::Wav,
            channels: spec.channels,
            sample_width_bytes: spec.bits_per_sample / 8,
            frame_rate: spec.sample_rate,
            frame_count,
            bytes,
        })
    }

    /// Read a clip from disk; the format tag comes from the extension
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or not parseable as WAV
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut clip = Self::from_wav_bytes(bytes)?;
        clip.format = AudioFormat::from_path(path);
        Ok(clip)
    }

    /// Container format tag
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Channel count
    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Bytes per sample
    #[must_use]
    pub const fn sample_width_bytes(&self) -> u16 {
        self.sample_width_bytes
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Number of frames in the stream
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Clip duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        if self.frame_rate == 0 {
            return 0.0;
        }
        self.frame_count as f32 / self.frame_rate as f32
    }

    /// Encoded file bytes (what gets base64'd or uploaded)
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded byte length
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

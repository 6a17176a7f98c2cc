//! Microphone capture

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioClip, SAMPLE_RATE};
use crate::{Error, Result};

/// Captures audio from the default input device
///
/// One `record` call blocks for the full requested duration and yields a
/// mono 16-bit clip at [`SAMPLE_RATE`].
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self { device, config })
    }

    /// Record for the full duration and return the captured clip
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be opened or started
    #[allow(clippy::future_not_send)] // cpal streams aren't Send
    pub async fn record(&mut self, duration: Duration) -> Result<AudioClip> {
        let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::debug!(seconds = duration.as_secs_f32(), "recording");
        tokio::time::sleep(duration).await;
        drop(stream);

        let samples = buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();

        tracing::debug!(samples = samples.len(), "recording complete");
        AudioClip::from_samples(&samples_to_i16(&samples), SAMPLE_RATE)
    }

    /// Get the capture sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Convert f32 samples in [-1.0, 1.0] to i16
fn samples_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            sample_i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_clamps_out_of_range_samples() {
        let converted = samples_to_i16(&[0.0, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(converted[0], 0);
        assert_eq!(converted[1], 32767);
        assert_eq!(converted[3], 32767);
        assert_eq!(converted[4], -32768);
    }
}

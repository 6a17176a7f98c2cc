//! Shared helpers for integration tests
#![allow(dead_code)] // not every test binary uses every helper

use axum::Router;
use tokio::net::TcpListener;

use talkback::AudioClip;

/// Serve a router on an ephemeral local port and return its base URL
pub async fn spawn_service(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A mono 16-bit clip of silence at the given rate and duration
pub fn speech_clip(rate: u32, secs: f32) -> AudioClip {
    let frames = (rate as f32 * secs) as usize;
    let samples = vec![0i16; frames];
    AudioClip::from_samples(&samples, rate).unwrap()
}

/// A stereo WAV clip, which every gate rejects
pub fn stereo_clip(rate: u32, secs: f32) -> AudioClip {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (rate as f32 * secs) as usize;
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames * 2 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    AudioClip::from_wav_bytes(cursor.into_inner()).unwrap()
}

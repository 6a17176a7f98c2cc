use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use talkback::audio::{AudioCapture, AudioPlayback};
use talkback::tts::SpeechSynthesizer;
use talkback::{Config, TurnOrchestrator};

/// Talkback - turn-taking voice assistant loop
#[derive(Parser)]
#[command(name = "talkback", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to ./talkback.toml if present)
    #[arg(short, long, env = "TALKBACK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the ASR provider ("baidu" or "ifly")
    #[arg(short, long, env = "TALKBACK_ASR_PROVIDER")]
    provider: Option<String>,

    /// Override seconds of audio recorded per turn
    #[arg(short, long)]
    duration: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output through the configured synthesis endpoint
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech synthesis endpoint.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,talkback=info",
        1 => "info,talkback=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(provider) = &cli.provider {
        config.asr.provider = provider.parse()?;
    }
    if let Some(duration) = cli.duration {
        config.voice.record_seconds = duration;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&config, &text).await,
        };
    }

    config.validate()?;

    tracing::info!(
        provider = %config.asr.provider,
        record_seconds = config.voice.record_seconds,
        "starting talkback loop"
    );

    let orchestrator = TurnOrchestrator::new(&config)?;
    orchestrator.run().await?;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    let clip = capture.record(Duration::from_secs(duration)).await?;

    println!("Captured {} frames ({:.2}s)", clip.frame_count(), clip.duration_secs());
    println!("\n---");
    if clip.frame_count() > 0 {
        println!("If the frame count is nonzero, your mic is working!");
    } else {
        println!("No frames captured. Check:");
        println!("  1. Is your mic plugged in?");
        println!("  2. Run: pactl info | grep 'Default Source'");
        println!("  3. Run: arecord -l (to list devices)");
    }

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // 2 seconds of 440Hz sine at 16kHz
    let sample_rate = 16000_u32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    playback.play_samples_blocking(samples, sample_rate)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS through the configured endpoint
#[allow(clippy::future_not_send)]
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let synthesizer = SpeechSynthesizer::new(config.tts.clone())?;

    println!("Synthesizing speech...");
    let audio = synthesizer
        .synthesize(text)
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!("Got {} bytes of audio data", audio.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_wav(&audio).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

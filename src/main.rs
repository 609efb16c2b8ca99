use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use chime_voice::audio::{
    AudioSink, CaptureConstraints, DecodedAudio, MimeType, NativeRecorder, NativeSink,
    PlaybackSession, PlaybackStatus, Recorder,
};
use chime_voice::client::{HttpVoiceBackend, VoiceBackend};
use chime_voice::{CATALOG, Config, Pipeline, Role, encoding};

/// Chime - voice chat client for AI assistants
#[derive(Parser)]
#[command(name = "chime", version, about)]
struct Cli {
    /// Voice backend base URL
    #[arg(long, env = "CHIME_BACKEND_URL")]
    backend: Option<String>,

    /// Language code (see `chime chat` then /langs)
    #[arg(short, long, env = "CHIME_LANGUAGE")]
    language: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive voice chat (default)
    Chat,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Synthesize text through the backend and play it
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,chime_voice=info",
        1 => "info,chime_voice=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend_url = backend.trim_end_matches('/').to_string();
    }
    if let Some(code) = cli.language {
        config.language = chime_voice::Language::from_code(&code)?;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(config).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::TestTts { text } => test_tts(config, &text).await,
    }
}

/// Interactive line-based shell over the pipeline
async fn chat(config: Config) -> anyhow::Result<()> {
    let backend = HttpVoiceBackend::new(config.backend_url.clone());
    let mut pipeline = Pipeline::new(
        &config,
        Box::new(NativeRecorder::new()),
        Box::new(NativeSink::new()),
        Box::new(backend),
    );

    println!(
        "chime voice chat | language {} | backend {}",
        config.language, config.backend_url
    );
    println!(
        "commands: /record  /stop  /send  /lang <code>  /langs  /stop-audio  /quit"
    );
    println!("plain text replaces the draft and sends it\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" | "/q" => break,
            "/record" => match pipeline.start_capture().await {
                Ok(()) => println!("recording... /stop to finish"),
                Err(e) => println!("error: {e}"),
            },
            "/stop" => match pipeline.stop_capture().await {
                Ok(Some(text)) => {
                    println!("draft: {text}");
                    println!("(/send to send, or type a replacement)");
                }
                Ok(None) => println!("not recording"),
                Err(e) => println!("error: {e}"),
            },
            "/send" => send_and_report(&mut pipeline).await,
            "/langs" => {
                for lang in CATALOG {
                    println!("  {:5}  {}", lang.code(), lang.name());
                }
            }
            "/stop-audio" => pipeline.stop_playback(),
            _ if line.starts_with("/lang") => {
                let code = line.trim_start_matches("/lang").trim();
                match pipeline.set_language(code) {
                    Ok(lang) => println!("language: {} ({})", lang.code(), lang.name()),
                    Err(e) => println!("error: {e}"),
                }
            }
            _ if line.starts_with('/') => println!("unknown command: {line}"),
            text => {
                pipeline.edit_draft(text);
                send_and_report(&mut pipeline).await;
            }
        }
    }

    Ok(())
}

async fn send_and_report(pipeline: &mut Pipeline) {
    match pipeline.send().await {
        Ok(()) => {
            if let Some(turn) = pipeline.history().last() {
                if turn.role == Role::Assistant {
                    println!("assistant: {}", turn.content);
                }
            }
            if pipeline.playback_status() == PlaybackStatus::Playing {
                println!("(speaking...)");
                if let Err(e) = pipeline.await_playback().await {
                    println!("playback error: {e}");
                }
            }
        }
        Err(e) => println!("error: {e}"),
    }
}

/// Test microphone input with a level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let constraints = CaptureConstraints::default();
    let mut recorder = NativeRecorder::new();
    let mut rx = recorder
        .start(&constraints, MimeType::Wav, Duration::from_millis(250))
        .await?;

    println!("Sample rate: {} Hz", constraints.sample_rate);
    println!("---");

    let mut total_bytes = 0usize;
    let mut header_seen = false;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut window = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            total_bytes += chunk.len();
            if header_seen {
                window.extend_from_slice(&chunk);
            } else {
                header_seen = true;
            }
        }

        let (rms, peak) = pcm16_levels(&window);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (rms * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {rms:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    recorder.finalize().await?;
    while let Some(chunk) = rx.recv().await {
        total_bytes += chunk.len();
    }
    recorder.release();

    println!("\n---");
    println!("Captured {total_bytes} bytes total.");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// RMS and peak of 16-bit little-endian PCM
fn pcm16_levels(bytes: &[u8]) -> (f32, f32) {
    let mut sum_squares = 0.0f32;
    let mut peak = 0.0f32;
    let mut count = 0usize;

    for pair in bytes.chunks_exact(2) {
        let value = f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0;
        sum_squares += value * value;
        peak = peak.max(value.abs());
        count += 1;
    }

    if count == 0 {
        return (0.0, 0.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let rms = (sum_squares / count as f32).sqrt();
    (rms, peak)
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());

    let mut sink = NativeSink::new();
    let done = sink.begin(DecodedAudio {
        samples,
        sample_rate,
    })?;
    done.await
        .map_err(|_| anyhow::anyhow!("output sink dropped"))??;
    sink.stop();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Synthesize text through the backend TTS route and play it
async fn test_tts(config: Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let backend = HttpVoiceBackend::new(config.backend_url.clone());

    println!("Synthesizing speech...");
    let encoded = backend.synthesize(text, config.language).await?;
    let audio = encoding::decode(&encoded)?;
    println!("Got {} bytes of audio data", audio.len());

    println!("Playing audio...");
    let mut playback = PlaybackSession::new(Box::new(NativeSink::new()));
    playback.play(&audio)?;
    playback.await_end().await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

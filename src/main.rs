use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use voiceloop::voice::{
    AudioCapture, AudioPlayback, Capture, SAMPLE_RATE, SpeechToText, TextToSpeech, decode_mp3,
    record_utterance, samples_to_wav,
};
use voiceloop::{
    Config, ConsoleSynthesizer, EchoResponder, EventSender, LoopEvent, MicrophoneRecognizer,
    SpeakerSynthesizer, Synthesizer, VoiceLoop, event_channel,
};

/// voiceloop - listen, respond, speak, repeat
#[derive(Parser)]
#[command(name = "voiceloop", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print responses instead of speaking them
    #[arg(long, env = "VOICELOOP_MUTE")]
    mute: bool,

    /// TTS backend ("openai" or "elevenlabs")
    #[arg(long)]
    tts_provider: Option<String>,

    /// STT backend ("whisper" or "deepgram")
    #[arg(long)]
    stt_provider: Option<String>,

    /// Processing delay in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

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
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Record one utterance and print its transcript
    TestStt,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voiceloop=info",
        1 => "info,voiceloop=debug",
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
    let mut overrides = Vec::new();
    if let Some(p) = cli.tts_provider {
        overrides.push(("VOICELOOP_TTS_PROVIDER", p));
    }
    if let Some(p) = cli.stt_provider {
        overrides.push(("VOICELOOP_STT_PROVIDER", p));
    }
    if let Some(ms) = cli.delay_ms {
        overrides.push(("VOICELOOP_PROCESSING_DELAY_MS", ms.to_string()));
    }
    if cli.mute {
        overrides.push(("VOICELOOP_SOUND", "false".to_string()));
    }

    let config = Config::load_with_overrides(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::TestStt => test_stt(&config).await,
        };
    }

    run_loop(config).await
}

/// Run the voice loop until Ctrl-C
async fn run_loop(config: Config) -> anyhow::Result<()> {
    let (events_tx, events_rx) = event_channel();

    let recognizer = MicrophoneRecognizer::from_config(&config, events_tx.clone())?;
    let synthesizer: Box<dyn Synthesizer> = if config.synthesizer.enabled {
        Box::new(SpeakerSynthesizer::from_config(&config, events_tx.clone())?)
    } else {
        tracing::info!("sound disabled, responses will be printed");
        Box::new(ConsoleSynthesizer::new(events_tx.clone()))
    };
    let responder = Arc::new(EchoResponder::new(config.responder.prefix.clone()));

    spawn_interrupt_source(events_tx.clone());

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        let _ = shutdown_tx.send(()).await;
    });

    tracing::info!("voiceloop ready - speak, or press Enter to interrupt");

    VoiceLoop::new(
        recognizer,
        synthesizer,
        responder,
        config.voice_loop.clone(),
        events_tx,
    )
    .run(events_rx, &mut shutdown_rx)
    .await?;

    Ok(())
}

/// Map each line on stdin to a user interrupt
fn spawn_interrupt_source(events: EventSender) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if events.send(LoopEvent::UserInterrupt).is_err() {
                break;
            }
        }
    });
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
fn calculate_rms(samples: &[f32]) -> f32 {
    voiceloop::voice::mean_energy(samples).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    tokio::task::spawn_blocking(move || {
        AudioPlayback::new(sample_rate)?.play_blocking(samples, &AtomicBool::new(false))
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let sc = &config.synthesizer;
    let tts = TextToSpeech::new(
        sc.provider,
        config.tts_api_key()?,
        sc.model.clone(),
        sc.voice.clone(),
        sc.speed,
    )?;

    println!("Synthesizing speech ({:?}, voice {})...", sc.provider, sc.voice);
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || {
        let audio = decode_mp3(&mp3_data)?;
        AudioPlayback::new(audio.sample_rate)?
            .play_blocking(audio.samples, &AtomicBool::new(false))
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Test STT on one recorded utterance
async fn test_stt(config: &Config) -> anyhow::Result<()> {
    let rc = &config.recognizer;
    let stt = SpeechToText::new(
        rc.provider,
        config.stt_api_key()?,
        rc.model.clone(),
        rc.language.clone(),
    )?;

    println!(
        "Calibrating, then speak. Recording stops after {}s of silence.",
        rc.endpoint.silence_secs
    );

    let endpoint = rc.endpoint.clone();
    let capture =
        tokio::task::spawn_blocking(move || record_utterance(&endpoint, &AtomicBool::new(false)))
            .await??;

    let Capture::Utterance(samples) = capture else {
        println!("No speech detected.");
        return Ok(());
    };

    #[allow(clippy::cast_precision_loss)]
    let secs = samples.len() as f32 / SAMPLE_RATE as f32;
    println!("Recorded {secs:.1}s. Transcribing ({:?})...", rc.provider);

    let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
    let transcript = stt.transcribe(&wav).await?;

    if transcript.is_empty() {
        println!("Transcript was empty.");
    } else {
        println!("Transcript: {transcript}");
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use voice_session::{
    AudioFile, AudioSession, Config, EffectsConfig, HeadlessBackend, Observer, StopKind,
};

/// Frame size fed to the headless capture device
const FRAME_MS: u64 = 100;

#[derive(Parser)]
#[command(name = "voice-session", about = "Record and play back a single audio session")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/voice-session")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a WAV file as if it were the microphone
    Record {
        /// PCM WAV file standing in for the microphone
        #[arg(long)]
        input: PathBuf,
        /// Destination (defaults to the documents directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Stop after this many seconds instead of at the end of the input
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Play an asset, optionally through the effects pipeline
    Play {
        source: Option<PathBuf>,
        #[arg(long)]
        rate: Option<f32>,
        /// Pitch shift in cents
        #[arg(long)]
        pitch: Option<f32>,
        #[arg(long)]
        echo: bool,
        #[arg(long)]
        reverb: bool,
        /// Pause after N seconds, then resume one second later
        #[arg(long)]
        pause_after: Option<u64>,
    },
}

fn observer(done: mpsc::UnboundedSender<()>) -> Arc<Observer> {
    let record_done = done.clone();
    Arc::new(
        Observer::new()
            .on_meter(|db| info!("Input level: {:.1} dB", db))
            .on_record_finished(move |ok| {
                info!("Recording finished (successfully={})", ok);
                let _ = record_done.send(());
            })
            .on_playback_stopped(move |kind| {
                info!("Playback stopped: {:?}", kind);
                if kind != StopKind::Pause {
                    let _ = done.send(());
                }
            })
            .on_error(|event| error!("Session error: {}", event)),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Voice Session v{}", env!("CARGO_PKG_VERSION"));
    info!("Session: {}", cfg.session.session_id);
    info!(
        "Clock: recording {}ms, playback {}ms",
        cfg.session.clock.recording_tick_ms, cfg.session.clock.playback_tick_ms
    );

    let backend = Arc::new(HeadlessBackend::new());
    let session = AudioSession::spawn(cfg.session, backend.clone());

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let observer = observer(done_tx);
    session.set_observer(&observer).await?;

    match cli.command {
        Commands::Record {
            input,
            output,
            seconds,
        } => {
            let audio = AudioFile::open(&input)?;
            let frames = audio.frames(FRAME_MS);
            let feed = backend.connect_input(frames.len().max(1));

            let path = session.start_recording(output).await?;
            info!("Recording to {}", path.display());

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_MS));
                for frame in frames {
                    ticker.tick().await;
                    if feed.send(frame).await.is_err() {
                        break;
                    }
                }
            });

            match seconds {
                Some(secs) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    let duration = session.stop_recording().await?;
                    info!("Recorded {}s", duration);
                    done_rx.recv().await;
                }
                None => {
                    done_rx.recv().await;
                    let duration = session.stop_recording().await?;
                    info!("Recorded {}s", duration);
                }
            }
        }
        Commands::Play {
            source,
            rate,
            pitch,
            echo,
            reverb,
            pause_after,
        } => {
            let effects = EffectsConfig {
                rate,
                pitch,
                echo_enabled: echo,
                reverb_enabled: reverb,
            };

            if effects == EffectsConfig::default() {
                session.play(source.clone()).await?;
            } else {
                session.play_with_effects(source.clone(), effects).await?;
            }

            if let Some(secs) = pause_after {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                session.pause().await?;
                tokio::time::sleep(Duration::from_secs(1)).await;
                if let Err(e) = session.play(source).await {
                    warn!("Resume failed: {}", e);
                }
            }

            done_rx.recv().await;
        }
    }

    let snapshot = session.snapshot().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to encode snapshot")?
    );

    session.shutdown().await?;
    Ok(())
}

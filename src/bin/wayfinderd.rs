//! wayfinderd - navigation cue daemon
//!
//! Runs a navigation session against the configured camera source, prints
//! every display state to stdout and speaks cues through the log-backed
//! synthesizer. With `--read-text` it performs one text reading and exits.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use wayfinder::{
    AnalyzerRegistry, CaptureMode, CueAnalyzer, CueDisplay, LogSpeech, MonotonicClock,
    NavigationSession, PipelineConfig, SpeechSynthesizer, StubAnalyzer, SyntheticCamera,
    SystemClock,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many seconds.
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    /// Capture mode (navigation|text_reading|photo_capture).
    #[arg(long, default_value = "navigation")]
    mode: String,
    /// Disable speech output.
    #[arg(long)]
    no_speech: bool,
    /// Read text once with this prompt and exit.
    #[arg(long, value_name = "PROMPT")]
    read_text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = PipelineConfig::load()?;
    if args.no_speech {
        config.speech.enabled = false;
    }
    let mode: CaptureMode = args.mode.parse()?;

    let clock: Arc<dyn MonotonicClock> = Arc::new(SystemClock::new());
    let mut registry = AnalyzerRegistry::new();
    registry.register(StubAnalyzer::new());
    log::info!("analyzers: {}", registry.list().join(", "));
    let analyzer: Arc<dyn CueAnalyzer> = Arc::new(registry);
    let speech: Arc<dyn SpeechSynthesizer> = Arc::new(LogSpeech::new());

    let session =
        NavigationSession::from_config(&config, Arc::clone(&clock), analyzer, Arc::clone(&speech));
    let (speech_tx, speech_rx) = watch::channel(config.speech.enabled);
    let mut camera = SyntheticCamera::new(config.source.clone(), clock)?;

    if let Some(prompt) = args.read_text {
        let displays = session.read_text(&mut camera, &prompt, speech_rx).await?;
        match displays.iter().rev().find(|d| !d.text.is_empty()) {
            Some(answer) => print_display(answer),
            None => log::warn!("no answer produced"),
        }
        speech.shutdown();
        return Ok(());
    }

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let mut handle = session.start(mode, camera, speech_rx);
    let deadline = tokio::time::sleep(Duration::from_secs(args.seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                log::info!("run time of {}s elapsed", args.seconds);
                break;
            }
            _ = stop_rx.recv() => {
                log::info!("shutdown signal received");
                break;
            }
            display = handle.next_display() => match display {
                Some(display) => print_display(&display),
                None => break,
            },
        }
    }

    handle.shutdown().await;
    drop(speech_tx);
    speech.shutdown();
    Ok(())
}

fn print_display(display: &CueDisplay) {
    if display.text.is_empty() {
        return;
    }
    match display.category {
        Some(category) => println!("[{:?}] {}", category, display.text),
        None => println!("{}", display.text),
    }
}

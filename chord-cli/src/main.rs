//! # chord-cli - Terminal front end for real-time chord recognition
//!
//! ## Architecture
//! - **Analysis Thread**: owns the microphone source and runs the blocking
//!   recognizer loop
//! - **Main Thread**: polls the progression on an interval and reacts to
//!   commands typed on stdin
//! - **Communication**: the recognizer is shared through an `Arc`; stdin
//!   commands arrive over a crossbeam channel

mod cli;

use std::fs;
use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chord_core::{
    chord_symbol, Chord, ChordRecognizer, MicrophoneSource, Progression, RecognizerConfig,
    RunSummary, StopReason,
};
use clap::Parser;
use crossbeam_channel::{Receiver, select};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;

/// Delay between repeated stop requests while the analysis thread winds down.
const STOP_RETRY: Duration = Duration::from_millis(10);

/// Commands accepted on stdin while listening.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Clear,
    Stop,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Command> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "c" | "clear" => Some(Command::Clear),
            "q" | "quit" | "s" | "stop" => Some(Command::Stop),
            other => Some(Command::Unknown(other.to_string())),
        }
    }
}

/// JSON export of a finished session.
#[derive(Debug, Serialize)]
struct SessionReport<'a> {
    progression: &'a Progression,
    frames_processed: u64,
    frames_skipped: u64,
    stop_reason: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let recognizer =
        Arc::new(ChordRecognizer::new(config).context("Invalid recognizer configuration")?);

    println!("=================================");
    println!("   Chord Recognition (chord-cli)  ");
    println!("=================================");
    println!("Listening... play some music! Type `clear` or `stop`.\n");

    let worker = start_analysis(Arc::clone(&recognizer));
    let commands = spawn_command_reader();
    poll_until_done(cli, &recognizer, &worker, commands);

    stop_analysis(&recognizer, &worker);
    let summary = worker
        .join()
        .map_err(|_| anyhow!("Analysis thread panicked"))?
        .context("Audio setup failed")?;

    let progression = recognizer.progression();
    println!("\nFinal Chord Progression:");
    println!("========================");
    println!("{}\n", render(&progression));
    info!(
        "Session ended ({:?}) after {} frames",
        summary.stop_reason, summary.frames_processed
    );
    if let StopReason::SourceFailed(reason) = &summary.stop_reason {
        warn!("Audio input failed mid-session: {}", reason);
    }

    if let Some(path) = &cli.output {
        save_report(path, &progression, &summary)?;
        println!("Progression saved to {}", path.display());
    }
    Ok(())
}

/// Loads recognizer settings from a JSON file, or uses the defaults.
fn load_config(path: Option<&Path>) -> Result<RecognizerConfig> {
    let Some(path) = path else {
        return Ok(RecognizerConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
    let config: RecognizerConfig = serde_json::from_str(&json)
        .with_context(|| format!("Invalid config file '{}'", path.display()))?;
    debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

/// Runs the recognizer against the microphone on a dedicated thread.
///
/// The source is created inside the thread because audio streams are not
/// guaranteed to be `Send`.
fn start_analysis(recognizer: Arc<ChordRecognizer>) -> JoinHandle<chord_core::Result<RunSummary>> {
    thread::spawn(move || {
        debug!("Analysis thread started");
        let config = recognizer.config();
        let mut source = MicrophoneSource::new(config.sample_rate, config.frame_size);
        let result = recognizer.start(&mut source);
        debug!("Analysis thread finished");
        result
    })
}

/// Forwards stdin lines as commands. The channel closes at end of input.
fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = Command::parse(&line) {
                if tx.send(command).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

/// Redraws the progression whenever it changes until time runs out, the user
/// stops, or the analysis thread exits on its own.
fn poll_until_done(
    cli: &Cli,
    recognizer: &ChordRecognizer,
    worker: &JoinHandle<chord_core::Result<RunSummary>>,
    commands: Receiver<Command>,
) {
    let started = Instant::now();
    let time_limit = cli.time_limit();
    let ticker = crossbeam_channel::tick(cli.poll_interval());
    let closed_input = crossbeam_channel::never();
    let mut input_open = true;
    let mut shown = (None, Progression::new());

    loop {
        let input = if input_open { &commands } else { &closed_input };
        select! {
            recv(ticker) -> _ => {
                let latest = (recognizer.current_guess(), recognizer.progression());
                if latest != shown {
                    println!("{}", status_line(latest.0, &latest.1));
                    shown = latest;
                }
                if worker.is_finished() {
                    debug!("Analysis thread exited");
                    return;
                }
                if time_limit.is_some_and(|limit| started.elapsed() >= limit) {
                    info!("Listening time elapsed");
                    return;
                }
            }
            recv(input) -> command => match command {
                Ok(Command::Clear) => {
                    recognizer.clear_progression();
                    shown = (None, Progression::new());
                    println!("Progression cleared.");
                }
                Ok(Command::Stop) => return,
                Ok(Command::Unknown(other)) => {
                    println!("Unknown command '{other}' (use `clear` or `stop`)");
                }
                Err(_) => {
                    if time_limit.is_none() {
                        return;
                    }
                    // End of input; keep listening until the time limit.
                    input_open = false;
                }
            },
        }
    }
}

/// Stops the recognizer and waits for the analysis thread to leave its loop.
///
/// A stop issued before the thread has claimed the loop has nothing to cancel,
/// so it is repeated until the thread exits.
fn stop_analysis(
    recognizer: &ChordRecognizer,
    worker: &JoinHandle<chord_core::Result<RunSummary>>,
) {
    while !worker.is_finished() {
        recognizer.stop();
        thread::sleep(STOP_RETRY);
    }
}

/// Live guess for the latest frame next to the confirmed chords.
fn status_line(guess: Option<Chord>, progression: &Progression) -> String {
    format!(
        "Hearing: {:<8} Last confirmed: {:<8} Progression: {}",
        chord_symbol(guess),
        progression.last().map_or_else(|| "---".to_string(), |c| c.to_string()),
        render(progression)
    )
}

fn render(progression: &Progression) -> String {
    if progression.is_empty() {
        "---".to_string()
    } else {
        progression.to_string()
    }
}

fn save_report(path: &Path, progression: &Progression, summary: &RunSummary) -> Result<()> {
    let report = SessionReport {
        progression,
        frames_processed: summary.frames_processed,
        frames_skipped: summary.frames_skipped,
        stop_reason: format!("{:?}", summary.stop_reason),
    };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
    Ok(())
}

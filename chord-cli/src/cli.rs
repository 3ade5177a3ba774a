//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// chord-cli - Real-time chord recognition from the default microphone
///
/// Listens to the default input device, prints the chord progression as it is
/// confirmed and optionally exports it as JSON. Type `clear` or `stop` on
/// stdin while it runs.
#[derive(Parser, Debug)]
#[command(name = "chord-cli")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Seconds to listen before stopping (0 = until `stop` or end of input)
    #[arg(short, long, value_name = "SECS", default_value_t = 30)]
    pub duration: u64,

    /// How often the progression is polled, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub poll_ms: u64,

    /// JSON file with recognizer settings (missing fields use defaults)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the final progression to this JSON file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Listening time limit, or `None` to run until told to stop
    pub fn time_limit(&self) -> Option<Duration> {
        (self.duration > 0).then(|| Duration::from_secs(self.duration))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(10))
    }

    /// Log filter derived from the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

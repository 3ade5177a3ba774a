//! # Recognizer Module
//!
//! Wires a frame source through analysis, matching and debouncing, and owns
//! the state shared between the analysis thread and its controller.
//!
//! ## Threading
//! - `start()` blocks the calling thread until stopped or the source ends
//! - `stop()`, `progression()`, `clear_progression()` may be called from any
//!   other thread through a shared `Arc<ChordRecognizer>`
//! - The running flag is raised before the source opens and checked before
//!   every read, so a stop during setup ends the run before the first frame
//!   and a later stop takes effect after the frame in flight
//! - Tracker and progression sit behind one mutex; each frame's
//!   observe-and-append happens under a single lock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, trace, warn};

use crate::analyzer::{FrameAnalysis, FrameAnalyzer};
use crate::chord::{Chord, ChordMatcher};
use crate::config::RecognizerConfig;
use crate::error::{ChordError, Result};
use crate::progression::{Observation, Progression, ProgressionTracker};
use crate::source::{FrameSource, StreamFormat};

/// Why the analysis loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Stopped,
    /// The source reported end-of-stream.
    EndOfStream,
    /// The source failed mid-stream; the progression so far is kept.
    SourceFailed(String),
}

/// Totals for one `start()` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub stop_reason: StopReason,
}

/// Result of pushing one frame through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub analysis: FrameAnalysis,
    /// Matcher output; `None` is "Unknown".
    pub guess: Option<Chord>,
    pub observation: Observation,
}

/// Real-time chord recognizer.
#[derive(Debug)]
pub struct ChordRecognizer {
    config: RecognizerConfig,
    analyzer: FrameAnalyzer,
    matcher: ChordMatcher,
    tracker: Mutex<ProgressionTracker>,
    current_guess: Mutex<Option<Chord>>,
    running: AtomicBool,
}

impl ChordRecognizer {
    /// Builds a recognizer after validating `config`.
    pub fn new(config: RecognizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: FrameAnalyzer::new(config.clone()),
            matcher: ChordMatcher::new(),
            tracker: Mutex::new(ProgressionTracker::new(config.stability_threshold)),
            current_guess: Mutex::new(None),
            running: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Opens `source` and analyzes frames until stopped or the stream ends.
    ///
    /// This function:
    /// 1. Claims the running flag, so `stop()` is honoured even while the
    ///    source is still opening
    /// 2. Opens the source and checks its sample rate against the config
    /// 3. Pulls frames and feeds each one through [`Self::process_frame`]
    ///
    /// # Arguments
    /// * `source` - Frame source to open and drain; it is read from the
    ///   calling thread only
    ///
    /// # Returns
    /// * `Ok(summary)` - Frame totals and why the loop ended. Mid-stream
    ///   failures land here as [`StopReason::SourceFailed`]
    /// * `Err(ChordError::AlreadyRunning)` - Another `start()` owns the loop
    /// * `Err(e)` - Setup failed; no frame was read and the running flag is
    ///   lowered again
    pub fn start<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChordError::AlreadyRunning);
        }

        let format = match self.open_source(source) {
            Ok(format) => format,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!("Audio setup failed: {}", e);
                return Err(e);
            }
        };

        info!(
            "Analysis started: {} Hz, {} samples per frame",
            format.sample_rate, self.config.frame_size
        );

        let mut frames_processed = 0;
        let mut frames_skipped = 0;
        let stop_reason = loop {
            if !self.running.load(Ordering::Acquire) {
                break StopReason::Stopped;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("Frame acquisition failed, stopping analysis: {}", e);
                    } else {
                        error!("Frame source error, stopping analysis: {}", e);
                    }
                    break StopReason::SourceFailed(e.to_string());
                }
            };

            match self.conform_frame(frame) {
                Some(frame) => {
                    self.process_frame(&frame);
                    frames_processed += 1;
                }
                None => frames_skipped += 1,
            }
        };

        self.running.store(false, Ordering::Release);
        info!(
            "Analysis finished ({:?}): {} frames processed, {} skipped",
            stop_reason, frames_processed, frames_skipped
        );

        Ok(RunSummary {
            frames_processed,
            frames_skipped,
            stop_reason,
        })
    }

    /// Asks a running loop to exit after its current frame.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("Stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one frame through analysis, matching and the debounce tracker.
    pub fn process_frame(&self, frame: &[f32]) -> FrameOutcome {
        let analysis = self.analyzer.analyze(frame);
        if analysis.is_silent(&self.config) {
            trace!("Frame below signal floor");
        }
        let guess = self.matcher.identify(&analysis.pitch_classes);
        let observation = self.lock_tracker().observe(guess);
        *self
            .current_guess
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = guess;

        FrameOutcome {
            analysis,
            guess,
            observation,
        }
    }

    /// Snapshot of the confirmed progression.
    pub fn progression(&self) -> Progression {
        self.lock_tracker().progression().clone()
    }

    /// Empties the progression and resets the debounce counter.
    pub fn clear_progression(&self) {
        self.lock_tracker().clear();
        *self
            .current_guess
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        info!("Progression cleared");
    }

    /// Chord guessed for the most recent frame, before debouncing.
    pub fn current_guess(&self) -> Option<Chord> {
        *self
            .current_guess
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn open_source<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<StreamFormat> {
        let format = source.open()?;
        if format.sample_rate != self.config.sample_rate {
            return Err(ChordError::UnsupportedFormat(format!(
                "source delivers {} Hz, recognizer expects {} Hz",
                format.sample_rate, self.config.sample_rate
            )));
        }
        Ok(format)
    }

    fn lock_tracker(&self) -> MutexGuard<'_, ProgressionTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Skips empty or non-finite frames; pads or truncates to the frame size.
    fn conform_frame(&self, mut frame: Vec<f32>) -> Option<Vec<f32>> {
        let frame_size = self.config.frame_size;
        if frame.is_empty() {
            warn!("Skipping empty frame");
            return None;
        }
        if frame.iter().any(|s| !s.is_finite()) {
            warn!("Skipping frame with non-finite samples");
            return None;
        }
        if frame.len() != frame_size {
            debug!("Resizing {}-sample frame to {}", frame.len(), frame_size);
            frame.resize(frame_size, 0.0);
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted source for driving the loop without threads.
    struct ScriptedSource {
        sample_rate: u32,
        fail_open: bool,
        frames: VecDeque<Result<Vec<f32>>>,
        reads: usize,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<Vec<f32>>>) -> Self {
            Self {
                sample_rate: 44100,
                fail_open: false,
                frames: frames.into(),
                reads: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> Result<StreamFormat> {
            if self.fail_open {
                return Err(ChordError::UnsupportedFormat("test".into()));
            }
            Ok(StreamFormat {
                sample_rate: self.sample_rate,
            })
        }

        fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
            self.reads += 1;
            self.frames.pop_front().transpose()
        }
    }

    fn tones(bins: &[usize]) -> Vec<f32> {
        let n = 4096;
        (0..n)
            .map(|t| {
                bins.iter()
                    .map(|&k| 0.3 * (2.0 * std::f32::consts::PI * (k * t) as f32 / n as f32).sin())
                    .sum()
            })
            .collect()
    }

    fn c_major() -> Vec<f32> {
        tones(&[24, 31, 36])
    }

    fn a_minor() -> Vec<f32> {
        tones(&[24, 31, 41])
    }

    fn recognizer() -> ChordRecognizer {
        ChordRecognizer::new(RecognizerConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RecognizerConfig {
            frame_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            ChordRecognizer::new(config),
            Err(ChordError::InvalidConfig(_))
        ));
    }

    #[test]
    fn process_frame_reports_guess_and_confirmation() {
        let recognizer = recognizer();
        let first = recognizer.process_frame(&c_major());
        assert_eq!(first.guess.map(|c| c.to_string()), Some("C".to_string()));
        assert_eq!(first.observation, Observation::Pending);

        recognizer.process_frame(&c_major());
        let third = recognizer.process_frame(&c_major());
        assert!(matches!(third.observation, Observation::Appended(_)));
        assert_eq!(recognizer.progression().to_string(), "C");
        assert_eq!(recognizer.current_guess().map(|c| c.to_string()), Some("C".into()));
    }

    #[test]
    fn runs_until_end_of_stream() {
        let recognizer = recognizer();
        let mut frames: Vec<Result<Vec<f32>>> = (0..3).map(|_| Ok(c_major())).collect();
        frames.extend((0..3).map(|_| Ok(a_minor())));
        let mut source = ScriptedSource::new(frames);

        let summary = recognizer.start(&mut source).unwrap();
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(summary.frames_processed, 6);
        assert_eq!(recognizer.progression().to_string(), "C → Am");
        assert!(!recognizer.is_running());
    }

    #[test]
    fn setup_failure_processes_nothing() {
        let recognizer = recognizer();
        let mut source = ScriptedSource::new(vec![Ok(c_major())]);
        source.fail_open = true;

        assert!(recognizer.start(&mut source).is_err());
        assert_eq!(source.reads, 0);
        assert!(!recognizer.is_running());
    }

    #[test]
    fn sample_rate_mismatch_is_fatal() {
        let recognizer = recognizer();
        let mut source = ScriptedSource::new(vec![Ok(c_major())]);
        source.sample_rate = 48000;

        assert!(matches!(
            recognizer.start(&mut source),
            Err(ChordError::UnsupportedFormat(_))
        ));
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn stream_failure_keeps_progression() {
        let recognizer = recognizer();
        let mut frames: Vec<Result<Vec<f32>>> = (0..3).map(|_| Ok(c_major())).collect();
        frames.push(Err(ChordError::Stream("device unplugged".into())));
        frames.push(Ok(a_minor()));
        let mut source = ScriptedSource::new(frames);

        let summary = recognizer.start(&mut source).unwrap();
        assert!(matches!(summary.stop_reason, StopReason::SourceFailed(_)));
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(recognizer.progression().to_string(), "C");
    }

    #[test]
    fn malformed_frames_are_skipped_and_short_frames_padded() {
        let recognizer = recognizer();
        let mut short = c_major();
        short.truncate(4000);
        let frames = vec![
            Ok(Vec::new()),
            Ok(vec![f32::NAN; 4096]),
            Ok(c_major()),
            Ok(short),
            Ok(c_major()),
        ];
        let mut source = ScriptedSource::new(frames);

        let summary = recognizer.start(&mut source).unwrap();
        assert_eq!(summary.frames_skipped, 2);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(recognizer.progression().to_string(), "C");
    }

    #[test]
    fn long_frames_are_truncated_to_frame_size() {
        let recognizer = recognizer();
        let mut long = c_major();
        long.extend(tones(&[46]).into_iter().take(1000));
        assert_eq!(
            recognizer.conform_frame(long.clone()).map(|f| f.len()),
            Some(4096)
        );

        let frames = vec![Ok(long.clone()), Ok(long.clone()), Ok(long)];
        let mut source = ScriptedSource::new(frames);

        let summary = recognizer.start(&mut source).unwrap();
        assert_eq!(summary.frames_skipped, 0);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(recognizer.progression().to_string(), "C");
    }

    #[test]
    fn stop_while_opening_skips_the_loop() {
        struct StopOnOpen<'a> {
            recognizer: &'a ChordRecognizer,
        }

        impl FrameSource for StopOnOpen<'_> {
            fn open(&mut self) -> Result<StreamFormat> {
                assert!(self.recognizer.is_running());
                self.recognizer.stop();
                Ok(StreamFormat { sample_rate: 44100 })
            }

            fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
                panic!("no frame may be read after a stop during setup");
            }
        }

        let recognizer = recognizer();
        let mut source = StopOnOpen {
            recognizer: &recognizer,
        };
        let summary = recognizer.start(&mut source).unwrap();
        assert_eq!(summary.stop_reason, StopReason::Stopped);
        assert_eq!(summary.frames_processed, 0);
        assert!(!recognizer.is_running());
    }

    #[test]
    fn silent_frames_never_advance_the_counter() {
        let recognizer = recognizer();
        recognizer.process_frame(&c_major());
        recognizer.process_frame(&c_major());
        let outcome = recognizer.process_frame(&vec![0.0; 4096]);
        assert!(outcome.analysis.pitch_classes.is_empty());
        assert_eq!(outcome.guess, None);
        recognizer.process_frame(&c_major());
        recognizer.process_frame(&c_major());
        assert!(recognizer.progression().is_empty());
    }

    #[test]
    fn clear_resets_progression_and_debounce() {
        let recognizer = recognizer();
        for _ in 0..3 {
            recognizer.process_frame(&c_major());
        }
        assert_eq!(recognizer.progression().len(), 1);

        recognizer.clear_progression();
        assert!(recognizer.progression().is_empty());
        assert_eq!(recognizer.current_guess(), None);

        recognizer.process_frame(&c_major());
        recognizer.process_frame(&c_major());
        assert!(recognizer.progression().is_empty());
    }

    #[test]
    fn stop_before_loop_iteration_ends_run() {
        struct StoppingSource<'a> {
            recognizer: &'a ChordRecognizer,
            frame: Vec<f32>,
        }

        impl FrameSource for StoppingSource<'_> {
            fn open(&mut self) -> Result<StreamFormat> {
                Ok(StreamFormat { sample_rate: 44100 })
            }

            fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
                // Stop arrives while this frame is in flight.
                self.recognizer.stop();
                Ok(Some(self.frame.clone()))
            }
        }

        let recognizer = recognizer();
        let mut source = StoppingSource {
            recognizer: &recognizer,
            frame: c_major(),
        };
        let summary = recognizer.start(&mut source).unwrap();
        assert_eq!(summary.stop_reason, StopReason::Stopped);
        assert_eq!(summary.frames_processed, 1);
    }
}

// chord-core/src/lib.rs

//! The core logic for real-time chord recognition.
//! This crate is responsible for frame analysis, chord matching and
//! progression tracking, plus the microphone frame source. It is completely
//! headless and contains no presentation code.

pub mod analyzer;
pub mod audio;
pub mod chord;
pub mod config;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod progression;
pub mod recognizer;
pub mod source;

pub use analyzer::{FrameAnalysis, FrameAnalyzer};
pub use audio::MicrophoneSource;
pub use chord::{chord_symbol, Chord, ChordMatcher, Quality, UNKNOWN_CHORD};
pub use config::RecognizerConfig;
pub use error::{ChordError, Result};
pub use pitch::{PitchClass, PitchClassSet};
pub use progression::{Observation, Progression, ProgressionTracker};
pub use recognizer::{ChordRecognizer, FrameOutcome, RunSummary, StopReason};
pub use source::{ChannelFrameSource, FrameSource, StreamFormat};

//! Configuration parameters for chord recognition

use serde::{Deserialize, Serialize};

use crate::error::{ChordError, Result};

/// Recognizer configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    // Stream
    /// Sample rate in Hz (default: 44100)
    pub sample_rate: u32,

    /// Samples per analysis frame (default: 4096)
    pub frame_size: usize,

    // Signal gate
    /// Frames with a scaled RMS below this are treated as silence (default: 40.0)
    pub signal_floor: f32,

    /// Multiplier applied to the RMS before comparing to `signal_floor` (default: 1000.0)
    pub signal_scale: f32,

    // Peak picking
    /// Peaks must exceed the mean magnitude times this (default: 3.0)
    pub peak_threshold_multiplier: f32,

    /// Peaks must always exceed this magnitude (default: 20.0)
    pub absolute_peak_floor: f32,

    /// Bins skipped at each edge of the spectrum (default: 5)
    pub peak_edge_bins: usize,

    /// A peak must dominate this many bins on either side (default: 2)
    pub peak_neighborhood: usize,

    /// Maximum number of peaks kept per frame (default: 8)
    pub max_peaks: usize,

    // Pitch mapping
    /// Peaks at or below this frequency are ignored (default: 60.0 Hz)
    pub min_pitch_hz: f32,

    /// Peaks above this frequency are ignored (default: 5000.0 Hz)
    pub max_pitch_hz: f32,

    /// Hard lower bound applied before `min_pitch_hz` (default: 20.0 Hz)
    pub hard_min_hz: f32,

    // Debounce
    /// Consecutive identical guesses needed to confirm a chord (default: 3)
    pub stability_threshold: u32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_size: 4096,
            signal_floor: 40.0,
            signal_scale: 1000.0,
            peak_threshold_multiplier: 3.0,
            absolute_peak_floor: 20.0,
            peak_edge_bins: 5,
            peak_neighborhood: 2,
            max_peaks: 8,
            min_pitch_hz: 60.0,
            max_pitch_hz: 5000.0,
            hard_min_hz: 20.0,
            stability_threshold: 3,
        }
    }
}

impl RecognizerConfig {
    /// Check that the parameters describe a usable pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        if self.frame_size < 64 || !self.frame_size.is_power_of_two() {
            return Err(invalid(format!(
                "frame_size must be a power of two >= 64, got {}",
                self.frame_size
            )));
        }
        // The scan window must leave at least one bin with a full neighbourhood.
        let margin = self.peak_edge_bins.max(self.peak_neighborhood);
        if 2 * margin >= self.frame_size / 2 {
            return Err(invalid("peak_edge_bins leave no bins to scan"));
        }
        for (name, value) in [
            ("signal_floor", self.signal_floor),
            ("signal_scale", self.signal_scale),
            ("peak_threshold_multiplier", self.peak_threshold_multiplier),
            ("absolute_peak_floor", self.absolute_peak_floor),
            ("min_pitch_hz", self.min_pitch_hz),
            ("max_pitch_hz", self.max_pitch_hz),
            ("hard_min_hz", self.hard_min_hz),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be finite and non-negative")));
            }
        }
        if self.min_pitch_hz >= self.max_pitch_hz {
            return Err(invalid("min_pitch_hz must be below max_pitch_hz"));
        }
        if self.max_peaks == 0 {
            return Err(invalid("max_peaks must be at least 1"));
        }
        if self.stability_threshold < 2 {
            return Err(invalid("stability_threshold must be at least 2"));
        }
        Ok(())
    }

    /// Duration of one frame in seconds; also the worst-case stop latency.
    pub fn frame_duration_secs(&self) -> f32 {
        self.frame_size as f32 / self.sample_rate as f32
    }
}

fn invalid(msg: impl Into<String>) -> ChordError {
    ChordError::InvalidConfig(msg.into())
}

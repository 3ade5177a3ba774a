//! # Frame Analysis Module
//!
//! Turns one frame of mono samples into the set of pitch classes sounding in it.
//!
//! ## Pipeline
//! 1. Signal gate: scaled RMS below the floor returns an empty set and skips
//!    all spectral work
//! 2. Magnitude spectrum of the raw frame
//! 3. Peak picking against a dynamic threshold, capped to the strongest peaks
//! 4. Mapping each peak inside the pitch range to its pitch class

use tracing::{debug, trace};

use crate::config::RecognizerConfig;
use crate::fft::{bin_to_frequency, SpectrumAnalyzer};
use crate::pitch::{PitchClass, PitchClassSet};

/// A local maximum of the magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub bin: usize,
    pub frequency: f32,
    pub magnitude: f32,
}

/// Everything the analyzer learned about one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameAnalysis {
    /// Scaled RMS of the frame (0 to roughly 1000 for normalized input).
    pub signal_strength: f32,
    /// Peak frequencies in Hz, strongest first. Empty when the frame was gated.
    pub peaks: Vec<f32>,
    /// Detected pitch classes.
    pub pitch_classes: PitchClassSet,
}

impl FrameAnalysis {
    /// True when the signal gate rejected the frame.
    pub fn is_silent(&self, config: &RecognizerConfig) -> bool {
        self.signal_strength < config.signal_floor
    }
}

/// Per-frame pitch-class detector.
#[derive(Debug, Clone)]
pub struct FrameAnalyzer {
    config: RecognizerConfig,
    spectrum: SpectrumAnalyzer,
}

impl FrameAnalyzer {
    pub fn new(config: RecognizerConfig) -> Self {
        let spectrum = SpectrumAnalyzer::new(config.frame_size);
        Self { config, spectrum }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Detected pitch classes for `frame`, possibly empty.
    pub fn detect(&self, frame: &[f32]) -> PitchClassSet {
        self.analyze(frame).pitch_classes
    }

    /// Runs the full analysis and keeps the intermediate diagnostics.
    pub fn analyze(&self, frame: &[f32]) -> FrameAnalysis {
        let config = &self.config;
        let strength = signal_strength(frame, config.signal_scale);
        if strength < config.signal_floor {
            trace!("Signal {:.1} below floor {:.1}", strength, config.signal_floor);
            return FrameAnalysis {
                signal_strength: strength,
                ..Default::default()
            };
        }

        let magnitudes = self.spectrum.magnitudes(frame);
        let peaks = pick_peaks(&magnitudes, config.sample_rate, config);

        let mut pitch_classes = PitchClassSet::new();
        for peak in &peaks {
            if let Some(pc) = map_peak(peak.frequency, config) {
                pitch_classes.insert(pc);
                trace!("{:.0} Hz -> {}", peak.frequency, pc);
            }
        }

        debug!(
            "Signal {:.1}: {} peaks, pitch classes {}",
            strength,
            peaks.len(),
            pitch_classes
        );

        FrameAnalysis {
            signal_strength: strength,
            peaks: peaks.iter().map(|p| p.frequency).collect(),
            pitch_classes,
        }
    }
}

/// Root-mean-square of `frame` multiplied by `scale`. Empty frames are silent.
pub fn signal_strength(frame: &[f32], scale: f32) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum_sq / frame.len() as f64).sqrt() as f32) * scale
}

/// Finds spectral peaks above `max(mean × multiplier, absolute floor)`.
///
/// A bin qualifies when it exceeds the threshold and is no smaller than every
/// bin within `peak_neighborhood` of it. Bins within `peak_edge_bins` of either
/// end are never considered. When more than `max_peaks` qualify, the strongest
/// are kept; equal magnitudes keep the lower bin.
///
/// # Arguments
/// * `magnitudes` - First half of the spectrum, `frame_size / 2` bins
/// * `sample_rate` - Sample rate of the analyzed frame in Hz
/// * `config` - Threshold multiplier, absolute floor, neighbourhood, edge
///   margin and peak cap
///
/// # Returns
/// Peaks ordered strongest first, at most `config.max_peaks` of them. Spectra
/// too short to leave any bin between the edge margins yield no peaks.
pub fn pick_peaks(magnitudes: &[f32], sample_rate: u32, config: &RecognizerConfig) -> Vec<Peak> {
    if magnitudes.is_empty() {
        return Vec::new();
    }
    let frame_size = magnitudes.len() * 2;
    let avg_mag = magnitudes.iter().map(|&m| m as f64).sum::<f64>() / magnitudes.len() as f64;
    let threshold =
        (avg_mag as f32 * config.peak_threshold_multiplier).max(config.absolute_peak_floor);

    let reach = config.peak_neighborhood;
    let margin = config.peak_edge_bins.max(reach);
    if magnitudes.len() <= 2 * margin {
        return Vec::new();
    }

    let mut peaks: Vec<Peak> = (margin..magnitudes.len() - margin)
        .filter(|&i| {
            let mag = magnitudes[i];
            mag > threshold
                && magnitudes[i - reach..=i + reach]
                    .iter()
                    .all(|&neighbour| mag >= neighbour)
        })
        .map(|i| Peak {
            bin: i,
            frequency: bin_to_frequency(i, sample_rate, frame_size),
            magnitude: magnitudes[i],
        })
        .collect();

    // Stable sort keeps ascending bin order among equal magnitudes.
    peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    peaks.truncate(config.max_peaks);

    trace!(
        "Avg mag {:.1}, threshold {:.1}, kept {} peaks",
        avg_mag,
        threshold,
        peaks.len()
    );
    peaks
}

/// Pitch class for a peak frequency, or `None` outside the detection range.
pub fn map_peak(freq: f32, config: &RecognizerConfig) -> Option<PitchClass> {
    if freq < config.hard_min_hz || freq > config.max_pitch_hz {
        return None;
    }
    if freq <= config.min_pitch_hz {
        return None;
    }
    PitchClass::from_frequency(freq)
}

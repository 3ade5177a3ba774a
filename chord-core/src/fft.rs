//! # Spectrum Module
//!
//! Magnitude spectrum of one analysis frame, computed with RustFFT.
//!
//! The frame is transformed as-is: no window and no DC removal, so every
//! magnitude equals `|Σ x[t]·e^(−2πi·k·t/N)|` of the plain DFT within float
//! tolerance. Only the first N/2 bins (up to Nyquist) are returned.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// A forward FFT planned once for a fixed frame size.
#[derive(Clone)]
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    frame_size: usize,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_size);
        Self { fft, frame_size }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Returns `frame_size / 2` magnitude bins for `frame`.
    ///
    /// Frames shorter than the planned size are zero-padded and longer ones
    /// truncated, so the bin spacing always stays `sample_rate / frame_size`.
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .take(self.frame_size)
            .map(|&sample| Complex { re: sample, im: 0.0 })
            .collect();
        buffer.resize(self.frame_size, Complex { re: 0.0, im: 0.0 });

        self.fft.process(&mut buffer);
        spectrum_to_magnitudes(&buffer)
    }
}

/// Magnitudes of the first half of a complex spectrum.
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
        .collect()
}

/// Frequency in Hz at the centre of bin `bin`.
pub fn bin_to_frequency(bin: usize, sample_rate: u32, frame_size: usize) -> f32 {
    bin as f32 * sample_rate as f32 / frame_size as f32
}

//! # Audio Capture Module
//!
//! Microphone frame source built on CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - Default input device selection
//! - Mono f32 or i16 capture at the requested sample rate
//! - Re-chunking of device callbacks into fixed-size analysis frames
//! - Stream errors forwarded to the analysis thread

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, trace, warn};

use crate::error::{ChordError, Result};
use crate::source::{FrameSource, StreamFormat};

/// Frames buffered between the device callback and the analysis loop.
/// When the analysis falls further behind, new frames are dropped.
pub const FRAME_QUEUE_DEPTH: usize = 4;

/// Accumulates device callbacks and cuts them into fixed-size frames.
#[derive(Debug)]
pub struct FrameChunker {
    frame_size: usize,
    buffer: Vec<f32>,
}

impl FrameChunker {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            buffer: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Appends samples and hands every completed frame to `emit`.
    pub fn push(
        &mut self,
        samples: impl IntoIterator<Item = f32>,
        mut emit: impl FnMut(Vec<f32>),
    ) {
        self.buffer.extend(samples);
        while self.buffer.len() >= self.frame_size {
            let frame = self.buffer[..self.frame_size].to_vec();
            emit(frame);
            self.buffer.drain(..self.frame_size);
        }
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Mono input from the default capture device.
pub struct MicrophoneSource {
    sample_rate: u32,
    frame_size: usize,
    stream: Option<cpal::Stream>,
    frames: Option<Receiver<Vec<f32>>>,
    errors: Option<Receiver<String>>,
}

impl MicrophoneSource {
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        Self {
            sample_rate,
            frame_size,
            stream: None,
            frames: None,
            errors: None,
        }
    }
}

impl FrameSource for MicrophoneSource {
    /// Selects the default input device, builds the stream and starts it.
    ///
    /// This function:
    /// 1. Picks the host's default input device
    /// 2. Chooses a mono f32 or i16 configuration covering the sample rate
    /// 3. Starts a stream whose callback cuts samples into frames and queues
    ///    them for [`FrameSource::next_frame`]
    ///
    /// # Returns
    /// * `Ok(format)` - The stream is playing at `format.sample_rate`
    /// * `Err(ChordError::NoInputDevice)` - The host has no default input
    /// * `Err(ChordError::UnsupportedFormat)` - No mono f32/i16 config covers
    ///   the requested rate
    /// * `Err(ChordError::Device)` - The stream could not be built or started
    ///
    /// # Audio Configuration
    /// - Channels: mono
    /// - Format: f32 preferred, i16 normalized to [-1, 1)
    /// - Queue: [`FRAME_QUEUE_DEPTH`] frames; new frames are dropped while it is full
    fn open(&mut self) -> Result<StreamFormat> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(ChordError::NoInputDevice)?;

        info!(
            "Using audio input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let configs = device
            .supported_input_configs()
            .map_err(ChordError::device)?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, self.sample_rate).ok_or_else(|| {
            ChordError::UnsupportedFormat(format!(
                "no mono f32/i16 input supporting {} Hz",
                self.sample_rate
            ))
        })?;

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(self.sample_rate))
            .into();

        info!("Selected {:?} input at {} Hz", sample_format, self.sample_rate);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let (error_tx, error_rx) = crossbeam_channel::bounded(1);

        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, self.frame_size, frame_tx, error_tx)?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, self.frame_size, frame_tx, error_tx)?
            }
            other => {
                return Err(ChordError::UnsupportedFormat(format!(
                    "sample format {other:?}"
                )));
            }
        };
        stream.play().map_err(ChordError::device)?;

        self.stream = Some(stream);
        self.frames = Some(frame_rx);
        self.errors = Some(error_rx);

        Ok(StreamFormat {
            sample_rate: self.sample_rate,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
        let (Some(frames), Some(errors)) = (&self.frames, &self.errors) else {
            return Err(ChordError::Stream("microphone source was not opened".to_string()));
        };

        crossbeam_channel::select! {
            recv(frames) -> msg => Ok(msg.ok()),
            recv(errors) -> msg => match msg {
                Ok(reason) => Err(ChordError::Stream(reason)),
                Err(_) => Ok(frames.recv().ok()),
            },
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Stop the callback before the stream is dropped.
            if let Err(e) = stream.pause() {
                warn!("Error pausing input stream: {}", e);
            }
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frame_size: usize,
    frames: Sender<Vec<f32>>,
    errors: Sender<String>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut chunker = FrameChunker::new(frame_size);

    let err_fn = move |err: cpal::StreamError| {
        error!("An error occurred on the audio stream: {}", err);
        let _ = errors.try_send(err.to_string());
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut dropped = 0;
                chunker.push(data.iter().map(|s| s.to_sample::<f32>()), |frame| {
                    // A full queue means the analysis is behind; drop the frame.
                    if frames.try_send(frame).is_err() {
                        dropped += 1;
                    }
                });
                if dropped > 0 {
                    trace!(
                        "Dropped {} frame(s), {} samples carried over",
                        dropped,
                        chunker.pending()
                    );
                }
            },
            err_fn,
            None,
        )
        .map_err(ChordError::device)
}

/// Picks a mono configuration that covers `target_rate`, preferring f32 over i16.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .filter_map(|c| match c.sample_format() {
            SampleFormat::F32 => Some((0, c)),
            SampleFormat::I16 => Some((1, c)),
            _ => None,
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, c)| c)
}

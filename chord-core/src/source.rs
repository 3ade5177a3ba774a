//! Frame sources feeding the recognizer.
//!
//! A source is pulled one frame at a time from the analysis thread. It owns
//! capture, buffering and blocking; the recognizer only sees whole frames.

use crossbeam_channel::Receiver;

use crate::error::Result;

/// Format negotiated when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
}

/// Pull-based supplier of mono sample frames.
pub trait FrameSource {
    /// Prepares the source. Failures here are fatal setup errors.
    fn open(&mut self) -> Result<StreamFormat>;

    /// Blocks for the next frame. `Ok(None)` signals end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>>;
}

/// Frames pushed by another thread over a crossbeam channel.
///
/// The stream ends once every sender has been dropped.
#[derive(Debug)]
pub struct ChannelFrameSource {
    receiver: Receiver<Vec<f32>>,
    format: StreamFormat,
}

impl ChannelFrameSource {
    pub fn new(receiver: Receiver<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            receiver,
            format: StreamFormat { sample_rate },
        }
    }
}

impl FrameSource for ChannelFrameSource {
    fn open(&mut self) -> Result<StreamFormat> {
        Ok(self.format)
    }

    fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
        Ok(self.receiver.recv().ok())
    }
}

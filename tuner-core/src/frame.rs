//! # Audio Frames
//!
//! A frame is one fixed-size block of mono samples together with the rate it
//! was captured at. Frames are handed to the core per invocation and never
//! retained.

use crate::error::{Result, TunerError};

/// A block of mono samples in [-1, 1] and its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Frame {
    /// Builds a frame, rejecting empty sample blocks, NaN or infinite
    /// samples and a zero sample rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate);
        }
        if samples.is_empty() {
            return Err(TunerError::EmptyFrame);
        }
        if let Some((index, &value)) = samples.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(TunerError::NonFiniteSample { index, value });
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the first `buffer_size` samples, the block the estimator works on.
    ///
    /// # Returns
    /// * `Ok(window)` - Exactly `buffer_size` samples
    /// * `Err(TunerError::FrameTooShort)` - The frame holds fewer samples
    pub fn analysis_window(&self, buffer_size: usize) -> Result<&[f32]> {
        if self.samples.len() < buffer_size {
            return Err(TunerError::FrameTooShort {
                expected: buffer_size,
                actual: self.samples.len(),
            });
        }
        Ok(&self.samples[..buffer_size])
    }

    /// Duration of the frame in milliseconds.
    pub fn duration_ms(&self) -> f32 {
        self.samples.len() as f32 * 1000.0 / self.sample_rate as f32
    }
}

/// Root-mean-square amplitude of a block of samples. Zero for an empty block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

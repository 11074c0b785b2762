//! # Audio Capture Module
//!
//! Live frame source backed by CPAL (Cross-Platform Audio Library). The
//! device callback accumulates samples and forwards them as fixed-size
//! [`Frame`]s to the processing loop over a channel.
//!
//! ## Features
//! - Default input device selection
//! - Mono f32 input at the rate closest to 44.1 kHz
//! - Frames of a caller-chosen size, dropped rather than queued when the loop falls behind

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::frame::Frame;

/// Preferred capture rate in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel the captured frames are pushed into; a full channel drops frames
/// * `buffer_size` - Samples per frame
///
/// # Returns
/// * `Ok((stream, sample_rate))` - The running stream (capture stops when it is dropped) and its rate
/// * `Err(e)` - No device, no usable format, or the stream failed to start
pub fn start_audio_capture(sender: Sender<Frame>, buffer_size: usize) -> Result<(cpal::Stream, u32)> {
    if buffer_size == 0 {
        return Err(anyhow!("buffer size must be positive"));
    }

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    tracing::info!(device = %device.name()?, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 mono input format found"))?;

    let sample_rate = nearest_supported_rate(&supported_config, TARGET_SAMPLE_RATE);
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let config: cpal::StreamConfig = config.into();

    tracing::info!(sample_rate, buffer_size, "selected capture format");

    let err_fn = |err: cpal::StreamError| tracing::error!(%err, "audio stream error");

    let mut chunker = FrameChunker::new(buffer_size);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for samples in chunker.push(data) {
                match Frame::new(samples, sample_rate) {
                    // Drop the frame if the loop has not drained the previous ones.
                    Ok(frame) => {
                        let _ = sender.try_send(frame);
                    }
                    Err(err) => tracing::warn!(%err, "discarding captured block"),
                }
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Slices an arbitrary stream of sample chunks into fixed-size blocks.
#[derive(Debug)]
pub struct FrameChunker {
    buffer_size: usize,
    pending: Vec<f32>,
}

impl FrameChunker {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            pending: Vec::with_capacity(buffer_size * 2),
        }
    }

    /// Appends `data` and returns every complete block it finishes.
    pub fn push(&mut self, data: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(data);
        let mut blocks = Vec::new();
        while self.pending.len() >= self.buffer_size {
            blocks.push(self.pending.drain(..self.buffer_size).collect());
        }
        blocks
    }
}

/// Finds the best supported input configuration for the target sample rate.
///
/// Only mono 32-bit float configurations qualify; among those the one whose
/// rate range lies closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            target_rate.clamp(min, max).abs_diff(target_rate)
        })
}

fn nearest_supported_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}

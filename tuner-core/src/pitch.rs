//! # Pitch Detection Module
//!
//! This module implements the autocorrelation pitch estimator used for
//! monophonic string tuning. It turns one frame of samples into a frequency
//! estimate, or reports that no pitch could be found.
//!
//! ## Pipeline
//! 1. Amplitude gate on the frame's precomputed RMS
//! 2. Edge trimming to drop the noisy start and end of the block
//! 3. Autocorrelation over a fixed lag window of [30, 800) samples
//! 4. First local maximum above 80% of the zero-lag energy (octave guard)
//! 5. Global maximum as a lower-confidence fallback
//! 6. Parabolic interpolation for sub-sample accuracy

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::config::TunerConfig;
use crate::fft::Autocorrelator;

/// Shortest period searched, in samples.
pub const MIN_LAG: usize = 30;
/// Upper (exclusive) bound of the searched periods, in samples.
pub const MAX_LAG: usize = 800;
/// Samples quieter than this mark the edges of the steady region.
pub const TRIM_AMPLITUDE: f32 = 0.2;
/// Fraction of the zero-lag energy a peak must exceed to be accepted outright.
pub const PEAK_THRESHOLD_RATIO: f64 = 0.8;

/// Per-frame result of the gate and estimator combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchReading {
    /// The frame fell below the silence floor.
    Silent,
    /// The frame had energy but no usable period.
    NoPitch,
    /// Estimated fundamental frequency in Hz.
    Pitch(f32),
}

impl PitchReading {
    pub fn frequency(&self) -> Option<f32> {
        match *self {
            PitchReading::Pitch(freq) => Some(freq),
            _ => None,
        }
    }
}

/// How the lag sums are evaluated. Both produce the same peak choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    /// Brute-force sums, O(lags × samples).
    #[default]
    Direct,
    /// Zero-padded FFT correlation.
    Fft,
}

/// Which rule picked the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakKind {
    /// First local maximum above the energy threshold.
    Threshold,
    /// Global maximum of the lag window; more prone to octave errors.
    Fallback,
}

/// Detailed estimator output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub frequency: f32,
    /// Integer period in samples.
    pub lag: usize,
    /// Sub-sample correction applied to `lag`.
    pub shift: f32,
    pub kind: PeakKind,
}

/// Autocorrelation values for a contiguous run of lags starting at `first_lag`.
///
/// The first and last lags are only there as neighbours: peaks are picked
/// from the [`candidates`](Self::candidates) between them.
#[derive(Debug, Clone, PartialEq)]
pub struct LagCorrelation {
    first_lag: usize,
    values: Vec<f64>,
}

impl LagCorrelation {
    pub fn new(first_lag: usize, values: Vec<f64>) -> Self {
        Self { first_lag, values }
    }

    /// Correlation at `lag`, or `None` outside the computed range.
    pub fn get(&self, lag: usize) -> Option<f64> {
        lag.checked_sub(self.first_lag)
            .and_then(|offset| self.values.get(offset))
            .copied()
    }

    /// Lags that may be chosen as the period; each has both neighbours computed.
    pub fn candidates(&self) -> Range<usize> {
        self.first_lag + 1..self.first_lag + self.values.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Direct,
    Fft(Autocorrelator),
}

/// Autocorrelation pitch estimator.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    silence_rms: f32,
    backend: Backend,
}

impl PitchEstimator {
    /// Builds an estimator. The FFT back-end plans its transforms for
    /// frames of `buffer_size` samples up front.
    pub fn new(silence_rms: f32, method: CorrelationMethod, buffer_size: usize) -> Self {
        let backend = match method {
            CorrelationMethod::Direct => Backend::Direct,
            CorrelationMethod::Fft => Backend::Fft(Autocorrelator::new(buffer_size)),
        };
        Self { silence_rms, backend }
    }

    pub fn from_config(config: &TunerConfig) -> Self {
        Self::new(config.silence_rms, config.correlation, config.buffer_size)
    }

    /// Estimates the fundamental of one frame.
    ///
    /// # Arguments
    /// * `signal` - The frame's analysis window (`buffer_size` samples)
    /// * `sample_rate` - Sample rate in Hz
    /// * `rms` - RMS of `signal`, as computed by the silence gate
    ///
    /// # Returns
    /// * `PitchReading::Pitch(freq)` - A period was found
    /// * `PitchReading::NoPitch` - Too quiet, or no lag could be evaluated
    pub fn detect(&self, signal: &[f32], sample_rate: u32, rms: f32) -> PitchReading {
        match self.estimate(signal, sample_rate, rms) {
            Some(estimate) => PitchReading::Pitch(estimate.frequency),
            None => PitchReading::NoPitch,
        }
    }

    /// Same as [`detect`](Self::detect) but keeps the chosen lag and the rule that picked it.
    pub fn estimate(&self, signal: &[f32], sample_rate: u32, rms: f32) -> Option<PitchEstimate> {
        if rms.is_nan() || rms < self.silence_rms {
            return None;
        }

        let trimmed = trim_edges(signal);
        let correlation = match &self.backend {
            Backend::Direct => correlate_direct(trimmed),
            Backend::Fft(correlator) => correlate_fft(correlator, trimmed),
        };
        if correlation.candidates().is_empty() {
            tracing::trace!(trimmed_len = trimmed.len(), "lag window empty after trimming");
            return None;
        }

        let zero_lag_energy: f64 = trimmed.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        let (lag, kind) = select_peak(&correlation, zero_lag_energy)?;
        if kind == PeakKind::Fallback {
            tracing::debug!(lag, "no peak above threshold, using global maximum");
        }

        let (Some(left), Some(center), Some(right)) =
            (correlation.get(lag - 1), correlation.get(lag), correlation.get(lag + 1))
        else {
            return None;
        };
        let shift = parabolic_shift(left, center, right) as f32;

        let frequency = sample_rate as f32 / (lag as f32 + shift);
        if frequency.is_finite() && frequency > 0.0 {
            Some(PitchEstimate {
                frequency,
                lag,
                shift,
                kind,
            })
        } else {
            None
        }
    }
}

/// Cuts the quiet onset and decay off a frame.
///
/// The left edge is the first sample in the first half quieter than
/// [`TRIM_AMPLITUDE`] (0 if none is); the right edge is the first such sample
/// scanning back from the end to the midpoint (last index if none is). If the
/// two edges cross, the frame is returned untrimmed.
pub fn trim_edges(signal: &[f32]) -> &[f32] {
    let len = signal.len();
    let mid = len / 2;
    let is_quiet = |s: &f32| s.abs() < TRIM_AMPLITUDE;

    let left = signal[..mid].iter().position(is_quiet).unwrap_or(0);
    let right = signal[mid..]
        .iter()
        .rposition(is_quiet)
        .map(|i| mid + i)
        .unwrap_or(len.saturating_sub(1));

    if right <= left {
        tracing::trace!(left, right, "degenerate trim, keeping whole frame");
        return signal;
    }
    &signal[left..right]
}

/// Lags evaluated for a block of `len` samples: the candidate periods
/// `[MIN_LAG, min(MAX_LAG, len))` plus one neighbour on either side.
fn evaluated_lags(len: usize) -> Range<usize> {
    let end = MAX_LAG.min(len);
    if end <= MIN_LAG {
        return 0..0;
    }
    MIN_LAG - 1..end + 1
}

fn correlate_direct(signal: &[f32]) -> LagCorrelation {
    let lags = evaluated_lags(signal.len());
    let first_lag = lags.start;
    let values = lags
        .map(|lag| {
            signal
                .iter()
                .zip(&signal[lag..])
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum()
        })
        .collect();
    LagCorrelation::new(first_lag, values)
}

fn correlate_fft(correlator: &Autocorrelator, signal: &[f32]) -> LagCorrelation {
    let lags = evaluated_lags(signal.len());
    if lags.is_empty() {
        return LagCorrelation::new(lags.start, Vec::new());
    }
    let full = correlator.autocorrelate(signal);
    let first_lag = lags.start;
    // A lag equal to the block length has no overlap: its sum is 0.
    let values = lags.map(|lag| full.get(lag).copied().unwrap_or(0.0)).collect();
    LagCorrelation::new(first_lag, values)
}

/// Picks the period from a lag window.
///
/// Scans the candidate lags in ascending order and takes the first strict
/// local maximum exceeding `PEAK_THRESHOLD_RATIO × zero_lag_energy`. Without
/// one, the candidate with the global maximum is returned (earliest lag on
/// ties). `None` only when there are no candidates.
pub fn select_peak(correlation: &LagCorrelation, zero_lag_energy: f64) -> Option<(usize, PeakKind)> {
    let threshold = PEAK_THRESHOLD_RATIO * zero_lag_energy;

    for lag in correlation.candidates() {
        let (Some(prev), Some(value), Some(next)) =
            (correlation.get(lag - 1), correlation.get(lag), correlation.get(lag + 1))
        else {
            continue;
        };
        if value > threshold && value > prev && value > next {
            return Some((lag, PeakKind::Threshold));
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for lag in correlation.candidates() {
        let Some(value) = correlation.get(lag) else { continue };
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((lag, value));
        }
    }
    best.map(|(lag, _)| (lag, PeakKind::Fallback))
}

/// Offset of a parabola's vertex fitted through three equally spaced points.
///
/// Returns 0 when the points are collinear or the result is not finite.
pub fn parabolic_shift(left: f64, center: f64, right: f64) -> f64 {
    let denominator = 2.0 * (left - 2.0 * center + right);
    if denominator == 0.0 {
        return 0.0;
    }
    let shift = (left - right) / denominator;
    if shift.is_finite() { shift } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const BUFFER: usize = 4096;

    fn sine(freq: f32, amplitude: f32) -> Vec<f32> {
        (0..BUFFER)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn detect(signal: &[f32], method: CorrelationMethod) -> Option<PitchEstimate> {
        let estimator = PitchEstimator::new(0.01, method, BUFFER);
        estimator.estimate(signal, SAMPLE_RATE, crate::frame::rms(signal))
    }

    fn assert_close(actual: f32, expected: f32, tolerance: f32) {
        let error = (actual - expected).abs() / expected;
        assert!(
            error <= tolerance,
            "expected {expected} Hz, got {actual} Hz ({:.3}% off)",
            error * 100.0
        );
    }

    #[test]
    fn detects_a4_sine() {
        let estimate = detect(&sine(440.0, 0.8), CorrelationMethod::Direct).unwrap();
        assert_eq!(estimate.kind, PeakKind::Threshold);
        assert_close(estimate.frequency, 440.0, 0.005);
    }

    #[test]
    fn detects_g3_sine() {
        let estimate = detect(&sine(196.0, 0.6), CorrelationMethod::Direct).unwrap();
        assert_close(estimate.frequency, 196.0, 0.005);
    }

    #[test]
    fn detects_low_e_string() {
        let estimate = detect(&sine(82.41, 0.7), CorrelationMethod::Direct).unwrap();
        assert_eq!(estimate.kind, PeakKind::Threshold);
        assert_close(estimate.frequency, 82.41, 0.01);
    }

    #[test]
    fn strong_second_harmonic_does_not_cause_octave_error() {
        let signal: Vec<f32> = (0..BUFFER)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                0.6 * (2.0 * PI * 110.0 * t).sin() + 0.4 * (2.0 * PI * 220.0 * t).sin()
            })
            .collect();
        let estimate = detect(&signal, CorrelationMethod::Direct).unwrap();
        assert_close(estimate.frequency, 110.0, 0.01);
    }

    #[test]
    fn periods_at_the_short_end_of_the_lag_window() {
        // Periods between 30 and 30.5 samples peak at lag 30 itself.
        for freq in [1451.1155, 1460.0, 1465.6266] {
            let estimate = detect(&sine(freq, 0.7), CorrelationMethod::Direct).unwrap();
            assert_eq!((estimate.lag, estimate.kind), (MIN_LAG, PeakKind::Threshold), "{freq} Hz");
            assert_close(estimate.frequency, freq, 0.005);
        }
    }

    #[test]
    fn periods_at_the_long_end_of_the_lag_window() {
        for freq in [55.5, 59.0] {
            let estimate = detect(&sine(freq, 0.7), CorrelationMethod::Direct).unwrap();
            assert_eq!(estimate.kind, PeakKind::Threshold, "{freq} Hz");
            assert!(estimate.lag > 740 && estimate.lag < MAX_LAG);
            assert_close(estimate.frequency, freq, 0.005);
        }
    }

    #[test]
    fn fft_and_direct_pick_the_same_period_across_the_range() {
        let mut freqs = vec![68.39775];
        let mut freq = 55.5_f32;
        while freq < 1470.0 {
            freqs.push(freq);
            freq *= 1.03;
        }
        for freq in freqs {
            let signal = sine(freq, 0.7);
            let direct = detect(&signal, CorrelationMethod::Direct).unwrap();
            let fast = detect(&signal, CorrelationMethod::Fft).unwrap();
            assert_eq!((direct.lag, direct.kind), (fast.lag, fast.kind), "{freq} Hz");
            assert_close(fast.frequency, direct.frequency, 1e-4);
        }
    }

    #[test]
    fn quiet_frame_has_no_pitch() {
        let estimator = PitchEstimator::new(0.01, CorrelationMethod::Direct, BUFFER);
        let signal = sine(440.0, 0.005);
        let rms = crate::frame::rms(&signal);
        assert_eq!(estimator.detect(&signal, SAMPLE_RATE, rms), PitchReading::NoPitch);
        assert_eq!(estimator.detect(&[0.0; BUFFER], SAMPLE_RATE, 0.0), PitchReading::NoPitch);
        assert_eq!(estimator.detect(&signal, SAMPLE_RATE, f32::NAN), PitchReading::NoPitch);
    }

    #[test]
    fn collapsed_trim_leaves_no_lags() {
        // Loud everywhere except the two samples around the midpoint.
        let mut signal: Vec<f32> = (0..BUFFER).map(|i| if i % 2 == 0 { 0.9 } else { -0.9 }).collect();
        signal[BUFFER / 2 - 1] = 0.0;
        signal[BUFFER / 2] = 0.0;
        assert_eq!(trim_edges(&signal).len(), 1);
        assert!(detect(&signal, CorrelationMethod::Direct).is_none());
    }

    #[test]
    fn trim_keeps_steady_region() {
        let signal = [0.1, 0.5, 0.6, 0.5, 0.1, 0.5, 0.6, 0.05];
        // left: first quiet sample in [0, 4) is index 0; right: last quiet in [4, 8) is index 7.
        assert_eq!(trim_edges(&signal), &signal[0..7]);

        let loud_onset = [0.9, 0.8, 0.1, 0.5, 0.5, 0.1, 0.9, 0.9];
        assert_eq!(trim_edges(&loud_onset), &loud_onset[2..5]);
    }

    #[test]
    fn single_sample_frame_is_left_untrimmed() {
        let signal = [0.05];
        assert_eq!(trim_edges(&signal), &signal[..]);
    }

    #[test]
    fn first_qualifying_peak_beats_later_global_maximum() {
        // Peaks at lags 32 (9.0) and 36 (10.0); threshold is 0.8 * 10 = 8.
        let values = vec![0.5, 1.0, 2.0, 9.0, 3.0, 2.0, 4.0, 10.0, 5.0, 1.0];
        let correlation = LagCorrelation::new(MIN_LAG - 1, values);
        assert_eq!(select_peak(&correlation, 10.0), Some((32, PeakKind::Threshold)));
    }

    #[test]
    fn falls_back_to_global_maximum() {
        // Monotonically decreasing: no local maximum anywhere.
        let values = vec![10.0, 9.0, 8.0, 7.0, 6.0];
        let correlation = LagCorrelation::new(MIN_LAG - 1, values);
        assert_eq!(correlation.candidates(), 30..33);
        assert_eq!(select_peak(&correlation, 100.0), Some((30, PeakKind::Fallback)));
        assert_eq!(select_peak(&LagCorrelation::new(MIN_LAG - 1, Vec::new()), 1.0), None);
    }

    #[test]
    fn first_lag_is_a_candidate_when_its_neighbour_is_lower() {
        // Lag 29 is computed only as the neighbour of lag 30.
        let values = vec![9.0, 9.5, 9.2, 5.0];
        let correlation = LagCorrelation::new(MIN_LAG - 1, values);
        assert_eq!(select_peak(&correlation, 10.0), Some((MIN_LAG, PeakKind::Threshold)));
    }

    #[test]
    fn short_block_evaluates_the_lag_at_its_length() {
        let signal: Vec<f32> = (0..40).map(|i| (i as f32 * 0.3).sin()).collect();
        let correlation = correlate_direct(&signal);
        assert_eq!(correlation.candidates(), MIN_LAG..40);
        assert_eq!(correlation.get(40), Some(0.0));
        let fast = correlate_fft(&Autocorrelator::new(40), &signal);
        assert_eq!(fast.candidates(), correlation.candidates());
        assert_eq!(fast.get(40), Some(0.0));
    }

    #[test]
    fn parabolic_shift_handles_flat_and_symmetric_peaks() {
        assert_eq!(parabolic_shift(1.0, 1.0, 1.0), 0.0);
        assert_eq!(parabolic_shift(2.0, 3.0, 2.0), 0.0);
        let shift = parabolic_shift(2.0, 3.0, 2.5);
        assert!(shift > 0.0 && shift < 0.5, "shift {shift}");
    }
}

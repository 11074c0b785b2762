//! # FFT Autocorrelation
//!
//! Computes the linear autocorrelation of a block through the Wiener-Khinchin
//! relation: transform, take the power spectrum, transform back. The block is
//! zero-padded to at least twice its length so the circular correlation the
//! FFT produces matches the direct lag sums. The transform runs in `f64` so
//! its rounding stays far below the gap between neighbouring lags.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::fmt;
use std::sync::Arc;

/// Forward and inverse plans for blocks of up to a fixed length.
///
/// Planning is the expensive part of an FFT, so a session plans once for its
/// buffer size and reuses the plans for every frame.
#[derive(Clone)]
pub struct Autocorrelator {
    padded_len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for Autocorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autocorrelator")
            .field("padded_len", &self.padded_len)
            .finish_non_exhaustive()
    }
}

impl Autocorrelator {
    /// Plans transforms for blocks of at most `max_len` samples.
    pub fn new(max_len: usize) -> Self {
        let padded_len = (2 * max_len.max(1)).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        Self {
            padded_len,
            forward: planner.plan_fft_forward(padded_len),
            inverse: planner.plan_fft_inverse(padded_len),
        }
    }

    /// Longest block the cached plans can correlate without wrap-around.
    pub fn max_len(&self) -> usize {
        self.padded_len / 2
    }

    /// Returns `r[lag] = Σ signal[i] * signal[i + lag]` for every lag in `0..signal.len()`.
    ///
    /// Blocks longer than [`max_len`](Self::max_len) are correlated with
    /// one-off plans.
    ///
    /// # Arguments
    /// * `signal` - Samples to correlate with themselves
    ///
    /// # Returns
    /// * `Vec<f64>` - One value per lag; empty for an empty input
    pub fn autocorrelate(&self, signal: &[f32]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        if n > self.max_len() {
            tracing::debug!(len = n, planned = self.max_len(), "block exceeds planned length, replanning");
            return Self::new(n).autocorrelate(signal);
        }

        let mut buffer: Vec<Complex<f64>> = signal
            .iter()
            .map(|&sample| Complex {
                re: f64::from(sample),
                im: 0.0,
            })
            .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
            .take(self.padded_len)
            .collect();

        self.forward.process(&mut buffer);
        for bin in buffer.iter_mut() {
            // |X|^2, the power spectrum
            *bin = Complex { re: bin.norm_sqr(), im: 0.0 };
        }
        self.inverse.process(&mut buffer);

        // rustfft leaves the inverse unnormalized.
        let scale = self.padded_len as f64;
        buffer.iter().take(n).map(|c| c.re / scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(signal: &[f32], lag: usize) -> f64 {
        signal
            .iter()
            .zip(&signal[lag..])
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum()
    }

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.07).sin() + 0.3 * (i as f32 * 0.31).cos())
            .collect()
    }

    #[test]
    fn matches_direct_sums() {
        let signal = test_signal(300);
        let fast = Autocorrelator::new(300).autocorrelate(&signal);
        assert_eq!(fast.len(), signal.len());
        for lag in [0, 1, 17, 90, 299] {
            let expected = direct(&signal, lag);
            assert!(
                (fast[lag] - expected).abs() < 1e-9 * (1.0 + expected.abs()),
                "lag {lag}: fft {} vs direct {expected}",
                fast[lag]
            );
        }
    }

    #[test]
    fn shorter_blocks_reuse_the_plans() {
        let correlator = Autocorrelator::new(4096);
        assert_eq!(correlator.max_len(), 4096);
        let signal = test_signal(2500);
        let fast = correlator.autocorrelate(&signal);
        assert_eq!(fast.len(), 2500);
        let expected = direct(&signal, 640);
        assert!((fast[640] - expected).abs() < 1e-9 * (1.0 + expected.abs()));
    }

    #[test]
    fn longer_blocks_are_replanned() {
        let signal = test_signal(600);
        let fast = Autocorrelator::new(100).autocorrelate(&signal);
        assert_eq!(fast.len(), 600);
        let expected = direct(&signal, 450);
        assert!((fast[450] - expected).abs() < 1e-9 * (1.0 + expected.abs()));
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(Autocorrelator::new(16).autocorrelate(&[]).is_empty());
    }
}

//! # Silence Gate
//!
//! Classifies a frame as silent or not from its RMS energy. The RMS computed
//! here is reused by the pitch estimator and reported to the caller, so it is
//! computed once per frame.

use crate::frame;

/// Outcome of gating one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateReading {
    /// Energy below the configured floor.
    Silent { rms: f32 },
    /// Energy at or above the floor.
    NotSilent { rms: f32 },
}

impl GateReading {
    pub fn rms(&self) -> f32 {
        match *self {
            GateReading::Silent { rms } | GateReading::NotSilent { rms } => rms,
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, GateReading::Silent { .. })
    }
}

/// RMS-threshold noise gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceGate {
    silence_rms: f32,
}

impl SilenceGate {
    pub fn new(silence_rms: f32) -> Self {
        Self { silence_rms }
    }

    /// Gates a block of samples.
    pub fn classify(&self, samples: &[f32]) -> GateReading {
        let rms = frame::rms(samples);
        if rms < self.silence_rms {
            GateReading::Silent { rms }
        } else {
            GateReading::NotSilent { rms }
        }
    }
}

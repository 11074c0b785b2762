//! # Tuning Stability
//!
//! Turns jittery per-frame cent readings into a steady "in tune" verdict.
//! A note has to stay within tolerance for longer than the configured
//! duration before it is confirmed; any frame outside tolerance starts the
//! streak over. Confirmation is reported once per streak.

use crate::config::TunerConfig;

/// Persisted per-target stability counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilityState {
    /// Time spent continuously in tolerance.
    pub dwell_ms: f32,
    /// Whether this streak has already been confirmed.
    pub confirmed: bool,
}

/// Derived view of a [`StabilityState`] for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityPhase {
    /// No resolved reading this frame.
    Idle,
    /// Resolved, but outside tolerance.
    Approaching,
    /// In tolerance and accumulating dwell time.
    Locked,
    /// In tolerance long enough; confirmation has fired.
    Confirmed,
}

/// Result of advancing the tracker by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityUpdate {
    pub state: StabilityState,
    /// `min(1, dwell / stable duration)`, 0 after a reset.
    pub progress: f32,
    pub phase: StabilityPhase,
    /// Set only on the frame the streak crosses the stable duration.
    pub confirmed_now: bool,
}

/// Dwell-time accumulator with one-shot confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningStabilityTracker {
    tolerance_cents: f32,
    stable_duration_ms: f32,
}

impl TuningStabilityTracker {
    pub fn new(tolerance_cents: f32, stable_duration_ms: f32) -> Self {
        Self {
            tolerance_cents,
            stable_duration_ms,
        }
    }

    pub fn from_config(config: &TunerConfig) -> Self {
        Self::new(config.tuned_tolerance_cents, config.stable_duration_ms)
    }

    /// Advances `state` by one frame.
    ///
    /// # Arguments
    /// * `state` - Counters carried over from the previous frame
    /// * `cents` - Deviation from the active target, `None` when silent or unresolved
    /// * `dt_ms` - Time since the previous frame; negative or NaN counts as 0
    pub fn advance(&self, state: StabilityState, cents: Option<f32>, dt_ms: f32) -> StabilityUpdate {
        let in_tolerance = cents.is_some_and(|c| c.abs() <= self.tolerance_cents);
        if !in_tolerance {
            return StabilityUpdate {
                state: StabilityState::default(),
                progress: 0.0,
                phase: if cents.is_some() {
                    StabilityPhase::Approaching
                } else {
                    StabilityPhase::Idle
                },
                confirmed_now: false,
            };
        }

        let mut next = StabilityState {
            dwell_ms: state.dwell_ms + dt_ms.max(0.0),
            confirmed: state.confirmed,
        };
        let confirmed_now = next.dwell_ms > self.stable_duration_ms && !next.confirmed;
        if confirmed_now {
            next.confirmed = true;
        }

        StabilityUpdate {
            state: next,
            progress: self.progress(&next),
            phase: if next.confirmed {
                StabilityPhase::Confirmed
            } else {
                StabilityPhase::Locked
            },
            confirmed_now,
        }
    }

    /// Fraction of the stable duration accumulated so far, capped at 1.
    pub fn progress(&self, state: &StabilityState) -> f32 {
        (state.dwell_ms / self.stable_duration_ms).min(1.0)
    }
}

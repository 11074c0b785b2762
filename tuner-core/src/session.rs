//! # Tuning Session
//!
//! The per-frame entry point. [`process_frame`] runs one frame through the
//! gate, the estimator, the resolver and the stability tracker, and returns
//! the report plus the state to carry into the next frame. [`TuningSession`]
//! owns that state for callers that prefer a single object.

use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::frame::Frame;
use crate::gate::SilenceGate;
use crate::pitch::{PitchEstimator, PitchReading};
use crate::resolver::{self, ResolvedMatch, TuningMode};
use crate::stability::{StabilityPhase, StabilityState, TuningStabilityTracker};
use crate::targets::TargetNoteSet;

/// Everything the presentation layer needs about one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Frame energy, for "too quiet" feedback.
    pub rms: f32,
    pub pitch: PitchReading,
    pub resolved: ResolvedMatch,
    /// Deviation from the resolved target, if any.
    pub cents: Option<f32>,
    pub stability: StabilityState,
    pub progress: f32,
    pub phase: StabilityPhase,
    /// True on the single frame a streak is confirmed.
    pub confirmed: bool,
}

/// Stability counters and the target they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub active_target: Option<String>,
    pub stability: StabilityState,
}

/// A frame's report and the state for the next frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub report: FrameReport,
    pub state: SessionState,
}

/// Processes one frame.
///
/// The configuration is validated and the estimator built on every call;
/// [`TuningSession`] does both once.
///
/// # Arguments
/// * `frame` - At least `config.buffer_size` samples; only the first `buffer_size` are analysed
/// * `dt_ms` - Time elapsed since the previous frame
/// * `mode` - Auto or manual matching
/// * `targets` - The active target set
/// * `config` - Session configuration
/// * `state` - State returned by the previous call, or the default for a fresh session
///
/// # Returns
/// * `Ok(outcome)` - The report and the next state; silence and unresolved readings are normal outcomes
/// * `Err(TunerError::InvalidConfig)` - `config` fails validation
/// * `Err(TunerError::FrameTooShort)` - The frame holds fewer than `buffer_size` samples
pub fn process_frame(
    frame: &Frame,
    dt_ms: f32,
    mode: &TuningMode,
    targets: &TargetNoteSet,
    config: &TunerConfig,
    state: &SessionState,
) -> Result<FrameOutcome> {
    config.validate()?;
    let estimator = PitchEstimator::from_config(config);
    analyse_frame(frame, dt_ms, mode, targets, config, &estimator, state)
}

/// The pipeline behind [`process_frame`], for a config already validated.
fn analyse_frame(
    frame: &Frame,
    dt_ms: f32,
    mode: &TuningMode,
    targets: &TargetNoteSet,
    config: &TunerConfig,
    estimator: &PitchEstimator,
    state: &SessionState,
) -> Result<FrameOutcome> {
    let window = frame.analysis_window(config.buffer_size)?;
    let tracker = TuningStabilityTracker::from_config(config);

    let gate = SilenceGate::new(config.silence_rms).classify(window);
    let pitch = if gate.is_silent() {
        PitchReading::Silent
    } else {
        estimator.detect(window, frame.sample_rate(), gate.rms())
    };

    let resolved = match pitch.frequency() {
        Some(freq) => {
            if !config.within_frequency_bounds(freq) {
                tracing::debug!(freq, min = ?config.min_freq, max = ?config.max_freq, "reading outside configured bounds");
            }
            resolver::resolve(freq, mode, targets)
        }
        None => ResolvedMatch::Unresolved,
    };

    let target_id = resolved.target_id().map(str::to_string);
    // Dwell time never carries over to a different target.
    let carried = if target_id.is_some() && target_id == state.active_target {
        state.stability
    } else {
        StabilityState::default()
    };

    let cents = resolved.cents();
    let update = tracker.advance(carried, cents, dt_ms);
    if update.confirmed_now {
        tracing::info!(note = target_id.as_deref().unwrap_or_default(), ?cents, "note confirmed in tune");
    }

    Ok(FrameOutcome {
        report: FrameReport {
            rms: gate.rms(),
            pitch,
            resolved,
            cents,
            stability: update.state,
            progress: update.progress,
            phase: update.phase,
            confirmed: update.confirmed_now,
        },
        state: SessionState {
            active_target: target_id,
            stability: update.state,
        },
    })
}

/// Caller-owned session: configuration, target set, mode and stability state.
#[derive(Debug, Clone)]
pub struct TuningSession {
    config: TunerConfig,
    estimator: PitchEstimator,
    targets: TargetNoteSet,
    mode: TuningMode,
    state: SessionState,
}

impl TuningSession {
    /// Starts an auto-mode session after validating `config`.
    pub fn new(config: TunerConfig, targets: TargetNoteSet) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimator: PitchEstimator::from_config(&config),
            config,
            targets,
            mode: TuningMode::Auto,
            state: SessionState::default(),
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn targets(&self) -> &TargetNoteSet {
        &self.targets
    }

    pub fn mode(&self) -> &TuningMode {
        &self.mode
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Switches to searching the whole target set.
    pub fn set_auto(&mut self) {
        self.mode = TuningMode::Auto;
        self.reset();
    }

    /// Pins the session to one note of the target set.
    pub fn select_manual(&mut self, id: &str) -> Result<()> {
        let note = self
            .targets
            .get(id)
            .cloned()
            .ok_or_else(|| TunerError::UnknownNote(id.to_string()))?;
        self.mode = TuningMode::Manual(note);
        self.reset();
        Ok(())
    }

    /// Replaces the target set.
    ///
    /// A pinned note is re-pinned to the new set's note of the same id, or the
    /// session falls back to auto mode when the new set lacks it.
    pub fn set_targets(&mut self, targets: TargetNoteSet) {
        if let Some(id) = self.mode.pinned_id() {
            self.mode = match targets.get(id) {
                Some(note) => TuningMode::Manual(note.clone()),
                None => {
                    tracing::debug!(id, "pinned note missing from new target set, switching to auto");
                    TuningMode::Auto
                }
            };
        }
        self.targets = targets;
        self.reset();
    }

    /// Stops tuning; the next frame starts from a clean state.
    pub fn stop(&mut self) {
        self.reset();
    }

    /// Processes one frame and keeps the resulting state.
    pub fn process_frame(&mut self, frame: &Frame, dt_ms: f32) -> Result<FrameReport> {
        let outcome = analyse_frame(
            frame,
            dt_ms,
            &self.mode,
            &self.targets,
            &self.config,
            &self.estimator,
            &self.state,
        )?;
        self.state = outcome.state;
        Ok(outcome.report)
    }

    fn reset(&mut self) {
        self.state = SessionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::CorrelationMethod;
    use crate::targets::TargetNote;
    use pretty_assertions::assert_eq;
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;

    fn config() -> TunerConfig {
        TunerConfig {
            tuned_tolerance_cents: 10.0,
            stable_duration_ms: 100.0,
            ..TunerConfig::default()
        }
    }

    fn tone(freq: f32) -> Frame {
        let samples = (0..config().buffer_size)
            .map(|i| 0.7 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        Frame::new(samples, SAMPLE_RATE).unwrap()
    }

    fn silence() -> Frame {
        Frame::new(vec![0.0; config().buffer_size], SAMPLE_RATE).unwrap()
    }

    fn guitar() -> TargetNoteSet {
        TargetNoteSet::new([
            TargetNote::new("A2", 110.0, 95.0, 125.0).unwrap(),
            TargetNote::new("D3", 146.83, 130.0, 165.0).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn silent_frame_reports_silence_and_resets() {
        let state = SessionState {
            active_target: Some("A2".into()),
            stability: StabilityState {
                dwell_ms: 80.0,
                confirmed: false,
            },
        };
        let outcome = process_frame(&silence(), 16.0, &TuningMode::Auto, &guitar(), &config(), &state).unwrap();
        assert_eq!(outcome.report.pitch, PitchReading::Silent);
        assert_eq!(outcome.report.resolved, ResolvedMatch::Unresolved);
        assert_eq!(outcome.report.cents, None);
        assert_eq!(outcome.report.phase, StabilityPhase::Idle);
        assert_eq!(outcome.state, SessionState::default());
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = Frame::new(vec![0.1; 1024], SAMPLE_RATE).unwrap();
        let err = process_frame(&frame, 16.0, &TuningMode::Auto, &guitar(), &config(), &SessionState::default())
            .unwrap_err();
        assert!(matches!(err, TunerError::FrameTooShort { expected: 4096, actual: 1024 }));
    }

    #[test]
    fn target_change_discards_dwell() {
        let state = SessionState {
            active_target: Some("D3".into()),
            stability: StabilityState {
                dwell_ms: 90.0,
                confirmed: false,
            },
        };
        let outcome = process_frame(&tone(110.0), 16.0, &TuningMode::Auto, &guitar(), &config(), &state).unwrap();
        assert_eq!(outcome.state.active_target.as_deref(), Some("A2"));
        assert_eq!(outcome.report.stability.dwell_ms, 16.0);
    }

    #[test]
    fn manual_mode_outside_window_is_unresolved() {
        let mut session = TuningSession::new(config(), guitar()).unwrap();
        session.select_manual("A2").unwrap();
        let report = session.process_frame(&tone(146.83), 16.0).unwrap();
        assert!(report.pitch.frequency().is_some());
        assert_eq!(report.resolved, ResolvedMatch::Unresolved);
        assert_eq!(report.progress, 0.0);
    }

    #[test]
    fn unknown_manual_note_is_an_error() {
        let mut session = TuningSession::new(config(), guitar()).unwrap();
        assert!(matches!(session.select_manual("E4"), Err(TunerError::UnknownNote(_))));
        assert_eq!(session.mode(), &TuningMode::Auto);
    }

    #[test]
    fn mode_switch_resets_stability() {
        let mut session = TuningSession::new(config(), guitar()).unwrap();
        session.process_frame(&tone(110.0), 40.0).unwrap();
        assert!(session.state().stability.dwell_ms > 0.0);

        session.select_manual("A2").unwrap();
        assert_eq!(session.state(), &SessionState::default());
    }

    #[test]
    fn replacing_targets_repins_or_falls_back_to_auto() {
        let mut session = TuningSession::new(config(), guitar()).unwrap();
        session.select_manual("D3").unwrap();

        let wider = TargetNoteSet::new([TargetNote::new("D3", 146.83, 120.0, 175.0).unwrap()]).unwrap();
        session.set_targets(wider);
        assert_eq!(session.mode().pinned_id(), Some("D3"));
        match session.mode() {
            TuningMode::Manual(note) => assert_eq!(note.min_freq(), 120.0),
            TuningMode::Auto => panic!("expected manual mode"),
        }

        session.set_targets(TargetNoteSet::from_note_names(&["E2"], 50.0).unwrap());
        assert_eq!(session.mode(), &TuningMode::Auto);
    }

    #[test]
    fn invalid_config_is_rejected_per_frame() {
        let bad = TunerConfig {
            silence_rms: 0.0,
            stable_duration_ms: 0.0,
            ..TunerConfig::default()
        };
        let result = process_frame(&silence(), 16.0, &TuningMode::Auto, &guitar(), &bad, &SessionState::default());
        assert!(matches!(result, Err(TunerError::InvalidConfig(_))), "got {result:?}");
    }

    #[test]
    fn session_with_fft_backend_reuses_its_plans() {
        let fft = TunerConfig {
            correlation: CorrelationMethod::Fft,
            ..config()
        };
        let mut session = TuningSession::new(fft, guitar()).unwrap();
        for _ in 0..3 {
            let report = session.process_frame(&tone(110.0), 16.0).unwrap();
            assert_eq!(report.resolved.target_id(), Some("A2"));
        }
        assert_eq!(session.state().stability.dwell_ms, 48.0);
    }

    #[test]
    fn invalid_config_is_rejected_at_session_start() {
        let bad = TunerConfig {
            silence_rms: 0.0,
            ..TunerConfig::default()
        };
        assert!(TuningSession::new(bad, guitar()).is_err());
    }
}

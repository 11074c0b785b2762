// tuner-core/src/lib.rs

//! The core logic for the string tuner.
//! This crate is responsible for noise gating, pitch estimation, note
//! resolution and the in-tune confirmation state machine. It is completely
//! headless and contains no presentation code.
//!
//! One call to [`process_frame`] (or [`TuningSession::process_frame`]) per
//! animation tick turns a block of samples into a [`FrameReport`].

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod frame;
pub mod gate;
pub mod pitch;
pub mod resolver;
pub mod session;
pub mod stability;
pub mod targets;
pub mod tuning;

pub use config::TunerConfig;
pub use error::{Result, TunerError};
pub use frame::Frame;
pub use pitch::{CorrelationMethod, PitchReading};
pub use resolver::{MatchKind, ResolvedMatch, TuningMode};
pub use session::{FrameReport, SessionState, TuningSession, process_frame};
pub use stability::{StabilityPhase, StabilityState};
pub use targets::{TargetNote, TargetNoteSet};

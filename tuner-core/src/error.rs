//! # Error Types
//!
//! Contract violations raised by the tuning core. Silence, missing pitch and
//! unresolved notes are ordinary outcomes and never show up here.

use thiserror::Error;

/// Errors returned when a caller breaks the core's input contract.
#[derive(Debug, Error)]
pub enum TunerError {
    #[error("frame has {actual} samples but the configured buffer size is {expected}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("frame contains no samples")]
    EmptyFrame,

    #[error("sample {index} is not a finite number ({value})")]
    NonFiniteSample { index: usize, value: f32 },

    #[error("sample rate must be positive")]
    InvalidSampleRate,

    #[error("note '{id}': reference frequency {reference} Hz must be positive and finite")]
    InvalidReference { id: String, reference: f32 },

    #[error("note '{id}': window [{min}, {max}] must satisfy 0 < min < reference ({reference}) < max")]
    InvalidWindow {
        id: String,
        reference: f32,
        min: f32,
        max: f32,
    },

    #[error("note '{0}' appears more than once in the target set")]
    DuplicateNote(String),

    #[error("note '{0}' is not part of the active target set")]
    UnknownNote(String),

    #[error("cannot parse note name '{0}'")]
    InvalidNoteName(String),

    #[error("cents require positive frequencies (got {current} Hz against {reference} Hz)")]
    NonPositiveFrequency { current: f32, reference: f32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TunerError>;

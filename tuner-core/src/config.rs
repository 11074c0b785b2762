//! # Tuner Configuration
//!
//! Session-wide tuning parameters. A configuration is fixed for the lifetime
//! of a [`TuningSession`](crate::session::TuningSession); persisted user
//! settings may override the defaults before the session starts.
//!
//! ## JSON Form
//! Every field is optional when loading from JSON; missing fields take the
//! values of [`TunerConfig::default`]. The loaded config is always validated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, TunerError};
use crate::pitch::CorrelationMethod;

/// Default number of samples per analysis frame.
///
/// At 44.1 kHz this keeps the period of a low E string (~535 samples) well
/// inside the estimator's lag window and its peak above the acceptance
/// threshold.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Tuning parameters for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples per analysis frame.
    pub buffer_size: usize,
    /// Maximum absolute deviation, in cents, that still counts as in tune.
    pub tuned_tolerance_cents: f32,
    /// How long a note must stay in tune before it is confirmed.
    pub stable_duration_ms: f32,
    /// RMS level below which a frame is treated as silence.
    pub silence_rms: f32,
    /// How the estimator evaluates its lag sums.
    pub correlation: CorrelationMethod,
    /// Declared but not consulted by the estimator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
    /// Lower bound for plausible readings. Not enforced; readings below it are only logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_freq: Option<f32>,
    /// Upper bound for plausible readings. Not enforced; readings above it are only logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_freq: Option<f32>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            tuned_tolerance_cents: 5.0,
            stable_duration_ms: 1000.0,
            silence_rms: 0.01,
            correlation: CorrelationMethod::Direct,
            confidence_threshold: None,
            min_freq: None,
            max_freq: None,
        }
    }
}

impl TunerConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(TunerError::InvalidConfig("buffer_size must be positive".into()));
        }
        check_positive("tuned_tolerance_cents", self.tuned_tolerance_cents)?;
        check_positive("stable_duration_ms", self.stable_duration_ms)?;
        check_positive("silence_rms", self.silence_rms)?;
        if let Some(threshold) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(TunerError::InvalidConfig(format!(
                    "confidence_threshold must be within [0, 1], got {threshold}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_freq, self.max_freq) {
            if min >= max {
                return Err(TunerError::InvalidConfig(format!(
                    "min_freq ({min}) must be below max_freq ({max})"
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TunerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Arguments
    /// * `path` - Path to a JSON file holding a (possibly partial) config
    ///
    /// # Returns
    /// * `Ok(config)` - Defaults overridden by the file's fields
    /// * `Err(e)` - The file could not be read, parsed, or failed validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&data)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded tuner config");
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Whether `freq` lies inside the optional plausibility bounds.
    ///
    /// Unset bounds never exclude anything.
    pub fn within_frequency_bounds(&self, freq: f32) -> bool {
        self.min_freq.is_none_or(|min| freq >= min) && self.max_freq.is_none_or(|max| freq <= max)
    }
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TunerError::InvalidConfig(format!("{name} must be positive, got {value}")))
    }
}

//! # Target Notes
//!
//! A [`TargetNoteSet`] is the set of notes a session tunes against: the
//! strings of an instrument, or every chromatic note. Each note carries a
//! reference frequency and an acceptance window. Sets are built once per
//! tuning and only read afterwards.

use std::collections::BTreeMap;

use crate::error::{Result, TunerError};
use crate::tuning;

/// A reference pitch and the band of frequencies attributed to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetNote {
    id: String,
    reference_freq: f32,
    min_freq: f32,
    max_freq: f32,
}

impl TargetNote {
    /// Builds a note, enforcing `0 < min_freq < reference_freq < max_freq`.
    pub fn new(id: impl Into<String>, reference_freq: f32, min_freq: f32, max_freq: f32) -> Result<Self> {
        let id = id.into();
        if !(reference_freq.is_finite() && reference_freq > 0.0) {
            return Err(TunerError::InvalidReference {
                id,
                reference: reference_freq,
            });
        }
        if !(0.0 < min_freq && min_freq < reference_freq && reference_freq < max_freq) || !max_freq.is_finite() {
            return Err(TunerError::InvalidWindow {
                id,
                reference: reference_freq,
                min: min_freq,
                max: max_freq,
            });
        }
        Ok(Self {
            id,
            reference_freq,
            min_freq,
            max_freq,
        })
    }

    /// Builds a note whose window spans `half_window_cents` either side of the reference.
    pub fn with_cents_window(id: impl Into<String>, reference_freq: f32, half_window_cents: f32) -> Result<Self> {
        Self::new(
            id,
            reference_freq,
            tuning::offset_by_cents(reference_freq, -half_window_cents),
            tuning::offset_by_cents(reference_freq, half_window_cents),
        )
    }

    /// Builds a note from its name (`E2`, `C#3`, `Bb4`) in equal temperament.
    pub fn from_name(name: &str, half_window_cents: f32) -> Result<Self> {
        Self::with_cents_window(name, tuning::note_frequency(name)?, half_window_cents)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference_freq(&self) -> f32 {
        self.reference_freq
    }

    pub fn min_freq(&self) -> f32 {
        self.min_freq
    }

    pub fn max_freq(&self) -> f32 {
        self.max_freq
    }

    /// Inclusive window test.
    pub fn contains(&self, freq: f32) -> bool {
        self.min_freq <= freq && freq <= self.max_freq
    }

    /// Absolute distance from the reference frequency in Hz.
    pub fn distance(&self, freq: f32) -> f32 {
        (freq - self.reference_freq).abs()
    }
}

/// Notes keyed by id, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetNoteSet {
    notes: BTreeMap<String, TargetNote>,
}

impl TargetNoteSet {
    /// Collects notes into a set, rejecting duplicate ids.
    pub fn new(notes: impl IntoIterator<Item = TargetNote>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for note in notes {
            if map.contains_key(note.id()) {
                return Err(TunerError::DuplicateNote(note.id.clone()));
            }
            map.insert(note.id.clone(), note);
        }
        Ok(Self { notes: map })
    }

    /// Builds a set from note names, each with a symmetric window in cents.
    ///
    /// # Arguments
    /// * `names` - Note names such as `["E2", "A2", "D3"]`
    /// * `half_window_cents` - Width of each window on either side of its reference
    pub fn from_note_names<S: AsRef<str>>(names: &[S], half_window_cents: f32) -> Result<Self> {
        Self::new(
            names
                .iter()
                .map(|name| TargetNote::from_name(name.as_ref(), half_window_cents))
                .collect::<Result<Vec<_>>>()?,
        )
    }

    /// Every note from A0 to C8 with a window of `half_window_cents` either side.
    ///
    /// With 50 cents the windows tile the keyboard, touching at the quarter-tones.
    pub fn chromatic(half_window_cents: f32) -> Result<Self> {
        Self::new(
            tuning::keyboard_notes()
                .iter()
                .map(|note| TargetNote::with_cents_window(note.name.as_str(), note.frequency, half_window_cents))
                .collect::<Result<Vec<_>>>()?,
        )
    }

    pub fn get(&self, id: &str) -> Option<&TargetNote> {
        self.notes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetNote> {
        self.notes.values()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

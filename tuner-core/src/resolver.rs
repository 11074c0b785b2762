//! # Note Resolution
//!
//! Attributes an estimated frequency to one of the session's target notes and
//! measures its deviation in cents.
//!
//! - **Manual**: only the pinned note is considered, and only inside its window.
//! - **Auto**: the note whose window holds the frequency, otherwise the
//!   nearest note by absolute frequency difference.

use crate::targets::{TargetNote, TargetNoteSet};
use crate::tuning;

/// Matching policy chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TuningMode {
    /// Search the whole target set.
    Auto,
    /// Tune a single pinned note.
    Manual(TargetNote),
}

impl TuningMode {
    /// Id of the pinned note, if any.
    pub fn pinned_id(&self) -> Option<&str> {
        match self {
            TuningMode::Auto => None,
            TuningMode::Manual(note) => Some(note.id()),
        }
    }
}

/// How a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The frequency fell inside the note's window.
    Window,
    /// No window held the frequency; the closest reference was used.
    Nearest,
}

/// A resolved target with the reading's deviation from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub target_id: String,
    pub reference_freq: f32,
    pub cents: f32,
    pub kind: MatchKind,
}

/// Outcome of resolving one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedMatch {
    Matched(ResolvedTarget),
    Unresolved,
}

impl ResolvedMatch {
    pub fn target(&self) -> Option<&ResolvedTarget> {
        match self {
            ResolvedMatch::Matched(target) => Some(target),
            ResolvedMatch::Unresolved => None,
        }
    }

    pub fn cents(&self) -> Option<f32> {
        self.target().map(|t| t.cents)
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target().map(|t| t.target_id.as_str())
    }

    fn from_note(note: &TargetNote, freq: f32, kind: MatchKind) -> Self {
        ResolvedMatch::Matched(ResolvedTarget {
            target_id: note.id().to_string(),
            reference_freq: note.reference_freq(),
            cents: tuning::calculate_cents_deviation(freq, note.reference_freq()),
            kind,
        })
    }
}

/// Resolves `freq` according to `mode`.
///
/// # Arguments
/// * `freq` - Estimated frequency in Hz, positive
/// * `mode` - Auto search or a pinned note
/// * `targets` - Notes searched in auto mode; ignored in manual mode
pub fn resolve(freq: f32, mode: &TuningMode, targets: &TargetNoteSet) -> ResolvedMatch {
    match mode {
        TuningMode::Manual(note) => resolve_manual(freq, note),
        TuningMode::Auto => resolve_auto(freq, targets),
    }
}

/// Matches `freq` against a single pinned note, inclusive of the window edges.
pub fn resolve_manual(freq: f32, note: &TargetNote) -> ResolvedMatch {
    if note.contains(freq) {
        ResolvedMatch::from_note(note, freq, MatchKind::Window)
    } else {
        ResolvedMatch::Unresolved
    }
}

/// Searches the whole set.
///
/// Overlapping windows go to the closest reference; equal distances keep the
/// lower id. Without a containing window the closest reference wins under the
/// same tie-break. Only an empty set is unresolved.
pub fn resolve_auto(freq: f32, targets: &TargetNoteSet) -> ResolvedMatch {
    let containing = closest(targets.iter().filter(|note| note.contains(freq)), freq);
    if let Some(note) = containing {
        return ResolvedMatch::from_note(note, freq, MatchKind::Window);
    }
    match closest(targets.iter(), freq) {
        Some(note) => ResolvedMatch::from_note(note, freq, MatchKind::Nearest),
        None => ResolvedMatch::Unresolved,
    }
}

fn closest<'a>(notes: impl Iterator<Item = &'a TargetNote>, freq: f32) -> Option<&'a TargetNote> {
    // Ties keep the earlier (lower id) note.
    notes.fold(None, |best: Option<&TargetNote>, note| match best {
        Some(current) if current.distance(freq) <= note.distance(freq) => Some(current),
        _ => Some(note),
    })
}

//! # Musical Tuning Module
//!
//! Equal-temperament note arithmetic (A4 = 440 Hz, semitone ratio 2^(1/12))
//! and cent deviation measurement.
//!
//! ## Features
//! - 88-key note table (A0 to C8)
//! - Note name parsing (`A2`, `C#3`, `Bb4`)
//! - Cent deviation between two frequencies

use once_cell::sync::Lazy;

use crate::error::{Result, TunerError};

/// Concert pitch of A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
const A4_MIDI: i32 = 69;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Statically computed notes for the standard 88-key range (A0 to C8).
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
    ];
    (0..88)
        .map(|i| {
            // A0 is MIDI note 21; A4 is the 49th key.
            let frequency = midi_to_frequency(21 + i as i32);
            // The octave number changes at C, three keys above each A.
            let octave = (i + 9) / 12;
            Note {
                name: format!("{}{}", NOTE_NAMES[i % 12], octave),
                frequency,
            }
        })
        .collect()
});

/// All 88 notes from A0 to C8, lowest first.
pub fn keyboard_notes() -> &'static [Note] {
    &NOTES
}

/// Equal-temperament frequency of a MIDI note number.
pub fn midi_to_frequency(midi: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Parses a note name into its MIDI note number.
///
/// Accepts a letter `A`-`G` (either case), an optional `#` or `b`, and an
/// octave number, e.g. `E2`, `C#3`, `Bb4`, `A-1`.
pub fn parse_note_name(name: &str) -> Result<i32> {
    let invalid = || TunerError::InvalidNoteName(name.to_string());
    let mut chars = name.chars();

    let pitch_class = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
        (1, octave)
    } else if let Some(octave) = rest.strip_prefix('b') {
        (-1, octave)
    } else {
        (0, rest)
    };

    let octave: i32 = octave.parse().map_err(|_| invalid())?;
    Ok(12 * (octave + 1) + pitch_class + accidental)
}

/// Equal-temperament frequency of a named note.
pub fn note_frequency(name: &str) -> Result<f32> {
    parse_note_name(name).map(midi_to_frequency)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// Both frequencies must be positive; the pipeline only calls this with
/// estimator output, which always is.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Checked form of [`calculate_cents_deviation`].
pub fn cents_between(freq: f32, target_freq: f32) -> Result<f32> {
    if freq > 0.0 && target_freq > 0.0 && freq.is_finite() && target_freq.is_finite() {
        Ok(calculate_cents_deviation(freq, target_freq))
    } else {
        Err(TunerError::NonPositiveFrequency {
            current: freq,
            reference: target_freq,
        })
    }
}

/// Scales `freq` by a signed interval in cents.
pub fn offset_by_cents(freq: f32, cents: f32) -> f32 {
    freq * 2.0_f32.powf(cents / 1200.0)
}

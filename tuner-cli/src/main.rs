//! # String Tuner - Headless Front End
//!
//! Runs the tuning core against the default microphone and logs one line per
//! analysed frame, plus a line when a note is confirmed in tune.
//!
//! ## Architecture
//! - **Audio callback**: CPAL driver thread slicing input into frames
//! - **Communication**: bounded crossbeam channel, frames dropped when full
//! - **Main loop**: owns the `TuningSession` and is its only writer
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::StreamTrait;
use std::path::PathBuf;
use std::time::Instant;
use string_tuner_core::{
    FrameReport, PitchReading, TargetNoteSet, TunerConfig, TuningSession, audio,
};
use tracing_subscriber::EnvFilter;

/// Frames buffered between the audio callback and the analysis loop.
const FRAME_QUEUE_DEPTH: usize = 4;

/// Monophonic instrument tuner
#[derive(Debug, Parser)]
#[command(name = "string-tuner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file overriding the default tuner configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated notes to tune against
    #[arg(short, long, value_delimiter = ',', default_value = "E2,A2,D3,G3,B3,E4")]
    notes: Vec<String>,

    /// Match any note from A0 to C8 instead of a fixed set
    #[arg(long, conflicts_with = "notes")]
    chromatic: bool,

    /// Half-width of each acceptance window in cents [default: 100, or 50 with --chromatic]
    #[arg(short, long)]
    window_cents: Option<f32>,

    /// Pin a single note (manual mode) instead of searching the whole set
    #[arg(short, long)]
    manual: Option<String>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TunerConfig::default(),
    };

    let targets = build_targets(&cli)?;
    tracing::info!(notes = targets.len(), "target set ready");

    let buffer_size = config.buffer_size;
    let mut session = TuningSession::new(config, targets)?;
    if let Some(id) = &cli.manual {
        session.select_manual(id)?;
        tracing::info!(note = %id, "manual mode");
    }

    let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
    let (stream, sample_rate) =
        audio::start_audio_capture(frame_tx, buffer_size).context("starting audio capture")?;
    tracing::info!(sample_rate, "listening");

    let mut last_frame: Option<Instant> = None;
    let mut processed = 0u64;
    while let Ok(frame) = frame_rx.recv() {
        let now = Instant::now();
        let dt_ms = match last_frame {
            Some(previous) => now.duration_since(previous).as_secs_f32() * 1000.0,
            None => frame.duration_ms(),
        };
        last_frame = Some(now);

        let report = session.process_frame(&frame, dt_ms)?;
        log_report(&report);

        processed += 1;
        if cli.frames.is_some_and(|limit| processed >= limit) {
            break;
        }
    }

    session.stop();
    if let Err(e) = stream.pause() {
        tracing::warn!(%e, "error pausing stream");
    }
    tracing::info!(processed, "stopped");
    Ok(())
}

fn build_targets(cli: &Cli) -> Result<TargetNoteSet> {
    let targets = if cli.chromatic {
        TargetNoteSet::chromatic(cli.window_cents.unwrap_or(50.0))?
    } else {
        TargetNoteSet::from_note_names(&cli.notes, cli.window_cents.unwrap_or(100.0))?
    };
    Ok(targets)
}

fn log_report(report: &FrameReport) {
    match report.pitch {
        PitchReading::Silent => tracing::debug!(rms = report.rms, "too quiet"),
        PitchReading::NoPitch => tracing::debug!(rms = report.rms, "no pitch"),
        PitchReading::Pitch(_) => tracing::info!("{}", describe(report)),
    }
    if report.confirmed {
        if let Some(note) = report.resolved.target_id() {
            tracing::info!(note, "in tune");
        }
    }
}

/// One-line summary of a frame with a pitch.
fn describe(report: &FrameReport) -> String {
    let freq = report.pitch.frequency().unwrap_or_default();
    match (report.resolved.target(), report.cents) {
        (Some(target), Some(cents)) => format!(
            "{freq:7.2} Hz  {:<4} {cents:+6.1} cents  {:>3.0}%  {:?}",
            target.target_id,
            report.progress * 100.0,
            report.phase
        ),
        _ => format!("{freq:7.2} Hz  --"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use string_tuner_core::{
        ResolvedMatch, StabilityPhase, StabilityState,
        resolver::{MatchKind, ResolvedTarget},
    };

    fn report(resolved: ResolvedMatch, cents: Option<f32>) -> FrameReport {
        FrameReport {
            rms: 0.2,
            pitch: PitchReading::Pitch(110.5),
            resolved,
            cents,
            stability: StabilityState::default(),
            progress: 0.25,
            phase: StabilityPhase::Locked,
            confirmed: false,
        }
    }

    #[test]
    fn describes_resolved_frame() {
        let resolved = ResolvedMatch::Matched(ResolvedTarget {
            target_id: "A2".into(),
            reference_freq: 110.0,
            cents: 7.86,
            kind: MatchKind::Window,
        });
        let line = describe(&report(resolved, Some(7.86)));
        assert_eq!(line, " 110.50 Hz  A2     +7.9 cents   25%  Locked");
    }

    #[test]
    fn describes_unresolved_frame() {
        assert_eq!(describe(&report(ResolvedMatch::Unresolved, None)), " 110.50 Hz  --");
    }

    #[test]
    fn parses_note_list_and_manual_pin() {
        let cli = Cli::try_parse_from(["string-tuner", "--notes", "D2,A2,D3", "--manual", "D2"]).unwrap();
        assert_eq!(cli.notes, vec!["D2", "A2", "D3"]);
        assert_eq!(cli.manual.as_deref(), Some("D2"));
        assert_eq!(build_targets(&cli).unwrap().len(), 3);
    }

    #[test]
    fn chromatic_conflicts_with_explicit_notes() {
        assert!(Cli::try_parse_from(["string-tuner", "--chromatic", "--notes", "E2"]).is_err());
        let cli = Cli::try_parse_from(["string-tuner", "--chromatic"]).unwrap();
        assert_eq!(build_targets(&cli).unwrap().len(), 88);
    }
}

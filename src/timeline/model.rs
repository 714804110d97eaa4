//! Normalized timeline data model.
//!
//! Everything downstream of ingestion works on these types; the source
//! document's own resolution and layout never leak past this boundary.

use crate::pitch::Step;

/// A pitched note's spelling as encoded in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    /// Diatonic letter.
    pub step: Step,
    /// Accidental in whole semitones. Fractional encodings are rounded to
    /// the nearest integer during parsing.
    pub alter: i32,
    /// Octave number, MIDI convention (C4 = middle C).
    pub octave: i32,
}

/// One note or rest on the canonical tick grid.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Onset position in canonical ticks.
    pub tick: u64,
    /// Length in canonical ticks. At least 1 for any sounding event.
    pub duration_ticks: u64,
    /// Pitch spelling; `None` marks a rest.
    pub pitch: Option<Pitch>,
    /// Source voice number. Provenance only, not used for scheduling order.
    pub voice: u8,
    /// Source staff number. Provenance only.
    pub staff: u8,
    /// Normalized loudness in [0, 1].
    pub velocity: f32,
}

impl NoteEvent {
    /// Whether this event is a rest.
    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

/// A tempo override taking effect at a tick and holding until the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    /// Canonical tick at which the new tempo applies.
    pub tick: u64,
    /// Tempo in BPM, clamped to the playable range.
    pub bpm: f64,
}

/// The normalized output of score ingestion.
///
/// Built once per score load and never mutated in place; a new document
/// means a new `ScoreTimeline`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTimeline {
    /// Canonical grid resolution in ticks per quarter note.
    pub ticks_per_quarter: u32,
    /// Initial tempo: the document's first tempo marker, clamped, or the
    /// configured default when the document has none.
    pub base_tempo_bpm: f64,
    /// All events, ascending by tick, rests before notes at equal tick.
    pub events: Vec<NoteEvent>,
    /// Strictly ascending, deduplicated onset ticks across all events.
    pub onset_ticks: Vec<u64>,
    /// Tempo markers after the first, in tick order.
    pub tempo_changes: Vec<TempoChange>,
}

impl ScoreTimeline {
    /// Tempo in effect at a given tick: the base tempo overridden by the
    /// latest tempo change at or before `tick`.
    pub fn tempo_at(&self, tick: u64) -> f64 {
        self.tempo_changes
            .iter()
            .take_while(|change| change.tick <= tick)
            .last()
            .map(|change| change.bpm)
            .unwrap_or(self.base_tempo_bpm)
    }

    /// Converts a canonical tick count into wall-clock seconds at a tempo.
    pub fn ticks_to_secs(&self, ticks: u64, bpm: f64) -> f64 {
        ticks as f64 / self.ticks_per_quarter as f64 * 60.0 / bpm
    }
}

//! Pure schedule computation.
//!
//! Converts a normalized timeline plus a transpose offset into the flat
//! note-on plan the clock callbacks are built from. Keeping this step free
//! of clock and tone handles makes rebuild idempotence directly testable.

use crate::pitch::frequency_hz;
use crate::timeline::ScoreTimeline;

/// One scheduled note trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteOn {
    /// Canonical onset tick.
    pub tick: u64,
    /// Resolved frequency after transposition.
    pub frequency_hz: f64,
    /// Sounding length in wall-clock seconds at the tempo in effect at
    /// the onset tick.
    pub duration_secs: f64,
    /// Normalized loudness in [0, 1].
    pub velocity: f32,
}

/// Computes the note-on plan for a timeline at a transpose offset.
///
/// Rest events occupy timeline positions but produce no entries here; the
/// visual subsystem still sees their onsets through
/// [`ScoreTimeline::onset_ticks`].
pub fn schedule_entries(timeline: &ScoreTimeline, transpose_semitones: i32) -> Vec<NoteOn> {
    timeline
        .events
        .iter()
        .filter_map(|event| {
            let pitch = event.pitch.as_ref()?;
            let bpm = timeline.tempo_at(event.tick);
            Some(NoteOn {
                tick: event.tick,
                frequency_hz: frequency_hz(
                    pitch.step,
                    pitch.alter,
                    pitch.octave,
                    transpose_semitones,
                ),
                duration_secs: timeline.ticks_to_secs(event.duration_ticks, bpm),
                velocity: event.velocity,
            })
        })
        .collect()
}

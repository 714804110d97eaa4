//! Engine configuration.
//!
//! All tunables an embedder may want to override live here, including the
//! default transpose offset. There is no process-wide fallback: every
//! [`ScoreEngine`](crate::ScoreEngine) carries its own copy of this struct.

use serde::{Deserialize, Serialize};

/// Canonical tick resolution (ticks per quarter note).
pub const DEFAULT_TICKS_PER_QUARTER: u32 = 960;

/// Slowest playable tempo in BPM.
pub const MIN_TEMPO_BPM: f64 = 20.0;

/// Fastest playable tempo in BPM.
pub const MAX_TEMPO_BPM: f64 = 300.0;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY_HZ: f64 = 440.0;

/// Engine configuration, one copy per open score view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Canonical tick grid resolution, applied regardless of the document's
    /// own division unit.
    pub ticks_per_quarter: u32,
    /// Tempo used when the document carries no tempo marker.
    pub default_tempo_bpm: f64,
    /// Transpose offset applied when no explicit offset has been requested.
    pub default_transpose: i32,
    /// Note loudness in [0, 1] when the document does not specify one.
    pub default_velocity: f32,
    /// Horizontal distance in surface pixels within which rendered note
    /// groups on the same system collapse into one visual column.
    pub column_tolerance_px: f32,
    /// Margin kept between the playhead indicator and the viewport edge
    /// when auto-scrolling.
    pub scroll_margin_px: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ticks_per_quarter: DEFAULT_TICKS_PER_QUARTER,
            default_tempo_bpm: 100.0,
            default_transpose: 0,
            default_velocity: 0.85,
            column_tolerance_px: 6.0,
            scroll_margin_px: 48.0,
        }
    }
}

/// Clamps a tempo to the playable range.
pub fn clamp_tempo(bpm: f64) -> f64 {
    bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM)
}

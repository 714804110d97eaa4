//! Score ingestion and timeline normalization.
//!
//! Turns one interchange-format score document into a flat, time-ordered
//! event list on the canonical tick grid. Built once per score load;
//! transposition rebuilds downstream schedules without ever re-entering
//! this module.

mod model;
mod xml_parser;


pub use model::{NoteEvent, Pitch, ScoreTimeline, TempoChange};

use crate::config::PlaybackConfig;
use crate::error::Result;

/// Ingests score markup into a normalized [`ScoreTimeline`].
///
/// The walker honors per-measure division updates, `<backup>`/`<forward>`
/// cursor moves and `<chord/>` continuations, and rescales every position
/// onto the canonical grid from `config.ticks_per_quarter`.
///
/// # Errors
///
/// - [`EngineError::MalformedDocument`](crate::EngineError::MalformedDocument)
///   when the markup cannot be parsed; log and abort, do not retry.
/// - [`EngineError::EmptyTimeline`](crate::EngineError::EmptyTimeline) when no
///   playable (non-rest) events result; treat as "nothing to play".
pub fn ingest(text: &str, config: &PlaybackConfig) -> Result<ScoreTimeline> {
    xml_parser::parse_document(text, config)
}

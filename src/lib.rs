//! Score playback and transposition synchronization engine.
//!
//! This crate turns a parsed MusicXML-style score into a timed performance
//! against a host-provided audio clock, drives a visual position indicator
//! in lockstep with that audio, supports click-to-seek on the rendered
//! notation, and keeps an independently rendered chord-transposition
//! control in sync with the score's pitch offset.
//!
//! The engine performs no synthesis, no layout and no persistence: sound,
//! rendering and the chord display are capability traits ([`ports`]) the
//! host platform implements. All engine state is in-memory and scoped to
//! one open score view.
//!
//! # Components
//!
//! - [`timeline`] - ingestion of score markup onto a canonical tick grid
//! - [`playback`] - the audio schedule and transport state
//! - [`playhead`] - visual column mapping, playhead advance and seek
//! - [`transpose`] - transpose rebuilds and the chord-tonic bridge
//! - [`ScoreEngine`] - the per-view facade wiring it all together
//!
//! # Quick Start
//!
//! ```ignore
//! use scoresync::{PlaybackConfig, Point, ScoreEngine};
//!
//! // clock, tone, surface, cursor and tonic control are your platform's
//! // adapters implementing the traits in scoresync::ports
//! let mut engine = ScoreEngine::new(
//!     clock,
//!     tone,
//!     surface,
//!     Some(cursor),
//!     Some(tonic_control),
//!     PlaybackConfig::default(),
//! );
//!
//! engine.load_document(&std::fs::read("hymn.mxl")?)?;
//! engine.play()?;
//! engine.set_transpose(2)?;
//! engine.seek_to_screen(Point { x: 312.0, y: 148.0 });
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod pitch;
pub mod playback;
pub mod playhead;
pub mod ports;
pub mod source;
pub mod timeline;
pub mod transpose;

mod engine;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export public API (explicit, no star exports)
pub use config::{PlaybackConfig, DEFAULT_TICKS_PER_QUARTER, MAX_TEMPO_BPM, MIN_TEMPO_BPM};
pub use engine::ScoreEngine;
pub use error::{EngineError, Result};
pub use pitch::{frequency_hz, semitone_from_a4, tonic_distance, Step, Tonic};
pub use playback::{schedule_entries, NoteOn, PlaybackState};
pub use playhead::{DomColumn, Playhead};
pub use ports::{
    AudioClock, ClockHandle, GroupId, NotationSurface, NoteGroup, Point, ScoreSource, StepCursor,
    ToneGenerator, TonicSource,
};
pub use source::{extract_document, fetch_document};
pub use timeline::{ingest, NoteEvent, Pitch, ScoreTimeline, TempoChange};
pub use transpose::{TonalityBridge, TranspositionCoordinator};

//! Audio playback scheduling.
//!
//! Owns the per-view transport state and turns a [`ScoreTimeline`] into
//! live clock callbacks that drive the tone generator. Exactly one schedule
//! is live per [`PlaybackState`]; building a new one always disposes the
//! previous one first.

mod schedule;


pub use schedule::{schedule_entries, NoteOn};

use std::rc::Rc;

use crate::config::{clamp_tempo, PlaybackConfig};
use crate::ports::{ClockHandle, SharedClock, SharedTone};
use crate::timeline::ScoreTimeline;

/// Transport state for one open score view.
///
/// `playing` and `paused` are mutually exclusive; both false means stopped.
/// The scheduled handle sets are owned exclusively by this state and are
/// disposed and replaced wholesale on any rebuild, never partially mutated.
#[derive(Debug)]
pub struct PlaybackState {
    /// Canonical, authoritative pitch offset in semitones. Every other
    /// transpose source is resolved into this value before use.
    pub transpose_semitones: i32,
    /// Current tempo in BPM.
    pub tempo_bpm: f64,
    playing: bool,
    paused: bool,
    audio_handles: Vec<ClockHandle>,
    visual_handles: Vec<ClockHandle>,
}

impl PlaybackState {
    /// Creates a stopped state carrying the configured defaults.
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            transpose_semitones: config.default_transpose,
            tempo_bpm: config.default_tempo_bpm,
            playing: false,
            paused: false,
            audio_handles: Vec::new(),
            visual_handles: Vec::new(),
        }
    }

    /// Whether playback is running.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether playback is paused with a resumable schedule.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether playback is stopped (neither playing nor paused).
    pub fn is_stopped(&self) -> bool {
        !self.playing && !self.paused
    }

    /// Whether a schedule is currently live.
    pub fn has_schedule(&self) -> bool {
        !self.audio_handles.is_empty() || !self.visual_handles.is_empty()
    }

    pub(crate) fn mark_playing(&mut self) {
        self.playing = true;
        self.paused = false;
    }

    pub(crate) fn mark_paused(&mut self) {
        self.playing = false;
        self.paused = true;
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.playing = false;
        self.paused = false;
    }

    /// Installs a new audio schedule, disposing the previous one first.
    pub(crate) fn replace_audio_handles(&mut self, clock: &SharedClock, handles: Vec<ClockHandle>) {
        self.cancel_handles(clock, true, false);
        self.audio_handles = handles;
    }

    /// Installs a new visual schedule, disposing the previous one first.
    pub(crate) fn replace_visual_handles(&mut self, clock: &SharedClock, handles: Vec<ClockHandle>) {
        self.cancel_handles(clock, false, true);
        self.visual_handles = handles;
    }

    /// Synchronously cancels every scheduled callback.
    pub(crate) fn dispose_schedules(&mut self, clock: &SharedClock) {
        self.cancel_handles(clock, true, true);
    }

    fn cancel_handles(&mut self, clock: &SharedClock, audio: bool, visual: bool) {
        let mut clock = clock.borrow_mut();
        if audio {
            for handle in self.audio_handles.drain(..) {
                clock.cancel(handle);
            }
        }
        if visual {
            for handle in self.visual_handles.drain(..) {
                clock.cancel(handle);
            }
        }
    }
}

/// Registers the audio half of a schedule on the clock.
///
/// One callback per note-on, plus a rate-update callback per mid-timeline
/// tempo change. Callback bodies never propagate failures into the clock;
/// a collaborator that cannot be borrowed logs and drops that trigger.
pub(crate) fn build_audio_schedule(
    clock: &SharedClock,
    tone: &SharedTone,
    timeline: &ScoreTimeline,
    transpose_semitones: i32,
) -> Vec<ClockHandle> {
    let entries = schedule_entries(timeline, transpose_semitones);
    let mut handles = Vec::with_capacity(entries.len() + timeline.tempo_changes.len());
    let mut clock_ref = clock.borrow_mut();

    for entry in entries {
        let tone = Rc::clone(tone);
        let NoteOn {
            tick,
            frequency_hz,
            duration_secs,
            velocity,
        } = entry;
        handles.push(clock_ref.schedule_at(
            tick,
            Box::new(move || match tone.try_borrow_mut() {
                Ok(mut tone) => tone.trigger_note(frequency_hz, duration_secs, velocity, 0.0),
                Err(_) => log::warn!("tone generator unavailable; dropped note at tick {tick}"),
            }),
        ));
    }

    for change in &timeline.tempo_changes {
        let clock = Rc::clone(clock);
        let bpm = change.bpm;
        handles.push(clock_ref.schedule_at(
            change.tick,
            Box::new(move || match clock.try_borrow_mut() {
                Ok(mut clock) => clock.set_rate(bpm),
                Err(_) => log::warn!("clock busy; dropped tempo change to {bpm} BPM"),
            }),
        ));
    }

    handles
}

/// Applies a live tempo change: clamps, updates the state and the clock
/// rate. No schedule rebuild happens.
pub(crate) fn apply_tempo(state: &mut PlaybackState, clock: &SharedClock, bpm: f64) {
    let bpm = clamp_tempo(bpm);
    state.tempo_bpm = bpm;
    clock.borrow_mut().set_rate(bpm);
}

//! Mock collaborators shared by the engine tests.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::config::PlaybackConfig;
use crate::engine::ScoreEngine;
use crate::error::Result;
use crate::pitch::Tonic;
use crate::ports::{
    AudioClock, ClockHandle, GroupId, NotationSurface, NoteGroup, Point, ScoreSource, StepCursor,
    ToneGenerator, TonicSource,
};

/// One scheduled mock-clock entry.
pub struct ScheduledEntry {
    pub tick: u64,
    pub handle: ClockHandle,
    pub callback: Option<Box<dyn FnMut()>>,
}

/// Recording clock. Callbacks are drained out of the RefCell before they
/// run, so a callback may re-borrow the clock without panicking.
#[derive(Default)]
pub struct MockClock {
    next_handle: u64,
    pub entries: Vec<ScheduledEntry>,
    pub running: bool,
    pub position: u64,
    pub rate_bpm: f64,
    pub resolution: u32,
    pub cancelled: Vec<ClockHandle>,
    pub start_count: usize,
    pub stop_count: usize,
    pub pause_count: usize,
}

impl MockClock {
    pub fn shared() -> Rc<RefCell<MockClock>> {
        Rc::new(RefCell::new(MockClock::default()))
    }

    /// Ticks with a pending (not cancelled) callback, in schedule order.
    pub fn pending_ticks(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|entry| entry.callback.is_some())
            .map(|entry| entry.tick)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.callback.is_some())
            .count()
    }
}

impl AudioClock for MockClock {
    fn set_resolution(&mut self, ticks_per_quarter: u32) {
        self.resolution = ticks_per_quarter;
    }

    fn schedule_at(&mut self, tick: u64, callback: Box<dyn FnMut()>) -> ClockHandle {
        let handle = ClockHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(ScheduledEntry {
            tick,
            handle,
            callback: Some(callback),
        });
        handle
    }

    fn cancel(&mut self, handle: ClockHandle) {
        self.cancelled.push(handle);
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.handle == handle) {
            entry.callback = None;
        }
    }

    fn start(&mut self) {
        self.running = true;
        self.start_count += 1;
    }

    fn pause(&mut self) {
        self.running = false;
        self.pause_count += 1;
    }

    fn stop(&mut self) {
        self.running = false;
        self.position = 0;
        self.stop_count += 1;
    }

    fn set_position(&mut self, tick: u64) {
        self.position = tick;
    }

    fn set_rate(&mut self, bpm: f64) {
        self.rate_bpm = bpm;
    }
}

/// Fires every pending callback with `tick <= up_to`, in tick order.
///
/// Each callback is moved out of the clock before it runs, matching a real
/// clock that never holds internal locks while dispatching.
pub fn drain_due(clock: &Rc<RefCell<MockClock>>, up_to: u64) {
    loop {
        let next = {
            let mut clock = clock.borrow_mut();
            let due = clock
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.callback.is_some() && entry.tick <= up_to)
                .min_by_key(|(index, entry)| (entry.tick, *index))
                .map(|(index, _)| index);
            due.and_then(|index| {
                let tick = clock.entries[index].tick;
                clock.position = tick;
                clock.entries[index].callback.take().map(|cb| (tick, cb))
            })
        };
        match next {
            Some((_, mut callback)) => callback(),
            None => break,
        }
    }
}

/// Recording tone generator.
#[derive(Default)]
pub struct MockTone {
    pub notes: Vec<(f64, f64, f32, f64)>,
}

impl MockTone {
    pub fn shared() -> Rc<RefCell<MockTone>> {
        Rc::new(RefCell::new(MockTone::default()))
    }
}

impl ToneGenerator for MockTone {
    fn trigger_note(&mut self, frequency_hz: f64, duration_secs: f64, velocity: f32, detune_cents: f64) {
        self.notes.push((frequency_hz, duration_secs, velocity, detune_cents));
    }
}

/// Scripted notation surface.
#[derive(Default)]
pub struct MockSurface {
    pub groups: Vec<NoteGroup>,
    pub screen_offset: Point,
    pub highlighted: HashSet<u64>,
    pub indicator: Option<(f32, f32, f32)>,
    pub scrolls: Vec<(f32, f32, f32)>,
}

impl MockSurface {
    pub fn shared() -> Rc<RefCell<MockSurface>> {
        Rc::new(RefCell::new(MockSurface::default()))
    }

    pub fn with_groups(groups: Vec<NoteGroup>) -> Rc<RefCell<MockSurface>> {
        Rc::new(RefCell::new(MockSurface {
            groups,
            ..MockSurface::default()
        }))
    }
}

impl NotationSurface for MockSurface {
    fn query_note_groups(&self) -> Vec<NoteGroup> {
        self.groups.clone()
    }

    fn to_local(&self, screen: Point) -> Point {
        Point {
            x: screen.x - self.screen_offset.x,
            y: screen.y - self.screen_offset.y,
        }
    }

    fn set_highlight(&mut self, groups: &[GroupId], on: bool) {
        for id in groups {
            if on {
                self.highlighted.insert(id.0);
            } else {
                self.highlighted.remove(&id.0);
            }
        }
    }

    fn place_indicator(&mut self, x: f32, top: f32, bottom: f32) {
        self.indicator = Some((x, top, bottom));
    }

    fn scroll_into_view(&mut self, x: f32, y: f32, margin: f32) {
        self.scrolls.push((x, y, margin));
    }
}

/// Counting step cursor; `position` tracks reset/next calls.
#[derive(Default)]
pub struct MockCursor {
    pub position: usize,
    pub visible: bool,
    pub reset_count: usize,
}

impl MockCursor {
    pub fn shared() -> Rc<RefCell<MockCursor>> {
        Rc::new(RefCell::new(MockCursor::default()))
    }
}

impl StepCursor for MockCursor {
    fn show(&mut self) {
        self.visible = true;
    }

    fn next(&mut self) {
        self.position += 1;
    }

    fn reset(&mut self) {
        self.position = 0;
        self.reset_count += 1;
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}

/// Scripted chord-tonic control.
#[derive(Default)]
pub struct MockTonicControl {
    pub declared_base: Option<Tonic>,
    pub selected: Vec<Tonic>,
}

impl MockTonicControl {
    pub fn shared(base: Option<Tonic>) -> Rc<RefCell<MockTonicControl>> {
        Rc::new(RefCell::new(MockTonicControl {
            declared_base: base,
            selected: Vec::new(),
        }))
    }
}

impl TonicSource for MockTonicControl {
    fn current(&self) -> Option<Tonic> {
        self.declared_base
    }

    fn select(&mut self, tonic: Tonic) {
        self.selected.push(tonic);
    }
}

/// In-memory score source.
pub struct MockSource {
    pub payload: Option<Vec<u8>>,
}

impl ScoreSource for MockSource {
    fn fetch(&mut self, reference: &str) -> Result<Vec<u8>> {
        self.payload.clone().ok_or_else(|| {
            crate::error::EngineError::SourceUnavailable(format!("no payload for '{reference}'"))
        })
    }
}

/// Evenly spaced single-system note groups, one per onset.
pub fn groups_for_columns(count: usize) -> Vec<NoteGroup> {
    (0..count)
        .map(|i| NoteGroup {
            id: GroupId(i as u64),
            x: 100.0 * i as f32,
            y: 10.0,
            width: 20.0,
            height: 30.0,
            system_index: 0,
        })
        .collect()
}

/// A fully wired engine over mock collaborators.
pub struct TestRig {
    pub engine: ScoreEngine,
    pub clock: Rc<RefCell<MockClock>>,
    pub tone: Rc<RefCell<MockTone>>,
    pub surface: Rc<RefCell<MockSurface>>,
    pub cursor: Rc<RefCell<MockCursor>>,
    pub tonic: Rc<RefCell<MockTonicControl>>,
}

impl TestRig {
    pub fn new(groups: Vec<NoteGroup>, base_tonic: Option<Tonic>) -> TestRig {
        let clock = MockClock::shared();
        let tone = MockTone::shared();
        let surface = MockSurface::with_groups(groups);
        let cursor = MockCursor::shared();
        let tonic = MockTonicControl::shared(base_tonic);
        let engine = ScoreEngine::new(
            clock.clone(),
            tone.clone(),
            surface.clone(),
            Some(cursor.clone()),
            Some(tonic.clone()),
            PlaybackConfig::default(),
        );
        TestRig {
            engine,
            clock,
            tone,
            surface,
            cursor,
            tonic,
        }
    }
}

/// A one-part score with two quarter notes (C4, D4) at divisions 480.
pub const TWO_NOTE_SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <part id="P1">
    <measure number="1">
      <attributes><divisions>480</divisions></attributes>
      <direction><sound tempo="120"/></direction>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>480</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>480</duration></note>
    </measure>
  </part>
</score-partwise>"#;

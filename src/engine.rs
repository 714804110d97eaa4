//! The per-view engine facade.
//!
//! One `ScoreEngine` lives per open score view. It owns the playback state,
//! the playhead and the coordinator, and drives the host-provided clock,
//! tone generator, notation surface and chord control through their
//! capability traits. All state is transient; dropping the engine disposes
//! every scheduled callback.

use std::rc::Rc;

use crate::config::PlaybackConfig;
use crate::error::{EngineError, Result};
use crate::pitch::Tonic;
use crate::playback::{apply_tempo, PlaybackState};
use crate::playhead::Playhead;
use crate::ports::{
    Point, ScoreSource, SharedClock, SharedCursor, SharedSurface, SharedTone, SharedTonicSource,
};
use crate::source;
use crate::timeline::{self, ScoreTimeline};
use crate::transpose::{rebuild_schedules, RebuildContext, TranspositionCoordinator};

/// Score playback and transposition engine for one open score view.
pub struct ScoreEngine {
    clock: SharedClock,
    tone: SharedTone,
    config: PlaybackConfig,
    timeline: Option<Rc<ScoreTimeline>>,
    state: PlaybackState,
    playhead: Playhead,
    coordinator: TranspositionCoordinator,
}

impl ScoreEngine {
    /// Wires an engine to its collaborators.
    ///
    /// `cursor` and `tonic_source` are optional: without a cursor the
    /// engine runs indicator-line-only, without a tonic control there is
    /// no chord bridge.
    pub fn new(
        clock: SharedClock,
        tone: SharedTone,
        surface: SharedSurface,
        cursor: Option<SharedCursor>,
        tonic_source: Option<SharedTonicSource>,
        config: PlaybackConfig,
    ) -> Self {
        clock.borrow_mut().set_resolution(config.ticks_per_quarter);
        let state = PlaybackState::new(&config);
        let playhead = Playhead::new(surface, cursor, &config);
        Self {
            clock,
            tone,
            timeline: None,
            state,
            playhead,
            coordinator: TranspositionCoordinator::new(tonic_source),
            config,
        }
    }

    /// Loads a score from raw bytes (plain markup or a zip container).
    ///
    /// The previous score is torn down first; on failure the engine keeps
    /// no partial state and playback stays disabled.
    pub fn load_document(&mut self, data: &[u8]) -> Result<()> {
        self.teardown();
        let text = source::extract_document(data)?;
        self.install(timeline::ingest(&text, &self.config)?)
    }

    /// Fetches a score through a [`ScoreSource`] and loads it.
    pub fn load_from(&mut self, src: &mut dyn ScoreSource, reference: &str) -> Result<()> {
        self.teardown();
        let text = source::fetch_document(src, reference)?;
        self.install(timeline::ingest(&text, &self.config)?)
    }

    fn install(&mut self, new_timeline: ScoreTimeline) -> Result<()> {
        self.state = PlaybackState::new(&self.config);
        self.state.tempo_bpm = new_timeline.base_tempo_bpm;
        self.clock.borrow_mut().set_rate(new_timeline.base_tempo_bpm);
        self.timeline = Some(Rc::new(new_timeline));
        self.coordinator.reset_for_load(self.state.transpose_semitones);
        Ok(())
    }

    /// Whether a playable timeline is loaded.
    pub fn can_play(&self) -> bool {
        self.timeline.is_some()
    }

    /// Starts or resumes playback.
    ///
    /// Resuming from pause keeps the live schedule; a cold start (or a
    /// start after stop) rebuilds both schedules from tick 0.
    ///
    /// # Errors
    ///
    /// [`EngineError::EmptyTimeline`] when no score is loaded.
    pub fn play(&mut self) -> Result<()> {
        let timeline = self.timeline.clone().ok_or(EngineError::EmptyTimeline)?;

        if self.state.is_paused() && self.state.has_schedule() {
            self.clock.borrow_mut().start();
            self.state.mark_playing();
            return Ok(());
        }

        let mut ctx = RebuildContext {
            clock: &self.clock,
            tone: &self.tone,
            timeline: &timeline,
            state: &mut self.state,
            playhead: &mut self.playhead,
        };
        rebuild_schedules(&mut ctx);

        {
            let mut clock = self.clock.borrow_mut();
            clock.set_position(0);
            clock.set_rate(self.state.tempo_bpm);
            clock.start();
        }
        self.playhead.show_cursor();
        self.state.mark_playing();
        Ok(())
    }

    /// Halts the clock, keeping the schedule for a later resume.
    pub fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        self.clock.borrow_mut().pause();
        self.state.mark_paused();
    }

    /// Halts the clock, resets the position to tick 0 and discards the
    /// schedule; the next [`play`](Self::play) rebuilds.
    pub fn stop(&mut self) {
        self.clock.borrow_mut().stop();
        self.state.dispose_schedules(&self.clock);
        self.playhead.clear_highlight();
        self.playhead.hide_cursor();
        self.state.mark_stopped();
    }

    /// Live tempo change; updates the clock rate without a rebuild.
    pub fn set_tempo(&mut self, bpm: f64) {
        apply_tempo(&mut self.state, &self.clock, bpm);
    }

    /// Requests a transpose-offset change.
    ///
    /// # Errors
    ///
    /// [`EngineError::EmptyTimeline`] when no score is loaded.
    pub fn set_transpose(&mut self, semitones: i32) -> Result<()> {
        let timeline = self.timeline.clone().ok_or(EngineError::EmptyTimeline)?;
        let ctx = RebuildContext {
            clock: &self.clock,
            tone: &self.tone,
            timeline: &timeline,
            state: &mut self.state,
            playhead: &mut self.playhead,
        };
        self.coordinator.request_transpose(ctx, semitones)
    }

    /// Forwards a user tonic selection from the chord control.
    pub fn on_tonic_selected(&mut self, tonic: Tonic) -> Result<()> {
        let Some(timeline) = self.timeline.clone() else {
            log::debug!("tonic selection before a score is loaded; ignored");
            return Ok(());
        };
        let ctx = RebuildContext {
            clock: &self.clock,
            tone: &self.tone,
            timeline: &timeline,
            state: &mut self.state,
            playhead: &mut self.playhead,
        };
        self.coordinator.on_tonic_selected(ctx, tonic)
    }

    /// Seeks to the column nearest a pointer position.
    ///
    /// Atomic with respect to the clock: pause, reposition, resume only if
    /// playback was running. A surface without columns makes this a no-op.
    pub fn seek_to_screen(&mut self, screen: Point) {
        let Some(timeline) = self.timeline.clone() else {
            return;
        };
        let Some(tick) = self.playhead.seek_target(screen) else {
            log::debug!("seek ignored; no visual columns available");
            return;
        };

        let was_playing = self.state.is_playing();
        let mut clock = self.clock.borrow_mut();
        clock.pause();
        clock.set_position(tick);
        drop(clock);

        self.playhead.sync_cursor(&timeline.onset_ticks, tick);

        if was_playing {
            self.clock.borrow_mut().start();
        }
    }

    /// The canonical transpose offset.
    pub fn transpose(&self) -> i32 {
        self.state.transpose_semitones
    }

    /// The current tempo in BPM.
    pub fn tempo_bpm(&self) -> f64 {
        self.state.tempo_bpm
    }

    /// Whether playback is running.
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Whether playback is paused.
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Whether playback is stopped.
    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    /// The loaded timeline, if any.
    pub fn timeline(&self) -> Option<&ScoreTimeline> {
        self.timeline.as_deref()
    }

    fn teardown(&mut self) {
        self.clock.borrow_mut().stop();
        self.state.dispose_schedules(&self.clock);
        self.playhead.reset();
        self.playhead.hide_cursor();
        self.state.mark_stopped();
        self.timeline = None;
    }
}

impl Drop for ScoreEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        drain_due, groups_for_columns, MockSource, TestRig, TWO_NOTE_SCORE,
    };

    const RESTS_ONLY: &str = r#"<score-partwise>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><rest/><duration>4</duration></note>
    </measure>
  </part>
</score-partwise>"#;

    #[test]
    fn load_enables_playback_and_applies_document_tempo() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        assert!(!rig.engine.can_play());

        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();

        assert!(rig.engine.can_play());
        assert_eq!(rig.engine.tempo_bpm(), 120.0);
        let clock = rig.clock.borrow();
        assert_eq!(clock.rate_bpm, 120.0);
        assert_eq!(clock.resolution, 960);
    }

    #[test]
    fn rests_only_score_keeps_playback_disabled() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        let result = rig.engine.load_document(RESTS_ONLY.as_bytes());
        assert!(matches!(result, Err(EngineError::EmptyTimeline)));
        assert!(!rig.engine.can_play());
        assert!(rig.engine.play().is_err());
    }

    #[test]
    fn malformed_document_leaves_no_partial_state() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
        rig.engine.play().unwrap();

        let broken = b"<score-partwise><part></measure></score-partwise>";
        let result = rig.engine.load_document(broken);
        assert!(matches!(result, Err(EngineError::MalformedDocument(_))));
        assert!(!rig.engine.can_play());
        assert_eq!(rig.clock.borrow().pending_count(), 0);
    }

    #[test]
    fn load_from_source_failure_aborts_cleanly() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        let mut source = MockSource { payload: None };
        let result = rig.engine.load_from(&mut source, "scores/42");
        assert!(matches!(result, Err(EngineError::SourceUnavailable(_))));
        assert!(!rig.engine.can_play());
    }

    #[test]
    fn cold_play_builds_both_schedules_and_starts() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();

        rig.engine.play().unwrap();

        let clock = rig.clock.borrow();
        assert!(clock.running);
        assert_eq!(clock.position, 0);
        // two note-ons plus two playhead advances
        assert_eq!(clock.pending_count(), 4);
        drop(clock);
        assert!(rig.cursor.borrow().visible);
        assert!(rig.engine.is_playing());
    }

    #[test]
    fn resume_from_pause_keeps_the_schedule() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
        rig.engine.play().unwrap();
        drain_due(&rig.clock, 0);

        rig.engine.pause();
        assert!(!rig.clock.borrow().running);
        assert!(rig.engine.is_paused());
        let pending = rig.clock.borrow().pending_count();

        rig.engine.play().unwrap();
        let clock = rig.clock.borrow();
        assert!(clock.running);
        assert_eq!(clock.pending_count(), pending, "resume does not rebuild");
        assert!(clock.cancelled.is_empty());
    }

    #[test]
    fn stop_discards_the_schedule_and_rewinds() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
        rig.engine.play().unwrap();

        rig.engine.stop();

        {
            let clock = rig.clock.borrow();
            assert!(!clock.running);
            assert_eq!(clock.position, 0);
            assert_eq!(clock.pending_count(), 0);
        }
        assert!(rig.engine.is_stopped());
        assert!(!rig.cursor.borrow().visible);

        // next play rebuilds from scratch
        rig.engine.play().unwrap();
        assert_eq!(rig.clock.borrow().pending_count(), 4);
    }

    #[test]
    fn seek_repositions_and_resumes_only_if_playing() {
        let mut rig = TestRig::new(groups_for_columns(2), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
        rig.engine.play().unwrap();

        // click on the second column (center x = 110)
        rig.engine.seek_to_screen(Point { x: 111.0, y: 20.0 });

        {
            let clock = rig.clock.borrow();
            assert_eq!(clock.position, 960);
            assert!(clock.running, "was playing, so the clock resumes");
            assert_eq!(clock.pause_count, 1);
        }
        assert_eq!(rig.cursor.borrow().position, 1);

        rig.engine.pause();
        rig.engine.seek_to_screen(Point { x: 5.0, y: 20.0 });
        let clock = rig.clock.borrow();
        assert_eq!(clock.position, 0);
        assert!(!clock.running, "paused playback stays paused after a seek");
    }

    #[test]
    fn seek_without_columns_is_a_noop() {
        let mut rig = TestRig::new(Vec::new(), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
        rig.engine.play().unwrap();

        rig.engine.seek_to_screen(Point { x: 50.0, y: 20.0 });

        let clock = rig.clock.borrow();
        assert_eq!(clock.position, 0);
        assert_eq!(clock.pause_count, 0);
    }

    #[test]
    fn bare_surface_degrades_to_audio_only() {
        let mut rig = TestRig::new(Vec::new(), None);
        rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
        rig.engine.play().unwrap();

        let clock = rig.clock.borrow();
        assert!(clock.running);
        // audio callbacks only, no playhead advances
        assert_eq!(clock.pending_count(), 2);
    }

    #[test]
    fn drop_disposes_scheduled_callbacks() {
        let rig = {
            let mut rig = TestRig::new(groups_for_columns(2), None);
            rig.engine.load_document(TWO_NOTE_SCORE.as_bytes()).unwrap();
            rig.engine.play().unwrap();
            rig
        };
        let clock = rig.clock.clone();
        drop(rig);
        assert_eq!(clock.borrow().pending_count(), 0);
    }
}

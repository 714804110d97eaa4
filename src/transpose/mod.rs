//! Transposition coordination.
//!
//! Owns the rebuild state machine and the chord-control bridge. A transpose
//! change never re-parses the document: it recomputes both schedules from
//! the existing timeline at the new offset, then restarts playback from
//! tick 0 if it was running.

mod bridge;


pub use bridge::TonalityBridge;

use std::rc::Rc;

use crate::error::Result;
use crate::pitch::Tonic;
use crate::playback::{build_audio_schedule, PlaybackState};
use crate::playhead::Playhead;
use crate::ports::{SharedClock, SharedTone, SharedTonicSource};
use crate::timeline::ScoreTimeline;

/// Rebuild lifecycle; only one rebuild may be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinatorState {
    Idle,
    Rebuilding,
}

/// Everything a schedule rebuild needs to borrow, bundled so the borrow
/// set stays explicit at each call site.
pub(crate) struct RebuildContext<'a> {
    pub clock: &'a SharedClock,
    pub tone: &'a SharedTone,
    pub timeline: &'a Rc<ScoreTimeline>,
    pub state: &'a mut PlaybackState,
    pub playhead: &'a mut Playhead,
}

/// Coordinates transpose changes and the chord-tonic bridge for one view.
pub struct TranspositionCoordinator {
    state: CoordinatorState,
    bridge: Option<TonalityBridge>,
}

impl TranspositionCoordinator {
    /// Creates a coordinator; without a tonic control there is no bridge
    /// and offset changes stay score-local.
    pub fn new(tonic_source: Option<SharedTonicSource>) -> Self {
        Self {
            state: CoordinatorState::Idle,
            bridge: tonic_source.map(TonalityBridge::new),
        }
    }

    /// Re-arms the bridge baseline for a freshly loaded score and attempts
    /// an immediate link at the given offset.
    pub(crate) fn reset_for_load(&mut self, current_offset: i32) {
        if let Some(bridge) = &mut self.bridge {
            bridge.reset_for_load();
            bridge.try_capture_base(current_offset);
        }
    }

    /// Applies a transpose-offset change: stop, rebuild both schedules at
    /// the new offset against the existing timeline, restart from tick 0
    /// if playback was running, then notify the bridge.
    pub(crate) fn request_transpose(&mut self, mut ctx: RebuildContext<'_>, offset: i32) -> Result<()> {
        if self.state == CoordinatorState::Rebuilding {
            log::warn!("transpose request to {offset} dropped; rebuild already in flight");
            return Ok(());
        }
        self.state = CoordinatorState::Rebuilding;

        let was_playing = ctx.state.is_playing();
        ctx.clock.borrow_mut().stop();
        ctx.state.mark_stopped();
        ctx.state.transpose_semitones = offset;

        rebuild_schedules(&mut ctx);

        if was_playing {
            // restart-from-zero: position is not preserved across a transpose
            let mut clock = ctx.clock.borrow_mut();
            clock.set_position(0);
            clock.set_rate(ctx.state.tempo_bpm);
            clock.start();
            drop(clock);
            ctx.state.mark_playing();
            ctx.playhead.show_cursor();
        }

        self.state = CoordinatorState::Idle;

        if let Some(bridge) = &mut self.bridge {
            bridge.on_score_offset_changed(offset);
        }
        Ok(())
    }

    /// Handles a user tonic selection reported by the chord control.
    ///
    /// Unlinked or bridge-less coordinators ignore the event.
    pub(crate) fn on_tonic_selected(&mut self, ctx: RebuildContext<'_>, tonic: Tonic) -> Result<()> {
        let Some(bridge) = &mut self.bridge else {
            return Ok(());
        };
        bridge.try_capture_base(ctx.state.transpose_semitones);
        match bridge.on_external_tonic(tonic) {
            Some(offset) => self.request_transpose(ctx, offset),
            None => {
                log::debug!("tonic selection ignored; bridge not linked");
                Ok(())
            }
        }
    }

}

/// Rebuilds the audio and visual schedules from the timeline at the
/// state's current offset. Previous handles are always disposed before
/// anything new is registered, so the clock never carries two schedules;
/// a renderer that is not laid out yet degrades to audio-only.
pub(crate) fn rebuild_schedules(ctx: &mut RebuildContext<'_>) {
    ctx.state.dispose_schedules(ctx.clock);

    let audio = build_audio_schedule(
        ctx.clock,
        ctx.tone,
        ctx.timeline,
        ctx.state.transpose_semitones,
    );
    ctx.state.replace_audio_handles(ctx.clock, audio);

    match ctx.playhead.rebuild(&ctx.timeline.onset_ticks) {
        Ok(()) => {
            let visual = ctx.playhead.schedule_advance(ctx.clock);
            ctx.state.replace_visual_handles(ctx.clock, visual);
        }
        Err(err) => {
            log::warn!("visual playhead unavailable: {err}");
            ctx.state.replace_visual_handles(ctx.clock, Vec::new());
        }
    }
}

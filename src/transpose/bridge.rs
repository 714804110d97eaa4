//! Bridge between the score's pitch offset and the chord-tonic control.
//!
//! The two subsystems render independently; this bridge keeps them
//! consistent in both directions while preventing feedback loops with a
//! one-shot suppression flag. The flag is set immediately before the
//! guarded request and consumed exactly once, in the same event turn.

use crate::pitch::{tonic_distance, Tonic};
use crate::ports::SharedTonicSource;

/// Bidirectional tonic/offset bridge state.
pub struct TonalityBridge {
    source: SharedTonicSource,
    /// Pitch offset the score had when the bridge first linked; captured
    /// exactly once per score load.
    base_score_offset: Option<i32>,
    /// The chord display's declared base tonic at link time.
    base_tonic: Option<Tonic>,
    /// One-shot guard against echoing a locally triggered change back to
    /// the chord control.
    suppress_next_external_event: bool,
}

impl TonalityBridge {
    /// Creates an unlinked bridge over a tonic control.
    pub fn new(source: SharedTonicSource) -> Self {
        Self {
            source,
            base_score_offset: None,
            base_tonic: None,
            suppress_next_external_event: false,
        }
    }

    /// Forgets the captured baseline; the next successful read re-links.
    /// Called on every score load.
    pub fn reset_for_load(&mut self) {
        self.base_score_offset = None;
        self.base_tonic = None;
        self.suppress_next_external_event = false;
    }

    /// Attempts to link: reads the control's declared base tonic and, on
    /// the first success after a load, records it together with the
    /// score's current offset. Returns whether the bridge is linked.
    pub fn try_capture_base(&mut self, current_score_offset: i32) -> bool {
        if self.base_tonic.is_some() {
            return true;
        }
        match self.source.borrow().current() {
            Some(tonic) => {
                self.base_tonic = Some(tonic);
                self.base_score_offset = Some(current_score_offset);
                true
            }
            None => false,
        }
    }

    /// Chord→Score: the user picked a new tonic in the chord control.
    ///
    /// Returns the transpose offset to request, with the suppression flag
    /// already armed so the resulting score-side change does not echo back.
    /// Returns `None` while unlinked.
    pub fn on_external_tonic(&mut self, tonic: Tonic) -> Option<i32> {
        let base_tonic = self.base_tonic?;
        let base_offset = self.base_score_offset?;
        let distance = tonic_distance(base_tonic, tonic);
        self.suppress_next_external_event = true;
        Some(base_offset + distance)
    }

    /// Score→Chord: the score's offset changed through some other path.
    ///
    /// Consumes a pending suppression instead of selecting, otherwise maps
    /// the offset delta back to a tonic relative to the declared base and
    /// selects it programmatically.
    pub fn on_score_offset_changed(&mut self, new_offset: i32) {
        if self.suppress_next_external_event {
            self.suppress_next_external_event = false;
            return;
        }
        let (Some(base_tonic), Some(base_offset)) = (self.base_tonic, self.base_score_offset)
        else {
            // first linkable moment: treat this offset as the baseline
            if self.try_capture_base(new_offset) {
                log::debug!("tonality bridge linked at offset {new_offset}");
            }
            return;
        };
        let distance = new_offset - base_offset;
        let target = base_tonic.shifted(distance);
        self.source.borrow_mut().select(target);
    }

    #[cfg(test)]
    pub(crate) fn base_score_offset(&self) -> Option<i32> {
        self.base_score_offset
    }
}

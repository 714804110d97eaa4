//! Visual playhead and click-to-seek.
//!
//! Keeps a position indicator in lockstep with the audio clock by scheduling
//! one lightweight callback per mapped onset tick, and translates pointer
//! positions back into ticks for seeking. Everything here is cosmetic:
//! when the renderer has not laid out yet, the subsystem degrades to a
//! no-op instead of failing playback.

mod columns;


pub use columns::{cluster_columns, column_tick_map, nearest_column, nearest_onset_index, DomColumn};

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::PlaybackConfig;
use crate::error::{EngineError, Result};
use crate::ports::{ClockHandle, Point, SharedClock, SharedCursor, SharedSurface};

/// Column data shared with the scheduled advance callbacks.
///
/// Active-column bookkeeping lives here so highlight clearing stays correct
/// across seeks and out-of-order interaction.
#[derive(Debug, Default)]
struct Frame {
    columns: Vec<DomColumn>,
    column_ticks: Vec<u64>,
    active: Option<usize>,
}

/// The visual playhead for one score view.
pub struct Playhead {
    surface: SharedSurface,
    cursor: Option<SharedCursor>,
    frame: Rc<RefCell<Frame>>,
    column_tolerance_px: f32,
    scroll_margin_px: f32,
}

impl Playhead {
    /// Creates a playhead over a notation surface.
    ///
    /// `cursor` is the renderer's optional step cursor; without it the
    /// engine runs in indicator-line-only mode.
    pub fn new(surface: SharedSurface, cursor: Option<SharedCursor>, config: &PlaybackConfig) -> Self {
        Self {
            surface,
            cursor,
            frame: Rc::new(RefCell::new(Frame::default())),
            column_tolerance_px: config.column_tolerance_px,
            scroll_margin_px: config.scroll_margin_px,
        }
    }

    /// Rescans the rendered surface and rebuilds the column/tick mapping.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderNotReady`] when no note groups can be
    /// discovered; callers log and continue without visuals.
    pub fn rebuild(&mut self, onset_ticks: &[u64]) -> Result<()> {
        self.clear_highlight();

        let groups = self.surface.borrow().query_note_groups();
        if groups.is_empty() {
            let mut frame = self.frame.borrow_mut();
            *frame = Frame::default();
            return Err(EngineError::RenderNotReady(
                "no note groups discovered".to_string(),
            ));
        }

        let columns = cluster_columns(&groups, self.column_tolerance_px);
        let column_ticks = column_tick_map(columns.len(), onset_ticks);

        let mut frame = self.frame.borrow_mut();
        *frame = Frame {
            columns,
            column_ticks,
            active: None,
        };
        Ok(())
    }

    /// Whether a column mapping is currently available.
    pub fn has_columns(&self) -> bool {
        !self.frame.borrow().columns.is_empty()
    }

    /// Registers one advance callback per mapped column tick.
    ///
    /// The returned handles are owned by the caller's playback state; the
    /// callbacks themselves only touch the shared frame and the surface.
    pub fn schedule_advance(&self, clock: &SharedClock) -> Vec<ClockHandle> {
        let frame = self.frame.borrow();
        let mut clock_ref = clock.borrow_mut();
        let mut handles = Vec::with_capacity(frame.column_ticks.len());

        for (index, tick) in frame.column_ticks.iter().enumerate() {
            let frame = Rc::clone(&self.frame);
            let surface = Rc::clone(&self.surface);
            let margin = self.scroll_margin_px;
            handles.push(clock_ref.schedule_at(
                *tick,
                Box::new(move || {
                    let Ok(mut frame) = frame.try_borrow_mut() else {
                        log::warn!("playhead frame busy; skipping advance");
                        return;
                    };
                    let Ok(mut surface) = surface.try_borrow_mut() else {
                        log::warn!("notation surface busy; skipping advance");
                        return;
                    };
                    advance_to(&mut frame, &mut *surface, index, margin);
                }),
            ));
        }
        handles
    }

    /// Resolves a pointer position to the nearest column's mapped tick.
    ///
    /// Returns `None` when no columns are available (renderer not laid out);
    /// seeking is then a no-op.
    pub fn seek_target(&self, screen: Point) -> Option<u64> {
        let local = self.surface.borrow().to_local(screen);
        let frame = self.frame.borrow();
        let index = nearest_column(&frame.columns, local.x)?;
        frame.column_ticks.get(index).copied()
    }

    /// Moves the step cursor to the onset index nearest to `tick` by
    /// absolute tick distance. No-op without a cursor.
    pub fn sync_cursor(&self, onset_ticks: &[u64], tick: u64) {
        let Some(cursor) = &self.cursor else {
            return;
        };
        if onset_ticks.is_empty() {
            return;
        }
        let index = nearest_onset_index(onset_ticks, tick);
        let mut cursor = cursor.borrow_mut();
        cursor.reset();
        for _ in 0..index {
            cursor.next();
        }
    }

    /// Shows and rewinds the step cursor, if one is attached.
    pub fn show_cursor(&self) {
        if let Some(cursor) = &self.cursor {
            let mut cursor = cursor.borrow_mut();
            cursor.reset();
            cursor.show();
        }
    }

    /// Rewinds and hides the step cursor, if one is attached.
    pub fn hide_cursor(&self) {
        if let Some(cursor) = &self.cursor {
            let mut cursor = cursor.borrow_mut();
            cursor.reset();
            cursor.hide();
        }
    }

    /// Clears the highlight and forgets the column mapping entirely.
    /// Used when the score view is torn down or replaced.
    pub fn reset(&mut self) {
        self.clear_highlight();
        *self.frame.borrow_mut() = Frame::default();
    }

    /// Clears any active column highlight.
    pub fn clear_highlight(&self) {
        let mut frame = self.frame.borrow_mut();
        if let Some(active) = frame.active.take() {
            if let Some(column) = frame.columns.get(active) {
                self.surface.borrow_mut().set_highlight(&column.members, false);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn column_snapshot(&self) -> (Vec<DomColumn>, Vec<u64>) {
        let frame = self.frame.borrow();
        (frame.columns.clone(), frame.column_ticks.clone())
    }
}

/// Advances the highlight, indicator line and viewport to a column.
fn advance_to(
    frame: &mut Frame,
    surface: &mut dyn crate::ports::NotationSurface,
    index: usize,
    margin: f32,
) {
    if let Some(previous) = frame.active {
        if let Some(column) = frame.columns.get(previous) {
            surface.set_highlight(&column.members, false);
        }
    }
    let Some(column) = frame.columns.get(index) else {
        return;
    };
    surface.set_highlight(&column.members, true);
    surface.place_indicator(column.center_x, column.top, column.bottom);
    surface.scroll_into_view(column.center_x, column.top, margin);
    frame.active = Some(index);
}

//! Note-group clustering and tick mapping.
//!
//! The renderer reports individual note-glyph groups; playback wants one
//! position per visual "beat". Groups on the same rendering system whose
//! horizontal centers sit within a small pixel tolerance collapse into a
//! single column.

use crate::ports::{GroupId, NoteGroup};

/// One visual beat position: a cluster of rendered note-glyphs sharing a
/// system and an x-position.
#[derive(Debug, Clone, PartialEq)]
pub struct DomColumn {
    /// Index of the rendering system containing the cluster.
    pub system_index: usize,
    /// Horizontal center in the renderer's local coordinate space; the
    /// running mean of the member centers.
    pub center_x: f32,
    /// Top of the merged vertical span.
    pub top: f32,
    /// Bottom of the merged vertical span.
    pub bottom: f32,
    /// Renderer ids of the member groups.
    pub members: Vec<GroupId>,
}

impl DomColumn {
    fn from_group(group: &NoteGroup) -> Self {
        Self {
            system_index: group.system_index,
            center_x: group.center_x(),
            top: group.y,
            bottom: group.y + group.height,
            members: vec![group.id],
        }
    }

    fn absorb(&mut self, group: &NoteGroup) {
        let n = self.members.len() as f32;
        self.center_x = (self.center_x * n + group.center_x()) / (n + 1.0);
        self.top = self.top.min(group.y);
        self.bottom = self.bottom.max(group.y + group.height);
        self.members.push(group.id);
    }
}

/// Clusters note groups into columns ordered by system, then center.
///
/// Columns within one system end up strictly ordered by `center_x`.
pub fn cluster_columns(groups: &[NoteGroup], tolerance_px: f32) -> Vec<DomColumn> {
    let mut sorted: Vec<&NoteGroup> = groups.iter().collect();
    sorted.sort_by(|a, b| {
        (a.system_index, a.center_x())
            .partial_cmp(&(b.system_index, b.center_x()))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut columns: Vec<DomColumn> = Vec::new();
    for group in sorted {
        match columns.last_mut() {
            Some(last)
                if last.system_index == group.system_index
                    && (group.center_x() - last.center_x).abs() <= tolerance_px =>
            {
                last.absorb(group)
            }
            _ => columns.push(DomColumn::from_group(group)),
        }
    }
    columns
}

/// Maps each column to an onset tick by index.
///
/// When counts differ, the last available onset is repeated for any excess
/// columns (and excess onsets go unmapped). This degrades seek precision in
/// that region rather than failing; the resulting mapping is monotonically
/// non-decreasing either way.
pub fn column_tick_map(column_count: usize, onset_ticks: &[u64]) -> Vec<u64> {
    if onset_ticks.is_empty() {
        return Vec::new();
    }
    (0..column_count)
        .map(|i| onset_ticks[i.min(onset_ticks.len() - 1)])
        .collect()
}

/// Index of the column whose horizontal center is nearest to `x`; ties
/// break toward the first match.
pub fn nearest_column(columns: &[DomColumn], x: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, column) in columns.iter().enumerate() {
        let distance = (column.center_x - x).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// Index into `onset_ticks` nearest to `tick` by absolute distance; ties
/// break toward the earlier onset.
pub fn nearest_onset_index(onset_ticks: &[u64], tick: u64) -> usize {
    let mut best_index = 0;
    let mut best_distance = u64::MAX;
    for (index, onset) in onset_ticks.iter().enumerate() {
        let distance = onset.abs_diff(tick);
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }
    best_index
}

use super::colourizer::colourize;
use super::group::{GroupSpec, apply_group};
use super::style::StyleSpec;
use crate::engine::buffer::{PointBuffer, UpdateRange};
use std::ops::Range;

/// Keeps a copy of the styled colours so highlight groups can be switched without
/// recomputing the style.
///
/// The snapshot is written only by [`ColourLayers::restyle`], straight after the style
/// pass and before any group is applied; highlighted colours never end up in it.
#[derive(Debug, Clone)]
pub struct ColourLayers {
    snapshot: Vec<f32>,
}

impl ColourLayers {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshot: vec![0.0; capacity * 3],
        }
    }

    /// Colourize `range`, retake the snapshot for it, then apply the active group.
    pub fn restyle(
        &mut self,
        buffer: &mut PointBuffer,
        range: Range<usize>,
        style: &StyleSpec,
        group: Option<&GroupSpec>,
    ) -> UpdateRange {
        let touched = colourize(buffer, range, style);
        self.retake(buffer, touched);
        if let Some(group) = group {
            apply_group(buffer, touched.as_range(), group);
        }
        touched
    }

    /// Restore the styled colours of every populated point, then apply `group` if given.
    /// Groups never stack: each switch starts from the clean styled colours.
    pub fn switch_group(&self, buffer: &mut PointBuffer, group: Option<&GroupSpec>) -> UpdateRange {
        let valid = buffer.valid_range();
        self.restore(buffer, valid.clone());
        if let Some(group) = group {
            apply_group(buffer, valid.clone(), group);
        }
        UpdateRange::from_range(valid)
    }

    /// Styled colours of `range` as captured by the last style pass.
    pub fn snapshot(&self, range: Range<usize>) -> &[f32] {
        let end = (range.end * 3).min(self.snapshot.len());
        &self.snapshot[(range.start * 3).min(end)..end]
    }

    fn retake(&mut self, buffer: &PointBuffer, touched: UpdateRange) {
        let range = touched.as_range();
        self.snapshot[range.start * 3..range.end * 3].copy_from_slice(buffer.colour_slice(range));
    }

    fn restore(&self, buffer: &mut PointBuffer, range: Range<usize>) {
        let range = buffer.clamp_range(range);
        let saved = &self.snapshot[range.start * 3..range.end * 3];
        buffer.colour_slice_mut(range).copy_from_slice(saved);
    }
}

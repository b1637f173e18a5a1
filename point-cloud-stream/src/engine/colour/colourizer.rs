use super::palette::RampScale;
use super::style::{ChannelMapping, StyleSpec};
use crate::engine::buffer::{PointBuffer, UpdateRange};
use std::ops::Range;

/// Recompute colours for the populated points in `range` from `style`.
///
/// Only colours inside `range` are written, and the result depends only on the
/// attribute rows, so repeated calls over the same range are idempotent.
pub fn colourize(buffer: &mut PointBuffer, range: Range<usize>, style: &StyleSpec) -> UpdateRange {
    match style {
        StyleSpec::Ramp(ramp) => {
            let scale = RampScale::new(ramp);
            let column = ramp.column;
            buffer.for_each_row_mut(range, |row, rgb| {
                let value = row.get(column).copied().unwrap_or(f32::NAN);
                rgb.copy_from_slice(&scale.sample(value));
            })
        }
        StyleSpec::Ternary(ternary) => {
            let channels = [ternary.r, ternary.g, ternary.b];
            buffer.for_each_row_mut(range, |row, rgb| {
                for (out, mapping) in rgb.iter_mut().zip(&channels) {
                    *out = channel(row, mapping);
                }
            })
        }
    }
}

// Unclamped; out-of-domain values give out-of-gamut colours.
fn channel(row: &[f32], mapping: &ChannelMapping) -> f32 {
    let value = row.get(mapping.column).copied().unwrap_or(f32::NAN);
    (value - mapping.lo) / (mapping.hi - mapping.lo)
}

use crate::engine::buffer::{PointBuffer, UpdateRange};
use constants::render_settings::{DEFAULT_BLEND_COLOUR, DEFAULT_BLEND_FACTOR};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Threshold comparison. `Less` and `Greater` are inclusive (`<=`, `>=`);
/// existing datasets are authored against that behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=", alias = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<", alias = "<=")]
    Less,
    #[serde(rename = ">", alias = ">=")]
    Greater,
}

impl CompareOp {
    pub fn holds(self, value: f32, threshold: f32) -> bool {
        match self {
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
            Self::Less => value <= threshold,
            Self::Greater => value >= threshold,
        }
    }
}

/// `[column, op, threshold]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(usize, CompareOp, f32)", into = "(usize, CompareOp, f32)")]
pub struct Predicate {
    pub column: usize,
    pub op: CompareOp,
    pub threshold: f32,
}

impl Predicate {
    pub fn new(column: usize, op: CompareOp, threshold: f32) -> Self {
        Self {
            column,
            op,
            threshold,
        }
    }

    /// Rows missing the column never match.
    pub fn matches(&self, row: &[f32]) -> bool {
        row.get(self.column)
            .is_some_and(|v| self.op.holds(*v, self.threshold))
    }
}

impl From<(usize, CompareOp, f32)> for Predicate {
    fn from((column, op, threshold): (usize, CompareOp, f32)) -> Self {
        Self::new(column, op, threshold)
    }
}

impl From<Predicate> for (usize, CompareOp, f32) {
    fn from(p: Predicate) -> Self {
        (p.column, p.op, p.threshold)
    }
}

/// A named highlight rule: blend matching points towards a colour, hide masked points,
/// or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(rename = "color", default = "default_blend_colour")]
    pub blend_color: [f32; 3],
    #[serde(rename = "blend", default = "default_blend_factor")]
    pub blend_factor: f32,
    #[serde(rename = "iq", default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Predicate>,
}

fn default_blend_colour() -> [f32; 3] {
    DEFAULT_BLEND_COLOUR
}

fn default_blend_factor() -> f32 {
    DEFAULT_BLEND_FACTOR
}

impl Default for GroupSpec {
    fn default() -> Self {
        Self {
            blend_color: DEFAULT_BLEND_COLOUR,
            blend_factor: DEFAULT_BLEND_FACTOR,
            compare: None,
            mask: None,
        }
    }
}

/// Apply `group` on top of the already styled colours in `range`.
///
/// Matching rows are blended as `c * (1 - f) + blend_color * f`; masked rows become
/// pure black, which the renderer discards.
pub fn apply_group(buffer: &mut PointBuffer, range: Range<usize>, group: &GroupSpec) -> UpdateRange {
    let f = group.blend_factor;
    let target = group.blend_color;
    buffer.for_each_row_mut(range, |row, rgb| {
        if group.compare.is_some_and(|p| p.matches(row)) {
            for (c, t) in rgb.iter_mut().zip(target) {
                *c = *c * (1.0 - f) + t * f;
            }
        }
        if group.mask.is_some_and(|p| p.matches(row)) {
            rgb.fill(0.0);
        }
    })
}

use bevy::prelude::*;
use constants::palette::PALETTES;
use constants::style::{
    ELEVATION_RAMP_LIMITS, ELEVATION_STYLE_NAME, FALLBACK_RAMP_COLUMN, FALLBACK_RAMP_LIMITS,
    FALLBACK_RAMP_PALETTE, RGB_COLUMNS, RGB_MIN_ATTRIBUTES, RGB_STYLE_NAME,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a dataset's attribute columns become point colours.
///
/// Stylesheets spell ramps as `[column, {"limits": [lo, hi, steps], "scale": palette}]`
/// and ternary styles as `{"R": [column, lo, hi], "G": ..., "B": ...}`, either of which
/// may be wrapped in `{"color": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StyleValue", into = "StyleValue")]
pub enum StyleSpec {
    Ramp(RampStyle),
    Ternary(TernaryStyle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RampStyle {
    pub column: usize,
    pub domain: RampDomain,
    pub palette: PaletteSpec,
}

/// Equal-interval domain `[lo, hi]` split into `steps` intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct RampDomain {
    pub lo: f32,
    pub hi: f32,
    pub steps: u32,
}

impl From<[f32; 3]> for RampDomain {
    fn from([lo, hi, steps]: [f32; 3]) -> Self {
        Self {
            lo,
            hi,
            steps: steps.round().max(1.0) as u32,
        }
    }
}

impl From<RampDomain> for [f32; 3] {
    fn from(domain: RampDomain) -> Self {
        [domain.lo, domain.hi, domain.steps as f32]
    }
}

/// A palette by name (`viridis`, `spectral`, ...) or as explicit hex colour stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaletteSpec {
    Named(String),
    Stops(Vec<String>),
}

impl Default for PaletteSpec {
    fn default() -> Self {
        Self::Named(FALLBACK_RAMP_PALETTE.to_string())
    }
}

/// Linear mapping of one column onto one colour channel: `(value - lo) / (hi - lo)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(usize, f32, f32)", into = "(usize, f32, f32)")]
pub struct ChannelMapping {
    pub column: usize,
    pub lo: f32,
    pub hi: f32,
}

impl From<(usize, f32, f32)> for ChannelMapping {
    fn from((column, lo, hi): (usize, f32, f32)) -> Self {
        Self { column, lo, hi }
    }
}

impl From<ChannelMapping> for (usize, f32, f32) {
    fn from(mapping: ChannelMapping) -> Self {
        (mapping.column, mapping.lo, mapping.hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TernaryStyle {
    #[serde(rename = "R")]
    pub r: ChannelMapping,
    #[serde(rename = "G")]
    pub g: ChannelMapping,
    #[serde(rename = "B")]
    pub b: ChannelMapping,
}

#[derive(Clone, Serialize, Deserialize)]
struct RampOptions {
    limits: RampDomain,
    #[serde(default)]
    scale: PaletteSpec,
}

/// Wire shape of a stylesheet entry.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StyleValue {
    Ramp(usize, RampOptions),
    Ternary(TernaryStyle),
    Wrapped { color: Box<StyleValue> },
}

impl From<StyleValue> for StyleSpec {
    fn from(value: StyleValue) -> Self {
        match value {
            StyleValue::Ramp(column, options) => Self::Ramp(RampStyle {
                column,
                domain: options.limits,
                palette: options.scale,
            }),
            StyleValue::Ternary(ternary) => Self::Ternary(ternary),
            StyleValue::Wrapped { color } => Self::from(*color),
        }
    }
}

impl From<StyleSpec> for StyleValue {
    fn from(spec: StyleSpec) -> Self {
        match spec {
            StyleSpec::Ramp(ramp) => StyleValue::Ramp(
                ramp.column,
                RampOptions {
                    limits: ramp.domain,
                    scale: ramp.palette,
                },
            ),
            StyleSpec::Ternary(ternary) => StyleValue::Ternary(ternary),
        }
    }
}

impl StyleSpec {
    /// Ramp over column 2 (elevation), `[-100, 100]` in 25 steps, viridis.
    pub fn fallback() -> Self {
        Self::ramp(
            FALLBACK_RAMP_COLUMN,
            FALLBACK_RAMP_LIMITS,
            FALLBACK_RAMP_PALETTE,
        )
    }

    pub fn ramp(column: usize, limits: [f32; 3], palette: &str) -> Self {
        Self::Ramp(RampStyle {
            column,
            domain: RampDomain::from(limits),
            palette: PaletteSpec::Named(palette.to_string()),
        })
    }

    pub fn ternary(columns: [usize; 3], lo: f32, hi: f32) -> Self {
        let channel = |column| ChannelMapping { column, lo, hi };
        Self::Ternary(TernaryStyle {
            r: channel(columns[0]),
            g: channel(columns[1]),
            b: channel(columns[2]),
        })
    }

    /// Highest attribute column the style reads.
    pub fn max_column(&self) -> usize {
        match self {
            Self::Ramp(ramp) => ramp.column,
            Self::Ternary(t) => t.r.column.max(t.g.column).max(t.b.column),
        }
    }
}

/// The named styles a dataset offers, in display order, with a fallback for unknown names.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    names: Vec<String>,
    entries: BTreeMap<String, StyleSpec>,
    fallback: StyleSpec,
}

impl Stylesheet {
    /// Entries reading columns beyond `attribute_count` are dropped.
    /// An empty `entries` map gets the generated `rgb` or `elev` style, and an empty
    /// `names` list shows every entry.
    pub fn new(
        names: Vec<String>,
        entries: BTreeMap<String, StyleSpec>,
        attribute_count: usize,
        fallback: StyleSpec,
    ) -> Self {
        let mut entries = if entries.is_empty() {
            Self::generated(attribute_count)
        } else {
            entries
        };

        entries.retain(|name, spec| {
            let usable = spec.max_column() < attribute_count;
            if !usable {
                warn!(
                    "Style '{}' reads column {} but rows only have {} columns; dropping it",
                    name,
                    spec.max_column(),
                    attribute_count
                );
            }
            usable
        });

        let names = if names.is_empty() {
            entries.keys().cloned().collect()
        } else {
            names
        };

        Self {
            names,
            entries,
            fallback,
        }
    }

    fn generated(attribute_count: usize) -> BTreeMap<String, StyleSpec> {
        let mut entries = BTreeMap::new();
        if attribute_count >= RGB_MIN_ATTRIBUTES {
            entries.insert(
                RGB_STYLE_NAME.to_string(),
                StyleSpec::ternary(RGB_COLUMNS, 0.0, 1.0),
            );
        } else {
            entries.insert(
                ELEVATION_STYLE_NAME.to_string(),
                StyleSpec::ramp(
                    FALLBACK_RAMP_COLUMN,
                    ELEVATION_RAMP_LIMITS,
                    PALETTES[0].name,
                ),
            );
        }
        entries
    }

    /// Style names in the order the viewer lists them.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn first(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&StyleSpec> {
        self.entries.get(name)
    }

    /// Look up a style, falling back to the default ramp for unknown names.
    pub fn resolve(&self, name: &str) -> &StyleSpec {
        match self.entries.get(name) {
            Some(spec) => spec,
            None => {
                warn!("Unknown style '{}', using the fallback ramp", name);
                &self.fallback
            }
        }
    }

    pub fn fallback(&self) -> &StyleSpec {
        &self.fallback
    }
}

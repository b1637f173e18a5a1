use super::style::{PaletteSpec, RampStyle};
use bevy::prelude::*;
use constants::palette::get_palette;
use constants::render_settings::NAN_COLOUR;
use constants::style::FALLBACK_RAMP_PALETTE;

/// Evenly spaced colour stops, interpolated linearly in sRGB space.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    stops: Vec<[f32; 3]>,
}

impl Palette {
    /// Parse hex stops; invalid entries are skipped.
    pub fn from_hex<S: AsRef<str>>(stops: &[S]) -> Option<Self> {
        let stops: Vec<[f32; 3]> = stops
            .iter()
            .filter_map(|s| match Srgba::hex(s.as_ref()) {
                Ok(c) => Some([c.red, c.green, c.blue].map(|v| (v * 255.0).round())),
                Err(err) => {
                    warn!("Skipping palette stop '{}': {:?}", s.as_ref(), err);
                    None
                }
            })
            .collect();

        (!stops.is_empty()).then_some(Self { stops })
    }

    /// Resolve a stylesheet palette, falling back to viridis when it is unknown or empty.
    pub fn from_spec(spec: &PaletteSpec) -> Self {
        let resolved = match spec {
            PaletteSpec::Named(name) => get_palette(name).and_then(|p| Self::from_hex(p.stops)),
            PaletteSpec::Stops(stops) => Self::from_hex(stops),
        };

        resolved.unwrap_or_else(|| {
            warn!("Unusable palette {:?}, using {}", spec, FALLBACK_RAMP_PALETTE);
            Self::viridis()
        })
    }

    pub fn viridis() -> Self {
        get_palette(FALLBACK_RAMP_PALETTE)
            .and_then(|p| Self::from_hex(p.stops))
            .unwrap_or(Self {
                stops: vec![[0.0; 3], [255.0; 3]],
            })
    }

    /// Colour at `t` in `[0, 1]` with channels in `[0, 255]`; `t` is clamped.
    pub fn rgb(&self, t: f32) -> [f32; 3] {
        let last = self.stops.len() - 1;
        if last == 0 {
            return self.stops[0];
        }

        let pos = t.clamp(0.0, 1.0) * last as f32;
        let k = (pos.floor() as usize).min(last - 1);
        let f = pos - k as f32;
        let (a, b) = (self.stops[k], self.stops[k + 1]);
        [
            a[0] + (b[0] - a[0]) * f,
            a[1] + (b[1] - a[1]) * f,
            a[2] + (b[2] - a[2]) * f,
        ]
    }
}

/// `steps + 1` equal-interval break points spanning `[lo, hi]`.
pub fn limits(lo: f32, hi: f32, steps: u32) -> Vec<f32> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| lo + (hi - lo) * i as f32 / steps as f32)
        .collect()
}

/// Scalar-to-colour lookup for a ramp style.
#[derive(Debug, Clone)]
pub struct RampScale {
    breaks: Vec<f32>,
    palette: Palette,
}

impl RampScale {
    pub fn new(style: &RampStyle) -> Self {
        Self {
            breaks: limits(style.domain.lo, style.domain.hi, style.domain.steps),
            palette: Palette::from_spec(&style.palette),
        }
    }

    pub fn breaks(&self) -> &[f32] {
        &self.breaks
    }

    /// Position of `value` along the domain, clamped to `[0, 1]`.
    fn position(&self, value: f32) -> f32 {
        let lo = self.breaks[0];
        let hi = self.breaks[self.breaks.len() - 1];
        if hi == lo {
            return 1.0;
        }
        if hi < lo {
            return ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
        }
        if value <= lo {
            return 0.0;
        }
        if value >= hi {
            return 1.0;
        }

        let segments = (self.breaks.len() - 1) as f32;
        let k = self.breaks.partition_point(|b| *b <= value).saturating_sub(1);
        let k = k.min(self.breaks.len() - 2);
        let (b0, b1) = (self.breaks[k], self.breaks[k + 1]);
        let within = if b1 > b0 { (value - b0) / (b1 - b0) } else { 0.0 };
        (k as f32 + within) / segments
    }

    /// RGB in `[0, 1]`. Channels are rounded to whole 8-bit steps before scaling down.
    pub fn sample(&self, value: f32) -> [f32; 3] {
        if value.is_nan() {
            return NAN_COLOUR;
        }
        self.palette
            .rgb(self.position(value))
            .map(|c| c.round() / 255.0)
    }
}

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Trend and plunge of a picked line, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineOrientation {
    pub trend: f32,
    pub plunge: f32,
    pub length: f32,
}

/// Orientation of a plane through three picked points, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneOrientation {
    pub strike: f32,
    pub dip: f32,
    pub dip_direction: f32,
}

/// What a selection measures, decided by how many points it holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Label { position: Vec3 },
    Line(LineOrientation),
    Plane(PlaneOrientation),
    Trace { length: f32 },
}

/// Measure an ordered selection. An empty selection measures nothing.
pub fn measure(points: &[Vec3]) -> Option<Measurement> {
    match points {
        [] => None,
        [p] => Some(Measurement::Label { position: *p }),
        [a, b] => Some(Measurement::Line(line(*a, *b))),
        [a, b, c] => Some(Measurement::Plane(plane(*a, *b, *c))),
        _ => Some(Measurement::Trace {
            length: trace_length(points),
        }),
    }
}

fn wrap_degrees(angle: f32) -> f32 {
    if angle < 0.0 { angle + 360.0 } else { angle }
}

/// Lines always point downward: an upward pick is flipped by negating the plunge and
/// turning the trend around.
pub fn line(v1: Vec3, v2: Vec3) -> LineOrientation {
    let direction = (v2 - v1).normalize_or_zero();
    let mut trend = direction.x.atan2(direction.y).to_degrees();
    let mut plunge = direction.z.clamp(-1.0, 1.0).asin().to_degrees();
    if plunge < 0.0 {
        plunge = -plunge;
        trend -= 180.0;
    }

    LineOrientation {
        trend: wrap_degrees(trend),
        plunge,
        length: v1.distance(v2),
    }
}

/// Strike follows the plane normal's horizontal bearing; dip ignores which side the
/// normal faces.
pub fn plane(v1: Vec3, v2: Vec3, v3: Vec3) -> PlaneOrientation {
    let normal = (v2 - v1).cross(v3 - v1).normalize_or_zero();
    let dip = normal.z.abs().min(1.0).acos().to_degrees();
    let strike = wrap_degrees(normal.x.atan2(normal.y).to_degrees());

    PlaneOrientation {
        strike,
        dip,
        dip_direction: (strike + 90.0) % 360.0,
    }
}

pub fn trace_length(points: &[Vec3]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

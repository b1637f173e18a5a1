use super::geometry::{Measurement, measure};
use bevy::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A vertex on the wire: `[x, y, z]`, or `{"x": .., "y": .., "z": ..}` as older
/// documents store it.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireVertex {
    Array([f32; 3]),
    Object { x: f32, y: f32, z: f32 },
}

impl From<WireVertex> for Vec3 {
    fn from(v: WireVertex) -> Self {
        match v {
            WireVertex::Array(a) => Vec3::from_array(a),
            WireVertex::Object { x, y, z } => Vec3::new(x, y, z),
        }
    }
}

fn vertex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
    WireVertex::deserialize(deserializer).map(Vec3::from)
}

fn vertex_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec3>, D::Error> {
    let verts = Vec::<WireVertex>::deserialize(deserializer)?;
    Ok(verts.into_iter().map(Vec3::from).collect())
}

fn vertex_array<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[Vec3; N], D::Error> {
    let verts = vertex_list(deserializer)?;
    let len = verts.len();
    verts
        .try_into()
        .map_err(|_| D::Error::invalid_length(len, &"a fixed number of vertices"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub text: String,
    #[serde(deserialize_with = "vertex")]
    pub pos: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    #[serde(deserialize_with = "vertex_array")]
    pub verts: [Vec3; 2],
    pub trend: f32,
    pub plunge: f32,
    pub length: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneRecord {
    #[serde(deserialize_with = "vertex_array")]
    pub verts: [Vec3; 3],
    pub strike: f32,
    pub dip: f32,
    pub dipdir: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(deserialize_with = "vertex_list")]
    pub verts: Vec<Vec3>,
    pub length: f32,
    pub color: String,
}

/// One committed annotation. Persisted documents store each kind in its own list, so
/// the variant is implied by which list a record sits in.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Label(LabelRecord),
    Line(LineRecord),
    Plane(PlaneRecord),
    Trace(TraceRecord),
}

impl Annotation {
    /// Build the record for a selection. Single points only become labels when `text`
    /// is given.
    pub fn from_selection(points: &[Vec3], color: &str, text: Option<&str>) -> Option<Self> {
        let color = color.to_string();
        match measure(points)? {
            Measurement::Label { position } => text.map(|text| {
                Annotation::Label(LabelRecord {
                    text: text.to_string(),
                    pos: position,
                })
            }),
            Measurement::Line(line) => Some(Annotation::Line(LineRecord {
                verts: [points[0], points[1]],
                trend: line.trend,
                plunge: line.plunge,
                length: line.length,
                color,
            })),
            Measurement::Plane(plane) => Some(Annotation::Plane(PlaneRecord {
                verts: [points[0], points[1], points[2]],
                strike: plane.strike,
                dip: plane.dip,
                dipdir: plane.dip_direction,
                color,
            })),
            Measurement::Trace { length } => Some(Annotation::Trace(TraceRecord {
                verts: points.to_vec(),
                length,
                color,
            })),
        }
    }

    /// The first vertex; records are identified by it when removed.
    pub fn anchor(&self) -> Vec3 {
        match self {
            Annotation::Label(r) => r.pos,
            Annotation::Line(r) => r.verts[0],
            Annotation::Plane(r) => r.verts[0],
            Annotation::Trace(r) => r.verts.first().copied().unwrap_or_default(),
        }
    }
}

/// Every annotation recorded for one site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteAnnotations {
    #[serde(default)]
    pub lines: Vec<LineRecord>,
    #[serde(default)]
    pub planes: Vec<PlaneRecord>,
    #[serde(default)]
    pub traces: Vec<TraceRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelRecord>,
}

impl SiteAnnotations {
    pub fn push(&mut self, annotation: Annotation) {
        match annotation {
            Annotation::Label(r) => self.labels.push(r),
            Annotation::Line(r) => self.lines.push(r),
            Annotation::Plane(r) => self.planes.push(r),
            Annotation::Trace(r) => self.traces.push(r),
        }
    }

    /// Remove every line, plane and trace whose first vertex is `anchor`, and any label
    /// placed there. Returns how many records went.
    pub fn remove_by_anchor(&mut self, anchor: Vec3) -> usize {
        let before = self.len();
        self.lines.retain(|r| r.verts[0] != anchor);
        self.planes.retain(|r| r.verts[0] != anchor);
        self.traces.retain(|r| r.verts.first() != Some(&anchor));
        self.labels.retain(|r| r.pos != anchor);
        before - self.len()
    }

    pub fn len(&self) -> usize {
        self.lines.len() + self.planes.len() + self.traces.len() + self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Annotations of every site, keyed by site id. Loads from `*.annotations.json`.
#[derive(Asset, TypePath, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationDocument {
    pub sites: BTreeMap<String, SiteAnnotations>,
}

impl AnnotationDocument {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn site(&self, id: &str) -> Option<&SiteAnnotations> {
        self.sites.get(id)
    }

    pub fn site_mut(&mut self, id: &str) -> &mut SiteAnnotations {
        self.sites.entry(id.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_size_picks_the_record_kind() {
        let line = Annotation::from_selection(&[Vec3::ZERO, Vec3::X], "#ffcd00", None);
        assert!(matches!(line, Some(Annotation::Line(ref r)) if (r.trend - 90.0).abs() < 1e-4));

        let label = Annotation::from_selection(&[Vec3::ONE], "#ffcd00", Some("Outcrop"));
        assert!(matches!(label, Some(Annotation::Label(ref r)) if r.text == "Outcrop"));

        assert_eq!(Annotation::from_selection(&[Vec3::ONE], "#ffcd00", None), None);
        assert_eq!(Annotation::from_selection(&[], "#ffcd00", Some("x")), None);
    }

    #[test]
    fn removal_matches_the_first_vertex() {
        let mut site = SiteAnnotations::default();
        let color = "#ffcd00";
        for points in [
            vec![Vec3::ZERO, Vec3::X],
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::X, Vec3::ZERO],
        ] {
            site.push(Annotation::from_selection(&points, color, None).unwrap());
        }

        assert_eq!(site.remove_by_anchor(Vec3::ZERO), 2);
        assert_eq!(site.lines.len(), 1);
        assert_eq!(site.lines[0].verts[0], Vec3::X);
    }

    #[test]
    fn document_json_uses_flat_record_lists() {
        let json = r##"{
            "site-a": {
                "lines": [{"verts": [[0,0,0],[1,0,0]], "trend": 90, "plunge": 0, "length": 1, "color": "#ffcd00"}],
                "planes": [],
                "traces": []
            }
        }"##;
        let doc = AnnotationDocument::from_json(json).unwrap();
        let site = doc.site("site-a").unwrap();
        assert_eq!(site.lines[0].verts[1], Vec3::X);
        assert!(site.labels.is_empty());

        let written = doc.to_json().unwrap();
        assert!(!written.contains("labels"));
        assert_eq!(AnnotationDocument::from_json(&written).unwrap(), doc);
    }

    #[test]
    fn object_vertices_are_read_like_arrays() {
        let json = r##"{
            "site-b": {
                "lines": [],
                "planes": [{"verts": [{"x":0,"y":0,"z":0},{"x":1,"y":0,"z":0},[0,1,0]],
                            "strike": 90, "dip": 0, "dipdir": 180, "color": "#ffcd00"}],
                "traces": [{"verts": [{"x":2,"y":3,"z":4}], "length": 0, "color": "#ffcd00"}],
                "labels": [{"text": "seep", "pos": {"x":1.5,"y":-2,"z":0.25}}]
            }
        }"##;
        let doc = AnnotationDocument::from_json(json).unwrap();
        let site = doc.site("site-b").unwrap();
        assert_eq!(site.planes[0].verts, [Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert_eq!(site.traces[0].verts, vec![Vec3::new(2.0, 3.0, 4.0)]);
        assert_eq!(site.labels[0].pos, Vec3::new(1.5, -2.0, 0.25));

        let written = doc.to_json().unwrap();
        assert!(!written.contains("\"x\""));
        assert_eq!(AnnotationDocument::from_json(&written).unwrap(), doc);
    }

    #[test]
    fn wrong_vertex_counts_are_rejected() {
        let json = r##"{"s": {"lines": [{"verts": [[0,0,0]], "trend": 0, "plunge": 0, "length": 0, "color": "#fff"}]}}"##;
        assert!(AnnotationDocument::from_json(json).is_err());
    }
}

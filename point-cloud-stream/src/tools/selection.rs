use super::annotations::Annotation;
use bevy::prelude::*;
use constants::render_settings::{DEFAULT_ANNOTATION_COLOUR, SELECTION_MARKER_FACTOR};

/// Points picked since the last commit or cancel, in pick order.
#[derive(Resource, Debug, Clone, Default)]
pub struct Selection {
    points: Vec<Vec3>,
}

impl Selection {
    pub fn push(&mut self, point: Vec3) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn cancel(&mut self) {
        self.points.clear();
    }

    /// Turn the picked points into an annotation and clear the selection either way.
    pub fn commit(&mut self, color: &str, text: Option<&str>) -> Option<Annotation> {
        let points = std::mem::take(&mut self.points);
        Annotation::from_selection(&points, color, text)
    }
}

/// Annotation tool state shared with the host UI.
#[derive(Resource, Debug, Clone)]
pub struct AnnotationTool {
    color: String,
}

impl Default for AnnotationTool {
    fn default() -> Self {
        Self {
            color: DEFAULT_ANNOTATION_COLOUR.to_string(),
        }
    }
}

impl AnnotationTool {
    /// Colour stamped on new annotations.
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Accepts `#rgb`, `#rrggbb` and the alpha forms. Invalid input keeps the old colour.
    pub fn set_color(&mut self, hex: &str) -> bool {
        match Srgba::hex(hex) {
            Ok(_) => {
                let hex = hex.trim();
                self.color = if hex.starts_with('#') {
                    hex.to_ascii_lowercase()
                } else {
                    format!("#{}", hex.to_ascii_lowercase())
                };
                true
            }
            Err(err) => {
                warn!("Ignoring annotation colour '{}': {}", hex, err);
                false
            }
        }
    }

    /// Size of the markers drawn at picked points for a cloud of the given resolution.
    pub fn marker_size(resolution: f32) -> f32 {
        SELECTION_MARKER_FACTOR * resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_clears_even_without_an_annotation() {
        let mut selection = Selection::default();
        selection.push(Vec3::ONE);
        assert_eq!(selection.commit("#ffcd00", None), None);
        assert!(selection.is_empty());
    }

    #[test]
    fn commit_builds_from_pick_order() {
        let mut selection = Selection::default();
        for p in [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y] {
            selection.push(p);
        }
        let Some(Annotation::Trace(trace)) = selection.commit("#00ff00", None) else {
            panic!("expected a trace");
        };
        assert_eq!(trace.verts.len(), 4);
        assert!((trace.length - 3.0).abs() < 1e-5);
        assert_eq!(trace.color, "#00ff00");
    }

    #[test]
    fn cancel_drops_the_points() {
        let mut selection = Selection::default();
        selection.push(Vec3::ZERO);
        selection.push(Vec3::X);
        selection.cancel();
        assert_eq!(selection.len(), 0);
    }

    #[test]
    fn colour_must_be_valid_hex() {
        let mut tool = AnnotationTool::default();
        assert_eq!(tool.color(), DEFAULT_ANNOTATION_COLOUR);
        assert!(tool.set_color("#FF0000"));
        assert_eq!(tool.color(), "#ff0000");
        assert!(!tool.set_color("not a colour"));
        assert_eq!(tool.color(), "#ff0000");
    }
}

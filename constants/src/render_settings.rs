/// Point spacing assumed when a dataset does not declare its resolution
pub const DEFAULT_RESOLUTION: f32 = 0.1;

/// Rendered point size is this factor times the dataset resolution
pub const POINT_SIZE_FACTOR: f32 = 3.2;

/// Selection markers are drawn with this factor times the dataset resolution
pub const SELECTION_MARKER_FACTOR: f32 = 3.0;

/// Colour given to new annotations until the user picks another one
pub const DEFAULT_ANNOTATION_COLOUR: &str = "#ffcd00";

/// Highlight blend factor used when a group omits `blend`
pub const DEFAULT_BLEND_FACTOR: f32 = 0.5;

/// Highlight colour used when a group omits `color`
pub const DEFAULT_BLEND_COLOUR: [f32; 3] = [1.0, 1.0, 0.0];

/// Colour a ramp assigns to NaN samples (#cccccc)
pub const NAN_COLOUR: [f32; 3] = [0.8, 0.8, 0.8];

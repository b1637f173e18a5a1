/// Column the fallback ramp reads (elevation in exported datasets)
pub const FALLBACK_RAMP_COLUMN: usize = 2;

/// Fallback ramp domain as `[lo, hi, steps]`
pub const FALLBACK_RAMP_LIMITS: [f32; 3] = [-100.0, 100.0, 25.0];

/// Fallback ramp palette
pub const FALLBACK_RAMP_PALETTE: &str = "viridis";

/// Ramp generated for datasets that ship without a stylesheet
pub const ELEVATION_STYLE_NAME: &str = "elev";
pub const ELEVATION_RAMP_LIMITS: [f32; 3] = [-100.0, 100.0, 255.0];

/// Ternary style generated for datasets with at least six columns and no stylesheet
pub const RGB_STYLE_NAME: &str = "rgb";
pub const RGB_COLUMNS: [usize; 3] = [3, 4, 5];
pub const RGB_MIN_ATTRIBUTES: usize = 6;

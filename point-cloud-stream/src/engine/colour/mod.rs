//! Per-point colour: stylesheet parsing, palette ramps, the style pass, and highlight
//! groups layered on top of it.
//!
//! ```text
//! rows ──colourize(style)──> styled colours ──snapshot──> ColourLayers
//!                                   │
//!                                   └──apply_group(group)──> rendered colours
//! ```
//!
//! A style pass always retakes the snapshot before any group is applied, so turning a
//! group off (or switching to another one) restores the styled colours bit for bit.

/// The style pass: ramp and ternary colour mapping over a row range.
pub mod colourizer;

/// Highlight and mask groups with threshold predicates.
pub mod group;

/// Styled-colour snapshot and group switching.
pub mod layers;

/// Named palettes, equal-interval limits and the ramp lookup.
pub mod palette;

/// Stylesheet entries and fallback resolution.
pub mod style;

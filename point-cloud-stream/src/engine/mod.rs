pub mod buffer;
pub mod colour;
pub mod dataset;
pub mod streaming;

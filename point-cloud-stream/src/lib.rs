pub mod engine;
pub mod export;
pub mod tools;

pub use engine::streaming::plugin::PointStreamPlugin;
pub use tools::AnnotationPlugin;

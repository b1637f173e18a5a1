pub mod palette;
pub mod render_settings;
pub mod stream;
pub mod style;

use crate::engine::buffer::PointBuffer;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Colour channel in `[0, 1]` as a byte, floored. Out-of-gamut ternary values clamp.
pub fn channel_byte(c: f32) -> u8 {
    if c.is_nan() {
        return 0;
    }
    (c * 255.0).floor().clamp(0.0, 255.0) as u8
}

/// Write the populated points as `x,y,z,r,g,b` rows, shifting positions back by `origin`.
pub fn write_csv<W: Write>(
    buffer: &PointBuffer,
    origin: [f64; 3],
    writer: W,
) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["x", "y", "z", "r", "g", "b"])?;

    let range = buffer.valid_range();
    let positions = buffer.position_slice(range.clone());
    let colours = buffer.colour_slice(range.clone());

    for (p, c) in positions.chunks_exact(3).zip(colours.chunks_exact(3)) {
        csv.serialize((
            p[0] as f64 + origin[0],
            p[1] as f64 + origin[1],
            p[2] as f64 + origin[2],
            channel_byte(c[0]),
            channel_byte(c[1]),
            channel_byte(c[2]),
        ))?;
    }

    csv.flush()?;
    Ok(range.len())
}

pub fn export_csv_file(
    buffer: &PointBuffer,
    origin: [f64; 3],
    path: impl AsRef<Path>,
) -> Result<usize, ExportError> {
    let file = File::create(path)?;
    write_csv(buffer, origin, file)
}

use constants::stream::POSITION_COLUMNS;
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("chunk needs points up to {required} but the buffer holds {capacity}")]
    OutOfCapacity { required: usize, capacity: usize },
    #[error("chunk has {len} values, not a multiple of {columns} attributes")]
    ShapeMismatch { len: usize, columns: usize },
    #[error("chunk written at offset {offset} but the populated prefix ends at {expected}")]
    NonContiguous { offset: usize, expected: usize },
    #[error("chunk {0} is already loaded")]
    AlreadyLoaded(u32),
}

impl BufferError {
    /// Fatal errors mean the dataset does not match its own layout; retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AlreadyLoaded(_))
    }
}

/// Span of points touched by an update, for partial uploads to the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateRange {
    pub offset: usize,
    pub count: usize,
}

impl UpdateRange {
    pub fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    pub fn from_range(range: Range<usize>) -> Self {
        Self::new(range.start, range.end.saturating_sub(range.start))
    }

    pub fn as_range(&self) -> Range<usize> {
        self.offset..self.offset + self.count
    }

    pub fn end(&self) -> usize {
        self.offset + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Flat per-point storage for one dataset: raw attribute rows, xyz positions for the
/// renderer, and derived RGB colours. Points `[0, valid_count)` are populated.
#[derive(Debug, Clone)]
pub struct PointBuffer {
    capacity: usize,
    attribute_count: usize,
    attributes: Vec<f32>,
    positions: Vec<f32>,
    colour: Vec<f32>,
    valid_count: usize,
    loaded: HashSet<u32>,
}

impl PointBuffer {
    pub fn new(capacity: usize, attribute_count: usize) -> Self {
        Self {
            capacity,
            attribute_count,
            attributes: vec![0.0; capacity * attribute_count],
            positions: vec![0.0; capacity * 3],
            colour: vec![0.0; capacity * 3],
            valid_count: 0,
            loaded: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    pub fn is_loaded(&self, chunk_id: u32) -> bool {
        self.loaded.contains(&chunk_id)
    }

    pub fn loaded_chunks(&self) -> &HashSet<u32> {
        &self.loaded
    }

    /// Copy a chunk's rows in at `at_offset`, which must be the end of the populated prefix.
    ///
    /// The prefix grows and the chunk is marked loaded in the same call, so no reader
    /// ever sees one without the other.
    pub fn append(
        &mut self,
        chunk_id: u32,
        rows: &[f32],
        at_offset: usize,
    ) -> Result<UpdateRange, BufferError> {
        let columns = self.attribute_count;
        if rows.len() % columns != 0 {
            return Err(BufferError::ShapeMismatch {
                len: rows.len(),
                columns,
            });
        }
        if self.loaded.contains(&chunk_id) {
            return Err(BufferError::AlreadyLoaded(chunk_id));
        }
        if at_offset != self.valid_count {
            return Err(BufferError::NonContiguous {
                offset: at_offset,
                expected: self.valid_count,
            });
        }

        let count = rows.len() / columns;
        let required = at_offset + count;
        if required > self.capacity {
            return Err(BufferError::OutOfCapacity {
                required,
                capacity: self.capacity,
            });
        }

        self.attributes[at_offset * columns..required * columns].copy_from_slice(rows);
        for (dst, row) in self.positions[at_offset * 3..required * 3]
            .chunks_exact_mut(3)
            .zip(rows.chunks_exact(columns))
        {
            dst.copy_from_slice(&row[..POSITION_COLUMNS]);
        }

        self.valid_count = required;
        self.loaded.insert(chunk_id);

        Ok(UpdateRange::new(at_offset, count))
    }

    /// Clip a requested range to the populated prefix.
    pub fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.valid_count);
        range.start.min(end)..end
    }

    pub fn valid_range(&self) -> Range<usize> {
        0..self.valid_count
    }

    /// Flat xyz positions of the points in `range`.
    pub fn position_slice(&self, range: Range<usize>) -> &[f32] {
        let range = self.clamp_range(range);
        &self.positions[range.start * 3..range.end * 3]
    }

    /// Values of one attribute column over `range`, or `None` if the column does not exist.
    pub fn attribute_column(
        &self,
        range: Range<usize>,
        column: usize,
    ) -> Option<impl Iterator<Item = f32> + '_> {
        if column >= self.attribute_count {
            return None;
        }
        let range = self.clamp_range(range);
        let columns = self.attribute_count;
        Some(
            self.attributes[range.start * columns..range.end * columns]
                .iter()
                .skip(column)
                .step_by(columns)
                .copied(),
        )
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.valid_count {
            return None;
        }
        let columns = self.attribute_count;
        Some(&self.attributes[index * columns..(index + 1) * columns])
    }

    pub fn colour(&self, index: usize) -> Option<[f32; 3]> {
        if index >= self.valid_count {
            return None;
        }
        let c = &self.colour[index * 3..index * 3 + 3];
        Some([c[0], c[1], c[2]])
    }

    /// Overwrite one point's colour. Writes outside the populated prefix are ignored.
    pub fn set_colour(&mut self, index: usize, rgb: [f32; 3]) {
        debug_assert!(index < self.valid_count, "colour write past populated prefix");
        if index < self.valid_count {
            self.colour[index * 3..index * 3 + 3].copy_from_slice(&rgb);
        }
    }

    /// Flat RGB colours of the points in `range`.
    pub fn colour_slice(&self, range: Range<usize>) -> &[f32] {
        let range = self.clamp_range(range);
        &self.colour[range.start * 3..range.end * 3]
    }

    pub(crate) fn colour_slice_mut(&mut self, range: Range<usize>) -> &mut [f32] {
        let range = self.clamp_range(range);
        &mut self.colour[range.start * 3..range.end * 3]
    }

    /// Visit every populated row in `range` with its attributes and its writable colour.
    pub fn for_each_row_mut<F>(&mut self, range: Range<usize>, mut f: F) -> UpdateRange
    where
        F: FnMut(&[f32], &mut [f32]),
    {
        let range = self.clamp_range(range);
        let columns = self.attribute_count;
        let rows = self.attributes[range.start * columns..range.end * columns].chunks_exact(columns);
        let colours = self.colour[range.start * 3..range.end * 3].chunks_exact_mut(3);
        for (row, rgb) in rows.zip(colours) {
            f(row, rgb);
        }
        UpdateRange::from_range(range)
    }

    /// Populated positions as raw bytes for GPU upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions[..self.valid_count * 3])
    }

    /// Populated colours as raw bytes for GPU upload.
    pub fn colour_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colour[..self.valid_count * 3])
    }
}

use bevy::prelude::*;
use constants::stream::POSITION_COLUMNS;
use thiserror::Error;

/// Chunk layouts the streaming engine cannot work with.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset rows need at least 3 position columns, got {0}")]
    TooFewAttributes(usize),
    #[error("chunk centre data has {len} values, not a multiple of {columns} columns")]
    RaggedCentres { len: usize, columns: usize },
}

/// Layout of a chunked dataset: one seed coordinate per fetchable chunk.
/// Chunk ids are indices into `chunk_seeds`.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    total_points: u64,
    attribute_count: usize,
    chunk_seeds: Vec<Vec3>,
    resolution: f32,
}

impl ChunkIndex {
    pub fn new(
        total_points: u64,
        attribute_count: usize,
        chunk_seeds: Vec<Vec3>,
        resolution: f32,
    ) -> Result<Self, DatasetError> {
        if attribute_count < POSITION_COLUMNS {
            return Err(DatasetError::TooFewAttributes(attribute_count));
        }

        Ok(Self {
            total_points,
            attribute_count,
            chunk_seeds,
            resolution,
        })
    }

    /// Build the index from the flat `chunk_centers` array, shape `[chunks, columns]`.
    /// The first three columns of every centre row are its seed position.
    pub fn from_centres(
        total_points: u64,
        resolution: f32,
        centres: &[f32],
        columns: usize,
    ) -> Result<Self, DatasetError> {
        if columns < POSITION_COLUMNS {
            return Err(DatasetError::TooFewAttributes(columns));
        }
        if centres.len() % columns != 0 {
            return Err(DatasetError::RaggedCentres {
                len: centres.len(),
                columns,
            });
        }

        let seeds = centres
            .chunks_exact(columns)
            .map(|row| Vec3::new(row[0], row[1], row[2]))
            .collect();

        Self::new(total_points, columns, seeds, resolution)
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_seeds.len()
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn seeds(&self) -> &[Vec3] {
        &self.chunk_seeds
    }

    pub fn seed(&self, chunk_id: u32) -> Option<Vec3> {
        self.chunk_seeds.get(chunk_id as usize).copied()
    }

    /// Flat xyz buffer of all seeds, used for the placeholder cloud shown while streaming.
    pub fn seed_positions(&self) -> Vec<f32> {
        self.chunk_seeds
            .iter()
            .flat_map(|s| [s.x, s.y, s.z])
            .collect()
    }
}

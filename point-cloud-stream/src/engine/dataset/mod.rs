//! Dataset description and access: the chunk layout, the root metadata, and the stores
//! chunks are fetched from.

/// Blosc frame decoding for compressed array blocks.
pub mod blosc;

/// Seed coordinates and sizes of a chunked dataset.
pub mod chunk_index;

/// Root metadata: point totals, stylesheet, highlight groups and export origin.
pub mod metadata;

/// `ChunkStore` trait with in-memory and on-disk implementations.
pub mod store;

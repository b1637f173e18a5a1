/// Milliseconds to wait after a chunk completes before the next fetch is allowed
pub const LOAD_INTERVAL_MS: u64 = 100;

/// Number of leading columns in every chunk row that hold the point position
pub const POSITION_COLUMNS: usize = 3;

/// The chunk that bootstraps the dense cloud; always fetched first
pub const BOOTSTRAP_CHUNK: u32 = 0;

/// Name of the chunk-centre array inside a chunk store
pub const CHUNK_CENTERS_ARRAY: &str = "chunk_centers";

/// Chunk arrays are addressed as `c{id}`
pub fn chunk_array_name(chunk_id: u32) -> String {
    format!("c{}", chunk_id)
}

use super::blosc::{self, BloscError};
use super::metadata::DatasetMetadata;
use constants::stream::{CHUNK_CENTERS_ARRAY, chunk_array_name};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("array '{0}' not found")]
    MissingArray(String),
    #[error("array '{name}' uses unsupported encoding: {reason}")]
    Unsupported { name: String, reason: String },
    #[error("failed to decode array '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: BloscError,
    },
    #[error("array '{name}' holds {len} values but its shape is {rows}x{columns}")]
    Shape {
        name: String,
        len: usize,
        rows: usize,
        columns: usize,
    },
}

/// A 2D float array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkArray {
    pub rows: usize,
    pub columns: usize,
    pub data: Vec<f32>,
}

impl ChunkArray {
    pub fn new(name: &str, rows: usize, columns: usize, data: Vec<f32>) -> Result<Self, StoreError> {
        if rows * columns != data.len() {
            return Err(StoreError::Shape {
                name: name.to_string(),
                len: data.len(),
                rows,
                columns,
            });
        }
        Ok(Self {
            rows,
            columns,
            data,
        })
    }
}

/// Source of a chunked dataset: root metadata, per-chunk centres, and chunk rows.
///
/// Calls may block; the streaming plugin runs them on the IO task pool.
pub trait ChunkStore: Send + Sync + 'static {
    fn metadata(&self) -> Result<DatasetMetadata, StoreError>;

    /// `[chunks, attributes]`; the first three columns are the chunk seed positions.
    fn chunk_centers(&self) -> Result<ChunkArray, StoreError>;

    /// `[rows, attributes]` for chunk `c{chunk_id}`.
    fn chunk(&self, chunk_id: u32) -> Result<ChunkArray, StoreError>;
}

/// In-process store, for tests and for datasets generated at runtime.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    metadata: DatasetMetadata,
    centers: ChunkArray,
    chunks: Vec<ChunkArray>,
}

impl MemoryStore {
    /// Build a store from per-chunk row data, computing each centre as the column mean
    /// of its chunk the way the exporter does.
    pub fn from_chunks(
        mut metadata: DatasetMetadata,
        columns: usize,
        chunks: Vec<Vec<f32>>,
    ) -> Result<Self, StoreError> {
        let mut centre_data = Vec::with_capacity(chunks.len() * columns);
        let mut arrays = Vec::with_capacity(chunks.len());

        for (id, data) in chunks.into_iter().enumerate() {
            let name = chunk_array_name(id as u32);
            let rows = if columns == 0 { 0 } else { data.len() / columns };
            let array = ChunkArray::new(&name, rows, columns, data)?;

            let mut mean = vec![0.0f32; columns];
            for row in array.data.chunks_exact(columns.max(1)) {
                for (m, v) in mean.iter_mut().zip(row) {
                    *m += v;
                }
            }
            centre_data.extend(mean.iter().map(|m| m / rows.max(1) as f32));
            arrays.push(array);
        }

        metadata.total = arrays.iter().map(|a| a.rows as u64).sum();
        metadata.chunks = Some(arrays.len() as u32);
        let centers = ChunkArray::new(CHUNK_CENTERS_ARRAY, arrays.len(), columns, centre_data)?;

        Ok(Self {
            metadata,
            centers,
            chunks: arrays,
        })
    }
}

impl ChunkStore for MemoryStore {
    fn metadata(&self) -> Result<DatasetMetadata, StoreError> {
        Ok(self.metadata.clone())
    }

    fn chunk_centers(&self) -> Result<ChunkArray, StoreError> {
        Ok(self.centers.clone())
    }

    fn chunk(&self, chunk_id: u32) -> Result<ChunkArray, StoreError> {
        self.chunks
            .get(chunk_id as usize)
            .cloned()
            .ok_or_else(|| StoreError::MissingArray(chunk_array_name(chunk_id)))
    }
}

/// Chunked-array group on disk: `.zattrs` holds the metadata and every array lives in
/// its own directory with a `.zarray` header and a single `0.0` data block.
/// Blocks are little-endian `<f4`, either raw or Blosc-compressed.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ArrayHeader {
    shape: Vec<usize>,
    dtype: String,
    #[serde(default)]
    compressor: Option<serde_json::Value>,
    #[serde(default)]
    filters: Option<serde_json::Value>,
    #[serde(default = "default_order")]
    order: String,
}

fn default_order() -> String {
    "C".to_string()
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_array(&self, name: &str) -> Result<ChunkArray, StoreError> {
        let dir = self.root.join(name);
        let header_path = dir.join(".zarray");
        if !header_path.exists() {
            return Err(StoreError::MissingArray(name.to_string()));
        }
        let header: ArrayHeader = Self::read_json(&header_path)?;

        let unsupported = |reason: String| StoreError::Unsupported {
            name: name.to_string(),
            reason,
        };
        if header.dtype != "<f4" {
            return Err(unsupported(format!("dtype {}", header.dtype)));
        }
        let compressor = header.compressor.as_ref().filter(|c| !c.is_null());
        let compressed = match compressor.map(|c| c.get("id").and_then(|id| id.as_str())) {
            None => false,
            Some(Some("blosc")) => true,
            Some(id) => {
                return Err(unsupported(format!(
                    "compressor {}",
                    id.unwrap_or("without id")
                )));
            }
        };
        if header.filters.as_ref().is_some_and(|f| !f.is_null()) {
            return Err(unsupported("filters".to_string()));
        }
        if header.order != "C" {
            return Err(unsupported(format!("order {}", header.order)));
        }
        let [rows, columns] = header.shape[..] else {
            return Err(unsupported(format!("{}-dimensional shape", header.shape.len())));
        };

        let block_path = dir.join("0.0");
        let mut bytes = fs::read(&block_path).map_err(|source| StoreError::Io {
            path: block_path,
            source,
        })?;
        if compressed {
            bytes = blosc::decompress(&bytes).map_err(|source| StoreError::Decode {
                name: name.to_string(),
                source,
            })?;
        }
        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        ChunkArray::new(name, rows, columns, data)
    }
}

impl ChunkStore for DirectoryStore {
    fn metadata(&self) -> Result<DatasetMetadata, StoreError> {
        Self::read_json(&self.root.join(".zattrs"))
    }

    fn chunk_centers(&self) -> Result<ChunkArray, StoreError> {
        self.read_array(CHUNK_CENTERS_ARRAY)
    }

    fn chunk(&self, chunk_id: u32) -> Result<ChunkArray, StoreError> {
        self.read_array(&chunk_array_name(chunk_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_array(root: &Path, name: &str, rows: usize, columns: usize, data: &[f32]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let header = serde_json::json!({
            "zarr_format": 2,
            "shape": [rows, columns],
            "chunks": [rows, columns],
            "dtype": "<f4",
            "compressor": null,
            "fill_value": 0.0,
            "filters": null,
            "order": "C"
        });
        fs::write(dir.join(".zarray"), header.to_string()).unwrap();
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        fs::write(dir.join("0.0"), bytes).unwrap();
    }

    #[test]
    fn memory_store_derives_centres_and_totals() {
        let store = MemoryStore::from_chunks(
            DatasetMetadata::default(),
            3,
            vec![vec![0.0, 0.0, 0.0, 2.0, 2.0, 2.0], vec![5.0, 6.0, 7.0]],
        )
        .unwrap();

        let meta = store.metadata().unwrap();
        assert_eq!(meta.total, 3);
        assert_eq!(meta.chunks, Some(2));
        assert_eq!(store.chunk_centers().unwrap().data, vec![1.0, 1.0, 1.0, 5.0, 6.0, 7.0]);
        assert!(matches!(store.chunk(2), Err(StoreError::MissingArray(name)) if name == "c2"));
    }

    #[test]
    fn directory_store_reads_uncompressed_arrays() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".zattrs"),
            r#"{"total": 2, "resolution": 0.2, "origin": [10, 20, 30]}"#,
        )
        .unwrap();
        write_array(dir.path(), "chunk_centers", 1, 4, &[0.5, 0.5, 0.5, 1.0]);
        write_array(dir.path(), "c0", 2, 4, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);

        let store = DirectoryStore::new(dir.path());
        let meta = store.metadata().unwrap();
        let chunk = store.chunk(0).unwrap();

        assert_eq!(meta.origin, [10.0, 20.0, 30.0]);
        assert_eq!(store.chunk_centers().unwrap().rows, 1);
        assert_eq!((chunk.rows, chunk.columns), (2, 4));
        assert_eq!(chunk.data[4..], [1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(store.chunk(1), Err(StoreError::MissingArray(_))));
    }

    #[test]
    fn directory_store_reads_blosc_zstd_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("chunk_centers");
        fs::create_dir_all(&array).unwrap();
        let header = serde_json::json!({
            "zarr_format": 2,
            "shape": [2, 3],
            "chunks": [2, 3],
            "dtype": "<f4",
            "compressor": {"id": "blosc", "cname": "zstd", "clevel": 3, "shuffle": 1, "blocksize": 0},
            "fill_value": 0.0,
            "filters": null,
            "order": "C"
        });
        fs::write(array.join(".zarray"), header.to_string()).unwrap();
        let values = [0.5, -1.0, 2.0, 10.0, 20.0, 30.0];
        fs::write(array.join("0.0"), blosc::tests::zstd_frame(&values)).unwrap();

        let centres = DirectoryStore::new(dir.path()).chunk_centers().unwrap();
        assert_eq!((centres.rows, centres.columns), (2, 3));
        assert_eq!(centres.data, values);
    }

    #[test]
    fn directory_store_rejects_unknown_compressors() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("c0");
        fs::create_dir_all(&array).unwrap();
        fs::write(
            array.join(".zarray"),
            r#"{"shape": [1, 3], "dtype": "<f4", "compressor": {"id": "lzma"}}"#,
        )
        .unwrap();

        let err = DirectoryStore::new(dir.path()).chunk(0).unwrap_err();
        assert!(matches!(err, StoreError::Unsupported { reason, .. } if reason == "compressor lzma"));
    }

    #[test]
    fn corrupt_blosc_blocks_are_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("c0");
        fs::create_dir_all(&array).unwrap();
        fs::write(
            array.join(".zarray"),
            r#"{"shape": [1, 3], "dtype": "<f4", "compressor": {"id": "blosc"}}"#,
        )
        .unwrap();
        fs::write(array.join("0.0"), [2u8, 1, 0x90]).unwrap();

        let err = DirectoryStore::new(dir.path()).chunk(0).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}

use super::scheduler::{Throttle, Viewpoint, next_chunk};
use crate::engine::buffer::{BufferError, PointBuffer, UpdateRange};
use crate::engine::colour::group::GroupSpec;
use crate::engine::colour::layers::ColourLayers;
use crate::engine::colour::style::{StyleSpec, Stylesheet};
use crate::engine::dataset::chunk_index::{ChunkIndex, DatasetError};
use crate::engine::dataset::metadata::DatasetMetadata;
use crate::engine::dataset::store::{ChunkArray, ChunkStore, StoreError};
use crate::export::{ExportError, write_csv};
use bevy::prelude::*;
use constants::render_settings::POINT_SIZE_FACTOR;
use constants::stream::LOAD_INTERVAL_MS;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Tunables for every stream the app opens.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub load_interval_ms: u64,
    pub point_size_factor: f32,
    /// Style used when a requested style name is unknown.
    pub default_style: StyleSpec,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            load_interval_ms: LOAD_INTERVAL_MS,
            point_size_factor: POINT_SIZE_FACTOR,
            default_style: StyleSpec::fallback(),
        }
    }
}

impl StreamSettings {
    pub fn load_interval(&self) -> Duration {
        Duration::from_millis(self.load_interval_ms)
    }
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream aborted: {0}")]
    Buffer(#[from] BufferError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Ready to schedule the next fetch once the throttle allows.
    Idle,
    /// One fetch in flight.
    Loading(u32),
    /// At least one chunk is materialised and more remain.
    Streaming,
    Complete,
    /// A chunk did not fit the buffer; no further appends are attempted.
    Failed,
}

/// Identifies one scheduled fetch. Completions carrying a ticket from an older
/// session are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub chunk_id: u32,
}

/// Scheduling bookkeeping for one session.
#[derive(Debug, Clone)]
pub struct StreamState {
    cursor: usize,
    throttle: Throttle,
    last_fetch_at: Option<Duration>,
}

impl StreamState {
    fn new(interval: Duration) -> Self {
        Self {
            cursor: 0,
            throttle: Throttle::new(interval),
            last_fetch_at: None,
        }
    }

    /// Next write offset; always equal to the buffer's valid count.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn last_fetch_at(&self) -> Option<Duration> {
        self.last_fetch_at
    }
}

/// Everything owned by one streaming dataset: its layout, the point buffer, the colour
/// layers and the fetch state machine.
///
/// Opening a different dataset builds a new session; nothing carries across.
pub struct StreamSession {
    generation: u64,
    index: ChunkIndex,
    metadata: DatasetMetadata,
    stylesheet: Stylesheet,
    buffer: PointBuffer,
    layers: ColourLayers,
    state: StreamState,
    phase: StreamPhase,
    style_name: String,
    active_group: Option<String>,
    point_size_factor: f32,
}

impl StreamSession {
    /// Read the metadata and chunk centres from `store` and allocate the buffer.
    pub fn open(store: &dyn ChunkStore, settings: &StreamSettings) -> Result<Self, OpenError> {
        let metadata = store.metadata()?;
        let centres = store.chunk_centers()?;
        Self::from_parts(metadata, &centres, settings)
    }

    pub fn from_parts(
        metadata: DatasetMetadata,
        centres: &ChunkArray,
        settings: &StreamSettings,
    ) -> Result<Self, OpenError> {
        let index = ChunkIndex::from_centres(
            metadata.total,
            metadata.resolution,
            &centres.data,
            centres.columns,
        )?;
        if let Some(declared) = metadata.chunks {
            if declared as usize != index.chunk_count() {
                warn!(
                    "Dataset declares {} chunks but lists {} centres",
                    declared,
                    index.chunk_count()
                );
            }
        }

        let stylesheet = metadata.stylesheet(index.attribute_count(), settings.default_style.clone());
        let style_name = stylesheet.first().unwrap_or_default().to_string();
        let capacity = index.total_points() as usize;

        info!(
            "Opened dataset: {} points in {} chunks, {} attributes, styles {:?}",
            index.total_points(),
            index.chunk_count(),
            index.attribute_count(),
            stylesheet.names()
        );

        Ok(Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            buffer: PointBuffer::new(capacity, index.attribute_count()),
            layers: ColourLayers::new(capacity),
            state: StreamState::new(settings.load_interval()),
            phase: StreamPhase::Idle,
            index,
            metadata,
            stylesheet,
            style_name,
            active_group: None,
            point_size_factor: settings.point_size_factor,
        })
    }

    /// Advance the state machine. Returns a ticket when a fetch should start now.
    pub fn tick(&mut self, now: Duration, viewpoint: &Viewpoint) -> Option<FetchTicket> {
        match self.phase {
            StreamPhase::Idle | StreamPhase::Streaming => {}
            StreamPhase::Loading(_) | StreamPhase::Complete | StreamPhase::Failed => return None,
        }
        if !self.state.throttle.is_ready(now) {
            return None;
        }

        match next_chunk(viewpoint, self.buffer.loaded_chunks(), self.index.seeds()) {
            Some(chunk_id) => {
                self.phase = StreamPhase::Loading(chunk_id);
                Some(FetchTicket {
                    generation: self.generation,
                    chunk_id,
                })
            }
            None => {
                self.finish();
                None
            }
        }
    }

    /// Feed a fetch result back in.
    ///
    /// Fetch failures leave the chunk unloaded so a later tick retries it. Buffer errors
    /// other than a duplicate chunk fail the session and are returned.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        now: Duration,
        result: Result<ChunkArray, StoreError>,
    ) -> Result<Option<UpdateRange>, StreamError> {
        if ticket.generation != self.generation {
            debug!(
                "Ignoring chunk {} from a replaced dataset (generation {} != {})",
                ticket.chunk_id, ticket.generation, self.generation
            );
            return Ok(None);
        }
        if self.phase != StreamPhase::Loading(ticket.chunk_id) {
            debug!("Ignoring unexpected completion of chunk {}", ticket.chunk_id);
            return Ok(None);
        }

        self.state.throttle.mark(now);
        self.state.last_fetch_at = Some(now);

        let array = match result {
            Ok(array) => array,
            Err(err) => {
                warn!("Failed to fetch chunk {}: {}", ticket.chunk_id, err);
                self.phase = self.resting_phase();
                return Ok(None);
            }
        };

        match self.append(ticket.chunk_id, &array) {
            Ok(range) => {
                info!(
                    "Chunk {} appended: {} rows, cursor {}",
                    ticket.chunk_id, range.count, self.state.cursor
                );
                self.phase = self.resting_phase();
                if self.buffer.loaded_chunks().len() >= self.index.chunk_count() {
                    self.finish();
                }
                Ok(Some(range))
            }
            Err(err) if !err.is_fatal() => {
                warn!("Skipping chunk {}: {}", ticket.chunk_id, err);
                self.phase = self.resting_phase();
                Ok(None)
            }
            Err(err) => {
                error!("Streaming aborted at chunk {}: {}", ticket.chunk_id, err);
                self.phase = StreamPhase::Failed;
                Err(err.into())
            }
        }
    }

    fn append(&mut self, chunk_id: u32, array: &ChunkArray) -> Result<UpdateRange, BufferError> {
        if array.columns != self.index.attribute_count() {
            return Err(BufferError::ShapeMismatch {
                len: array.data.len(),
                columns: self.index.attribute_count(),
            });
        }

        let range = self.buffer.append(chunk_id, &array.data, self.state.cursor)?;
        self.state.cursor = range.end();

        let style = self.stylesheet.resolve(&self.style_name);
        let group = self
            .active_group
            .as_deref()
            .and_then(|name| self.metadata.group(name));
        Ok(self.layers.restyle(&mut self.buffer, range.as_range(), style, group))
    }

    fn resting_phase(&self) -> StreamPhase {
        if self.buffer.valid_count() == 0 && self.buffer.loaded_chunks().is_empty() {
            StreamPhase::Idle
        } else {
            StreamPhase::Streaming
        }
    }

    fn finish(&mut self) {
        if self.phase != StreamPhase::Complete {
            info!(
                "Stream complete: {} of {} points loaded",
                self.buffer.valid_count(),
                self.index.total_points()
            );
        }
        self.phase = StreamPhase::Complete;
    }

    /// Recolour every populated point with the named style and re-apply the active group.
    /// Unknown names fall back to the default style.
    pub fn set_style(&mut self, name: &str) -> UpdateRange {
        self.style_name = name.to_string();
        let style = self.stylesheet.resolve(name);
        let group = self
            .active_group
            .as_deref()
            .and_then(|name| self.metadata.group(name));
        let valid = self.buffer.valid_range();
        self.layers.restyle(&mut self.buffer, valid, style, group)
    }

    /// Toggle a highlight group. Turning a different group on replaces the current one;
    /// the styled colours are restored before any group is applied.
    pub fn toggle_group(&mut self, name: &str) -> UpdateRange {
        if self.active_group.as_deref() == Some(name) {
            self.active_group = None;
            return self.layers.switch_group(&mut self.buffer, None);
        }

        let Some(group) = self.metadata.group(name) else {
            warn!("Unknown highlight group '{}'", name);
            return UpdateRange::default();
        };
        self.active_group = Some(name.to_string());
        self.layers.switch_group(&mut self.buffer, Some(group))
    }

    pub fn clear_group(&mut self) -> UpdateRange {
        if self.active_group.take().is_none() {
            return UpdateRange::default();
        }
        self.layers.switch_group(&mut self.buffer, None)
    }

    /// Write the populated points to CSV with the dataset origin added back.
    pub fn export<W: Write>(&self, writer: W) -> Result<usize, ExportError> {
        write_csv(&self.buffer, self.metadata.origin, writer)
    }

    /// The placeholder seed cloud is drawn until every chunk has streamed in.
    pub fn show_seed_points(&self) -> bool {
        !matches!(self.phase, StreamPhase::Complete | StreamPhase::Failed)
    }

    pub fn point_size(&self) -> f32 {
        self.point_size_factor * self.index.resolution()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn buffer(&self) -> &PointBuffer {
        &self.buffer
    }

    pub fn style_name(&self) -> &str {
        &self.style_name
    }

    pub fn active_group(&self) -> Option<&str> {
        self.active_group.as_deref()
    }

    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.metadata.group(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dataset::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::from_chunks(
            DatasetMetadata::default(),
            4,
            vec![
                vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 2.0],
                vec![50.0, 0.0, 0.0, 3.0],
                vec![-50.0, 0.0, 0.0, 4.0, -51.0, 0.0, 0.0, 5.0],
            ],
        )
        .unwrap()
    }

    fn open() -> StreamSession {
        StreamSession::open(&store(), &StreamSettings::default()).unwrap()
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn first_tick_requests_the_bootstrap_chunk() {
        let mut session = open();
        let ticket = session.tick(ms(0), &Viewpoint::default()).unwrap();
        assert_eq!(ticket.chunk_id, 0);
        assert_eq!(session.phase(), StreamPhase::Loading(0));
        assert_eq!(session.tick(ms(5), &Viewpoint::default()), None);
    }

    #[test]
    fn completion_appends_and_starts_the_cooldown() {
        let store = store();
        let mut session = open();
        let ticket = session.tick(ms(0), &Viewpoint::default()).unwrap();

        let range = session
            .complete(ticket, ms(20), store.chunk(0))
            .unwrap()
            .unwrap();
        assert_eq!(range, UpdateRange::new(0, 2));
        assert_eq!(session.state().cursor(), 2);
        assert_eq!(session.phase(), StreamPhase::Streaming);

        assert_eq!(session.tick(ms(60), &Viewpoint::default()), None);
        assert!(session.tick(ms(120), &Viewpoint::default()).is_some());
    }

    #[test]
    fn failed_fetch_is_retried() {
        let mut session = open();
        let ticket = session.tick(ms(0), &Viewpoint::default()).unwrap();
        let result = session
            .complete(ticket, ms(10), Err(StoreError::MissingArray("c0".into())))
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(session.phase(), StreamPhase::Idle);
        let retry = session.tick(ms(200), &Viewpoint::default()).unwrap();
        assert_eq!(retry.chunk_id, 0);
    }

    #[test]
    fn stale_tickets_are_ignored() {
        let store = store();
        let mut old = open();
        let ticket = old.tick(ms(0), &Viewpoint::default()).unwrap();

        let mut replacement = open();
        replacement.tick(ms(0), &Viewpoint::default());
        let result = replacement.complete(ticket, ms(10), store.chunk(0)).unwrap();

        assert_eq!(result, None);
        assert_eq!(replacement.buffer().valid_count(), 0);
        assert_eq!(replacement.phase(), StreamPhase::Loading(0));
    }

    #[test]
    fn wrong_column_count_fails_the_session() {
        let mut session = open();
        let ticket = session.tick(ms(0), &Viewpoint::default()).unwrap();
        let bad = ChunkArray::new("c0", 1, 3, vec![0.0, 0.0, 0.0]).unwrap();

        let err = session.complete(ticket, ms(10), Ok(bad)).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Buffer(BufferError::ShapeMismatch { .. })
        ));
        assert_eq!(session.phase(), StreamPhase::Failed);
        assert_eq!(session.tick(ms(500), &Viewpoint::default()), None);
        assert!(!session.show_seed_points());
    }

    #[test]
    fn streams_to_completion() {
        let store = store();
        let mut session = open();
        let mut now = ms(0);
        while let Some(ticket) = session.tick(now, &Viewpoint::default()) {
            session
                .complete(ticket, now, store.chunk(ticket.chunk_id))
                .unwrap();
            now += ms(100);
        }

        assert_eq!(session.phase(), StreamPhase::Complete);
        assert_eq!(session.buffer().valid_count(), 5);
        assert!(!session.show_seed_points());
    }

    #[test]
    fn point_size_scales_with_resolution() {
        let session = open();
        assert!((session.point_size() - 0.32).abs() < 1e-6);
    }

    #[test]
    fn unknown_group_is_a_no_op() {
        let mut session = open();
        assert!(session.toggle_group("missing").is_empty());
        assert_eq!(session.active_group(), None);
    }
}

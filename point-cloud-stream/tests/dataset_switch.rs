use bevy::app::{TaskPoolOptions, TaskPoolPlugin};
use bevy::prelude::*;
use bevy::time::TimePlugin;
use point_cloud_stream::PointStreamPlugin;
use point_cloud_stream::engine::dataset::metadata::DatasetMetadata;
use point_cloud_stream::engine::dataset::store::{ChunkArray, ChunkStore, MemoryStore, StoreError};
use point_cloud_stream::engine::streaming::plugin::{ActiveStream, OpenDataset};
use point_cloud_stream::engine::streaming::session::{StreamPhase, StreamSettings};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLOW_FETCH: Duration = Duration::from_secs(4);

/// Serves metadata at once but takes `SLOW_FETCH` to return any chunk.
struct SlowStore(MemoryStore);

impl ChunkStore for SlowStore {
    fn metadata(&self) -> Result<DatasetMetadata, StoreError> {
        self.0.metadata()
    }

    fn chunk_centers(&self) -> Result<ChunkArray, StoreError> {
        self.0.chunk_centers()
    }

    fn chunk(&self, chunk_id: u32) -> Result<ChunkArray, StoreError> {
        std::thread::sleep(SLOW_FETCH);
        self.0.chunk(chunk_id)
    }
}

fn memory_store(offset: f32) -> MemoryStore {
    let chunks = (0..3)
        .map(|i| {
            let x = offset + i as f32 * 10.0;
            vec![x, 0.0, 0.0, x + 1.0, 0.0, 1.0]
        })
        .collect();
    MemoryStore::from_chunks(DatasetMetadata::default(), 3, chunks).unwrap()
}

fn run_until(app: &mut App, limit: Duration, done: impl Fn(&ActiveStream) -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        app.update();
        if done(app.world().resource::<ActiveStream>()) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn switching_datasets_does_not_wait_for_the_old_fetch() {
    let mut app = App::new();
    app.add_plugins((
        TaskPoolPlugin {
            task_pool_options: TaskPoolOptions::with_num_threads(16),
        },
        TimePlugin,
        PointStreamPlugin,
    ))
    .insert_resource(StreamSettings {
        load_interval_ms: 0,
        ..Default::default()
    });

    app.world_mut().send_event(OpenDataset {
        store: Arc::new(SlowStore(memory_store(0.0))),
    });
    assert!(run_until(&mut app, Duration::from_secs(2), |a| a.is_fetching()));

    let switched_at = Instant::now();
    app.world_mut().send_event(OpenDataset {
        store: Arc::new(memory_store(500.0)),
    });
    assert!(run_until(&mut app, Duration::from_secs(3), |a| {
        a.session().map(|s| s.phase()) == Some(StreamPhase::Complete)
    }));

    assert!(switched_at.elapsed() < SLOW_FETCH);
    let active = app.world().resource::<ActiveStream>();
    let buffer = active.session().unwrap().buffer();
    assert_eq!(buffer.valid_count(), 6);
    assert!(buffer.position_slice(0..6).chunks_exact(3).all(|p| p[0] >= 500.0));
}

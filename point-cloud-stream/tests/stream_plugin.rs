use bevy::app::TaskPoolPlugin;
use bevy::prelude::*;
use bevy::time::TimePlugin;
use point_cloud_stream::PointStreamPlugin;
use point_cloud_stream::engine::colour::group::{CompareOp, GroupSpec, Predicate};
use point_cloud_stream::engine::dataset::metadata::DatasetMetadata;
use point_cloud_stream::engine::dataset::store::MemoryStore;
use point_cloud_stream::engine::streaming::plugin::{
    ActiveStream, OpenDataset, SelectStyle, StreamUpdated, ToggleGroup, UpdateKind,
};
use point_cloud_stream::engine::streaming::session::{StreamPhase, StreamSettings};
use std::sync::Arc;
use std::time::Duration;

fn store(offset: f32) -> Arc<MemoryStore> {
    let chunks = (0..4)
        .map(|i| {
            let x = offset + i as f32 * 10.0;
            vec![x, 0.0, 0.0, x + 1.0, 0.0, 1.0]
        })
        .collect();
    Arc::new(MemoryStore::from_chunks(DatasetMetadata::default(), 3, chunks).unwrap())
}

fn app() -> App {
    let mut app = App::new();
    app.add_plugins((TaskPoolPlugin::default(), TimePlugin, PointStreamPlugin))
        .insert_resource(StreamSettings {
            load_interval_ms: 0,
            ..Default::default()
        });
    app
}

fn run_until(app: &mut App, done: impl Fn(&ActiveStream) -> bool) -> bool {
    for _ in 0..2000 {
        app.update();
        if done(app.world().resource::<ActiveStream>()) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

fn phase(active: &ActiveStream) -> Option<StreamPhase> {
    active.session().map(|s| s.phase())
}

#[test]
fn plugin_streams_a_dataset_to_completion() {
    let mut app = app();
    app.world_mut().send_event(OpenDataset { store: store(0.0) });

    assert!(run_until(&mut app, |a| phase(a) == Some(StreamPhase::Complete)));

    let active = app.world().resource::<ActiveStream>();
    let session = active.session().unwrap();
    assert_eq!(session.buffer().valid_count(), 8);
    assert!(!session.show_seed_points());
    assert!(!active.is_fetching());
}

#[test]
fn reopening_discards_the_previous_dataset() {
    let mut app = app();
    app.world_mut().send_event(OpenDataset { store: store(0.0) });
    assert!(run_until(&mut app, |a| a.session().is_some()));
    let first = app.world().resource::<ActiveStream>().session().unwrap().generation();

    app.world_mut().send_event(OpenDataset { store: store(500.0) });
    assert!(run_until(&mut app, |a| {
        a.session().is_some_and(|s| s.generation() != first) && phase(a) == Some(StreamPhase::Complete)
    }));

    let active = app.world().resource::<ActiveStream>();
    let buffer = active.session().unwrap().buffer();
    assert_eq!(buffer.valid_count(), 8);
    assert!(buffer.position_slice(0..8).chunks_exact(3).all(|p| p[0] >= 500.0));
}

#[test]
fn style_requests_reach_the_session() {
    let mut app = app();
    app.world_mut().send_event(OpenDataset { store: store(0.0) });
    assert!(run_until(&mut app, |a| phase(a) == Some(StreamPhase::Complete)));

    app.world_mut().send_event(SelectStyle("elev".to_string()));
    app.update();

    let active = app.world().resource::<ActiveStream>();
    assert_eq!(active.session().unwrap().style_name(), "elev");
}

#[test]
fn toggling_a_group_highlights_the_loaded_points() {
    let mut metadata = DatasetMetadata::default();
    metadata.groups.insert(
        "raised".to_string(),
        GroupSpec {
            compare: Some(Predicate::new(2, CompareOp::Greater, 0.5)),
            ..Default::default()
        },
    );
    let chunks = vec![vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0], vec![10.0, 0.0, 0.0, 11.0, 0.0, 1.0]];
    let store = Arc::new(MemoryStore::from_chunks(metadata, 3, chunks).unwrap());

    let mut app = app();
    app.world_mut().send_event(OpenDataset { store });
    assert!(run_until(&mut app, |a| phase(a) == Some(StreamPhase::Complete)));

    app.world_mut().send_event(ToggleGroup("raised".to_string()));
    app.update();

    let highlighted: Vec<StreamUpdated> = app
        .world()
        .resource::<Events<StreamUpdated>>()
        .iter_current_update_events()
        .filter(|e| e.kind == UpdateKind::Highlighted)
        .copied()
        .collect();
    assert_eq!(highlighted.len(), 1);
    assert_eq!(highlighted[0].range.as_range(), 0..4);
    let active = app.world().resource::<ActiveStream>();
    assert_eq!(active.session().unwrap().active_group(), Some("raised"));

    app.world_mut().send_event(ToggleGroup("raised".to_string()));
    app.update();
    let active = app.world().resource::<ActiveStream>();
    assert_eq!(active.session().unwrap().active_group(), None);
}

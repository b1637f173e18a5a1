use super::scheduler::Viewpoint;
use super::session::{FetchTicket, OpenError, StreamSession, StreamSettings};
use crate::engine::buffer::UpdateRange;
use crate::engine::dataset::store::{ChunkArray, ChunkStore, StoreError};
use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task, block_on, futures_lite::future};
use std::sync::Arc;

/// Camera state written by the host renderer each frame.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct StreamViewpoint(pub Viewpoint);

/// Replace the active dataset with the one behind `store`.
#[derive(Event, Clone)]
pub struct OpenDataset {
    pub store: Arc<dyn ChunkStore>,
}

#[derive(Event, Debug, Clone)]
pub struct SelectStyle(pub String);

#[derive(Event, Debug, Clone)]
pub struct ToggleGroup(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Opened,
    Appended,
    Restyled,
    Highlighted,
    Failed,
}

/// Points in `range` changed; the renderer re-uploads them.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StreamUpdated {
    pub generation: u64,
    pub kind: UpdateKind,
    pub range: UpdateRange,
    pub show_seed_points: bool,
}

impl StreamUpdated {
    fn new(session: &StreamSession, kind: UpdateKind, range: UpdateRange) -> Self {
        Self {
            generation: session.generation(),
            kind,
            range,
            show_seed_points: session.show_seed_points(),
        }
    }
}

struct PendingOpen {
    store: Arc<dyn ChunkStore>,
    task: Task<Result<StreamSession, OpenError>>,
}

struct PendingFetch {
    ticket: FetchTicket,
    task: Task<Result<ChunkArray, StoreError>>,
}

/// The streaming session the app is showing, with its store and in-flight tasks.
#[derive(Resource, Default)]
pub struct ActiveStream {
    session: Option<StreamSession>,
    store: Option<Arc<dyn ChunkStore>>,
    opening: Option<PendingOpen>,
    fetch: Option<PendingFetch>,
}

impl ActiveStream {
    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut StreamSession> {
        self.session.as_mut()
    }

    pub fn is_opening(&self) -> bool {
        self.opening.is_some()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_some()
    }
}

pub struct PointStreamPlugin;

impl Plugin for PointStreamPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StreamSettings>()
            .init_resource::<StreamViewpoint>()
            .init_resource::<ActiveStream>()
            .add_event::<OpenDataset>()
            .add_event::<SelectStyle>()
            .add_event::<ToggleGroup>()
            .add_event::<StreamUpdated>()
            .add_systems(
                Update,
                (
                    handle_open_requests,
                    poll_open_task,
                    poll_fetch_task,
                    schedule_next_fetch,
                    handle_style_requests,
                    handle_group_requests,
                )
                    .chain(),
            );
    }
}

/// Start opening the newest requested dataset on the IO pool. The old session and any
/// fetch still in flight for it are dropped straight away, so the new dataset never
/// waits on the old store.
pub fn handle_open_requests(
    mut events: EventReader<OpenDataset>,
    mut active: ResMut<ActiveStream>,
    settings: Res<StreamSettings>,
) {
    let Some(request) = events.read().last() else {
        return;
    };

    if let Some(old) = active.session.take() {
        info!("Closing dataset generation {}", old.generation());
    }
    if let Some(stale) = active.fetch.take() {
        debug!(
            "Cancelling fetch of chunk {} for generation {}",
            stale.ticket.chunk_id, stale.ticket.generation
        );
    }
    active.store = None;

    let store = request.store.clone();
    let task_store = store.clone();
    let settings = settings.clone();
    let task = IoTaskPool::get()
        .spawn(async move { StreamSession::open(task_store.as_ref(), &settings) });
    active.opening = Some(PendingOpen { store, task });
}

pub fn poll_open_task(mut active: ResMut<ActiveStream>, mut updates: EventWriter<StreamUpdated>) {
    let Some(pending) = active.opening.as_mut() else {
        return;
    };
    let Some(result) = block_on(future::poll_once(&mut pending.task)) else {
        return;
    };
    let Some(pending) = active.opening.take() else {
        return;
    };

    match result {
        Ok(session) => {
            updates.write(StreamUpdated::new(&session, UpdateKind::Opened, UpdateRange::default()));
            active.store = Some(pending.store);
            active.session = Some(session);
        }
        Err(err) => error!("Failed to open dataset: {}", err),
    }
}

/// Route a finished fetch into whichever session is current. The session's generation
/// check rejects rows meant for a dataset that has since been replaced.
pub fn poll_fetch_task(
    time: Res<Time>,
    mut active: ResMut<ActiveStream>,
    mut updates: EventWriter<StreamUpdated>,
) {
    let Some(pending) = active.fetch.as_mut() else {
        return;
    };
    let Some(result) = block_on(future::poll_once(&mut pending.task)) else {
        return;
    };
    let Some(pending) = active.fetch.take() else {
        return;
    };
    let Some(session) = active.session.as_mut() else {
        debug!("Dropping chunk {} with no active dataset", pending.ticket.chunk_id);
        return;
    };

    match session.complete(pending.ticket, time.elapsed(), result) {
        Ok(Some(range)) => {
            updates.write(StreamUpdated::new(session, UpdateKind::Appended, range));
        }
        Ok(None) => {}
        Err(_) => {
            updates.write(StreamUpdated::new(session, UpdateKind::Failed, UpdateRange::default()));
        }
    }
}

pub fn schedule_next_fetch(
    time: Res<Time>,
    viewpoint: Res<StreamViewpoint>,
    mut active: ResMut<ActiveStream>,
) {
    if active.fetch.is_some() {
        return;
    }
    let Some(store) = active.store.clone() else {
        return;
    };
    let Some(session) = active.session.as_mut() else {
        return;
    };
    let Some(ticket) = session.tick(time.elapsed(), &viewpoint.0) else {
        return;
    };

    debug!("Fetching chunk {}", ticket.chunk_id);
    let task = IoTaskPool::get().spawn(async move { store.chunk(ticket.chunk_id) });
    active.fetch = Some(PendingFetch { ticket, task });
}

pub fn handle_style_requests(
    mut events: EventReader<SelectStyle>,
    mut active: ResMut<ActiveStream>,
    mut updates: EventWriter<StreamUpdated>,
) {
    let Some(session) = active.session.as_mut() else {
        events.clear();
        return;
    };
    for SelectStyle(name) in events.read() {
        let range = session.set_style(name);
        updates.write(StreamUpdated::new(session, UpdateKind::Restyled, range));
    }
}

pub fn handle_group_requests(
    mut events: EventReader<ToggleGroup>,
    mut active: ResMut<ActiveStream>,
    mut updates: EventWriter<StreamUpdated>,
) {
    let Some(session) = active.session.as_mut() else {
        events.clear();
        return;
    };
    for ToggleGroup(name) in events.read() {
        let range = session.toggle_group(name);
        if !range.is_empty() {
            updates.write(StreamUpdated::new(session, UpdateKind::Highlighted, range));
        }
    }
}

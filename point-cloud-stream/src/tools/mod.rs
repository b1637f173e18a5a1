pub mod annotations;
pub mod geometry;
pub mod selection;

use annotations::{Annotation, AnnotationDocument, SiteAnnotations};
use bevy::prelude::*;
use bevy_common_assets::json::JsonAssetPlugin;
use selection::{AnnotationTool, Selection};

/// A point picked on the cloud by the host's raycast.
#[derive(Event, Debug, Clone, Copy)]
pub struct PickPoint(pub Vec3);

/// Turn the current selection into an annotation. `text` labels single-point picks.
#[derive(Event, Debug, Clone, Default)]
pub struct CommitSelection {
    pub text: Option<String>,
}

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct CancelSelection;

/// Delete the annotations anchored at this vertex.
#[derive(Event, Debug, Clone, Copy)]
pub struct RemoveAnnotation(pub Vec3);

/// The active site's records changed; the host persists them.
#[derive(Event, Debug, Clone)]
pub struct AnnotationsChanged {
    pub site: Option<String>,
    pub added: Option<Annotation>,
    pub removed: usize,
}

/// Records of the site currently on screen.
#[derive(Resource, Debug, Clone, Default)]
pub struct ActiveAnnotations {
    pub site: Option<String>,
    pub records: SiteAnnotations,
}

impl ActiveAnnotations {
    /// Switch to `site`, taking its records from `document` if it has any.
    pub fn load_site(&mut self, site: &str, document: &AnnotationDocument) {
        self.site = Some(site.to_string());
        self.records = document.site(site).cloned().unwrap_or_default();
    }

    /// Write the active records back into `document`.
    pub fn store_into(&self, document: &mut AnnotationDocument) {
        if let Some(site) = &self.site {
            *document.site_mut(site) = self.records.clone();
        }
    }
}

pub struct AnnotationPlugin;

impl Plugin for AnnotationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(JsonAssetPlugin::<AnnotationDocument>::new(&[
            "annotations.json",
        ]))
        .init_resource::<Selection>()
        .init_resource::<AnnotationTool>()
        .init_resource::<ActiveAnnotations>()
        .add_event::<PickPoint>()
        .add_event::<CommitSelection>()
        .add_event::<CancelSelection>()
        .add_event::<RemoveAnnotation>()
        .add_event::<AnnotationsChanged>()
        .add_systems(
            Update,
            (
                collect_picks,
                handle_cancel_selection,
                handle_commit_selection,
                handle_remove_annotation,
            )
                .chain(),
        );
    }
}

pub fn collect_picks(mut picks: EventReader<PickPoint>, mut selection: ResMut<Selection>) {
    for PickPoint(point) in picks.read() {
        selection.push(*point);
    }
}

pub fn handle_cancel_selection(
    mut events: EventReader<CancelSelection>,
    mut selection: ResMut<Selection>,
) {
    if events.read().count() > 0 {
        selection.cancel();
    }
}

pub fn handle_commit_selection(
    mut events: EventReader<CommitSelection>,
    mut selection: ResMut<Selection>,
    tool: Res<AnnotationTool>,
    mut active: ResMut<ActiveAnnotations>,
    mut changed: EventWriter<AnnotationsChanged>,
) {
    for commit in events.read() {
        if selection.is_empty() {
            continue;
        }
        let count = selection.len();
        let Some(annotation) = selection.commit(tool.color(), commit.text.as_deref()) else {
            debug!("Selection of {} point(s) produced no annotation", count);
            continue;
        };

        info!("Committed {} point annotation", count);
        active.records.push(annotation.clone());
        changed.write(AnnotationsChanged {
            site: active.site.clone(),
            added: Some(annotation),
            removed: 0,
        });
    }
}

pub fn handle_remove_annotation(
    mut events: EventReader<RemoveAnnotation>,
    mut active: ResMut<ActiveAnnotations>,
    mut changed: EventWriter<AnnotationsChanged>,
) {
    for RemoveAnnotation(anchor) in events.read() {
        let removed = active.records.remove_by_anchor(*anchor);
        if removed > 0 {
            changed.write(AnnotationsChanged {
                site: active.site.clone(),
                added: None,
                removed,
            });
        }
    }
}

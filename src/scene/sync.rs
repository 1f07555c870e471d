// scene/sync.rs
use hecs::{Entity, World};

use super::components::{
    GeometryComponent, MaterialComponent, ModesComponent, Placement, RenderLink,
    TransformComponent, VertexBufsComponent,
};
use crate::renderer::gpu::Gpu;
use crate::renderer::object::{ObjectKey, ObjectStates};
use crate::renderer::renderer::Renderer;
use crate::renderer::state::{ModesState, TransformState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    /// Entities whose fragments no longer exist in the renderer.
    pub failed: usize,
}

struct ReadyEntity {
    entity: Entity,
    geometry: GeometryComponent,
    material: MaterialComponent,
    transform: Option<TransformComponent>,
    modes: Option<ModesComponent>,
    vertex_bufs: Option<VertexBufsComponent>,
    placement: Option<Placement>,
    link: Option<RenderLink>,
}

fn is_render_ready(world: &World, entity: Entity) -> bool {
    world
        .satisfies::<(&GeometryComponent, &MaterialComponent)>(entity)
        .unwrap_or(false)
}

/// Keeps renderer objects in step with the world. An entity is render-ready
/// once it carries both a [`GeometryComponent`] and a [`MaterialComponent`];
/// missing transform and modes fragments are created and written back.
pub fn sync_world<G: Gpu>(world: &mut World, renderer: &mut Renderer<G>) -> SyncReport {
    let mut report = SyncReport::default();

    // Objects whose entity is gone, no longer render-ready, or relinked
    let stale: Vec<(ObjectKey, Entity)> = renderer
        .objects()
        .filter(|(key, object)| {
            let entity = object.entity();
            let linked = world
                .get::<&RenderLink>(entity)
                .map(|link| link.0 == *key)
                .unwrap_or(false);
            !linked || !is_render_ready(world, entity)
        })
        .map(|(key, object)| (key, object.entity()))
        .collect();
    for (key, entity) in stale {
        if renderer.destroy_object(key) {
            report.destroyed += 1;
        }
        if world.contains(entity) && !is_render_ready(world, entity) {
            let _ = world.remove_one::<RenderLink>(entity);
        }
    }

    let ready: Vec<ReadyEntity> = world
        .query::<(
            &GeometryComponent,
            &MaterialComponent,
            Option<&TransformComponent>,
            Option<&ModesComponent>,
            Option<&VertexBufsComponent>,
            Option<&Placement>,
            Option<&RenderLink>,
        )>()
        .iter()
        .map(
            |(entity, (geometry, material, transform, modes, vertex_bufs, placement, link))| {
                ReadyEntity {
                    entity,
                    geometry: *geometry,
                    material: *material,
                    transform: transform.copied(),
                    modes: modes.copied(),
                    vertex_bufs: vertex_bufs.copied(),
                    placement: placement.copied(),
                    link: link.copied(),
                }
            },
        )
        .collect();

    for item in ready {
        let transform = match item.transform {
            Some(transform) => transform,
            None => {
                let state = match item.placement {
                    Some(placement) => TransformState::from_transform(&placement.0),
                    None => TransformState::identity(),
                };
                let component = TransformComponent(renderer.create_state(state));
                let _ = world.insert_one(item.entity, component);
                component
            }
        };
        let modes = match item.modes {
            Some(modes) => modes,
            None => {
                let component = ModesComponent(renderer.create_state(ModesState::default()));
                let _ = world.insert_one(item.entity, component);
                component
            }
        };

        if let Some(placement) = item.placement {
            let matrix = placement.0.matrix();
            let current = renderer.state(transform.0).map(|state| state.matrix());
            if current.is_some_and(|current| current != matrix) {
                if let Err(err) = renderer.update_state(transform.0, |state| state.set_matrix(matrix)) {
                    log::warn!("Entity {:?} placement not applied: {}", item.entity, err);
                }
            }
        }

        let states = ObjectStates {
            material: item.material.0,
            geometry: item.geometry.0,
            transform: transform.0,
            modes: modes.0,
            vertex_bufs: item.vertex_bufs.map(|v| v.0),
        };

        let linked = item
            .link
            .and_then(|link| renderer.object(link.0).map(|object| (link.0, *object.states())));
        match linked {
            Some((_, current)) if current == states => {}
            Some((key, _)) => match renderer.update_object(key, states) {
                Ok(()) => report.updated += 1,
                Err(err) => {
                    log::warn!("Entity {:?} not updated: {}", item.entity, err);
                    renderer.destroy_object(key);
                    let _ = world.remove_one::<RenderLink>(item.entity);
                    report.destroyed += 1;
                    report.failed += 1;
                }
            },
            None => match renderer.create_object(item.entity, states) {
                Ok(key) => {
                    let _ = world.insert_one(item.entity, RenderLink(key));
                    report.created += 1;
                }
                Err(err) => {
                    log::trace!("Entity {:?} not render-ready: {}", item.entity, err);
                    if item.link.is_some() {
                        let _ = world.remove_one::<RenderLink>(item.entity);
                    }
                    report.failed += 1;
                }
            },
        }
    }

    if report != SyncReport::default() {
        log::debug!(
            "World sync: {} created, {} updated, {} destroyed, {} failed",
            report.created,
            report.updated,
            report.destroyed,
            report.failed
        );
    }
    report
}

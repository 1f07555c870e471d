// scene/components.rs
// Plain hecs components naming the renderer fragments of an entity

use crate::renderer::object::ObjectKey;
use crate::renderer::state::{
    GeometryState, MaterialState, ModesState, StateRef, Transform, TransformState,
    VertexBufsState,
};

/// Geometry fragment. Together with [`MaterialComponent`] it makes an entity
/// render-ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryComponent(pub StateRef<GeometryState>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialComponent(pub StateRef<MaterialState>);

/// Transform fragment. Created by [`sync_world`] when missing.
///
/// [`sync_world`]: super::sync_world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformComponent(pub StateRef<TransformState>);

/// Render modes fragment. Created by [`sync_world`] when missing.
///
/// [`sync_world`]: super::sync_world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModesComponent(pub StateRef<ModesState>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufsComponent(pub StateRef<VertexBufsState>);

/// Local transform pushed into the entity's transform fragment on every sync.
#[derive(Debug, Clone, Copy)]
pub struct Placement(pub Transform);

/// Render object created for this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLink(pub ObjectKey);

// scene/mod.rs
pub mod components;
pub mod sync;

pub use components::{
    GeometryComponent, MaterialComponent, ModesComponent, Placement, RenderLink,
    TransformComponent, VertexBufsComponent,
};
pub use sync::{sync_world, SyncReport};

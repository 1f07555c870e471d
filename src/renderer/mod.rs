pub mod camera;
pub mod draw_list;
pub mod frame;
pub mod gpu;
pub mod headless;
pub mod object;
pub mod passes;
pub mod program;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod shader;
pub mod state;

pub use camera::Camera;
pub use draw_list::{DrawEntry, DrawKey, DrawList};
pub use frame::{decode_pick_color, encode_pick_index, Frame};
pub use gpu::{
    BufferId, FrontFace, Gpu, GpuProgram, IndexType, Primitive, RenderTarget, TextureId,
    UniformValue,
};
pub use headless::{GpuCommand, HeadlessGpu};
pub use object::{CompileFailure, DrawOutcome, ObjectKey, ObjectStates, RenderObject};
pub use passes::{PassKind, ProgramCache, SceneFeatures};
pub use renderer::{PickResult, Renderer, RendererStats};
pub use state::{StateFactory, StateId, StateRef, StructureChange};

// renderer/passes/mod.rs
pub mod cache;
pub mod draw;
pub mod emphasis;
pub mod outline;
pub mod pick;
pub mod shadow;

pub use cache::{PassProgram, ProgramCache, ProgramHandle, ProgramKey};

use std::fmt;

use bitflags::bitflags;
use glam::Mat4;

use super::camera::Camera;
use super::frame::Frame;
use super::gpu::{BufferId, Gpu, Primitive, UniformValue};
use super::program::Program;
use super::shader::ShaderSource;
use super::state::{
    Appearance, ClipsState, EmphasisMaterialState, GeometryFeatures, GeometryState, LightsState,
    MaterialState, ModesState, OutlineMaterialState, State, StateId, TransformState,
    VertexBufsState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Draw,
    EmphasisFill,
    EmphasisEdges,
    EmphasisVertices,
    Outline,
    Shadow,
    PickMesh,
    PickTriangle,
    PickVertex,
}

impl PassKind {
    pub const COUNT: usize = 9;

    pub const ALL: [PassKind; Self::COUNT] = [
        Self::Draw,
        Self::EmphasisFill,
        Self::EmphasisEdges,
        Self::EmphasisVertices,
        Self::Outline,
        Self::Shadow,
        Self::PickMesh,
        Self::PickTriangle,
        Self::PickVertex,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Draw => "Draw",
            Self::EmphasisFill => "EmphasisFill",
            Self::EmphasisEdges => "EmphasisEdges",
            Self::EmphasisVertices => "EmphasisVertices",
            Self::Outline => "Outline",
            Self::Shadow => "Shadow",
            Self::PickMesh => "PickMesh",
            Self::PickTriangle => "PickTriangle",
            Self::PickVertex => "PickVertex",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    /// Canvas-wide switches that change generated shaders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SceneFeatures: u32 {
        const GAMMA_OUTPUT = 1 << 0;
        const SHADOWS = 1 << 1;
    }
}

/// Scene-level fragments resolved for one frame.
#[derive(Clone, Copy)]
pub struct SceneContext<'a> {
    pub canvas_id: &'a str,
    pub features: SceneFeatures,
    pub gamma_factor: f32,
    pub camera: &'a Camera,
    pub lights: &'a State<LightsState>,
    pub clips: &'a State<ClipsState>,
    pub emphasis: [&'a State<EmphasisMaterialState>; 3],
    pub outline: &'a State<OutlineMaterialState>,
}

impl<'a> SceneContext<'a> {
    pub fn emphasis_material(&self, appearance: Appearance) -> &'a EmphasisMaterialState {
        self.emphasis[appearance.index()]
    }

    /// Structural generations of the scene fragments. Part of every object's
    /// program stamp.
    pub fn stamp(&self) -> [u64; 3] {
        [
            self.lights.generation(),
            self.clips.generation(),
            u64::from(self.features.bits()),
        ]
    }
}

/// One object's fragments resolved for one frame.
#[derive(Clone, Copy)]
pub struct ObjectContext<'a> {
    pub material: &'a State<MaterialState>,
    pub geometry: &'a State<GeometryState>,
    pub transform: &'a State<TransformState>,
    pub modes: &'a State<ModesState>,
    pub vertex_bufs: Option<&'a State<VertexBufsState>>,
}

/// Vertex attributes an object is drawn with once shared vertex buffers
/// have replaced the geometry's own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexAttributes {
    pub positions: Option<BufferId>,
    pub normals: Option<BufferId>,
    pub uvs: Option<BufferId>,
    pub colors: Option<BufferId>,
    pub positions_decode_matrix: Option<Mat4>,
}

impl VertexAttributes {
    pub fn features(&self) -> GeometryFeatures {
        let mut features = GeometryFeatures::empty();
        features.set(GeometryFeatures::NORMALS, self.normals.is_some());
        features.set(GeometryFeatures::UVS, self.uvs.is_some());
        features.set(GeometryFeatures::COLORS, self.colors.is_some());
        features.set(
            GeometryFeatures::QUANTIZED,
            self.positions_decode_matrix.is_some(),
        );
        features
    }
}

impl ObjectContext<'_> {
    pub fn receives_shadows(&self, scene: &SceneContext<'_>) -> bool {
        scene.features.contains(SceneFeatures::SHADOWS) && self.modes.receives_shadow
    }

    pub fn attributes(&self) -> VertexAttributes {
        let geometry = self.geometry;
        let buffers = &geometry.buffers;
        match self.vertex_bufs {
            Some(shared) => VertexAttributes {
                positions: shared.positions.or(buffers.positions),
                normals: shared.normals.or(buffers.normals),
                uvs: shared.uvs.or(buffers.uvs),
                colors: shared.colors.or(buffers.colors),
                positions_decode_matrix: shared
                    .positions_decode_matrix
                    .or(geometry.positions_decode_matrix),
            },
            None => VertexAttributes {
                positions: buffers.positions,
                normals: buffers.normals,
                uvs: buffers.uvs,
                colors: buffers.colors,
                positions_decode_matrix: geometry.positions_decode_matrix,
            },
        }
    }

    /// Attribute features shaders are generated for.
    pub fn features(&self) -> GeometryFeatures {
        self.attributes().features()
    }

    /// Primitive plus effective attribute features.
    pub fn layout_hash(&self) -> String {
        format!(
            "{}{:x}",
            self.geometry.primitive.code(),
            self.features().bits()
        )
    }

    pub fn stamp(&self) -> [u64; 4] {
        [
            self.material.generation(),
            self.geometry.generation(),
            self.modes.generation(),
            self.vertex_bufs.map_or(0, |v| v.generation()),
        ]
    }
}

/// Per-invocation pass arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassArgs {
    pub appearance: Option<Appearance>,
    /// Index into the scene's active lights (shadow pass).
    pub light: Option<usize>,
    /// 1-based object pick index (object pick pass).
    pub pick_index: u32,
}

impl PassArgs {
    pub fn appearance(appearance: Appearance) -> Self {
        Self {
            appearance: Some(appearance),
            ..Self::default()
        }
    }

    pub fn light(light: usize) -> Self {
        Self {
            light: Some(light),
            ..Self::default()
        }
    }

    pub fn pick(index: u32) -> Self {
        Self {
            pick_index: index,
            ..Self::default()
        }
    }
}

/// Last per-object state uploaded to a program while it stayed bound.
/// Cleared whenever the program is (re)bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindTrackers {
    pub material: Option<StateId>,
    pub transform: Option<StateId>,
    pub geometry: Option<(StateId, Option<StateId>)>,
    pub modes: Option<StateId>,
    pub colorize: Option<[f32; 4]>,
}

impl BindTrackers {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub(crate) trait PassRenderer {
    const KIND: PassKind;

    /// Whether the object has anything to draw in this pass.
    fn applies(_object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        true
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String;

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource;

    /// Uploads program-wide uniforms right after the program was made current.
    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        scene: &SceneContext<'_>,
        args: &PassArgs,
    );

    /// Uploads the object's state (skipping what `last` says is current) and
    /// issues the draw.
    fn draw_object(
        program: &Program,
        last: &mut BindTrackers,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        scene: &SceneContext<'_>,
        object: &ObjectContext<'_>,
        args: &PassArgs,
    );
}

/// Hash shared by passes whose shaders depend only on geometry layout,
/// clipping and modes.
pub(crate) fn geometry_hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
    format!(
        "{};{:x};{};{};{}",
        scene.canvas_id,
        scene.features.bits(),
        scene.clips.hash(),
        object.layout_hash(),
        object.modes.hash()
    )
}

pub(crate) fn bind_camera(program: &Program, gpu: &mut dyn Gpu, camera: &Camera) {
    program.set_uniform(
        gpu,
        "u_viewMatrix",
        UniformValue::Mat4(camera.view().to_cols_array()),
    );
    program.set_uniform(
        gpu,
        "u_projMatrix",
        UniformValue::Mat4(camera.proj().to_cols_array()),
    );
    program.set_uniform(
        gpu,
        "u_viewNormalMatrix",
        UniformValue::Mat4(camera.view_normal().to_cols_array()),
    );
}

pub(crate) fn bind_clips(program: &Program, gpu: &mut dyn Gpu, clips: &ClipsState) {
    for (i, plane) in clips.planes.iter().enumerate() {
        program.set_uniform(gpu, &format!("u_clipActive{i}"), UniformValue::Bool(plane.active));
        program.set_uniform(
            gpu,
            &format!("u_clipPos{i}"),
            UniformValue::Vec3(plane.position.to_array()),
        );
        program.set_uniform(
            gpu,
            &format!("u_clipDir{i}"),
            UniformValue::Vec3(plane.direction.to_array()),
        );
    }
}

pub(crate) fn bind_transform(
    program: &Program,
    last: &mut BindTrackers,
    gpu: &mut dyn Gpu,
    object: &ObjectContext<'_>,
) {
    let transform = object.transform;
    if last.transform == Some(transform.id()) {
        return;
    }
    program.set_uniform(
        gpu,
        "u_modelMatrix",
        UniformValue::Mat4(transform.matrix().to_cols_array()),
    );
    program.set_uniform(
        gpu,
        "u_modelNormalMatrix",
        UniformValue::Mat4(transform.normal_matrix().to_cols_array()),
    );
    last.transform = Some(transform.id());
}

pub(crate) fn bind_modes(
    program: &Program,
    last: &mut BindTrackers,
    gpu: &mut dyn Gpu,
    object: &ObjectContext<'_>,
) {
    let modes = object.modes;
    if last.modes != Some(modes.id()) {
        program.set_uniform(gpu, "u_clippable", UniformValue::Bool(modes.clippable));
        last.modes = Some(modes.id());
    }
    if last.colorize != Some(modes.colorize)
        && program.set_uniform(gpu, "u_colorize", UniformValue::Vec4(modes.colorize))
    {
        last.colorize = Some(modes.colorize);
    }
}

/// Binds the object's vertex attributes and index buffer. Shared vertex
/// buffers, when present, replace the geometry's own attribute buffers.
pub(crate) fn bind_geometry(
    program: &Program,
    last: &mut BindTrackers,
    gpu: &mut dyn Gpu,
    object: &ObjectContext<'_>,
) {
    let key = geometry_key(object);
    if last.geometry == Some(key) {
        return;
    }

    let attributes = object.attributes();
    bind_positions(program, gpu, &attributes);
    program.bind_attribute(gpu, "a_normal", attributes.normals);
    program.bind_attribute(gpu, "a_uv", attributes.uvs);
    program.bind_attribute(gpu, "a_color", attributes.colors);
    if let Some(indices) = object.geometry.buffers.indices {
        gpu.bind_index_buffer(indices);
    }
    last.geometry = Some(key);
}

pub(crate) fn geometry_key(object: &ObjectContext<'_>) -> (StateId, Option<StateId>) {
    (object.geometry.id(), object.vertex_bufs.map(|v| v.id()))
}

/// Binds `a_position` and, for quantized positions, the decode matrix.
pub(crate) fn bind_positions(
    program: &Program,
    gpu: &mut dyn Gpu,
    attributes: &VertexAttributes,
) {
    program.bind_attribute(gpu, "a_position", attributes.positions);
    if let Some(decode) = attributes.positions_decode_matrix {
        program.set_uniform(
            gpu,
            "u_positionsDecodeMatrix",
            UniformValue::Mat4(decode.to_cols_array()),
        );
    }
}

/// Issues the draw for a geometry's own primitive.
pub(crate) fn draw_geometry(gpu: &mut dyn Gpu, frame: &mut Frame, geometry: &GeometryState) {
    if geometry.buffers.indices.is_some() {
        gpu.draw_elements(
            geometry.primitive,
            geometry.index_count,
            geometry.index_type,
            0,
        );
        frame.draw_elements += 1;
    } else {
        gpu.draw_arrays(geometry.primitive, 0, geometry.vertex_count);
        frame.draw_arrays += 1;
    }
}

pub(crate) fn is_surface(object: &ObjectContext<'_>) -> bool {
    object.geometry.primitive.is_triangles()
}

pub(crate) fn is_points(object: &ObjectContext<'_>) -> bool {
    object.geometry.primitive == Primitive::Points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_kind_indices_are_dense() {
        for (i, kind) in PassKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn shared_vertex_buffers_extend_geometry_features() {
        use crate::renderer::state::{StateFactory, VertexBufsState};

        let mut factory = StateFactory::new();
        let material = factory.create(MaterialState::default());
        let geometry =
            factory.create(GeometryState::triangles(BufferId(1), 3).with_uvs(BufferId(2)));
        let transform = factory.create(TransformState::identity());
        let modes = factory.create(ModesState::default());
        let shared = factory.create(VertexBufsState {
            positions: Some(BufferId(10)),
            normals: Some(BufferId(11)),
            positions_decode_matrix: Some(Mat4::IDENTITY),
            ..VertexBufsState::default()
        });

        let plain = ObjectContext {
            material: factory.get(material).unwrap(),
            geometry: factory.get(geometry).unwrap(),
            transform: factory.get(transform).unwrap(),
            modes: factory.get(modes).unwrap(),
            vertex_bufs: None,
        };
        let batched = ObjectContext {
            vertex_bufs: factory.get(shared),
            ..plain
        };

        assert_eq!(plain.features(), GeometryFeatures::UVS);
        assert_eq!(
            batched.features(),
            GeometryFeatures::UVS | GeometryFeatures::NORMALS | GeometryFeatures::QUANTIZED
        );
        assert_eq!(batched.attributes().positions, Some(BufferId(10)));
        assert_eq!(batched.attributes().uvs, Some(BufferId(2)));
        assert_ne!(plain.layout_hash(), batched.layout_hash());
        assert_ne!(plain.stamp(), batched.stamp());
    }
}

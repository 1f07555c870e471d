// renderer/passes/pick.rs
// Each pass writes an integer encoded as RGBA8, zero being the cleared
// background. Triangle and vertex colours come from the geometry layer.

use super::{
    bind_camera, bind_clips, bind_geometry, bind_modes, bind_positions, bind_transform,
    draw_geometry, geometry_hash, geometry_key, BindTrackers, ObjectContext, PassArgs, PassKind,
    PassRenderer, SceneContext, VertexAttributes,
};
use crate::renderer::frame::{encode_pick_index, Frame};
use crate::renderer::gpu::{BufferId, Gpu, Primitive, UniformValue};
use crate::renderer::program::Program;
use crate::renderer::shader::{self, ShaderBuilder, ShaderSource, Stage};
use crate::renderer::state::GeometryFeatures;

fn base(label: &str, scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderBuilder {
    let features = object.features();
    let mut b = ShaderBuilder::new(label);
    shader::world_position(&mut b, features.contains(GeometryFeatures::QUANTIZED));
    b.uniform(Stage::Vertex, "mat4", "u_viewMatrix")
        .uniform(Stage::Vertex, "mat4", "u_projMatrix")
        .vertex("vec4 viewPosition = u_viewMatrix * worldPosition;");
    shader::clipping(&mut b, scene.clips.len());
    b.vertex("gl_Position = u_projMatrix * viewPosition;");
    b
}

/// Vertex colours carry the encoded primitive index.
fn with_pick_colors(mut b: ShaderBuilder) -> ShaderSource {
    b.attribute("vec4", "a_color")
        .varying("vec4", "v_pickColor")
        .vertex("v_pickColor = a_color;")
        .fragment("gl_FragColor = v_pickColor;");
    b.build()
}

fn bind_scene(program: &Program, gpu: &mut dyn Gpu, scene: &SceneContext<'_>) {
    bind_camera(program, gpu, scene.camera);
    bind_clips(program, gpu, scene.clips);
}

/// Binds positions plus one pick colour buffer, tracked like regular geometry.
fn bind_pick_attributes(
    program: &Program,
    last: &mut BindTrackers,
    gpu: &mut dyn Gpu,
    object: &ObjectContext<'_>,
    positions: Option<BufferId>,
    colors: Option<BufferId>,
) {
    let key = geometry_key(object);
    if last.geometry == Some(key) {
        return;
    }
    let attributes = VertexAttributes {
        positions,
        colors,
        ..object.attributes()
    };
    bind_positions(program, gpu, &attributes);
    program.bind_attribute(gpu, "a_color", colors);
    last.geometry = Some(key);
}

pub(crate) struct PickMeshPass;

impl PassRenderer for PickMeshPass {
    const KIND: PassKind = PassKind::PickMesh;

    fn applies(object: &ObjectContext<'_>, args: &PassArgs) -> bool {
        args.pick_index > 0 && object.modes.pickable
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let mut b = base("PickMesh", scene, object);
        b.uniform(Stage::Fragment, "vec4", "u_pickColor")
            .fragment("gl_FragColor = u_pickColor;");
        b.build()
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        _args: &PassArgs,
    ) {
        bind_scene(program, gpu, scene);
    }

    fn draw_object(
        program: &Program,
        last: &mut BindTrackers,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        _scene: &SceneContext<'_>,
        object: &ObjectContext<'_>,
        args: &PassArgs,
    ) {
        frame.set_front_face(gpu, object.modes.frontface);
        frame.set_backfaces(gpu, object.modes.backfaces);
        program.set_uniform(
            gpu,
            "u_pickColor",
            UniformValue::Vec4(encode_pick_index(args.pick_index)),
        );
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_geometry(program, last, gpu, object);
        draw_geometry(gpu, frame, object.geometry);
    }
}

pub(crate) struct PickTrianglePass;

impl PassRenderer for PickTrianglePass {
    const KIND: PassKind = PassKind::PickTriangle;

    fn applies(object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        let buffers = &object.geometry.buffers;
        buffers.pick_triangle_positions.is_some()
            && buffers.pick_triangle_colors.is_some()
            && object.geometry.triangle_count() > 0
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        with_pick_colors(base("PickTriangle", scene, object))
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        _args: &PassArgs,
    ) {
        bind_scene(program, gpu, scene);
    }

    fn draw_object(
        program: &Program,
        last: &mut BindTrackers,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        _scene: &SceneContext<'_>,
        object: &ObjectContext<'_>,
        _args: &PassArgs,
    ) {
        let buffers = &object.geometry.buffers;
        frame.set_front_face(gpu, object.modes.frontface);
        frame.set_backfaces(gpu, object.modes.backfaces);
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_pick_attributes(
            program,
            last,
            gpu,
            object,
            buffers.pick_triangle_positions,
            buffers.pick_triangle_colors,
        );
        gpu.draw_arrays(Primitive::Triangles, 0, object.geometry.triangle_count() * 3);
        frame.draw_arrays += 1;
    }
}

pub(crate) struct PickVertexPass;

impl PassRenderer for PickVertexPass {
    const KIND: PassKind = PassKind::PickVertex;

    fn applies(object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        object.geometry.buffers.pick_vertex_colors.is_some() && object.geometry.vertex_count > 0
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let mut b = base("PickVertex", scene, object);
        b.uniform(Stage::Vertex, "float", "u_pointSize")
            .vertex("gl_PointSize = u_pointSize;");
        with_pick_colors(b)
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        _args: &PassArgs,
    ) {
        bind_scene(program, gpu, scene);
    }

    fn draw_object(
        program: &Program,
        last: &mut BindTrackers,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        _scene: &SceneContext<'_>,
        object: &ObjectContext<'_>,
        _args: &PassArgs,
    ) {
        let geometry = object.geometry;
        program.set_uniform(
            gpu,
            "u_pointSize",
            UniformValue::Float(object.material.point_size.max(1.0)),
        );
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_pick_attributes(
            program,
            last,
            gpu,
            object,
            object.attributes().positions,
            geometry.buffers.pick_vertex_colors,
        );
        gpu.draw_arrays(Primitive::Points, 0, geometry.vertex_count);
        frame.draw_arrays += 1;
    }
}

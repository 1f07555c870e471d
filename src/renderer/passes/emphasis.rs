// renderer/passes/emphasis.rs
// Ghost, highlight and selection share one program per sub-pass; the
// appearance only picks the emphasis material uploaded at bind time.

use super::{
    bind_camera, bind_clips, bind_geometry, bind_modes, bind_positions, bind_transform,
    draw_geometry, geometry_hash, geometry_key, is_surface, BindTrackers, ObjectContext, PassArgs,
    PassKind, PassRenderer, SceneContext, SceneFeatures,
};
use crate::renderer::frame::Frame;
use crate::renderer::gpu::{Gpu, Primitive, UniformValue};
use crate::renderer::program::Program;
use crate::renderer::shader::{self, ShaderBuilder, ShaderSource, Stage};
use crate::renderer::state::{Appearance, EmphasisMaterialState, GeometryFeatures};

fn material<'a>(scene: &SceneContext<'a>, args: &PassArgs) -> &'a EmphasisMaterialState {
    scene.emphasis_material(args.appearance.unwrap_or(Appearance::Ghost))
}

/// Common vertex stage: position, view/projection and clipping.
fn base(label: &str, scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderBuilder {
    let features = object.features();
    let mut b = ShaderBuilder::new(label);
    shader::world_position(&mut b, features.contains(GeometryFeatures::QUANTIZED));
    b.uniform(Stage::Vertex, "mat4", "u_viewMatrix")
        .uniform(Stage::Vertex, "mat4", "u_projMatrix")
        .vertex("vec4 viewPosition = u_viewMatrix * worldPosition;");
    shader::clipping(&mut b, scene.clips.len());
    b
}

fn finish(mut b: ShaderBuilder, scene: &SceneContext<'_>, color: &str) -> ShaderSource {
    b.vertex("gl_Position = u_projMatrix * viewPosition;");
    if scene.features.contains(SceneFeatures::GAMMA_OUTPUT) {
        shader::gamma_output(&mut b);
        b.fragment(&format!("gl_FragColor = linearToGamma({color}, u_gammaFactor);"));
    } else {
        b.fragment(&format!("gl_FragColor = {color};"));
    }
    b.build()
}

fn bind_scene(program: &Program, gpu: &mut dyn Gpu, scene: &SceneContext<'_>) {
    bind_camera(program, gpu, scene.camera);
    bind_clips(program, gpu, scene.clips);
    program.set_uniform(gpu, "u_gammaFactor", UniformValue::Float(scene.gamma_factor));
}

pub(crate) struct FillPass;

impl PassRenderer for FillPass {
    const KIND: PassKind = PassKind::EmphasisFill;

    fn applies(object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        is_surface(object)
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let mut b = base("EmphasisFill", scene, object);
        b.uniform(Stage::Fragment, "vec4", "u_fillColor");
        if object.features().contains(GeometryFeatures::NORMALS) {
            b.attribute("vec3", "a_normal")
                .uniform(Stage::Vertex, "mat4", "u_modelNormalMatrix")
                .uniform(Stage::Vertex, "mat4", "u_viewNormalMatrix")
                .varying("float", "v_shade")
                .vertex("vec3 viewNormal = normalize((u_viewNormalMatrix * u_modelNormalMatrix * vec4(a_normal, 0.0)).xyz);")
                .vertex("v_shade = 0.5 + 0.5 * abs(viewNormal.z);")
                .fragment("vec4 fillColor = vec4(u_fillColor.rgb * v_shade, u_fillColor.a);");
        } else {
            b.fragment("vec4 fillColor = u_fillColor;");
        }
        finish(b, scene, "fillColor")
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        args: &PassArgs,
    ) {
        bind_scene(program, gpu, scene);
        let material = material(scene, args);
        program.set_uniform(
            gpu,
            "u_fillColor",
            UniformValue::Vec4(material.fill_color.extend(material.fill_alpha).to_array()),
        );
    }

    fn draw_object(
        program: &Program,
        last: &mut BindTrackers,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        scene: &SceneContext<'_>,
        object: &ObjectContext<'_>,
        args: &PassArgs,
    ) {
        frame.set_front_face(gpu, object.modes.frontface);
        frame.set_backfaces(gpu, material(scene, args).backfaces);
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_geometry(program, last, gpu, object);
        draw_geometry(gpu, frame, object.geometry);
    }
}

pub(crate) struct EdgesPass;

impl PassRenderer for EdgesPass {
    const KIND: PassKind = PassKind::EmphasisEdges;

    fn applies(object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        object.geometry.buffers.edge_indices.is_some() && object.geometry.edge_index_count > 0
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let mut b = base("EmphasisEdges", scene, object);
        b.uniform(Stage::Fragment, "vec4", "u_edgeColor");
        finish(b, scene, "u_edgeColor")
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        scene: &SceneContext<'_>,
        args: &PassArgs,
    ) {
        bind_scene(program, gpu, scene);
        let material = material(scene, args);
        program.set_uniform(
            gpu,
            "u_edgeColor",
            UniformValue::Vec4(material.edge_color.extend(material.edge_alpha).to_array()),
        );
        frame.set_line_width(gpu, material.edge_width);
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
        let Some(edges) = geometry.buffers.edge_indices else {
            return;
        };
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        let key = geometry_key(object);
        if last.geometry != Some(key) {
            bind_positions(program, gpu, &object.attributes());
            gpu.bind_index_buffer(edges);
            last.geometry = Some(key);
        }
        gpu.draw_elements(
            Primitive::Lines,
            geometry.edge_index_count,
            geometry.index_type,
            0,
        );
        frame.draw_elements += 1;
    }
}

pub(crate) struct VerticesPass;

impl PassRenderer for VerticesPass {
    const KIND: PassKind = PassKind::EmphasisVertices;

    fn applies(object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        object.geometry.vertex_count > 0
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let mut b = base("EmphasisVertices", scene, object);
        b.uniform(Stage::Vertex, "float", "u_pointSize")
            .uniform(Stage::Fragment, "vec4", "u_vertexColor")
            .vertex("gl_PointSize = u_pointSize;");
        finish(b, scene, "u_vertexColor")
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        args: &PassArgs,
    ) {
        bind_scene(program, gpu, scene);
        let material = material(scene, args);
        program.set_uniform(
            gpu,
            "u_vertexColor",
            UniformValue::Vec4(material.vertex_color.extend(material.vertex_alpha).to_array()),
        );
        program.set_uniform(gpu, "u_pointSize", UniformValue::Float(material.vertex_size));
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
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_geometry(program, last, gpu, object);
        gpu.draw_arrays(Primitive::Points, 0, object.geometry.vertex_count);
        frame.draw_arrays += 1;
    }
}

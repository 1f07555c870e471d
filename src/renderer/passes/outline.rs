// renderer/passes/outline.rs
use super::{
    bind_camera, bind_clips, bind_geometry, bind_modes, bind_transform, draw_geometry,
    geometry_hash, is_surface, BindTrackers, ObjectContext, PassArgs, PassKind, PassRenderer,
    SceneContext,
};
use crate::renderer::frame::Frame;
use crate::renderer::gpu::{Gpu, UniformValue};
use crate::renderer::program::Program;
use crate::renderer::shader::{self, ShaderBuilder, ShaderSource, Stage};
use crate::renderer::state::GeometryFeatures;

/// Draws outlined objects inflated along their normals in a flat colour.
pub(crate) struct OutlinePass;

impl PassRenderer for OutlinePass {
    const KIND: PassKind = PassKind::Outline;

    fn applies(object: &ObjectContext<'_>, _args: &PassArgs) -> bool {
        is_surface(object)
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let features = object.features();
        let mut b = ShaderBuilder::new("Outline");
        shader::world_position(&mut b, features.contains(GeometryFeatures::QUANTIZED));
        b.uniform(Stage::Vertex, "mat4", "u_viewMatrix")
            .uniform(Stage::Vertex, "mat4", "u_projMatrix")
            .uniform(Stage::Vertex, "float", "u_width")
            .uniform(Stage::Fragment, "vec4", "u_color");
        if features.contains(GeometryFeatures::NORMALS) {
            b.attribute("vec3", "a_normal")
                .uniform(Stage::Vertex, "mat4", "u_modelNormalMatrix")
                .vertex("vec3 worldNormal = normalize((u_modelNormalMatrix * vec4(a_normal, 0.0)).xyz);")
                .vertex("worldPosition.xyz += worldNormal * u_width * 0.005;");
        }
        b.vertex("vec4 viewPosition = u_viewMatrix * worldPosition;");
        shader::clipping(&mut b, scene.clips.len());
        b.vertex("gl_Position = u_projMatrix * viewPosition;")
            .fragment("gl_FragColor = u_color;");
        b.build()
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        _args: &PassArgs,
    ) {
        bind_camera(program, gpu, scene.camera);
        bind_clips(program, gpu, scene.clips);
        let outline = scene.outline;
        program.set_uniform(
            gpu,
            "u_color",
            UniformValue::Vec4(outline.color.extend(outline.alpha).to_array()),
        );
        program.set_uniform(gpu, "u_width", UniformValue::Float(outline.width));
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
        frame.set_front_face(gpu, object.modes.frontface);
        frame.set_backfaces(gpu, object.modes.backfaces);
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_geometry(program, last, gpu, object);
        draw_geometry(gpu, frame, object.geometry);
    }
}

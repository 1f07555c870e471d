// renderer/passes/shadow.rs
use super::{
    bind_clips, bind_geometry, bind_modes, bind_transform, draw_geometry, geometry_hash,
    is_surface, BindTrackers, ObjectContext, PassArgs, PassKind, PassRenderer, SceneContext,
};
use crate::renderer::frame::Frame;
use crate::renderer::gpu::{Gpu, UniformValue};
use crate::renderer::program::Program;
use crate::renderer::shader::{self, ShaderBuilder, ShaderSource, Stage};
use crate::renderer::state::GeometryFeatures;

/// Renders depth from one shadow-casting light, packed into RGBA8.
pub(crate) struct ShadowPass;

impl PassRenderer for ShadowPass {
    const KIND: PassKind = PassKind::Shadow;

    fn applies(object: &ObjectContext<'_>, args: &PassArgs) -> bool {
        args.light.is_some() && object.modes.casts_shadow && is_surface(object)
    }

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        geometry_hash(scene, object)
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let features = object.features();
        let mut b = ShaderBuilder::new("Shadow");
        shader::world_position(&mut b, features.contains(GeometryFeatures::QUANTIZED));
        b.uniform(Stage::Vertex, "mat4", "u_shadowViewMatrix")
            .uniform(Stage::Vertex, "mat4", "u_shadowProjMatrix")
            .decl(
                Stage::Fragment,
                "vec4 packDepth(const in float depth) {\n    const vec4 bitShift = vec4(256.0 * 256.0 * 256.0, 256.0 * 256.0, 256.0, 1.0);\n    const vec4 bitMask = vec4(0.0, 1.0 / 256.0, 1.0 / 256.0, 1.0 / 256.0);\n    vec4 res = fract(depth * bitShift);\n    res -= res.xxyz * bitMask;\n    return res;\n}",
            );
        shader::clipping(&mut b, scene.clips.len());
        b.vertex("gl_Position = u_shadowProjMatrix * u_shadowViewMatrix * worldPosition;")
            .fragment("gl_FragColor = packDepth(gl_FragCoord.z);");
        b.build()
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        _frame: &mut Frame,
        scene: &SceneContext<'_>,
        args: &PassArgs,
    ) {
        bind_clips(program, gpu, scene.clips);
        let shadow = args
            .light
            .and_then(|i| scene.lights.active().get(i))
            .and_then(|light| light.shadow());
        if let Some(shadow) = shadow {
            program.set_uniform(
                gpu,
                "u_shadowViewMatrix",
                UniformValue::Mat4(shadow.view_matrix.to_cols_array()),
            );
            program.set_uniform(
                gpu,
                "u_shadowProjMatrix",
                UniformValue::Mat4(shadow.projection_matrix.to_cols_array()),
            );
        }
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
        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_geometry(program, last, gpu, object);
        draw_geometry(gpu, frame, object.geometry);
    }
}

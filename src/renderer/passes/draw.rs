// renderer/passes/draw.rs
use super::{
    bind_camera, bind_clips, bind_geometry, bind_modes, bind_transform, draw_geometry, is_points,
    BindTrackers, ObjectContext, PassArgs, PassKind, PassRenderer, SceneContext, SceneFeatures,
};
use crate::renderer::frame::Frame;
use crate::renderer::gpu::{Gpu, Primitive, UniformValue};
use crate::renderer::program::Program;
use crate::renderer::shader::{self, ShaderBuilder, ShaderSource, Stage};
use crate::renderer::state::{
    AlphaMode, GeometryFeatures, Light, LightSpace, LightingModel, MaterialMaps,
};

/// Normal shaded rendering (Lambert and Phong).
pub(crate) struct DrawPass;

impl PassRenderer for DrawPass {
    const KIND: PassKind = PassKind::Draw;

    fn hash(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> String {
        format!(
            "{};{:x};{};{};{};{};{}",
            scene.canvas_id,
            scene.features.bits(),
            scene.lights.hash(),
            scene.clips.hash(),
            object.layout_hash(),
            object.material.hash(),
            object.modes.hash()
        )
    }

    fn source(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> ShaderSource {
        let geometry = object.geometry;
        let material = object.material;
        let features = object.features();
        let maps = material.maps();
        let lit = features.contains(GeometryFeatures::NORMALS) && geometry.primitive.is_triangles();
        let uvs = features.contains(GeometryFeatures::UVS);
        let colors = features.contains(GeometryFeatures::COLORS);
        let phong = material.model == LightingModel::Phong;
        let shadows: Vec<usize> = if lit && object.receives_shadows(scene) {
            scene.lights.shadow_casters().map(|(i, _)| i).collect()
        } else {
            Vec::new()
        };

        let mut b = ShaderBuilder::new("Draw");
        shader::world_position(&mut b, features.contains(GeometryFeatures::QUANTIZED));
        b.uniform(Stage::Vertex, "mat4", "u_viewMatrix")
            .uniform(Stage::Vertex, "mat4", "u_projMatrix")
            .vertex("vec4 viewPosition = u_viewMatrix * worldPosition;");

        if is_points(object) {
            b.uniform(Stage::Vertex, "float", "u_pointSize")
                .vertex("gl_PointSize = u_pointSize;");
        }
        if lit {
            b.attribute("vec3", "a_normal")
                .uniform(Stage::Vertex, "mat4", "u_modelNormalMatrix")
                .uniform(Stage::Vertex, "mat4", "u_viewNormalMatrix")
                .varying("vec3", "v_viewNormal")
                .varying("vec3", "v_viewPosition")
                .vertex("v_viewNormal = normalize((u_viewNormalMatrix * u_modelNormalMatrix * vec4(a_normal, 0.0)).xyz);")
                .vertex("v_viewPosition = viewPosition.xyz;");
        }
        if uvs {
            b.attribute("vec2", "a_uv")
                .varying("vec2", "v_uv")
                .vertex("v_uv = a_uv;");
        }
        if colors {
            b.attribute("vec4", "a_color")
                .varying("vec4", "v_color")
                .vertex("v_color = a_color;");
        }
        for i in &shadows {
            b.uniform(Stage::Vertex, "mat4", &format!("u_shadowViewMatrix{i}"))
                .uniform(Stage::Vertex, "mat4", &format!("u_shadowProjMatrix{i}"))
                .varying("vec4", &format!("v_shadowPos{i}"))
                .vertex(&format!(
                    "v_shadowPos{i} = u_shadowProjMatrix{i} * u_shadowViewMatrix{i} * worldPosition;"
                ));
        }
        shader::clipping(&mut b, scene.clips.len());
        b.vertex("gl_Position = u_projMatrix * viewPosition;");

        // Fragment stage.
        b.uniform(Stage::Fragment, "vec3", "u_materialDiffuse")
            .uniform(Stage::Fragment, "vec3", "u_materialEmissive")
            .uniform(Stage::Fragment, "float", "u_materialAlpha")
            .uniform(Stage::Fragment, "vec4", "u_colorize")
            .fragment("vec3 diffuse = u_materialDiffuse;")
            .fragment("vec3 emissive = u_materialEmissive;")
            .fragment("float alpha = u_materialAlpha;");

        if uvs {
            for (flag, sampler, line) in [
                (MaterialMaps::DIFFUSE, "u_diffuseMap", "diffuse *= texture2D(u_diffuseMap, v_uv).rgb;"),
                (MaterialMaps::EMISSIVE, "u_emissiveMap", "emissive *= texture2D(u_emissiveMap, v_uv).rgb;"),
                (MaterialMaps::ALPHA, "u_alphaMap", "alpha *= texture2D(u_alphaMap, v_uv).r;"),
                (MaterialMaps::OCCLUSION, "u_occlusionMap", "diffuse *= texture2D(u_occlusionMap, v_uv).r;"),
            ] {
                if maps.contains(flag) {
                    b.uniform(Stage::Fragment, "sampler2D", sampler).fragment(line);
                }
            }
        }
        if colors {
            b.fragment("diffuse *= v_color.rgb;")
                .fragment("alpha *= v_color.a;");
        }
        if material.alpha_mode == AlphaMode::Mask {
            b.uniform(Stage::Fragment, "float", "u_alphaCutoff")
                .fragment("if (alpha < u_alphaCutoff) { discard; }");
        }

        if lit {
            light_section(&mut b, scene, phong, uvs && maps.contains(MaterialMaps::SPECULAR), &shadows);
        } else {
            b.fragment("vec3 color = diffuse + emissive;");
        }

        b.fragment("vec4 fragColor = vec4(color, alpha) * u_colorize;");
        if scene.features.contains(SceneFeatures::GAMMA_OUTPUT) {
            shader::gamma_output(&mut b);
            b.fragment("gl_FragColor = linearToGamma(fragColor, u_gammaFactor);");
        } else {
            b.fragment("gl_FragColor = fragColor;");
        }
        b.build()
    }

    fn bind_program(
        program: &Program,
        gpu: &mut dyn Gpu,
        frame: &mut Frame,
        scene: &SceneContext<'_>,
        _args: &PassArgs,
    ) {
        bind_camera(program, gpu, scene.camera);
        bind_clips(program, gpu, scene.clips);

        let lights = scene.lights;
        program.set_uniform(
            gpu,
            "u_lightAmbient",
            UniformValue::Vec3(lights.ambient.to_array()),
        );
        for (i, raw) in lights.packed().iter().enumerate() {
            program.set_uniform(
                gpu,
                &format!("u_light{i}"),
                UniformValue::FloatArray(bytemuck::cast_slice(std::slice::from_ref(raw))),
            );
        }
        for (i, light) in lights.shadow_casters() {
            let Some(shadow) = light.shadow() else {
                continue;
            };
            program.set_uniform(
                gpu,
                &format!("u_shadowViewMatrix{i}"),
                UniformValue::Mat4(shadow.view_matrix.to_cols_array()),
            );
            program.set_uniform(
                gpu,
                &format!("u_shadowProjMatrix{i}"),
                UniformValue::Mat4(shadow.projection_matrix.to_cols_array()),
            );
            let sampler = format!("u_shadowMap{i}");
            if program.has_uniform(&sampler) {
                let unit = frame.next_texture_unit();
                program.bind_texture(gpu, &sampler, shadow.map, unit);
            }
        }
        program.set_uniform(gpu, "u_gammaFactor", UniformValue::Float(scene.gamma_factor));
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
        let modes = object.modes;
        let material = object.material;
        frame.set_front_face(gpu, modes.frontface);
        frame.set_backfaces(gpu, modes.backfaces);
        if matches!(
            object.geometry.primitive,
            Primitive::Lines | Primitive::LineLoop | Primitive::LineStrip
        ) {
            frame.set_line_width(gpu, material.line_width);
        }

        if last.material != Some(material.id()) {
            program.set_uniform(
                gpu,
                "u_materialDiffuse",
                UniformValue::Vec3(material.diffuse.to_array()),
            );
            program.set_uniform(
                gpu,
                "u_materialEmissive",
                UniformValue::Vec3(material.emissive.to_array()),
            );
            program.set_uniform(
                gpu,
                "u_materialSpecular",
                UniformValue::Vec3(material.specular.to_array()),
            );
            program.set_uniform(
                gpu,
                "u_materialShininess",
                UniformValue::Float(material.shininess),
            );
            program.set_uniform(gpu, "u_materialAlpha", UniformValue::Float(material.alpha));
            program.set_uniform(gpu, "u_alphaCutoff", UniformValue::Float(material.alpha_cutoff));
            program.set_uniform(gpu, "u_pointSize", UniformValue::Float(material.point_size));
            for (sampler, texture) in material.bound_maps() {
                if program.has_uniform(sampler) {
                    let unit = frame.next_texture_unit();
                    program.bind_texture(gpu, sampler, texture, unit);
                }
            }
            last.material = Some(material.id());
        }

        bind_modes(program, last, gpu, object);
        bind_transform(program, last, gpu, object);
        bind_geometry(program, last, gpu, object);
        draw_geometry(gpu, frame, object.geometry);
    }
}

fn light_section(
    b: &mut ShaderBuilder,
    scene: &SceneContext<'_>,
    phong: bool,
    specular_map: bool,
    shadows: &[usize],
) {
    b.uniform(Stage::Fragment, "vec3", "u_lightAmbient")
        .uniform(Stage::Fragment, "mat4", "u_viewMatrix")
        .fragment("vec3 normal = normalize(v_viewNormal);")
        .fragment("vec3 viewDir = normalize(-v_viewPosition);")
        .fragment("vec3 reflected = u_lightAmbient * diffuse;");
    if phong {
        b.uniform(Stage::Fragment, "vec3", "u_materialSpecular")
            .uniform(Stage::Fragment, "float", "u_materialShininess")
            .fragment("vec3 specular = u_materialSpecular;")
            .fragment("vec3 highlight = vec3(0.0);");
        if specular_map {
            b.uniform(Stage::Fragment, "sampler2D", "u_specularMap")
                .fragment("specular *= texture2D(u_specularMap, v_uv).rgb;");
        }
    }
    if !shadows.is_empty() {
        b.decl(
            Stage::Fragment,
            "float unpackDepth(const in vec4 rgba) {\n    return dot(rgba, vec4(1.0, 1.0 / 255.0, 1.0 / 65025.0, 1.0 / 16581375.0));\n}",
        );
    }

    for (i, light) in scene.lights.active().iter().enumerate() {
        b.uniform_array(Stage::Fragment, "vec4", &format!("u_light{i}"), 4);
        match light {
            Light::Directional(_) => {
                b.fragment(&format!(
                    "vec3 lightDir{i} = normalize(-{});",
                    in_view_space(light, &format!("u_light{i}[1].xyz"), "0.0")
                ))
                .fragment(&format!("float attenuation{i} = 1.0;"));
            }
            Light::Point(_) | Light::Spot(_) => {
                b.fragment(&format!(
                    "vec3 lightVec{i} = {} - v_viewPosition;",
                    in_view_space(light, &format!("u_light{i}[0].xyz"), "1.0")
                ))
                .fragment(&format!("vec3 lightDir{i} = normalize(lightVec{i});"))
                .fragment(&format!(
                    "float attenuation{i} = u_light{i}[0].w > 0.0 ? clamp(1.0 - length(lightVec{i}) / u_light{i}[0].w, 0.0, 1.0) : 1.0;"
                ));
                if matches!(light, Light::Spot(_)) {
                    b.fragment(&format!(
                        "attenuation{i} *= smoothstep(u_light{i}[3].y, u_light{i}[3].x, dot(-lightDir{i}, normalize({})));",
                        in_view_space(light, &format!("u_light{i}[1].xyz"), "0.0")
                    ));
                }
            }
        }
        if shadows.contains(&i) {
            b.uniform(Stage::Fragment, "sampler2D", &format!("u_shadowMap{i}"))
                .fragment(&format!(
                    "vec3 shadowCoord{i} = (v_shadowPos{i}.xyz / v_shadowPos{i}.w) * 0.5 + 0.5;"
                ))
                .fragment(&format!(
                    "if (unpackDepth(texture2D(u_shadowMap{i}, shadowCoord{i}.xy)) < shadowCoord{i}.z - 0.005) {{ attenuation{i} *= 0.5; }}"
                ));
        }
        b.fragment(&format!(
            "vec3 radiance{i} = u_light{i}[2].rgb * u_light{i}[2].a * attenuation{i};"
        ))
        .fragment(&format!(
            "reflected += max(dot(normal, lightDir{i}), 0.0) * radiance{i} * diffuse;"
        ));
        if phong {
            b.fragment(&format!(
                "highlight += pow(max(dot(reflect(-lightDir{i}, normal), viewDir), 0.0), u_materialShininess) * radiance{i};"
            ));
        }
    }

    if phong {
        b.fragment("vec3 color = reflected + highlight * specular + emissive;");
    } else {
        b.fragment("vec3 color = reflected + emissive;");
    }
}

/// Moves a world-space light vector into view space; view-space lights pass
/// through.
fn in_view_space(light: &Light, expr: &str, w: &str) -> String {
    match light.space() {
        LightSpace::World => format!("(u_viewMatrix * vec4({expr}, {w})).xyz"),
        LightSpace::View => expr.to_string(),
    }
}

// renderer/shader.rs
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: Vec<String>,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

pub struct ShaderBuilder {
    vertex_decls: String,
    fragment_decls: String,
    vertex_body: String,
    fragment_body: String,
    uniforms: Vec<String>,
    attributes: Vec<String>,
}

impl ShaderBuilder {
    pub fn new(label: &str) -> Self {
        let mut fragment_decls = String::new();
        let _ = writeln!(fragment_decls, "// {label} fragment shader");
        fragment_decls.push_str("#ifdef GL_FRAGMENT_PRECISION_HIGH\nprecision highp float;\n#else\nprecision mediump float;\n#endif\n");

        Self {
            vertex_decls: format!("// {label} vertex shader\nprecision highp float;\n"),
            fragment_decls,
            vertex_body: String::new(),
            fragment_body: String::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn decls(&mut self, stage: Stage) -> &mut String {
        match stage {
            Stage::Vertex => &mut self.vertex_decls,
            Stage::Fragment => &mut self.fragment_decls,
        }
    }

    pub fn attribute(&mut self, ty: &str, name: &str) -> &mut Self {
        let _ = writeln!(self.vertex_decls, "attribute {ty} {name};");
        self.attributes.push(name.to_string());
        self
    }

    pub fn uniform(&mut self, stage: Stage, ty: &str, name: &str) -> &mut Self {
        let _ = writeln!(self.decls(stage), "uniform {ty} {name};");
        if !self.uniforms.iter().any(|n| n == name) {
            self.uniforms.push(name.to_string());
        }
        self
    }

    pub fn uniform_array(&mut self, stage: Stage, ty: &str, name: &str, len: usize) -> &mut Self {
        let _ = writeln!(self.decls(stage), "uniform {ty} {name}[{len}];");
        if !self.uniforms.iter().any(|n| n == name) {
            self.uniforms.push(name.to_string());
        }
        self
    }

    pub fn varying(&mut self, ty: &str, name: &str) -> &mut Self {
        let line = format!("varying {ty} {name};\n");
        self.vertex_decls.push_str(&line);
        self.fragment_decls.push_str(&line);
        self
    }

    /// Appends a declaration-level line (helper functions, constants).
    pub fn decl(&mut self, stage: Stage, line: &str) -> &mut Self {
        let decls = self.decls(stage);
        decls.push_str(line);
        decls.push('\n');
        self
    }

    pub fn vertex(&mut self, line: &str) -> &mut Self {
        self.vertex_body.push_str("    ");
        self.vertex_body.push_str(line);
        self.vertex_body.push('\n');
        self
    }

    pub fn fragment(&mut self, line: &str) -> &mut Self {
        self.fragment_body.push_str("    ");
        self.fragment_body.push_str(line);
        self.fragment_body.push('\n');
        self
    }

    pub fn build(self) -> ShaderSource {
        ShaderSource {
            vertex: format!("{}void main(void) {{\n{}}}\n", self.vertex_decls, self.vertex_body),
            fragment: format!(
                "{}void main(void) {{\n{}}}\n",
                self.fragment_decls, self.fragment_body
            ),
            uniforms: self.uniforms,
            attributes: self.attributes,
        }
    }
}

/// Declares `a_position` and writes `worldPosition` (a `vec4`), decoding
/// quantized positions when needed.
pub fn world_position(builder: &mut ShaderBuilder, quantized: bool) {
    builder
        .attribute("vec3", "a_position")
        .uniform(Stage::Vertex, "mat4", "u_modelMatrix");
    if quantized {
        builder
            .uniform(Stage::Vertex, "mat4", "u_positionsDecodeMatrix")
            .vertex("vec4 localPosition = u_positionsDecodeMatrix * vec4(a_position, 1.0);");
    } else {
        builder.vertex("vec4 localPosition = vec4(a_position, 1.0);");
    }
    builder.vertex("vec4 worldPosition = u_modelMatrix * localPosition;");
}

/// Clipping against `planes` scene planes. Emits the varying in the vertex
/// stage and the discard test at the top of the fragment stage.
pub fn clipping(builder: &mut ShaderBuilder, planes: usize) {
    if planes == 0 {
        return;
    }
    builder
        .varying("vec4", "v_worldPosition")
        .uniform(Stage::Fragment, "bool", "u_clippable")
        .vertex("v_worldPosition = worldPosition;")
        .fragment("if (u_clippable) {")
        .fragment("    float dist = 0.0;");
    for i in 0..planes {
        builder
            .uniform(Stage::Fragment, "bool", &format!("u_clipActive{i}"))
            .uniform(Stage::Fragment, "vec3", &format!("u_clipPos{i}"))
            .uniform(Stage::Fragment, "vec3", &format!("u_clipDir{i}"))
            .fragment(&format!(
                "    if (u_clipActive{i}) {{ dist += clamp(dot(-u_clipDir{i}, v_worldPosition.xyz - u_clipPos{i}), 0.0, 1000.0); }}"
            ));
    }
    builder
        .fragment("    if (dist > 0.0) { discard; }")
        .fragment("}");
}

/// Declares `u_gammaFactor` and the `linearToGamma` helper.
pub fn gamma_output(builder: &mut ShaderBuilder) {
    builder
        .uniform(Stage::Fragment, "float", "u_gammaFactor")
        .decl(
            Stage::Fragment,
            "vec4 linearToGamma(in vec4 value, in float gammaFactor) {\n    return vec4(pow(value.xyz, vec3(1.0 / gammaFactor)), value.w);\n}",
        );
}

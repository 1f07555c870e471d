// renderer/program.rs
use rustc_hash::FxHashMap;

use super::gpu::{
    AttributeLocation, BufferId, Gpu, GpuProgram, TextureId, UniformLocation, UniformValue,
};
use super::shader::ShaderSource;

pub struct Program {
    handle: GpuProgram,
    uniforms: FxHashMap<String, UniformLocation>,
    attributes: FxHashMap<String, AttributeLocation>,
}

impl Program {
    /// Compiles `source` and looks up every declared location once. Names the
    /// driver optimized away are simply absent.
    pub fn compile(gpu: &mut dyn Gpu, source: &ShaderSource) -> Result<Self, Vec<String>> {
        let handle = gpu.create_program(&source.vertex, &source.fragment)?;

        let uniforms = source
            .uniforms
            .iter()
            .filter_map(|name| {
                gpu.uniform_location(handle, name)
                    .map(|location| (name.clone(), location))
            })
            .collect();
        let attributes = source
            .attributes
            .iter()
            .filter_map(|name| {
                gpu.attribute_location(handle, name)
                    .map(|location| (name.clone(), location))
            })
            .collect();

        Ok(Self {
            handle,
            uniforms,
            attributes,
        })
    }

    pub fn handle(&self) -> GpuProgram {
        self.handle
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn bind(&self, gpu: &mut dyn Gpu) {
        gpu.use_program(self.handle);
    }

    /// Uploads `value` if the program uses `name`. Returns whether anything
    /// was sent.
    pub fn set_uniform(&self, gpu: &mut dyn Gpu, name: &str, value: UniformValue<'_>) -> bool {
        match self.uniforms.get(name) {
            Some(&location) => {
                gpu.set_uniform(location, value);
                true
            }
            None => false,
        }
    }

    pub fn bind_texture(&self, gpu: &mut dyn Gpu, name: &str, texture: TextureId, unit: u32) -> bool {
        match self.uniforms.get(name) {
            Some(&location) => {
                gpu.bind_texture(location, texture, unit);
                true
            }
            None => false,
        }
    }

    pub fn bind_attribute(&self, gpu: &mut dyn Gpu, name: &str, buffer: Option<BufferId>) -> bool {
        match (self.attributes.get(name), buffer) {
            (Some(&location), Some(buffer)) => {
                gpu.bind_attribute(location, buffer);
                true
            }
            _ => false,
        }
    }

    pub fn destroy(self, gpu: &mut dyn Gpu) {
        gpu.delete_program(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shader::{ShaderBuilder, Stage};
    use crate::renderer::HeadlessGpu;

    fn source() -> ShaderSource {
        let mut builder = ShaderBuilder::new("test");
        builder
            .attribute("vec3", "a_position")
            .uniform(Stage::Vertex, "mat4", "u_modelMatrix")
            .uniform(Stage::Fragment, "vec4", "u_color")
            .vertex("gl_Position = u_modelMatrix * vec4(a_position, 1.0);")
            .fragment("gl_FragColor = u_color;");
        builder.build()
    }

    #[test]
    fn missing_locations_are_silent_no_ops() {
        let mut gpu = HeadlessGpu::new();
        let program = Program::compile(&mut gpu, &source()).unwrap();

        assert!(program.set_uniform(&mut gpu, "u_color", UniformValue::Vec4([1.0; 4])));
        assert!(!program.set_uniform(&mut gpu, "u_unused", UniformValue::Float(1.0)));
        assert!(!program.bind_attribute(&mut gpu, "a_normal", Some(BufferId(4))));
        assert!(!program.bind_attribute(&mut gpu, "a_position", None));
        assert_eq!(gpu.uniform_set_count("u_color"), 1);
    }

    #[test]
    fn destroy_deletes_gpu_program() {
        let mut gpu = HeadlessGpu::new();
        let program = Program::compile(&mut gpu, &source()).unwrap();
        program.destroy(&mut gpu);
        assert_eq!(gpu.live_programs(), 0);
    }
}

// renderer/headless.rs
use rustc_hash::FxHashMap;

use super::gpu::{
    AttributeLocation, BufferId, FrontFace, Gpu, GpuProgram, IndexType, Primitive, RenderTarget,
    TextureId, UniformLocation, UniformValue,
};

const DEFAULT_TEXTURE_UNITS: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateProgram(GpuProgram),
    DeleteProgram(GpuProgram),
    UseProgram(GpuProgram),
    SetUniform { name: String },
    BindTexture { name: String, texture: TextureId, unit: u32 },
    BindAttribute { name: String, buffer: BufferId },
    BindIndexBuffer(BufferId),
    LineWidth(f32),
    FrontFace(FrontFace),
    CullFace(bool),
    Blend(bool),
    DepthMask(bool),
    RenderTarget(RenderTarget),
    Clear,
    DrawElements { primitive: Primitive, count: u32, offset: u32 },
    DrawArrays { primitive: Primitive, first: u32, count: u32 },
    ReadPixel { x: u32, y: u32 },
}

struct HeadlessProgram {
    uniforms: FxHashMap<String, UniformLocation>,
    attributes: FxHashMap<String, AttributeLocation>,
    source_hash: String,
}

/// Recording backend: programs link by scanning their sources for declared
/// names, and every call lands in a command log.
pub struct HeadlessGpu {
    programs: FxHashMap<GpuProgram, HeadlessProgram>,
    next_program: u32,
    uniform_names: Vec<String>,
    attribute_names: Vec<String>,
    commands: Vec<GpuCommand>,
    failure_markers: Vec<String>,
    max_texture_units: u32,
    pick_pixel: [u8; 4],
    created: usize,
    deleted: FxHashMap<String, usize>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self {
            programs: FxHashMap::default(),
            next_program: 1,
            uniform_names: Vec::new(),
            attribute_names: Vec::new(),
            commands: Vec::new(),
            failure_markers: Vec::new(),
            max_texture_units: DEFAULT_TEXTURE_UNITS,
            pick_pixel: [0; 4],
            created: 0,
            deleted: FxHashMap::default(),
        }
    }

    pub fn with_max_texture_units(mut self, units: u32) -> Self {
        self.max_texture_units = units.max(1);
        self
    }

    /// Any program whose vertex or fragment source contains `marker` fails to
    /// compile.
    pub fn fail_compiles_containing(&mut self, marker: impl Into<String>) {
        self.failure_markers.push(marker.into());
    }

    /// Value returned by the next [`Gpu::read_pixel`] calls.
    pub fn set_pick_pixel(&mut self, rgba: [u8; 4]) {
        self.pick_pixel = rgba;
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn programs_created(&self) -> usize {
        self.created
    }

    pub fn programs_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// How many times a program built from identical sources was deleted.
    pub fn deletions_of_source(&self, vertex: &str, fragment: &str) -> usize {
        self.deleted
            .get(&source_key(vertex, fragment))
            .copied()
            .unwrap_or(0)
    }

    pub fn uniform_set_count(&self, name: &str) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, GpuCommand::SetUniform { name: n } if n == name))
            .count()
    }

    pub fn use_program_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, GpuCommand::UseProgram(_)))
            .count()
    }

    pub fn draw_call_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| {
                matches!(
                    cmd,
                    GpuCommand::DrawElements { .. } | GpuCommand::DrawArrays { .. }
                )
            })
            .count()
    }

    pub fn texture_units_used(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                GpuCommand::BindTexture { unit, .. } => Some(*unit),
                _ => None,
            })
            .collect()
    }

    fn uniform_name(&self, location: UniformLocation) -> String {
        self.uniform_names
            .get(location.0 as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn attribute_name(&self, location: AttributeLocation) -> String {
        self.attribute_names
            .get(location.0 as usize)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for HeadlessGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpu for HeadlessGpu {
    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<GpuProgram, Vec<String>> {
        let failures: Vec<String> = self
            .failure_markers
            .iter()
            .filter(|marker| vertex.contains(marker.as_str()) || fragment.contains(marker.as_str()))
            .map(|marker| format!("ERROR: 0:1: '{marker}' : unsupported by this device"))
            .collect();
        if !failures.is_empty() {
            return Err(failures);
        }

        let program = GpuProgram(self.next_program);
        self.next_program += 1;

        let mut uniforms = FxHashMap::default();
        for name in declared_names(vertex, &["uniform"])
            .chain(declared_names(fragment, &["uniform"]))
        {
            if !uniforms.contains_key(&name) {
                let location = UniformLocation(self.uniform_names.len() as u32);
                self.uniform_names.push(name.clone());
                uniforms.insert(name, location);
            }
        }

        let mut attributes = FxHashMap::default();
        for name in declared_names(vertex, &["attribute", "in"]) {
            if !attributes.contains_key(&name) {
                let location = AttributeLocation(self.attribute_names.len() as u32);
                self.attribute_names.push(name.clone());
                attributes.insert(name, location);
            }
        }

        self.programs.insert(
            program,
            HeadlessProgram {
                uniforms,
                attributes,
                source_hash: source_key(vertex, fragment),
            },
        );
        self.created += 1;
        self.commands.push(GpuCommand::CreateProgram(program));
        Ok(program)
    }

    fn delete_program(&mut self, program: GpuProgram) {
        if let Some(removed) = self.programs.remove(&program) {
            *self.deleted.entry(removed.source_hash).or_default() += 1;
        }
        self.commands.push(GpuCommand::DeleteProgram(program));
    }

    fn uniform_location(&self, program: GpuProgram, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    fn attribute_location(&self, program: GpuProgram, name: &str) -> Option<AttributeLocation> {
        self.programs.get(&program)?.attributes.get(name).copied()
    }

    fn use_program(&mut self, program: GpuProgram) {
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, _value: UniformValue<'_>) {
        let name = self.uniform_name(location);
        self.commands.push(GpuCommand::SetUniform { name });
    }

    fn bind_texture(&mut self, location: UniformLocation, texture: TextureId, unit: u32) {
        let name = self.uniform_name(location);
        self.commands.push(GpuCommand::BindTexture {
            name,
            texture,
            unit,
        });
    }

    fn bind_attribute(&mut self, location: AttributeLocation, buffer: BufferId) {
        let name = self.attribute_name(location);
        self.commands.push(GpuCommand::BindAttribute { name, buffer });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.commands.push(GpuCommand::BindIndexBuffer(buffer));
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(GpuCommand::LineWidth(width));
    }

    fn set_front_face(&mut self, face: FrontFace) {
        self.commands.push(GpuCommand::FrontFace(face));
    }

    fn set_cull_face(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::CullFace(enabled));
    }

    fn set_blend(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::Blend(enabled));
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.commands.push(GpuCommand::DepthMask(enabled));
    }

    fn set_render_target(&mut self, target: RenderTarget) {
        self.commands.push(GpuCommand::RenderTarget(target));
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.commands.push(GpuCommand::Clear);
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32, _index_type: IndexType, offset: u32) {
        self.commands.push(GpuCommand::DrawElements {
            primitive,
            count,
            offset,
        });
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        self.commands.push(GpuCommand::DrawArrays {
            primitive,
            first,
            count,
        });
    }

    fn max_texture_image_units(&self) -> u32 {
        self.max_texture_units
    }

    fn read_pixel(&mut self, x: u32, y: u32) -> [u8; 4] {
        self.commands.push(GpuCommand::ReadPixel { x, y });
        self.pick_pixel
    }
}

fn source_key(vertex: &str, fragment: &str) -> String {
    format!("{vertex}\u{0}{fragment}")
}

/// Names declared by lines such as `uniform mat4 u_model;` or
/// `attribute vec3 a_position;`. Array suffixes are stripped.
fn declared_names<'a>(
    source: &'a str,
    qualifiers: &'a [&'a str],
) -> impl Iterator<Item = String> + 'a {
    source.lines().filter_map(move |line| {
        let mut tokens = line.split_whitespace();
        let qualifier = tokens.next()?;
        if !qualifiers.contains(&qualifier) {
            return None;
        }
        let name = tokens.last()?.trim_end_matches(';');
        let name = name.split('[').next().unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "attribute vec3 a_position;\nuniform mat4 u_model;\nuniform vec4 u_lights[4];\nvoid main() {}\n";
    const FRAGMENT: &str = "precision mediump float;\nuniform vec4 u_color;\nvoid main() {}\n";

    #[test]
    fn linked_program_exposes_declared_names_only() {
        let mut gpu = HeadlessGpu::new();
        let program = gpu.create_program(VERTEX, FRAGMENT).unwrap();

        assert!(gpu.uniform_location(program, "u_model").is_some());
        assert!(gpu.uniform_location(program, "u_lights").is_some());
        assert!(gpu.uniform_location(program, "u_color").is_some());
        assert!(gpu.uniform_location(program, "u_missing").is_none());
        assert!(gpu.attribute_location(program, "a_position").is_some());
        assert!(gpu.attribute_location(program, "a_normal").is_none());
    }

    #[test]
    fn failure_marker_rejects_program() {
        let mut gpu = HeadlessGpu::new();
        gpu.fail_compiles_containing("u_color");

        let errors = gpu.create_program(VERTEX, FRAGMENT).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(gpu.programs_created(), 0);
    }

    #[test]
    fn deletions_are_counted_per_source() {
        let mut gpu = HeadlessGpu::new();
        let program = gpu.create_program(VERTEX, FRAGMENT).unwrap();
        gpu.delete_program(program);

        assert_eq!(gpu.deletions_of_source(VERTEX, FRAGMENT), 1);
        assert_eq!(gpu.live_programs(), 0);
    }
}

// renderer/gpu.rs
/// Linked program handle issued by [`Gpu::create_program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuProgram(pub u32);

/// Uniform location inside one linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Vertex attribute location inside one linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub u32);

/// Vertex or index buffer owned by the geometry layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Texture owned by the material / light layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    /// Single-letter code used inside geometry hashes.
    pub fn code(self) -> char {
        match self {
            Self::Points => 'p',
            Self::Lines => 'l',
            Self::LineLoop => 'o',
            Self::LineStrip => 's',
            Self::Triangles => 't',
            Self::TriangleStrip => 'r',
            Self::TriangleFan => 'f',
        }
    }

    pub fn is_triangles(self) -> bool {
        matches!(
            self,
            Self::Triangles | Self::TriangleStrip | Self::TriangleFan
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Destination of subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Canvas,
    /// Off-screen colour target backed by a texture (shadow maps).
    Texture(TextureId),
    /// Off-screen RGBA8 target read back by [`Gpu::read_pixel`].
    Pick,
}

/// Value uploaded through [`Gpu::set_uniform`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    FloatArray(&'a [f32]),
}

/// GPU API collaborator. The core never talks to a driver directly.
///
/// Absence of a uniform or attribute location is a valid outcome: the compiled
/// shader for the current feature combination simply does not use it.
pub trait Gpu {
    /// Compiles and links a program. On failure every compiler/linker message
    /// is returned.
    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<GpuProgram, Vec<String>>;

    fn delete_program(&mut self, program: GpuProgram);

    fn uniform_location(&self, program: GpuProgram, name: &str) -> Option<UniformLocation>;

    fn attribute_location(&self, program: GpuProgram, name: &str) -> Option<AttributeLocation>;

    fn use_program(&mut self, program: GpuProgram);

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>);

    fn bind_texture(&mut self, location: UniformLocation, texture: TextureId, unit: u32);

    fn bind_attribute(&mut self, location: AttributeLocation, buffer: BufferId);

    fn bind_index_buffer(&mut self, buffer: BufferId);

    fn set_line_width(&mut self, width: f32);

    fn set_front_face(&mut self, face: FrontFace);

    fn set_cull_face(&mut self, enabled: bool);

    fn set_blend(&mut self, enabled: bool);

    fn set_depth_mask(&mut self, enabled: bool);

    fn set_render_target(&mut self, target: RenderTarget);

    fn clear(&mut self, color: [f32; 4]);

    fn draw_elements(&mut self, primitive: Primitive, count: u32, index_type: IndexType, offset: u32);

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);

    fn max_texture_image_units(&self) -> u32;

    /// Reads one RGBA8 pixel of the current render target (pick readback).
    fn read_pixel(&mut self, x: u32, y: u32) -> [u8; 4];
}

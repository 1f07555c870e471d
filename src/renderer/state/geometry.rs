// renderer/state/geometry.rs
use bitflags::bitflags;
use glam::Mat4;

use super::{RenderState, StateKind};
use crate::renderer::gpu::{BufferId, IndexType, Primitive};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GeometryFeatures: u32 {
        const NORMALS = 1 << 0;
        const UVS = 1 << 1;
        const COLORS = 1 << 2;
        /// Positions are quantized and need the decode matrix.
        const QUANTIZED = 1 << 3;
    }
}

/// GPU buffers created by the geometry layer. The core only binds them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometryBuffers {
    pub positions: Option<BufferId>,
    pub normals: Option<BufferId>,
    pub uvs: Option<BufferId>,
    pub colors: Option<BufferId>,
    pub indices: Option<BufferId>,
    pub edge_indices: Option<BufferId>,
    /// Non-indexed, one triangle per three vertices.
    pub pick_triangle_positions: Option<BufferId>,
    /// One color per pick-triangle vertex, encoding the triangle index.
    pub pick_triangle_colors: Option<BufferId>,
    /// One color per vertex, encoding the vertex index.
    pub pick_vertex_colors: Option<BufferId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryState {
    pub primitive: Primitive,
    pub buffers: GeometryBuffers,
    pub index_type: IndexType,
    pub index_count: u32,
    pub edge_index_count: u32,
    pub vertex_count: u32,
    pub positions_decode_matrix: Option<Mat4>,
}

impl GeometryState {
    pub fn new(primitive: Primitive, positions: BufferId, vertex_count: u32) -> Self {
        Self {
            primitive,
            buffers: GeometryBuffers {
                positions: Some(positions),
                ..GeometryBuffers::default()
            },
            index_type: IndexType::U32,
            index_count: 0,
            edge_index_count: 0,
            vertex_count,
            positions_decode_matrix: None,
        }
    }

    pub fn triangles(positions: BufferId, vertex_count: u32) -> Self {
        Self::new(Primitive::Triangles, positions, vertex_count)
    }

    pub fn with_indices(mut self, indices: BufferId, count: u32, index_type: IndexType) -> Self {
        self.buffers.indices = Some(indices);
        self.index_count = count;
        self.index_type = index_type;
        self
    }

    pub fn with_edge_indices(mut self, edges: BufferId, count: u32) -> Self {
        self.buffers.edge_indices = Some(edges);
        self.edge_index_count = count;
        self
    }

    pub fn with_normals(mut self, normals: BufferId) -> Self {
        self.buffers.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: BufferId) -> Self {
        self.buffers.uvs = Some(uvs);
        self
    }

    pub fn with_colors(mut self, colors: BufferId) -> Self {
        self.buffers.colors = Some(colors);
        self
    }

    pub fn with_quantized_positions(mut self, decode_matrix: Mat4) -> Self {
        self.positions_decode_matrix = Some(decode_matrix);
        self
    }

    pub fn with_pick_buffers(
        mut self,
        triangle_positions: BufferId,
        triangle_colors: BufferId,
        vertex_colors: BufferId,
    ) -> Self {
        self.buffers.pick_triangle_positions = Some(triangle_positions);
        self.buffers.pick_triangle_colors = Some(triangle_colors);
        self.buffers.pick_vertex_colors = Some(vertex_colors);
        self
    }

    pub fn features(&self) -> GeometryFeatures {
        let mut features = GeometryFeatures::empty();
        features.set(GeometryFeatures::NORMALS, self.buffers.normals.is_some());
        features.set(GeometryFeatures::UVS, self.buffers.uvs.is_some());
        features.set(GeometryFeatures::COLORS, self.buffers.colors.is_some());
        features.set(
            GeometryFeatures::QUANTIZED,
            self.positions_decode_matrix.is_some(),
        );
        features
    }

    /// Number of triangles covered by the pick-triangle buffers.
    pub fn triangle_count(&self) -> u32 {
        if !self.primitive.is_triangles() {
            return 0;
        }
        if self.buffers.indices.is_some() {
            self.index_count / 3
        } else {
            self.vertex_count / 3
        }
    }
}

impl RenderState for GeometryState {
    const KIND: StateKind = StateKind::Geometry;

    fn feature_hash(&self) -> Option<String> {
        Some(format!(
            "{}{:x}",
            self.primitive.code(),
            self.features().bits()
        ))
    }
}

/// Vertex buffers shared by many objects (batched geometry). When an object
/// carries one, its attribute buffers replace the geometry's own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexBufsState {
    pub positions: Option<BufferId>,
    pub normals: Option<BufferId>,
    pub uvs: Option<BufferId>,
    pub colors: Option<BufferId>,
    pub positions_decode_matrix: Option<Mat4>,
}

impl VertexBufsState {
    /// Attributes these buffers supply on top of a geometry.
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

impl RenderState for VertexBufsState {
    const KIND: StateKind = StateKind::VertexBufs;

    fn feature_hash(&self) -> Option<String> {
        Some(format!("v{:x}", self.features().bits()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_define_features() {
        let geometry = GeometryState::triangles(BufferId(1), 3)
            .with_normals(BufferId(2))
            .with_quantized_positions(Mat4::IDENTITY);

        assert_eq!(
            geometry.features(),
            GeometryFeatures::NORMALS | GeometryFeatures::QUANTIZED
        );
    }

    #[test]
    fn identical_layouts_share_a_hash() {
        let a = GeometryState::triangles(BufferId(1), 3).with_normals(BufferId(2));
        let b = GeometryState::triangles(BufferId(10), 300).with_normals(BufferId(11));
        let c = GeometryState::triangles(BufferId(1), 3).with_uvs(BufferId(3));

        assert_eq!(a.feature_hash(), b.feature_hash());
        assert_ne!(a.feature_hash(), c.feature_hash());
    }

    #[test]
    fn triangle_count_prefers_indices() {
        let geometry = GeometryState::triangles(BufferId(1), 4).with_indices(
            BufferId(2),
            6,
            IndexType::U16,
        );
        assert_eq!(geometry.triangle_count(), 2);

        let lines = GeometryState::new(Primitive::Lines, BufferId(1), 4);
        assert_eq!(lines.triangle_count(), 0);
    }
}

// renderer/state/emphasis.rs
use glam::Vec3;

use super::{RenderState, StateKind};

/// Emphasis appearance. The three appearances share one compiled program
/// family per pass (fill, edges, vertices); the appearance only selects which
/// emphasis material supplies the uniform values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Appearance {
    Ghost = 0,
    Highlight = 1,
    Selected = 2,
}

impl Appearance {
    pub const ALL: [Appearance; 3] = [Self::Ghost, Self::Highlight, Self::Selected];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmphasisMaterialState {
    pub fill: bool,
    pub fill_color: Vec3,
    pub fill_alpha: f32,
    pub edges: bool,
    pub edge_color: Vec3,
    pub edge_alpha: f32,
    pub edge_width: f32,
    pub vertices: bool,
    pub vertex_color: Vec3,
    pub vertex_alpha: f32,
    pub vertex_size: f32,
    pub backfaces: bool,
}

impl EmphasisMaterialState {
    pub fn ghost() -> Self {
        Self {
            fill: true,
            fill_color: Vec3::ZERO,
            fill_alpha: 0.1,
            edges: true,
            edge_color: Vec3::new(0.2, 0.2, 0.2),
            edge_alpha: 0.5,
            edge_width: 1.0,
            vertices: false,
            vertex_color: Vec3::new(0.4, 0.4, 0.4),
            vertex_alpha: 0.7,
            vertex_size: 4.0,
            backfaces: true,
        }
    }

    pub fn highlight() -> Self {
        Self {
            fill: true,
            fill_color: Vec3::new(1.0, 1.0, 0.0),
            fill_alpha: 0.5,
            edges: true,
            edge_color: Vec3::new(0.6, 0.6, 0.0),
            edge_alpha: 0.5,
            edge_width: 1.0,
            vertices: false,
            vertex_color: Vec3::new(0.6, 0.6, 0.0),
            vertex_alpha: 0.5,
            vertex_size: 4.0,
            backfaces: false,
        }
    }

    pub fn selected() -> Self {
        Self {
            fill: true,
            fill_color: Vec3::new(0.0, 1.0, 0.0),
            fill_alpha: 0.5,
            edges: true,
            edge_color: Vec3::new(0.0, 0.6, 0.0),
            edge_alpha: 0.5,
            edge_width: 1.0,
            vertices: false,
            vertex_color: Vec3::new(0.0, 0.6, 0.0),
            vertex_alpha: 0.5,
            vertex_size: 4.0,
            backfaces: false,
        }
    }

    pub fn for_appearance(appearance: Appearance) -> Self {
        match appearance {
            Appearance::Ghost => Self::ghost(),
            Appearance::Highlight => Self::highlight(),
            Appearance::Selected => Self::selected(),
        }
    }
}

impl RenderState for EmphasisMaterialState {
    const KIND: StateKind = StateKind::EmphasisMaterial;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineMaterialState {
    pub color: Vec3,
    pub alpha: f32,
    pub width: f32,
}

impl Default for OutlineMaterialState {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 0.2, 0.2),
            alpha: 1.0,
            width: 4.0,
        }
    }
}

impl RenderState for OutlineMaterialState {
    const KIND: StateKind = StateKind::OutlineMaterial;
}

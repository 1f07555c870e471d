// renderer/state/material.rs
use bitflags::bitflags;
use glam::Vec3;

use super::{RenderState, StateKind};
use crate::renderer::gpu::TextureId;

bitflags! {
    /// Texture maps attached to a material. Presence is structural (it
    /// selects shader variants), the bound texture itself is not.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialMaps: u32 {
        const DIFFUSE = 1 << 0;
        const EMISSIVE = 1 << 1;
        const NORMAL = 1 << 2;
        const SPECULAR = 1 << 3;
        const ALPHA = 1 << 4;
        const OCCLUSION = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightingModel {
    /// Per-vertex diffuse lighting.
    Lambert,
    /// Per-fragment Blinn-Phong lighting.
    Phong,
}

impl LightingModel {
    fn code(self) -> char {
        match self {
            Self::Lambert => 'L',
            Self::Phong => 'P',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    Opaque,
    /// Fragments below the material's cutoff are discarded.
    Mask,
    Blend,
}

impl AlphaMode {
    fn code(self) -> char {
        match self {
            Self::Opaque => 'o',
            Self::Mask => 'm',
            Self::Blend => 'b',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    pub model: LightingModel,
    pub diffuse: Vec3,
    pub emissive: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub alpha: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub line_width: f32,
    pub point_size: f32,

    pub diffuse_map: Option<TextureId>,
    pub emissive_map: Option<TextureId>,
    pub normal_map: Option<TextureId>,
    pub specular_map: Option<TextureId>,
    pub alpha_map: Option<TextureId>,
    pub occlusion_map: Option<TextureId>,
}

impl MaterialState {
    pub fn new(model: LightingModel, diffuse: Vec3) -> Self {
        Self {
            model,
            diffuse,
            emissive: Vec3::ZERO,
            specular: Vec3::ONE,
            shininess: 80.0,
            alpha: 1.0,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            line_width: 1.0,
            point_size: 1.0,
            diffuse_map: None,
            emissive_map: None,
            normal_map: None,
            specular_map: None,
            alpha_map: None,
            occlusion_map: None,
        }
    }

    pub fn lambert(diffuse: Vec3) -> Self {
        Self::new(LightingModel::Lambert, diffuse)
    }

    pub fn phong(diffuse: Vec3) -> Self {
        Self::new(LightingModel::Phong, diffuse)
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess.max(0.0);
        self
    }

    /// Sets the opacity; anything below 1.0 switches to blending.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        if self.alpha < 1.0 {
            self.alpha_mode = AlphaMode::Blend;
        }
        self
    }

    pub fn with_alpha_mask(mut self, cutoff: f32) -> Self {
        self.alpha_mode = AlphaMode::Mask;
        self.alpha_cutoff = cutoff.clamp(0.0, 1.0);
        self
    }

    pub fn with_diffuse_map(mut self, texture: TextureId) -> Self {
        self.diffuse_map = Some(texture);
        self
    }

    pub fn with_emissive_map(mut self, texture: TextureId) -> Self {
        self.emissive_map = Some(texture);
        self
    }

    pub fn with_normal_map(mut self, texture: TextureId) -> Self {
        self.normal_map = Some(texture);
        self
    }

    pub fn with_specular_map(mut self, texture: TextureId) -> Self {
        self.specular_map = Some(texture);
        self
    }

    pub fn with_alpha_map(mut self, texture: TextureId) -> Self {
        self.alpha_map = Some(texture);
        self
    }

    pub fn with_occlusion_map(mut self, texture: TextureId) -> Self {
        self.occlusion_map = Some(texture);
        self
    }

    pub fn maps(&self) -> MaterialMaps {
        let mut maps = MaterialMaps::empty();
        maps.set(MaterialMaps::DIFFUSE, self.diffuse_map.is_some());
        maps.set(MaterialMaps::EMISSIVE, self.emissive_map.is_some());
        maps.set(MaterialMaps::NORMAL, self.normal_map.is_some());
        maps.set(MaterialMaps::SPECULAR, self.specular_map.is_some());
        maps.set(MaterialMaps::ALPHA, self.alpha_map.is_some());
        maps.set(MaterialMaps::OCCLUSION, self.occlusion_map.is_some());
        maps
    }

    /// Attached maps paired with the sampler uniform each one binds to.
    pub fn bound_maps(&self) -> impl Iterator<Item = (&'static str, TextureId)> + '_ {
        [
            ("u_diffuseMap", self.diffuse_map),
            ("u_emissiveMap", self.emissive_map),
            ("u_normalMap", self.normal_map),
            ("u_specularMap", self.specular_map),
            ("u_alphaMap", self.alpha_map),
            ("u_occlusionMap", self.occlusion_map),
        ]
        .into_iter()
        .filter_map(|(name, texture)| texture.map(|t| (name, t)))
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}

impl Default for MaterialState {
    fn default() -> Self {
        Self::lambert(Vec3::ONE)
    }
}

impl RenderState for MaterialState {
    const KIND: StateKind = StateKind::Material;

    // No shader samples the normal map yet, so it never selects a variant.
    fn feature_hash(&self) -> Option<String> {
        Some(format!(
            "{}{:x}{}",
            self.model.code(),
            (self.maps() - MaterialMaps::NORMAL).bits(),
            self.alpha_mode.code()
        ))
    }
}

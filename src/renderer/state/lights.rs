// renderer/state/lights.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::{RenderState, StateKind};
use crate::renderer::gpu::TextureId;

/// Lights beyond this count are ignored by generated shaders.
pub const MAX_LIGHTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightSpace {
    World,
    /// Fixed relative to the camera (e.g. a headlight).
    View,
}

/// Shadow map rendered from a light's point of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSource {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub map: TextureId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub space: LightSpace,
    pub shadow: Option<ShadowSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub space: LightSpace,
    pub shadow: Option<ShadowSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub inner_angle: f32,
    pub outer_angle: f32,
    pub space: LightSpace,
    pub shadow: Option<ShadowSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self::Directional(DirectionalLight {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            space: LightSpace::World,
            shadow: None,
        })
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self::Point(PointLight {
            position,
            color,
            intensity,
            range,
            space: LightSpace::World,
            shadow: None,
        })
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self::Spot(SpotLight {
            position,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range: 0.0,
            inner_angle: 0.3,
            outer_angle: 0.5,
            space: LightSpace::World,
            shadow: None,
        })
    }

    pub fn with_space(mut self, space: LightSpace) -> Self {
        match &mut self {
            Self::Directional(l) => l.space = space,
            Self::Point(l) => l.space = space,
            Self::Spot(l) => l.space = space,
        }
        self
    }

    pub fn with_shadow(mut self, shadow: ShadowSource) -> Self {
        match &mut self {
            Self::Directional(l) => l.shadow = Some(shadow),
            Self::Point(l) => l.shadow = Some(shadow),
            Self::Spot(l) => l.shadow = Some(shadow),
        }
        self
    }

    pub fn space(&self) -> LightSpace {
        match self {
            Self::Directional(l) => l.space,
            Self::Point(l) => l.space,
            Self::Spot(l) => l.space,
        }
    }

    pub fn shadow(&self) -> Option<&ShadowSource> {
        match self {
            Self::Directional(l) => l.shadow.as_ref(),
            Self::Point(l) => l.shadow.as_ref(),
            Self::Spot(l) => l.shadow.as_ref(),
        }
    }

    fn type_code(&self) -> char {
        match self {
            Self::Directional(_) => 'd',
            Self::Point(_) => 'p',
            Self::Spot(_) => 's',
        }
    }
}

/// Packed light as uploaded to `u_light{i}` (`vec4[4]`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightRaw {
    pub position_range: [f32; 4],
    pub direction: [f32; 4],
    pub color_intensity: [f32; 4],
    pub cone_params: [f32; 4],
}

impl LightRaw {
    pub fn from_light(light: &Light) -> Self {
        match light {
            Light::Directional(data) => Self {
                position_range: [0.0; 4],
                direction: data.direction.extend(0.0).to_array(),
                color_intensity: data.color.extend(data.intensity).to_array(),
                cone_params: [0.0; 4],
            },
            Light::Point(data) => Self {
                position_range: data.position.extend(data.range).to_array(),
                direction: [0.0; 4],
                color_intensity: data.color.extend(data.intensity).to_array(),
                cone_params: [0.0; 4],
            },
            Light::Spot(data) => {
                let mut inner = data.inner_angle;
                let mut outer = data.outer_angle;
                if inner > outer {
                    std::mem::swap(&mut inner, &mut outer);
                }
                Self {
                    position_range: data.position.extend(data.range).to_array(),
                    direction: data.direction.extend(0.0).to_array(),
                    color_intensity: data.color.extend(data.intensity).to_array(),
                    cone_params: [inner.cos(), outer.cos(), 0.0, 0.0],
                }
            }
        }
    }
}

/// Scene-wide light list.
#[derive(Debug, Clone, PartialEq)]
pub struct LightsState {
    pub ambient: Vec3,
    pub lights: Vec<Light>,
}

impl Default for LightsState {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.2),
            lights: Vec::new(),
        }
    }
}

impl LightsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Lights that shaders actually see.
    pub fn active(&self) -> &[Light] {
        &self.lights[..self.lights.len().min(MAX_LIGHTS)]
    }

    pub fn shadow_casters(&self) -> impl Iterator<Item = (usize, &Light)> + '_ {
        self.active()
            .iter()
            .enumerate()
            .filter(|(_, light)| light.shadow().is_some())
    }

    pub fn packed(&self) -> Vec<LightRaw> {
        self.active().iter().map(LightRaw::from_light).collect()
    }
}

impl RenderState for LightsState {
    const KIND: StateKind = StateKind::Lights;

    fn feature_hash(&self) -> Option<String> {
        let mut hash = String::with_capacity(self.lights.len() * 3 + 1);
        hash.push('a');
        for light in self.active() {
            hash.push(light.type_code());
            hash.push(match light.space() {
                LightSpace::World => 'w',
                LightSpace::View => 'v',
            });
            if light.shadow().is_some() {
                hash.push('S');
            }
        }
        Some(hash)
    }
}

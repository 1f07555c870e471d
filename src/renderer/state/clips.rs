// renderer/state/clips.rs
use glam::Vec3;

use super::{RenderState, StateKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub active: bool,
    pub position: Vec3,
    /// Points towards the half-space that is discarded.
    pub direction: Vec3,
}

impl ClipPlane {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            active: true,
            position,
            direction: direction.normalize_or_zero(),
        }
    }
}

/// Scene-wide clipping planes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipsState {
    pub planes: Vec<ClipPlane>,
}

impl ClipsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plane(mut self, plane: ClipPlane) -> Self {
        self.planes.push(plane);
        self
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }
}

impl RenderState for ClipsState {
    const KIND: StateKind = StateKind::Clips;

    // Toggling a plane's `active` flag is a uniform, only the plane count
    // shapes the shader.
    fn feature_hash(&self) -> Option<String> {
        Some(self.planes.len().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_counts_planes_not_activity() {
        let mut clips = ClipsState::new()
            .with_plane(ClipPlane::new(Vec3::ZERO, Vec3::X))
            .with_plane(ClipPlane::new(Vec3::ONE, Vec3::Y));
        let before = clips.feature_hash();
        clips.planes[0].active = false;
        clips.planes[1].position = Vec3::splat(4.0);

        assert_eq!(before, clips.feature_hash());
        assert_eq!(before.as_deref(), Some("2"));
    }
}

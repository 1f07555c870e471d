// renderer/state/transform.rs
use glam::{Mat4, Quat, Vec3};

use super::{RenderState, StateKind};

#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_trs(t: Vec3, r: Quat, s: Vec3) -> Self {
        Self {
            translation: t,
            rotation: r,
            scale: s,
        }
    }
}

/// World matrix of one object, with its normal matrix kept in step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    matrix: Mat4,
    normal_matrix: Mat4,
}

impl TransformState {
    pub fn identity() -> Self {
        Self::from_matrix(Mat4::IDENTITY)
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            matrix,
            normal_matrix: normal_matrix(matrix),
        }
    }

    pub fn from_transform(transform: &Transform) -> Self {
        Self::from_matrix(transform.matrix())
    }

    pub fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
        self.normal_matrix = normal_matrix(matrix);
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn normal_matrix(&self) -> Mat4 {
        self.normal_matrix
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::identity()
    }
}

impl RenderState for TransformState {
    const KIND: StateKind = StateKind::Transform;
}

fn normal_matrix(matrix: Mat4) -> Mat4 {
    if matrix.determinant().abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    matrix.inverse().transpose()
}

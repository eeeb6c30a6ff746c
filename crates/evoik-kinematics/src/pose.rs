//! Position, rotation, and non-uniform scale of a segment frame.

use nalgebra::{UnitQuaternion, Vector3};

/// A segment frame: position, rotation, and non-uniform scale.
///
/// Composition follows scene-graph semantics: a child's local position is
/// scaled by the parent's scale, then rotated, then offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity frame with unit scale.
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
        }
    }

    /// Frame with unit scale.
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            rotation,
            scale: Vector3::repeat(1.0),
        }
    }

    /// Pure translation with unit scale.
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Replace the scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// `self ∘ local`: express a frame given relative to `self` in the space
    /// `self` lives in. Position, rotation, and scale compose independently.
    #[must_use]
    pub fn concat(&self, local: &Self) -> Self {
        Self {
            position: self.transform_point(&local.position),
            rotation: self.rotation * local.rotation,
            scale: self.scale.component_mul(&local.scale),
        }
    }

    /// Map a point given in this frame's local coordinates to the parent space.
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.position + self.rotation * point.component_mul(&self.scale)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

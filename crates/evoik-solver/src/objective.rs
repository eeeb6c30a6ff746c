//! What each tip should achieve.

use nalgebra::{UnitQuaternion, Vector3};

use evoik_kinematics::SegmentId;

/// Objective kind evaluated at a tip segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectiveKind {
    /// Reach a world position.
    #[default]
    Position,
    /// Match a world orientation.
    Orientation,
    /// Position and orientation together.
    Pose,
    /// Point a local direction at a world position.
    LookAt,
}

/// Target, weight and tolerances for one tip.
///
/// Defaults: weight 1, all tolerances 0.01 (meters or radians), look-at
/// direction +Z.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub target_position: Vector3<f32>,
    pub target_rotation: UnitQuaternion<f32>,
    /// Local direction that [`ObjectiveKind::LookAt`] aims at the target.
    pub direction: Vector3<f32>,
    weight: f32,
    pub max_position_error: f32,
    pub max_orientation_error: f32,
    pub max_direction_error: f32,
}

impl Default for Objective {
    fn default() -> Self {
        Self {
            kind: ObjectiveKind::Position,
            target_position: Vector3::zeros(),
            target_rotation: UnitQuaternion::identity(),
            direction: Vector3::z(),
            weight: 1.0,
            max_position_error: 0.01,
            max_orientation_error: 0.01,
            max_direction_error: 0.01,
        }
    }
}

impl Objective {
    pub fn position(target: Vector3<f32>) -> Self {
        Self {
            kind: ObjectiveKind::Position,
            target_position: target,
            ..Self::default()
        }
    }

    pub fn orientation(target: UnitQuaternion<f32>) -> Self {
        Self {
            kind: ObjectiveKind::Orientation,
            target_rotation: target,
            ..Self::default()
        }
    }

    pub fn pose(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            kind: ObjectiveKind::Pose,
            target_position: position,
            target_rotation: rotation,
            ..Self::default()
        }
    }

    /// Aim the tip's local `direction` at `target`.
    pub fn look_at(target: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            kind: ObjectiveKind::LookAt,
            target_position: target,
            direction,
            ..Self::default()
        }
    }

    /// Set the weight, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.set_weight(weight);
        self
    }

    /// Set the position, orientation and direction tolerances.
    #[must_use]
    pub const fn with_tolerances(mut self, position: f32, orientation: f32, direction: f32) -> Self {
        self.max_position_error = position;
        self.max_orientation_error = orientation;
        self.max_direction_error = direction;
        self
    }

    pub const fn weight(&self) -> f32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }
}

/// An objective bound to a tip segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Tip {
    pub segment: SegmentId,
    pub objective: Objective,
}

impl Tip {
    pub const fn new(segment: SegmentId, objective: Objective) -> Self {
        Self { segment, objective }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

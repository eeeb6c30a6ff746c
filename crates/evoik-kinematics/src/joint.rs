//! Three-axis kinematic joint and its closed-form local transform.

use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::motion::JointMotion;
use crate::pose::Pose;

// ---------------------------------------------------------------------------
// JointType / Axis
// ---------------------------------------------------------------------------

/// Joint kind. Determines how axis values map to motion and whether limits
/// are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JointType {
    /// Bounded rotation about each free axis.
    #[default]
    Revolute,
    /// Unbounded rotation; values are searched in `[-π, π)` and never clamped.
    Continuous,
    /// Translation along each free axis.
    Prismatic,
}

impl JointType {
    pub const fn is_rotational(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous)
    }
}

/// One of the joint's three local motion axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// KinematicJoint
// ---------------------------------------------------------------------------

/// A joint with up to three independent motion axes.
///
/// The joint's axes are the unit X/Y/Z vectors rotated by
/// `axis_orientation`. Rotations pivot about `connection`, a point given in
/// the segment's local frame. The segment's reference pose is captured once
/// when the joint is attached to a topology; every transform the joint
/// produces is relative to that reference.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicJoint {
    joint_type: JointType,
    connection: Vector3<f32>,
    axis_orientation: UnitQuaternion<f32>,
    motions: [JointMotion; 3],
    axes: [Unit<Vector3<f32>>; 3],
    reference: Pose,
    pivot: Vector3<f32>,
}

impl KinematicJoint {
    /// A joint with all three axes fixed.
    pub fn new(joint_type: JointType) -> Self {
        let mut joint = Self {
            joint_type,
            connection: Vector3::zeros(),
            axis_orientation: UnitQuaternion::identity(),
            motions: [
                JointMotion::new(joint_type),
                JointMotion::new(joint_type),
                JointMotion::new(joint_type),
            ],
            axes: [Vector3::x_axis(), Vector3::y_axis(), Vector3::z_axis()],
            reference: Pose::identity(),
            pivot: Vector3::zeros(),
        };
        joint.update_axes();
        joint
    }

    /// Set the pivot point in the segment's local frame.
    #[must_use]
    pub fn with_connection(mut self, connection: Vector3<f32>) -> Self {
        self.connection = connection;
        self.pivot = connection.component_mul(&self.reference.scale);
        self
    }

    /// Rotate the joint's X/Y/Z axes.
    #[must_use]
    pub fn with_axis_orientation(mut self, orientation: UnitQuaternion<f32>) -> Self {
        self.axis_orientation = orientation;
        self.update_axes();
        self
    }

    /// Replace one axis' motion. The motion adopts this joint's type.
    #[must_use]
    pub fn with_motion(mut self, axis: Axis, mut motion: JointMotion) -> Self {
        motion.set_joint_type(self.joint_type);
        self.motions[axis.index()] = motion;
        self
    }

    pub const fn joint_type(&self) -> JointType {
        self.joint_type
    }

    pub const fn connection(&self) -> &Vector3<f32> {
        &self.connection
    }

    pub const fn axis_orientation(&self) -> &UnitQuaternion<f32> {
        &self.axis_orientation
    }

    /// The captured reference pose.
    pub const fn reference(&self) -> &Pose {
        &self.reference
    }

    /// Direction of `axis` in the segment's reference frame.
    pub const fn axis(&self, axis: Axis) -> &Unit<Vector3<f32>> {
        &self.axes[axis.index()]
    }

    pub const fn x_axis(&self) -> &Unit<Vector3<f32>> {
        &self.axes[0]
    }

    pub const fn y_axis(&self) -> &Unit<Vector3<f32>> {
        &self.axes[1]
    }

    pub const fn z_axis(&self) -> &Unit<Vector3<f32>> {
        &self.axes[2]
    }

    pub const fn motion(&self, axis: Axis) -> &JointMotion {
        &self.motions[axis.index()]
    }

    pub const fn motion_mut(&mut self, axis: Axis) -> &mut JointMotion {
        &mut self.motions[axis.index()]
    }

    /// Number of free axes.
    pub fn dof(&self) -> usize {
        self.motions.iter().filter(|m| m.is_free()).count()
    }

    /// Capture the segment's reference pose. Transforms computed afterwards
    /// are expressed relative to it.
    pub fn capture_reference(&mut self, reference: &Pose) {
        self.reference = *reference;
        self.pivot = self.connection.component_mul(&reference.scale);
    }

    /// Current target values `[x, y, z]`.
    pub fn target_values(&self) -> [f32; 3] {
        self.motions.each_ref().map(JointMotion::target)
    }

    /// Live (actuated) values `[x, y, z]`.
    pub fn current_values(&self) -> Vector3<f32> {
        Vector3::from(self.motions.each_ref().map(JointMotion::current))
    }

    pub fn current_errors(&self) -> Vector3<f32> {
        Vector3::from(self.motions.each_ref().map(JointMotion::error))
    }

    pub fn current_velocities(&self) -> Vector3<f32> {
        Vector3::from(self.motions.each_ref().map(JointMotion::velocity))
    }

    pub fn current_accelerations(&self) -> Vector3<f32> {
        Vector3::from(self.motions.each_ref().map(JointMotion::acceleration))
    }

    /// Advance all three motion profiles by `dt` seconds.
    pub fn apply(&mut self, dt: f32) {
        for motion in &mut self.motions {
            motion.apply(dt);
        }
    }

    /// Where the pivot sits given the segment's world frame.
    pub fn connection_in(&self, world: &Pose) -> Vector3<f32> {
        world.transform_point(&self.connection)
    }

    /// Local pose for the given axis values, keeping the reference scale.
    pub fn local_pose(&self, x: f32, y: f32, z: f32) -> Pose {
        let (position, rotation) = self.compute_transformation(x, y, z);
        Pose {
            position,
            rotation,
            scale: self.reference.scale,
        }
    }

    /// Local position and rotation for the given axis values.
    ///
    /// Rotational joints compose their axes in Z, X, Y order about the pivot.
    /// Axes with a zero value are skipped; all-zero input returns the
    /// reference pose untouched. Prismatic joints offset the reference
    /// position along the oriented axes.
    #[allow(clippy::float_cmp)]
    pub fn compute_transformation(
        &self,
        x: f32,
        y: f32,
        z: f32,
    ) -> (Vector3<f32>, UnitQuaternion<f32>) {
        let reference = &self.reference;

        if self.joint_type == JointType::Prismatic {
            let offset = self.axis_orientation * Vector3::new(x, y, z);
            return (
                reference.rotation * offset + reference.position,
                reference.rotation,
            );
        }

        let mut rotation: Option<UnitQuaternion<f32>> = None;
        for (value, axis) in [(z, Axis::Z), (x, Axis::X), (y, Axis::Y)] {
            if value != 0.0 {
                let step = UnitQuaternion::from_axis_angle(self.axis(axis), value);
                rotation = Some(rotation.map_or(step, |r| r * step));
            }
        }
        let Some(rotation) = rotation else {
            return (reference.position, reference.rotation);
        };

        let about_pivot = rotation * -self.pivot + self.pivot;
        (
            reference.position + reference.rotation * about_pivot,
            reference.rotation * rotation,
        )
    }

    fn update_axes(&mut self) {
        self.axes = [
            Unit::new_unchecked(self.axis_orientation * Vector3::x()),
            Unit::new_unchecked(self.axis_orientation * Vector3::y()),
            Unit::new_unchecked(self.axis_orientation * Vector3::z()),
        ];
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

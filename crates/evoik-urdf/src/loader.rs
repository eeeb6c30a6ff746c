//! Turn a [`RobotModel`] into a kinematic [`Topology`].
//!
//! Every link becomes a segment whose rest pose is the origin of the joint
//! that introduces it. Revolute, continuous and prismatic joints get a
//! single free axis; the joint's Z axis is rotated onto the URDF axis so the
//! free motion always lives on [`Axis::Z`].

use std::collections::VecDeque;
use std::f32::consts::PI;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, warn};

use evoik_kinematics::{Axis, JointMotion, KinematicJoint, MotionType, Pose, Topology};

use crate::error::UrdfError;
use crate::types::{JointData, JointType, RobotModel};

/// How imported joint axes track their targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportOptions {
    pub motion_type: MotionType,
    /// URDF carries no acceleration bound; this one is applied to every axis.
    pub max_acceleration: f32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            motion_type: MotionType::Teleport,
            max_acceleration: 0.0,
        }
    }
}

/// Build a topology rooted at the model's root link with default options.
pub fn load_topology(model: &RobotModel) -> Result<Topology, UrdfError> {
    load_topology_with(model, &ImportOptions::default())
}

/// Build a topology rooted at the model's root link.
///
/// Links are added breadth-first so every parent precedes its children.
pub fn load_topology_with(
    model: &RobotModel,
    options: &ImportOptions,
) -> Result<Topology, UrdfError> {
    model.link(&model.root_link)?;

    let mut topology = Topology::new();
    let root = topology.add_root(&model.root_link, Pose::identity())?;

    let mut queue = VecDeque::from([(model.root_link.as_str(), root)]);
    while let Some((link, parent)) = queue.pop_front() {
        for joint in model.child_joints(link) {
            let id = topology.add_segment(parent, &joint.child, joint.origin.to_pose())?;
            if let Some(kinematic) = convert_joint(joint, options) {
                topology.attach_joint(id, kinematic)?;
            }
            queue.push_back((joint.child.as_str(), id));
        }
    }

    debug!(
        robot = %model.name,
        segments = topology.len(),
        joints = topology.joint_ids().len(),
        "imported URDF topology"
    );
    Ok(topology)
}

fn convert_joint(joint: &JointData, options: &ImportOptions) -> Option<KinematicJoint> {
    let joint_type = match joint.joint_type {
        JointType::Revolute => evoik_kinematics::JointType::Revolute,
        JointType::Continuous => evoik_kinematics::JointType::Continuous,
        JointType::Prismatic => evoik_kinematics::JointType::Prismatic,
        JointType::Fixed => return None,
        JointType::Floating | JointType::Planar => {
            warn!(joint = %joint.name, joint_type = ?joint.joint_type, "importing as fixed");
            return None;
        }
    };

    let (lower, upper) = match joint.joint_type {
        JointType::Prismatic => (
            joint.limits.lower.unwrap_or(0.0),
            joint.limits.upper.unwrap_or(0.0),
        ),
        _ => (
            joint.limits.lower.unwrap_or(-PI),
            joint.limits.upper.unwrap_or(PI),
        ),
    };

    let motion = JointMotion::free(joint_type, lower, upper)
        .with_dynamics(joint.limits.velocity, options.max_acceleration)
        .with_motion_type(options.motion_type);

    Some(
        KinematicJoint::new(joint_type)
            .with_axis_orientation(axis_orientation(joint.axis))
            .with_motion(Axis::Z, motion),
    )
}

/// Rotation taking +Z onto `axis`. Degenerate axes fall back to +Z.
fn axis_orientation(axis: [f32; 3]) -> UnitQuaternion<f32> {
    let axis = Vector3::from(axis);
    if axis.norm() <= f32::EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::rotation_between(&Vector3::z(), &axis).unwrap_or_else(|| {
        // Antiparallel: any half turn about a perpendicular axis works.
        UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-memory URDF kinematic tree.
//!
//! Only the parts of a URDF the solver needs are kept: link names, and for
//! each joint its type, parent/child links, origin, axis and limits.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};

use evoik_kinematics::Pose;

use crate::error::UrdfError;

// ---------------------------------------------------------------------------
// JointType
// ---------------------------------------------------------------------------

/// URDF joint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Rotation about a single axis, with position limits.
    Revolute,
    /// Unlimited rotation about a single axis.
    Continuous,
    /// Translation along an axis, with position limits.
    Prismatic,
    /// No relative motion between parent and child.
    Fixed,
    /// Unconstrained 6-DOF joint. Imported as fixed.
    Floating,
    /// Planar motion. Imported as fixed.
    Planar,
}

impl JointType {
    /// Whether the importer gives this joint a free axis.
    pub const fn is_actuated(self) -> bool {
        matches!(self, Self::Revolute | Self::Continuous | Self::Prismatic)
    }
}

// ---------------------------------------------------------------------------
// JointLimits / Origin
// ---------------------------------------------------------------------------

/// Limits on a joint's position and velocity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointLimits {
    /// Lower position limit (rad or m). `None` means unbounded.
    pub lower: Option<f32>,
    /// Upper position limit (rad or m). `None` means unbounded.
    pub upper: Option<f32>,
    /// Maximum velocity (rad/s or m/s).
    pub velocity: f32,
}

/// A 3D pose specified as position + roll-pitch-yaw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Origin {
    /// Translation `[x, y, z]` in meters.
    pub xyz: [f32; 3],
    /// Rotation `[roll, pitch, yaw]` in radians.
    pub rpy: [f32; 3],
}

impl Origin {
    /// Rest pose of the child link in its parent's frame.
    pub fn to_pose(&self) -> Pose {
        let [x, y, z] = self.xyz;
        let [roll, pitch, yaw] = self.rpy;
        Pose::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }
}

// ---------------------------------------------------------------------------
// JointData / RobotModel
// ---------------------------------------------------------------------------

/// One URDF joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointData {
    pub name: String,
    pub joint_type: JointType,
    /// Parent link name.
    pub parent: String,
    /// Child link name.
    pub child: String,
    /// Child link origin relative to the parent link.
    pub origin: Origin,
    /// Joint axis in the child frame (default `[1, 0, 0]` per URDF).
    pub axis: [f32; 3],
    pub limits: JointLimits,
}

/// Kinematic tree of a URDF robot.
#[derive(Debug, Clone)]
pub struct RobotModel {
    /// Robot name.
    pub name: String,
    /// Link names in document order.
    pub links: Vec<String>,
    /// All joints, keyed by name.
    pub joints: HashMap<String, JointData>,
    /// Name of the root link (the one never referenced as a child).
    pub root_link: String,
}

impl RobotModel {
    /// Get a joint by name.
    pub fn joint(&self, name: &str) -> Option<&JointData> {
        self.joints.get(name)
    }

    /// Check a link exists.
    pub fn link(&self, name: &str) -> Result<&str, UrdfError> {
        self.links
            .iter()
            .find(|l| *l == name)
            .map(String::as_str)
            .ok_or_else(|| UrdfError::MissingLink(name.into()))
    }

    /// Joints whose parent is `link`, sorted by name.
    pub fn child_joints(&self, link: &str) -> Vec<&JointData> {
        let mut children: Vec<&JointData> =
            self.joints.values().filter(|j| j.parent == link).collect();
        children.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// Iterate over joints that import with a free axis.
    pub fn actuated_joints(&self) -> impl Iterator<Item = &JointData> {
        self.joints.values().filter(|j| j.joint_type.is_actuated())
    }

    /// Number of free axes after import.
    pub fn dof(&self) -> usize {
        self.actuated_joints().count()
    }

    /// Names of actuated joints, sorted alphabetically.
    pub fn actuated_joint_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actuated_joints().map(|j| j.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn joint(name: &str, joint_type: JointType, parent: &str, child: &str) -> JointData {
        JointData {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            origin: Origin::default(),
            axis: [0.0, 0.0, 1.0],
            limits: JointLimits::default(),
        }
    }

    fn sample_model() -> RobotModel {
        let mut joints = HashMap::new();
        for j in [
            joint("joint2", JointType::Continuous, "base", "link2"),
            joint("joint1", JointType::Revolute, "base", "link1"),
            joint("tool", JointType::Fixed, "link1", "tool"),
        ] {
            joints.insert(j.name.clone(), j);
        }
        RobotModel {
            name: "sample".into(),
            links: vec!["base".into(), "link1".into(), "link2".into(), "tool".into()],
            joints,
            root_link: "base".into(),
        }
    }

    #[test]
    fn dof_counts_actuated_joints() {
        let model = sample_model();
        assert_eq!(model.dof(), 2);
        assert_eq!(model.actuated_joint_names(), vec!["joint1", "joint2"]);
    }

    #[test]
    fn child_joints_sorted_by_name() {
        let model = sample_model();
        let names: Vec<&str> = model
            .child_joints("base")
            .iter()
            .map(|j| j.name.as_str())
            .collect();
        assert_eq!(names, vec!["joint1", "joint2"]);
        assert!(model.child_joints("tool").is_empty());
    }

    #[test]
    fn missing_link_is_an_error() {
        let model = sample_model();
        assert_eq!(model.link("link1").unwrap(), "link1");
        assert!(matches!(model.link("nope"), Err(UrdfError::MissingLink(_))));
    }

    #[test]
    fn origin_to_pose() {
        let origin = Origin {
            xyz: [0.1, 0.2, 0.3],
            rpy: [0.0, 0.0, FRAC_PI_2],
        };
        let pose = origin.to_pose();
        assert_relative_eq!(pose.position, Vector3::new(0.1, 0.2, 0.3));
        assert_relative_eq!(pose.rotation * Vector3::x(), Vector3::y(), epsilon = 1e-6);
    }

    #[test]
    fn identity_origin() {
        let pose = Origin::default().to_pose();
        assert_relative_eq!(pose.position, Vector3::zeros());
        assert_relative_eq!(pose.rotation.angle(), 0.0);
    }
}

//! Canned segment trees.
//!
//! Every fixture hangs from a root segment called `base` at the origin and
//! names its tip segment in [`Fixture::tip`].

use std::f32::consts::{FRAC_PI_2, PI};

use nalgebra::Vector3;

use evoik_kinematics::{Axis, JointMotion, JointType, KinematicJoint, Pose, SegmentId, Topology};

/// A topology plus the segments a test usually needs.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub topology: Topology,
    pub root: SegmentId,
    pub tip: SegmentId,
}

/// Revolute joint about local Z with limits `[lower, upper]`.
pub fn hinge(lower: f32, upper: f32) -> KinematicJoint {
    KinematicJoint::new(JointType::Revolute)
        .with_motion(Axis::Z, JointMotion::free(JointType::Revolute, lower, upper))
}

/// `base -> shoulder (hinge about Z, ±π/2) -> hand` with the hand
/// `arm_length` along the shoulder's X axis.
///
/// The hand sits at `(L cos θ, L sin θ, 0)` for joint value `θ`.
pub fn single_revolute_arm(arm_length: f32) -> Fixture {
    let mut topology = Topology::new();
    let base = topology.add_root("base", Pose::identity()).expect("root");
    let shoulder = topology
        .add_segment(base, "shoulder", Pose::identity())
        .expect("shoulder");
    let hand = topology
        .add_segment(
            shoulder,
            "hand",
            Pose::from_position(Vector3::new(arm_length, 0.0, 0.0)),
        )
        .expect("hand");
    topology
        .attach_joint(shoulder, hinge(-FRAC_PI_2, FRAC_PI_2))
        .expect("attach shoulder");
    Fixture {
        topology,
        root: base,
        tip: hand,
    }
}

/// `base -> j1 -> j2` with two hinges 1 m apart along Z; the tip is `j2`.
pub fn straight_two_joint_chain() -> Fixture {
    let mut topology = Topology::new();
    let base = topology.add_root("base", Pose::identity()).expect("root");
    let j1 = topology
        .add_segment(base, "j1", Pose::identity())
        .expect("j1");
    let j2 = topology
        .add_segment(j1, "j2", Pose::from_position(Vector3::new(0.0, 0.0, 1.0)))
        .expect("j2");
    topology.attach_joint(j1, hinge(-PI, PI)).expect("attach j1");
    topology.attach_joint(j2, hinge(-PI, PI)).expect("attach j2");
    Fixture {
        topology,
        root: base,
        tip: j2,
    }
}

/// `base -> link -> tool` where `link` carries a joint with no free axis.
pub fn fixed_only_chain() -> Fixture {
    let mut topology = Topology::new();
    let base = topology.add_root("base", Pose::identity()).expect("root");
    let link = topology
        .add_segment(base, "link", Pose::from_position(Vector3::new(0.5, 0.0, 0.0)))
        .expect("link");
    let tool = topology
        .add_segment(link, "tool", Pose::from_position(Vector3::new(0.5, 0.0, 0.0)))
        .expect("tool");
    topology
        .attach_joint(link, KinematicJoint::new(JointType::Revolute))
        .expect("attach");
    Fixture {
        topology,
        root: base,
        tip: tool,
    }
}

/// Planar arm in the XY plane:
/// `base -> shoulder (hinge ±π) -> elbow (hinge ±π, `l1` along X) -> hand (`l2` along X)`.
pub fn planar_two_link_arm(l1: f32, l2: f32) -> Fixture {
    let mut topology = Topology::new();
    let base = topology.add_root("base", Pose::identity()).expect("root");
    let shoulder = topology
        .add_segment(base, "shoulder", Pose::identity())
        .expect("shoulder");
    let elbow = topology
        .add_segment(shoulder, "elbow", Pose::from_position(Vector3::new(l1, 0.0, 0.0)))
        .expect("elbow");
    let hand = topology
        .add_segment(elbow, "hand", Pose::from_position(Vector3::new(l2, 0.0, 0.0)))
        .expect("hand");
    topology
        .attach_joint(shoulder, hinge(-PI, PI))
        .expect("attach shoulder");
    topology
        .attach_joint(elbow, hinge(-PI, PI))
        .expect("attach elbow");
    Fixture {
        topology,
        root: base,
        tip: hand,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

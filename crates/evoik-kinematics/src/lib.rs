//! Kinematic description of a segment tree for the evoik solver.
//!
//! # Architecture
//!
//! ```text
//! Topology (arena of Segments) ──► Chain (root..tip path)
//!     │
//!     └── Segment ──► KinematicJoint ──► JointMotion × 3
//! ```
//!
//! A [`Topology`] is built once from the physical hierarchy. Joints are
//! evaluated in closed form by [`KinematicJoint::compute_transformation`],
//! and each axis tracks its target over time through a [`JointMotion`]
//! integrator.

pub mod chain;
pub mod joint;
pub mod motion;
pub mod pose;
pub mod topology;

pub use chain::Chain;
pub use joint::{Axis, JointType, KinematicJoint};
pub use motion::{AxisState, JointMotion, MotionType};
pub use pose::Pose;
pub use topology::{Segment, SegmentId, Topology};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::chain::Chain;
    pub use crate::joint::{Axis, JointType, KinematicJoint};
    pub use crate::motion::{AxisState, JointMotion, MotionType};
    pub use crate::pose::Pose;
    pub use crate::topology::{Segment, SegmentId, Topology};
}
